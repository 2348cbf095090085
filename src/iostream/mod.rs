//! Byte-stream abstraction shared by every stream backend.
//!
//! Concrete implementations:
//! - [`UartStream`](crate::uart::UartStream): DMA-backed UART
//! - [`NullStream`]: discards writes, never reads
//!
//! Helpers such as [`StreamExt::print`] and the
//! [`ResponsePrinter`](response::ResponsePrinter) are generic over
//! `IoStream`, so adding a backend requires no changes to them.
//!
//! Receivers are `&self` so one stream can be shared between a task and
//! its interrupt handler.

pub mod response;

use core::fmt;

use crate::error::{Error, Result, UartError};

/// Byte-oriented stream.
pub trait IoStream {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read; 0 when nothing is
    /// available and the stream does not block.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data`. Returns the number of input bytes consumed.
    fn write(&self, data: &[u8]) -> Result<usize>;
}

impl<T: IoStream + ?Sized> IoStream for &T {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }
}

/// A stream that discards all writes and never reads.
/// Useful as a default sink before a console is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStream;

impl IoStream for NullStream {
    fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }
}

/// Convenience operations available on every [`IoStream`].
pub trait StreamExt: IoStream {
    /// Write all of `data`, retrying on partial writes.
    fn write_all(&self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(Error::Uart(UartError::TxFailed)),
                n => data = &data[n..],
            }
        }
        Ok(())
    }

    fn putchar(&self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    /// Next byte, or `None` when nothing is available.
    fn getchar(&self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Formatted output, e.g. `stream.print(format_args!("x={}", x))`.
    fn print(&self, args: fmt::Arguments<'_>) -> Result<()> {
        let mut adapter = FmtAdapter {
            stream: self,
            error: None,
        };
        match fmt::write(&mut adapter, args) {
            Ok(()) => Ok(()),
            Err(fmt::Error) => Err(adapter.error.unwrap_or(Error::Format)),
        }
    }
}

impl<T: IoStream + ?Sized> StreamExt for T {}

/// Bridges `core::fmt` onto a stream, keeping the stream error that
/// `fmt::Error` cannot carry.
struct FmtAdapter<'a, S: ?Sized> {
    stream: &'a S,
    error: Option<Error>,
}

impl<S: IoStream + ?Sized> fmt::Write for FmtAdapter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.stream.write_all(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}
