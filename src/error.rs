//! Unified error types for the UART I/O stream.
//!
//! A single `Error` enum that every layer converts into, so callers of the
//! stream see one status type at the call boundary. All variants are `Copy`
//! so they can be returned from interrupt context without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible stream operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The DMA controller refused an operation.
    Dma(DmaError),
    /// The UART peripheral reported a failure.
    Uart(UartError),
    /// The static configuration record is invalid.
    Config(&'static str),
    /// The peer sent XOFF; nothing was transmitted.
    TxPaused,
    /// A response line could not be formatted.
    Response(ResponseError),
    /// A `core::fmt` formatter failed.
    Format,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dma(e) => write!(f, "dma: {e}"),
            Self::Uart(e) => write!(f, "uart: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::TxPaused => write!(f, "transmit paused by remote XOFF"),
            Self::Response(e) => write!(f, "response: {e}"),
            Self::Format => write!(f, "formatter error"),
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Self::Format
    }
}

// ---------------------------------------------------------------------------
// DMA errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Every channel of the controller is already allocated.
    NoChannelAvailable,
    /// The channel is not allocated or out of range.
    InvalidChannel,
    /// The controller rejected the descriptor chain.
    TransferFailed,
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChannelAvailable => write!(f, "no free DMA channel"),
            Self::InvalidChannel => write!(f, "invalid DMA channel"),
            Self::TransferFailed => write!(f, "DMA transfer failed"),
        }
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Self::Dma(e)
    }
}

// ---------------------------------------------------------------------------
// UART errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// The transmit register did not accept the byte.
    TxFailed,
}

impl fmt::Display for UartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxFailed => write!(f, "transmit failed"),
        }
    }
}

impl From<UartError> for Error {
    fn from(e: UartError) -> Self {
        Self::Uart(e)
    }
}

// ---------------------------------------------------------------------------
// Response print errors
// ---------------------------------------------------------------------------

/// Response-print failures. The discriminant is the code printed in the
/// trailing `{internal_error:N}` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseError {
    /// The staged line exceeded the line buffer.
    LineTooLong = 11,
    /// A tag contained a reserved character.
    InvalidTag = 13,
}

impl ResponseError {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineTooLong => write!(f, "line too long"),
            Self::InvalidTag => write!(f, "invalid tag"),
        }
    }
}

impl From<ResponseError> for Error {
    fn from(e: ResponseError) -> Self {
        Self::Response(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
