//! Receive ring buffer.
//!
//! The DMA controller is the single producer and advances the write
//! position; the driver is the single consumer and owns two cursors:
//!
//! - `read`: next byte handed to the application.
//! - `scan`: next byte to inspect for flow-control characters. Always at or
//!   ahead of `read`, never past the write position.
//!
//! One slot always stays empty so `write == read` means "no data".

use core::ptr::NonNull;

use super::dma::{DescriptorChain, RxRegion};
use crate::config::MIN_RX_BUFFER_SIZE;

pub(crate) struct RxRing {
    region: RxRegion,
    len: usize,
    read: usize,
    scan: usize,
}

impl RxRing {
    /// The caller has checked the length against [`MIN_RX_BUFFER_SIZE`].
    pub fn new(buffer: &'static mut [u8]) -> Self {
        let len = buffer.len();
        debug_assert!(len >= MIN_RX_BUFFER_SIZE);
        let base = NonNull::from(buffer).cast::<u8>();
        Self {
            region: RxRegion::new(base, len),
            len,
            read: 0,
            scan: 0,
        }
    }

    pub fn region(&self) -> RxRegion {
        self.region
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Usable bytes (one slot stays empty).
    pub fn capacity(&self) -> usize {
        self.len - 1
    }

    /// Bytes between the read cursor and `write`.
    pub fn available(&self, write: usize) -> usize {
        (write + self.len - self.read) % self.len
    }

    /// Descriptor chain covering the free region for `write`.
    pub fn chain(&self, write: usize) -> DescriptorChain {
        DescriptorChain::for_free_region(write, self.read, self.len)
    }

    /// Feed every byte between the scan cursor and `write` to `visit`.
    /// Returns the number of bytes scanned.
    pub fn scan(&mut self, write: usize, mut visit: impl FnMut(u8)) -> usize {
        let pending = (write + self.len - self.scan) % self.len;
        for _ in 0..pending {
            // SAFETY: `scan` lies in [read, write), which the DMA is not
            // armed to write.
            visit(unsafe { self.region.load(self.scan) });
            self.scan = (self.scan + 1) % self.len;
        }
        pending
    }

    /// Copy up to `out.len()` bytes from the read cursor towards `write`,
    /// in arrival order, and advance the cursor.
    pub fn copy_out(&mut self, write: usize, out: &mut [u8]) -> usize {
        let n = self.available(write).min(out.len());
        for slot in out.iter_mut().take(n) {
            // SAFETY: `read` lies in the unread region [read, write).
            *slot = unsafe { self.region.load(self.read) };
            self.read = (self.read + 1) % self.len;
        }
        // The scan cursor may not fall behind the read cursor.
        if (self.scan + self.len - self.read) % self.len > self.available(write) {
            self.scan = self.read;
        }
        n
    }

    /// Give the buffer back once the DMA channel is stopped.
    pub fn into_buffer(self) -> &'static mut [u8] {
        // SAFETY: the region was created from a `&'static mut [u8]` of
        // `len` bytes in `new`, and the caller has stopped the DMA, so this
        // is again the only reference to it.
        unsafe { core::slice::from_raw_parts_mut(self.region_ptr(), self.len) }
    }

    fn region_ptr(&self) -> *mut u8 {
        self.region.base_ptr()
    }
}
