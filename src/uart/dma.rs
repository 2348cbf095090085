//! DMA context and the receive descriptor chain.
//!
//! The receive region is covered by at most two descriptors:
//!
//! ```text
//!  0          read-1        write                 len
//!  ├──── wrap ────┤ (unread) ├──────── resume ────────┤
//! ```
//!
//! `resume` runs from the current write position towards the end of the
//! buffer; `wrap` restarts at offset 0 and stops one slot short of the read
//! cursor. Neither ever covers unread data, so the channel stops instead of
//! overwriting when the ring is full.

use core::ptr::NonNull;

use crate::config::DmaConfig;

/// Channel index assigned by the DMA controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DmaChannel(pub u8);

/// One contiguous destination block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxDescriptor {
    pub offset: usize,
    pub len: usize,
}

/// Resume descriptor linked to an optional wrap descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorChain {
    pub resume: Option<RxDescriptor>,
    pub wrap: Option<RxDescriptor>,
}

impl DescriptorChain {
    /// Chain covering every free slot for the given cursors.
    pub fn for_free_region(write: usize, read: usize, len: usize) -> Self {
        debug_assert!(write < len && read < len, "cursor outside ring");
        let free = (read + len - write - 1) % len;
        if free == 0 {
            return Self::default();
        }
        let first = free.min(len - write);
        let rest = free - first;
        Self {
            resume: Some(RxDescriptor {
                offset: write,
                len: first,
            }),
            wrap: (rest > 0).then_some(RxDescriptor {
                offset: 0,
                len: rest,
            }),
        }
    }

    /// Total bytes the chain can accept.
    pub fn capacity(&self) -> usize {
        self.resume.map_or(0, |d| d.len) + self.wrap.map_or(0, |d| d.len)
    }

    pub fn is_empty(&self) -> bool {
        self.capacity() == 0
    }
}

/// Destination memory handed to the DMA controller.
///
/// Only the controller writes through it, and only inside an armed
/// descriptor.
#[derive(Debug, Clone, Copy)]
pub struct RxRegion {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is a view of a `'static` buffer owned by the stream;
// moving the view to the controller's context does not alias any Rust
// reference, and the driver only reads offsets outside armed descriptors.
unsafe impl Send for RxRegion {}

impl RxRegion {
    pub(crate) fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Store one received byte.
    ///
    /// # Safety
    ///
    /// `offset` must lie inside a descriptor currently armed on the channel
    /// this region was given to, and the stream must not have been
    /// deinitialised.
    pub unsafe fn store(&self, offset: usize, byte: u8) {
        debug_assert!(offset < self.len);
        // SAFETY: the caller guarantees the offset is armed, so the driver
        // is not reading it.
        unsafe { self.base.as_ptr().add(offset).write_volatile(byte) }
    }

    /// # Safety
    ///
    /// `offset` must lie in the unread region, which the DMA is never armed
    /// to write.
    pub(crate) unsafe fn load(&self, offset: usize) -> u8 {
        debug_assert!(offset < self.len);
        // SAFETY: see the function contract.
        unsafe { self.base.as_ptr().add(offset).read_volatile() }
    }
}

/// Runtime DMA state of one stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DmaContext {
    pub cfg: DmaConfig,
    pub channel: DmaChannel,
    pub chain: DescriptorChain,
}
