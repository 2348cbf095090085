//! XON/XOFF software flow control.
//!
//! Inbound: the peer's XOFF/XON bytes toggle `remote_xon`, which gates
//! transmission. The bytes are left in the application-visible stream.
//!
//! Outbound: when the receive ring fills to the stop watermark the driver
//! sends XOFF and clears `xon`; once reads drain it to the resume watermark
//! it sends XON.

use core::sync::atomic::{AtomicBool, Ordering};

/// Resume transmission.
pub const XON: u8 = 0x11;
/// Stop transmission.
pub const XOFF: u8 = 0x13;

/// Fill levels at which local flow control toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    /// Send XOFF when this many bytes are unread.
    pub stop_at: usize,
    /// Send XON when unread bytes drop to this many.
    pub resume_at: usize,
}

impl Watermarks {
    pub fn for_capacity(capacity: usize) -> Self {
        Self {
            stop_at: (capacity - capacity / 4).max(1),
            resume_at: capacity / 4,
        }
    }
}

/// What the local side should send after a fill-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalAction {
    None,
    SendXoff,
    SendXon,
}

pub(crate) struct FlowControl {
    enabled: bool,
    watermarks: Watermarks,
    /// This side lets the peer transmit.
    xon: AtomicBool,
    /// The peer lets this side transmit.
    remote_xon: AtomicBool,
}

impl FlowControl {
    pub fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            watermarks: Watermarks::for_capacity(capacity),
            xon: AtomicBool::new(true),
            remote_xon: AtomicBool::new(true),
        }
    }

    pub fn xon(&self) -> bool {
        self.xon.load(Ordering::Acquire)
    }

    pub fn remote_xon(&self) -> bool {
        self.remote_xon.load(Ordering::Acquire)
    }

    /// Transmission is allowed.
    pub fn may_transmit(&self) -> bool {
        !self.enabled || self.remote_xon()
    }

    /// Inspect one received byte. Returns the control byte when it changed
    /// the remote state.
    pub fn observe(&self, byte: u8) -> Option<u8> {
        if !self.enabled {
            return None;
        }
        match byte {
            XOFF => {
                self.remote_xon.store(false, Ordering::Release);
                Some(XOFF)
            }
            XON => {
                self.remote_xon.store(true, Ordering::Release);
                Some(XON)
            }
            _ => None,
        }
    }

    /// Decide whether the local side must send a control byte for the
    /// current fill level.
    pub fn local_action(&self, unread: usize) -> LocalAction {
        if !self.enabled {
            return LocalAction::None;
        }
        let xon = self.xon();
        if xon && unread >= self.watermarks.stop_at {
            LocalAction::SendXoff
        } else if !xon && unread <= self.watermarks.resume_at {
            LocalAction::SendXon
        } else {
            LocalAction::None
        }
    }

    /// Record that a control byte went out.
    pub fn sent(&self, action: LocalAction) {
        match action {
            LocalAction::SendXoff => self.xon.store(false, Ordering::Release),
            LocalAction::SendXon => self.xon.store(true, Ordering::Release),
            LocalAction::None => {}
        }
    }
}
