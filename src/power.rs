//! Energy-mode vocabulary shared by the driver and the power manager.
//!
//! The power manager keeps a set of requirements; the system never sleeps
//! deeper than the shallowest required mode. A stream that must keep
//! receiving while the CPU sleeps requires the mode its receiver still
//! runs in.

use serde::{Deserialize, Serialize};

/// Processor energy modes, shallowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnergyMode {
    /// Active.
    Em0,
    /// Sleep: core stopped, high-frequency peripherals running.
    Em1,
    /// Deep sleep: high-frequency clocks stopped.
    Em2,
    /// Stop.
    Em3,
}

impl EnergyMode {
    pub const ALL: [Self; 4] = [Self::Em0, Self::Em1, Self::Em2, Self::Em3];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// What the power manager should do when an interrupt handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IsrExitAction {
    /// The stream did not raise the interrupt.
    #[default]
    Ignore = 0,
    /// The stream raised it and the main loop must run.
    Wakeup = 1,
    /// The stream raised it but the system may go back to sleep.
    Sleep = 2,
}

impl IsrExitAction {
    /// Merge a new outcome into a pending one. `Wakeup` wins over `Sleep`.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Wakeup, _) | (_, Self::Wakeup) => Self::Wakeup,
            (Self::Sleep, _) | (_, Self::Sleep) => Self::Sleep,
            _ => Self::Ignore,
        }
    }
}

/// Per-stream requirement bookkeeping.
#[cfg(feature = "power-manager")]
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnergyState {
    pub rx_em: EnergyMode,
    pub tx_em: EnergyMode,
    /// The receive requirement is currently asserted.
    pub rx_req_added: bool,
    /// No transmission is in flight (transmit requirement released).
    pub tx_idle: bool,
}

#[cfg(feature = "power-manager")]
impl EnergyState {
    pub fn new(rx_em: EnergyMode, tx_em: EnergyMode) -> Self {
        Self {
            rx_em,
            tx_em,
            rx_req_added: false,
            tx_idle: true,
        }
    }
}
