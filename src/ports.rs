//! Port traits: the boundary between the stream driver and the hardware.
//!
//! ```text
//!   UartStream ──▶ UartPort   (data register, IRQ lines)
//!              ──▶ DmaPort    (channel pool, descriptor chain)
//!              ──▶ PowerPort  (energy-mode requirements)
//! ```
//!
//! A target HAL implements these against real registers; the
//! [`sim`](crate::adapters::sim) adapters implement them in memory so the
//! driver runs unchanged on the host.

use crate::config::{DmaConfig, IrqNumber};
use crate::error::{DmaError, UartError};
use crate::power::EnergyMode;
use crate::uart::dma::{DescriptorChain, DmaChannel, RxRegion};

// ───────────────────────────────────────────────────────────────
// UART peripheral port
// ───────────────────────────────────────────────────────────────

/// Transmit side and interrupt control of one UART instance.
pub trait UartPort {
    /// Queue one byte for transmission, waiting for FIFO space.
    fn write_byte(&mut self, byte: u8) -> Result<(), UartError>;

    /// Enable or disable a peripheral interrupt line at the NVIC.
    fn set_irq_enabled(&mut self, irq: IrqNumber, enabled: bool);

    /// Enable or disable the "transmission complete" interrupt source.
    fn enable_tx_complete_irq(&mut self, enable: bool);

    /// Enable or disable the "receive data valid" interrupt source, used to
    /// detect the first byte after the receiver's clock was stopped.
    fn enable_rx_data_irq(&mut self, enable: bool);
}

// ───────────────────────────────────────────────────────────────
// DMA controller port
// ───────────────────────────────────────────────────────────────

/// Channel allocation and peripheral-to-memory transfers.
///
/// The controller writes received bytes into `region` following the
/// descriptor chain: `resume` first, then `wrap`, then it stops. Bytes that
/// arrive while the channel is stopped or paused stay in the peripheral.
pub trait DmaPort {
    fn allocate_channel(&mut self) -> Result<DmaChannel, DmaError>;

    fn free_channel(&mut self, channel: DmaChannel) -> Result<(), DmaError>;

    /// Start a free-running receive transfer into `region`.
    fn start_rx(
        &mut self,
        channel: DmaChannel,
        cfg: &DmaConfig,
        region: RxRegion,
        chain: &DescriptorChain,
    ) -> Result<(), DmaError>;

    /// Hold the channel so its write position is stable.
    fn pause(&mut self, channel: DmaChannel);

    /// Replace the descriptor chain and resume the channel.
    fn load(&mut self, channel: DmaChannel, chain: &DescriptorChain) -> Result<(), DmaError>;

    /// Offset in the region of the next byte the channel will write, in
    /// `0..=len`. A channel parked at the end of the last block may report
    /// `len`; the driver treats it as offset 0.
    fn write_offset(&self, channel: DmaChannel) -> usize;

    /// Abort the transfer.
    fn stop(&mut self, channel: DmaChannel);
}

// ───────────────────────────────────────────────────────────────
// Power manager port
// ───────────────────────────────────────────────────────────────

/// Energy-mode requirement bookkeeping. Requirements are counted; the
/// system never sleeps deeper than the shallowest outstanding one.
pub trait PowerPort {
    fn add_requirement(&mut self, mode: EnergyMode);

    fn remove_requirement(&mut self, mode: EnergyMode);
}

/// Used when no power manager is integrated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerManager;

impl PowerPort for NoPowerManager {
    fn add_requirement(&mut self, _mode: EnergyMode) {}

    fn remove_requirement(&mut self, _mode: EnergyMode) {}
}
