//! Stream configuration parameters
//!
//! The static configuration record handed to [`UartStream::new`]. Values are
//! chosen at build time; the record can also be persisted with postcard or
//! loaded from JSON on the host.
//!
//! [`UartStream::new`]: crate::uart::UartStream::new

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::power::EnergyMode;

/// Start + 8 data + stop bits, no parity.
pub const BITS_PER_FRAME: u32 = 10;

/// Time the driver keeps the DMA paused while re-arming after a read.
pub const DMA_UPDATE_TIME_NS: u64 = 23_700;

/// Smallest ring that can hold one byte (one slot always stays empty).
pub const MIN_RX_BUFFER_SIZE: usize = 2;

pub const DEFAULT_RX_BUFFER_SIZE: usize = 32;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Peripheral class backing the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeripheralKind {
    /// Classic USART with a 2-byte receive FIFO.
    Usart,
    /// Enhanced USART with a 16-byte receive FIFO.
    Eusart,
}

impl PeripheralKind {
    /// Receive FIFO depth in bytes.
    pub const fn fifo_depth(self) -> usize {
        match self {
            Self::Usart => 2,
            Self::Eusart => 16,
        }
    }
}

/// NVIC interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrqNumber(pub u16);

/// Peripheral-to-memory DMA configuration supplied at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaConfig {
    /// Peripheral request line that triggers a transfer.
    pub peripheral_signal: u32,
    /// Address of the peripheral's receive data register.
    pub source_register: u32,
}

/// Per-instance stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartStreamConfig {
    pub peripheral: PeripheralKind,
    pub baud_rate: u32,
    pub dma: DmaConfig,
    pub rx_irq: IrqNumber,
    pub tx_irq: IrqNumber,
    /// Receive ring length in bytes; must match the buffer handed to init.
    pub rx_buffer_size: usize,
    /// Expand outbound `\n` to `\r\n`.
    pub lf_to_crlf: bool,
    /// Assert the receive energy-mode restriction at init.
    pub rx_when_sleeping: bool,
    /// XON/XOFF software flow control.
    pub sw_flow_control: bool,
    /// Deepest mode in which the receiver still runs.
    pub rx_energy_mode: EnergyMode,
    /// Mode required while a transmission is in flight.
    pub tx_energy_mode: EnergyMode,
}

impl Default for UartStreamConfig {
    fn default() -> Self {
        Self {
            peripheral: PeripheralKind::Usart,
            baud_rate: DEFAULT_BAUD_RATE,
            dma: DmaConfig {
                peripheral_signal: 0,
                source_register: 0,
            },
            rx_irq: IrqNumber(0),
            tx_irq: IrqNumber(1),
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            lf_to_crlf: true,
            rx_when_sleeping: true,
            sw_flow_control: false,
            rx_energy_mode: EnergyMode::Em1,
            tx_energy_mode: EnergyMode::Em1,
        }
    }
}

impl UartStreamConfig {
    /// Basic sanity checks. Sizing against the baud rate is only warned
    /// about; it is an operational constraint, not an error.
    pub fn validate(&self) -> Result<()> {
        if self.rx_buffer_size < MIN_RX_BUFFER_SIZE {
            return Err(Error::Config("rx_buffer_size must be at least 2"));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be non-zero"));
        }
        let max = self.max_baud_without_flow_control();
        if self.baud_rate > max && !self.sw_flow_control {
            warn!(
                "config: {} baud exceeds {} sustainable by {:?} during DMA update; data may be dropped",
                self.baud_rate, max, self.peripheral
            );
        }
        Ok(())
    }

    /// Highest baud rate whose bytes fit in the peripheral FIFO while the
    /// DMA is paused for an update.
    pub fn max_baud_without_flow_control(&self) -> u32 {
        max_baud_without_flow_control(self.peripheral.fifo_depth())
    }

    /// Serialise for persistent storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Config("config encode failed"))
    }

    /// Deserialise from persistent storage and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cfg: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::Config("config corrupted"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON document (host tooling) and validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(text).map_err(|_| Error::Config("config is not valid JSON"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Ring size that absorbs `max_delay_us` of traffic at `baud_rate` between
/// two reads, rounded up.
pub fn recommended_rx_buffer_size(baud_rate: u32, max_delay_us: u32) -> usize {
    let bits = u64::from(max_delay_us) * u64::from(baud_rate);
    let per_frame = 1_000_000 * u64::from(BITS_PER_FRAME);
    bits.div_ceil(per_frame) as usize
}

/// `fifo_depth * BITS_PER_FRAME / DMA_UPDATE_TIME`, rounded down.
pub fn max_baud_without_flow_control(fifo_depth: usize) -> u32 {
    let bits = fifo_depth as u64 * u64::from(BITS_PER_FRAME) * 1_000_000_000;
    (bits / DMA_UPDATE_TIME_NS) as u32
}
