//! In-memory UART, DMA controller and power manager.
//!
//! Used by the tests and the host console. Handles are cheap clones
//! sharing one state, so a test keeps a handle to inspect what the driver
//! did after moving the other into the stream.
//!
//! The DMA model follows the controller closely enough to exercise the
//! driver's ring logic: a transfer runs through the `resume` descriptor,
//! continues with `wrap`, then stops. While a channel is stopped or paused
//! incoming bytes queue in a peripheral FIFO of fixed depth; anything
//! beyond it is dropped and counted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::config::{DmaConfig, IrqNumber};
use crate::error::{DmaError, UartError};
use crate::ports::{DmaPort, PowerPort, UartPort};
use crate::power::EnergyMode;
use crate::uart::dma::{DescriptorChain, DmaChannel, RxDescriptor, RxRegion};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── UART ──────────────────────────────────────────────────────

type TxHook = Box<dyn FnMut(&[u8]) + Send>;

#[derive(Default)]
struct UartState {
    tx: Vec<u8>,
    irqs: HashSet<u16>,
    tx_complete_irq: bool,
    rx_data_irq: bool,
    fail_tx: bool,
    tx_limit: Option<usize>,
    on_tx: Option<TxHook>,
}

/// Simulated UART transmitter and interrupt lines.
#[derive(Clone, Default)]
pub struct SimUart {
    state: Arc<Mutex<UartState>>,
}

impl SimUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every byte transmitted so far.
    pub fn tx(&self) -> Vec<u8> {
        lock(&self.state).tx.clone()
    }

    /// Drain the transmit log.
    pub fn take_tx(&self) -> Vec<u8> {
        core::mem::take(&mut lock(&self.state).tx)
    }

    pub fn irq_enabled(&self, irq: IrqNumber) -> bool {
        lock(&self.state).irqs.contains(&irq.0)
    }

    pub fn tx_complete_irq_enabled(&self) -> bool {
        lock(&self.state).tx_complete_irq
    }

    pub fn rx_data_irq_enabled(&self) -> bool {
        lock(&self.state).rx_data_irq
    }

    /// Make every following `write_byte` fail.
    pub fn set_fail_tx(&self, fail: bool) {
        lock(&self.state).fail_tx = fail;
    }

    /// Fail `write_byte` once the transmit log holds `limit` bytes.
    pub fn set_tx_limit(&self, limit: Option<usize>) {
        lock(&self.state).tx_limit = limit;
    }

    /// Call `hook` with the transmit log after every accepted byte. It runs
    /// inside the driver's transmit path, like a peer reacting on the wire.
    pub fn on_tx(&self, hook: impl FnMut(&[u8]) + Send + 'static) {
        lock(&self.state).on_tx = Some(Box::new(hook));
    }
}

impl UartPort for SimUart {
    fn write_byte(&mut self, byte: u8) -> Result<(), UartError> {
        let mut guard = lock(&self.state);
        let s = &mut *guard;
        if s.fail_tx || s.tx_limit.is_some_and(|limit| s.tx.len() >= limit) {
            return Err(UartError::TxFailed);
        }
        s.tx.push(byte);
        if let Some(hook) = s.on_tx.as_mut() {
            hook(&s.tx);
        }
        Ok(())
    }

    fn set_irq_enabled(&mut self, irq: IrqNumber, enabled: bool) {
        let mut s = lock(&self.state);
        if enabled {
            s.irqs.insert(irq.0);
        } else {
            s.irqs.remove(&irq.0);
        }
    }

    fn enable_tx_complete_irq(&mut self, enable: bool) {
        lock(&self.state).tx_complete_irq = enable;
    }

    fn enable_rx_data_irq(&mut self, enable: bool) {
        lock(&self.state).rx_data_irq = enable;
    }
}

// ── DMA ───────────────────────────────────────────────────────

struct Transfer {
    region: RxRegion,
    write: usize,
    active: Option<RxDescriptor>,
    queued: Option<RxDescriptor>,
    paused: bool,
    fifo: VecDeque<u8>,
    dropped: usize,
}

impl Transfer {
    fn running(&self) -> bool {
        !self.paused && self.active.is_some()
    }

    fn arm(&mut self, chain: &DescriptorChain) {
        self.active = chain.resume;
        self.queued = chain.wrap;
        if let Some(d) = self.active {
            self.write = d.offset;
        }
    }

    /// Move one byte into the region. The caller checked `running`.
    fn store(&mut self, byte: u8) {
        let Some(d) = self.active.as_mut() else {
            return;
        };
        // SAFETY: `write` is the next offset of the active descriptor, which
        // the driver armed over free slots only.
        unsafe { self.region.store(self.write, byte) };
        self.write = (self.write + 1) % self.region.len();
        d.offset += 1;
        d.len -= 1;
        if d.len == 0 {
            self.active = self.queued.take();
            if let Some(next) = self.active {
                self.write = next.offset;
            }
        }
    }

    fn drain_fifo(&mut self) {
        while self.running() {
            let Some(byte) = self.fifo.pop_front() else {
                break;
            };
            self.store(byte);
        }
    }
}

struct DmaState {
    allocated: Vec<bool>,
    transfers: HashMap<u8, Transfer>,
    fifo_depth: usize,
}

/// Simulated DMA controller with a fixed channel pool.
#[derive(Clone)]
pub struct SimDma {
    state: Arc<Mutex<DmaState>>,
}

impl SimDma {
    /// `channels` allocatable channels; `fifo_depth` bytes of peripheral
    /// FIFO in front of each.
    pub fn new(channels: usize, fifo_depth: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DmaState {
                allocated: vec![false; channels],
                transfers: HashMap::new(),
                fifo_depth,
            })),
        }
    }

    /// Bytes arriving on the receive line of `channel`'s peripheral.
    pub fn inject(&self, channel: DmaChannel, bytes: &[u8]) {
        let mut s = lock(&self.state);
        let depth = s.fifo_depth;
        let Some(t) = s.transfers.get_mut(&channel.0) else {
            warn!("sim dma: {} bytes on idle channel {}", bytes.len(), channel.0);
            return;
        };
        for &byte in bytes {
            if t.running() && t.fifo.is_empty() {
                t.store(byte);
            } else if t.fifo.len() < depth {
                t.fifo.push_back(byte);
            } else {
                t.dropped += 1;
            }
        }
    }

    /// Bytes lost to a full FIFO.
    pub fn dropped(&self, channel: DmaChannel) -> usize {
        lock(&self.state)
            .transfers
            .get(&channel.0)
            .map_or(0, |t| t.dropped)
    }

    /// Bytes waiting in the peripheral FIFO.
    pub fn fifo_len(&self, channel: DmaChannel) -> usize {
        lock(&self.state)
            .transfers
            .get(&channel.0)
            .map_or(0, |t| t.fifo.len())
    }

    /// The channel is armed and not paused.
    pub fn is_running(&self, channel: DmaChannel) -> bool {
        lock(&self.state)
            .transfers
            .get(&channel.0)
            .is_some_and(Transfer::running)
    }

    pub fn allocated_channels(&self) -> usize {
        lock(&self.state).allocated.iter().filter(|a| **a).count()
    }

    fn with_transfer(&mut self, channel: DmaChannel, f: impl FnOnce(&mut Transfer)) {
        if let Some(t) = lock(&self.state).transfers.get_mut(&channel.0) {
            f(t);
        }
    }
}

impl DmaPort for SimDma {
    fn allocate_channel(&mut self) -> Result<DmaChannel, DmaError> {
        let mut s = lock(&self.state);
        let idx = s
            .allocated
            .iter()
            .position(|a| !a)
            .ok_or(DmaError::NoChannelAvailable)?;
        s.allocated[idx] = true;
        Ok(DmaChannel(idx as u8))
    }

    fn free_channel(&mut self, channel: DmaChannel) -> Result<(), DmaError> {
        let mut guard = lock(&self.state);
        let s = &mut *guard;
        match s.allocated.get_mut(usize::from(channel.0)) {
            Some(slot) if *slot => {
                *slot = false;
                s.transfers.remove(&channel.0);
                Ok(())
            }
            _ => Err(DmaError::InvalidChannel),
        }
    }

    fn start_rx(
        &mut self,
        channel: DmaChannel,
        cfg: &DmaConfig,
        region: RxRegion,
        chain: &DescriptorChain,
    ) -> Result<(), DmaError> {
        let mut s = lock(&self.state);
        if !s.allocated.get(usize::from(channel.0)).copied().unwrap_or(false) {
            return Err(DmaError::InvalidChannel);
        }
        if chain.is_empty() {
            return Err(DmaError::TransferFailed);
        }
        debug!(
            "sim dma: channel {} rx from {:#x} on signal {}",
            channel.0, cfg.source_register, cfg.peripheral_signal
        );
        let mut t = Transfer {
            region,
            write: 0,
            active: None,
            queued: None,
            paused: false,
            fifo: VecDeque::new(),
            dropped: 0,
        };
        t.arm(chain);
        s.transfers.insert(channel.0, t);
        Ok(())
    }

    fn pause(&mut self, channel: DmaChannel) {
        self.with_transfer(channel, |t| t.paused = true);
    }

    fn load(&mut self, channel: DmaChannel, chain: &DescriptorChain) -> Result<(), DmaError> {
        let mut s = lock(&self.state);
        let t = s
            .transfers
            .get_mut(&channel.0)
            .ok_or(DmaError::InvalidChannel)?;
        t.arm(chain);
        t.paused = false;
        t.drain_fifo();
        Ok(())
    }

    fn write_offset(&self, channel: DmaChannel) -> usize {
        lock(&self.state)
            .transfers
            .get(&channel.0)
            .map_or(0, |t| t.write)
    }

    fn stop(&mut self, channel: DmaChannel) {
        self.with_transfer(channel, |t| {
            t.active = None;
            t.queued = None;
        });
    }
}

// ── Power manager ─────────────────────────────────────────────

/// Counts outstanding energy-mode requirements.
#[derive(Clone, Default)]
pub struct SimPower {
    counts: Arc<Mutex<[u32; 4]>>,
}

impl SimPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requirements(&self, mode: EnergyMode) -> u32 {
        lock(&self.counts)[mode.index()]
    }

    /// Deepest mode the system may enter right now.
    pub fn deepest_allowed(&self) -> EnergyMode {
        let counts = lock(&self.counts);
        EnergyMode::ALL
            .into_iter()
            .find(|m| counts[m.index()] > 0)
            .unwrap_or(EnergyMode::Em3)
    }
}

impl PowerPort for SimPower {
    fn add_requirement(&mut self, mode: EnergyMode) {
        lock(&self.counts)[mode.index()] += 1;
    }

    fn remove_requirement(&mut self, mode: EnergyMode) {
        let mut counts = lock(&self.counts);
        match counts[mode.index()].checked_sub(1) {
            Some(n) => counts[mode.index()] = n,
            None => warn!("sim power: {mode:?} removed without being added"),
        }
    }
}
