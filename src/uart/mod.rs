//! UART I/O stream driver.
//!
//! The receiver is drained by a DMA channel into a caller-supplied ring:
//!
//! ```text
//!   RX pin ─▶ peripheral FIFO ─▶ DMA (resume ▸ wrap) ─▶ RxRing ─▶ read()
//!                                                          │
//!                                              scan: XON/XOFF ─▶ remote_xon
//!
//!   write() ─▶ [LF→CRLF] ─▶ remote_xon gate ─▶ UartPort::write_byte
//! ```
//!
//! Every `read` scans the newly arrived bytes for flow-control characters,
//! copies out what is available and re-arms the DMA over the free region
//! (pause, sample the write offset, rebuild the chain, reload). The
//! receive interrupt does the same scan so that an XOFF takes effect before
//! the application next reads.
//!
//! Hardware state lives behind a critical-section mutex; line-ending mode
//! and flow-control flags are atomics so they can be read without one.

pub mod dma;
pub mod flow;
pub(crate) mod ring;
#[cfg(feature = "kernel")]
pub(crate) mod sync;

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::{IrqNumber, UartStreamConfig};
use crate::error::{Error, Result};
use crate::iostream::IoStream;
#[cfg(all(feature = "power-manager", not(feature = "kernel")))]
use crate::power::IsrExitAction;
#[cfg(feature = "power-manager")]
use crate::power::EnergyState;
use crate::ports::{DmaPort, NoPowerManager, PowerPort, UartPort};

use self::dma::{DmaChannel, DmaContext};
use self::flow::{FlowControl, LocalAction, XOFF, XON};
use self::ring::RxRing;
#[cfg(feature = "kernel")]
use self::sync::KernelSync;

// ───────────────────────────────────────────────────────────────
// Public handle trait
// ───────────────────────────────────────────────────────────────

/// UART-specific operations on top of [`IoStream`].
pub trait UartIoStream: IoStream {
    /// What `deinit` hands back.
    type Parts;

    /// Stop reception, release every resource and return the collaborators.
    /// Teardown always completes; a failed channel release is reported with
    /// the parts attached.
    fn deinit(self) -> core::result::Result<Self::Parts, PartsError<Self::Parts>>
    where
        Self: Sized;

    /// Expand `\n` to `\r\n` on the next writes.
    fn set_auto_cr_lf(&self, on: bool);

    fn auto_cr_lf(&self) -> bool;

    /// Keep (or stop keeping) the system awake enough to receive.
    #[cfg(feature = "power-manager")]
    fn set_rx_energy_mode_restriction(&self, on: bool) -> Result<()>;

    #[cfg(feature = "power-manager")]
    fn rx_energy_mode_restriction(&self) -> bool;

    /// Decision for the power manager when an interrupt returns. Resets
    /// the pending value.
    #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
    fn sleep_on_isr_exit(&self) -> IsrExitAction;

    /// Make `read` wait for at least one byte.
    #[cfg(feature = "kernel")]
    fn set_read_block(&self, on: bool);

    #[cfg(feature = "kernel")]
    fn read_block(&self) -> bool;
}

/// Resources returned by [`UartStream::deinit`].
pub struct UartParts<U, D, P> {
    pub uart: U,
    pub dma: D,
    pub power: P,
    pub buffer: &'static mut [u8],
}

/// A failed init or deinit, carrying the caller's resources back.
pub struct PartsError<T> {
    pub error: Error,
    pub parts: T,
}

impl<T> PartsError<T> {
    pub fn into_parts(self) -> T {
        self.parts
    }
}

impl<T> fmt::Debug for PartsError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartsError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PartsError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> From<PartsError<T>> for Error {
    fn from(e: PartsError<T>) -> Self {
        e.error
    }
}

/// Result of [`UartStream::new`].
pub type InitResult<U, D, P> =
    core::result::Result<UartStream<U, D, P>, PartsError<UartParts<U, D, P>>>;

/// Receive-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    /// Bytes the DMA delivered into the ring.
    pub bytes_received: u32,
    /// Bytes handed to the application.
    pub bytes_read: u32,
    pub xon_received: u32,
    pub xoff_received: u32,
    pub xon_sent: u32,
    pub xoff_sent: u32,
    /// Highest fill level seen.
    pub peak_fill: usize,
}

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

struct Inner<U, D, P> {
    uart: U,
    dma: D,
    power: P,
    ctx: DmaContext,
    ring: RxRing,
    rx_irq: IrqNumber,
    tx_irq: IrqNumber,
    stats: RxStats,
    #[cfg(feature = "power-manager")]
    energy: EnergyState,
    #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
    isr_exit: IsrExitAction,
}

/// DMA-backed UART byte stream.
pub struct UartStream<U, D, P = NoPowerManager> {
    hw: CriticalSectionMutex<RefCell<Inner<U, D, P>>>,
    flow: FlowControl,
    lf_to_crlf: AtomicBool,
    channel: DmaChannel,
    #[cfg(feature = "kernel")]
    sync: KernelSync,
}

impl<U, D, P> UartStream<U, D, P>
where
    U: UartPort,
    D: DmaPort,
    P: PowerPort,
{
    /// Bring up a stream over `buffer`.
    ///
    /// Allocates a DMA channel, arms it over the whole ring, enables the
    /// peripheral interrupts and, when configured, asserts the receive
    /// energy-mode restriction. Nothing stays allocated on failure, and the
    /// buffer and ports come back in the error so init can be retried.
    pub fn new(
        config: &UartStreamConfig,
        buffer: &'static mut [u8],
        mut uart: U,
        mut dma: D,
        #[allow(unused_mut)] mut power: P,
    ) -> InitResult<U, D, P> {
        if let Err(error) = check_buffer(config, buffer.len()) {
            return Err(PartsError {
                error,
                parts: UartParts {
                    uart,
                    dma,
                    power,
                    buffer,
                },
            });
        }
        let ring = RxRing::new(buffer);

        let channel = match dma.allocate_channel() {
            Ok(channel) => channel,
            Err(e) => {
                error!("uart: DMA channel allocation failed: {e}");
                return Err(init_failed(e.into(), uart, dma, power, ring));
            }
        };

        let chain = ring.chain(0);
        if let Err(e) = dma.start_rx(channel, &config.dma, ring.region(), &chain) {
            error!("uart: DMA start on channel {} failed: {e}", channel.0);
            // The start error is the one worth reporting.
            let _ = dma.free_channel(channel);
            return Err(init_failed(e.into(), uart, dma, power, ring));
        }

        uart.set_irq_enabled(config.rx_irq, true);
        uart.set_irq_enabled(config.tx_irq, true);

        #[cfg(feature = "power-manager")]
        let energy = {
            let mut energy = EnergyState::new(config.rx_energy_mode, config.tx_energy_mode);
            if config.rx_when_sleeping {
                power.add_requirement(energy.rx_em);
                energy.rx_req_added = true;
            }
            energy
        };

        info!(
            "uart: stream up, {:?} @ {} baud, {}-byte ring on DMA channel {}, flow control {}",
            config.peripheral,
            config.baud_rate,
            ring.len(),
            channel.0,
            if config.sw_flow_control { "on" } else { "off" }
        );

        let flow = FlowControl::new(config.sw_flow_control, ring.capacity());
        Ok(Self {
            hw: CriticalSectionMutex::new(RefCell::new(Inner {
                uart,
                dma,
                power,
                ctx: DmaContext {
                    cfg: config.dma,
                    channel,
                    chain,
                },
                ring,
                rx_irq: config.rx_irq,
                tx_irq: config.tx_irq,
                stats: RxStats::default(),
                #[cfg(feature = "power-manager")]
                energy,
                #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
                isr_exit: IsrExitAction::Ignore,
            })),
            flow,
            lf_to_crlf: AtomicBool::new(config.lf_to_crlf),
            channel,
            #[cfg(feature = "kernel")]
            sync: KernelSync::new(),
        })
    }

    /// DMA channel assigned at init.
    pub fn dma_channel(&self) -> DmaChannel {
        self.channel
    }

    /// Bytes readable right now.
    pub fn available(&self) -> usize {
        self.hw.lock(|cell| {
            let inner = cell.borrow();
            inner.ring.available(inner.write_pos())
        })
    }

    pub fn stats(&self) -> RxStats {
        self.hw.lock(|cell| cell.borrow().stats)
    }

    /// Peer currently allows transmission.
    pub fn remote_xon(&self) -> bool {
        self.flow.remote_xon()
    }

    /// This side currently allows the peer to transmit.
    pub fn local_xon(&self) -> bool {
        self.flow.xon()
    }

    /// Receive interrupt handler.
    pub fn on_rx_irq(&self) {
        self.hw.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let write = inner.write_pos();
            self.scan_control(&mut inner, write);
            #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
            {
                inner.isr_exit = inner.isr_exit.merge(IsrExitAction::Wakeup);
            }
        });
        #[cfg(feature = "kernel")]
        self.sync.rx_data.signal(());
    }

    /// Transmit-complete interrupt handler.
    pub fn on_tx_complete_irq(&self) {
        self.hw.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.uart.enable_tx_complete_irq(false);
            #[cfg(feature = "power-manager")]
            inner.end_tx();
            #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
            {
                inner.isr_exit = inner.isr_exit.merge(IsrExitAction::Sleep);
            }
        });
    }

    /// Arm the "next byte detected" interrupt before the receiver's clock
    /// stops.
    #[cfg(feature = "power-manager")]
    pub fn prepare_for_sleep(&self) {
        self.hw.lock(|cell| cell.borrow_mut().uart.enable_rx_data_irq(true));
    }

    /// Disarm it again once the system is awake.
    #[cfg(feature = "power-manager")]
    pub fn wakeup(&self) {
        self.hw.lock(|cell| cell.borrow_mut().uart.enable_rx_data_irq(false));
    }

    /// Wait until at least one byte is available, then read.
    #[cfg(feature = "kernel")]
    pub async fn read_async(&self, buf: &mut [u8]) -> Result<usize> {
        let _guard = self.sync.read_lock.lock().await;
        loop {
            let n = self.read_now(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            self.sync.rx_data.wait().await;
        }
    }

    /// Scan, copy out and re-arm the DMA in one critical section.
    fn read_now(&self, buf: &mut [u8]) -> Result<usize> {
        self.hw.lock(|cell| -> Result<usize> {
            let mut inner = cell.borrow_mut();
            let channel = inner.ctx.channel;
            inner.dma.pause(channel);
            let write = inner.write_pos();
            self.scan_control(&mut inner, write);

            let n = inner.ring.copy_out(write, buf);
            let chain = inner.ring.chain(write);
            inner.ctx.chain = chain;
            inner.dma.load(channel, &chain)?;

            inner.stats.bytes_read = inner.stats.bytes_read.wrapping_add(n as u32);
            if n > 0 {
                let unread = inner.ring.available(write);
                self.apply_local_flow(&mut inner, unread);
            }
            Ok(n)
        })
    }

    /// Feed newly arrived bytes to flow control and update the counters.
    fn scan_control(&self, inner: &mut Inner<U, D, P>, write: usize) {
        let Inner { ring, stats, .. } = &mut *inner;
        let flow = &self.flow;
        let scanned = ring.scan(write, |byte| match flow.observe(byte) {
            Some(XOFF) => {
                stats.xoff_received = stats.xoff_received.wrapping_add(1);
                debug!("uart: XOFF received, transmit paused");
            }
            Some(XON) => {
                stats.xon_received = stats.xon_received.wrapping_add(1);
                debug!("uart: XON received, transmit resumed");
            }
            _ => {}
        });
        if scanned == 0 {
            return;
        }
        stats.bytes_received = stats.bytes_received.wrapping_add(scanned as u32);
        let unread = ring.available(write);
        stats.peak_fill = stats.peak_fill.max(unread);
        self.apply_local_flow(inner, unread);
    }

    fn apply_local_flow(&self, inner: &mut Inner<U, D, P>, unread: usize) {
        let action = self.flow.local_action(unread);
        let byte = match action {
            LocalAction::None => return,
            LocalAction::SendXoff => XOFF,
            LocalAction::SendXon => XON,
        };
        #[cfg(feature = "power-manager")]
        inner.begin_tx();
        if let Err(e) = inner.uart.write_byte(byte) {
            warn!("uart: dropped flow-control byte {byte:#04x}: {e}");
            return;
        }
        self.flow.sent(action);
        match action {
            LocalAction::SendXoff => {
                inner.stats.xoff_sent = inner.stats.xoff_sent.wrapping_add(1);
                debug!("uart: ring at {unread} bytes, XOFF sent");
            }
            LocalAction::SendXon => {
                inner.stats.xon_sent = inner.stats.xon_sent.wrapping_add(1);
                debug!("uart: ring drained to {unread} bytes, XON sent");
            }
            LocalAction::None => {}
        }
    }

    fn write_now(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let crlf = self.auto_cr_lf();
        let mut sent = 0;
        for &byte in data {
            let step = self.hw.lock(|cell| -> Result<bool> {
                let mut inner = cell.borrow_mut();
                // Pick up any XOFF that arrived since the previous byte.
                let write = inner.write_pos();
                self.scan_control(&mut inner, write);
                if !self.flow.may_transmit() {
                    return Ok(false);
                }
                #[cfg(feature = "power-manager")]
                inner.begin_tx();
                if crlf && byte == b'\n' {
                    inner.uart.write_byte(b'\r')?;
                }
                inner.uart.write_byte(byte)?;
                Ok(true)
            });
            match step {
                Ok(true) => sent += 1,
                Ok(false) => break,
                // The count goes back to the caller; a persistent fault
                // shows up on the next write.
                Err(e) if sent > 0 => {
                    warn!("uart: transmit failed after {sent} of {} bytes: {e}", data.len());
                    return Ok(sent);
                }
                Err(e) => return Err(e),
            }
        }
        if sent == 0 {
            debug!("uart: write of {} bytes held by XOFF", data.len());
            return Err(Error::TxPaused);
        }
        Ok(sent)
    }
}

fn check_buffer(config: &UartStreamConfig, len: usize) -> Result<()> {
    config.validate()?;
    if len != config.rx_buffer_size {
        return Err(Error::Config("rx buffer length does not match rx_buffer_size"));
    }
    Ok(())
}

fn init_failed<U, D, P>(
    error: Error,
    uart: U,
    dma: D,
    power: P,
    ring: RxRing,
) -> PartsError<UartParts<U, D, P>> {
    PartsError {
        error,
        parts: UartParts {
            uart,
            dma,
            power,
            buffer: ring.into_buffer(),
        },
    }
}

impl<U, D: DmaPort, P> Inner<U, D, P> {
    /// Channel write position as a ring offset. A controller parked at the
    /// end of the last block reports `len`, which is offset 0.
    fn write_pos(&self) -> usize {
        self.dma.write_offset(self.ctx.channel) % self.ring.len()
    }
}

#[cfg(feature = "power-manager")]
impl<U: UartPort, D, P: PowerPort> Inner<U, D, P> {
    /// Hold the transmit energy mode until the tx-complete interrupt.
    fn begin_tx(&mut self) {
        if self.energy.tx_idle {
            self.power.add_requirement(self.energy.tx_em);
            self.energy.tx_idle = false;
            self.uart.enable_tx_complete_irq(true);
        }
    }

    fn end_tx(&mut self) {
        if !self.energy.tx_idle {
            self.power.remove_requirement(self.energy.tx_em);
            self.energy.tx_idle = true;
        }
    }
}

impl<U, D, P> IoStream for UartStream<U, D, P>
where
    U: UartPort,
    D: DmaPort,
    P: PowerPort,
{
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        #[cfg(feature = "kernel")]
        if self.sync.block() {
            return futures_lite::future::block_on(self.read_async(buf));
        }
        #[cfg(feature = "kernel")]
        let _guard = futures_lite::future::block_on(self.sync.read_lock.lock());
        self.read_now(buf)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        #[cfg(feature = "kernel")]
        let _guard = futures_lite::future::block_on(self.sync.write_lock.lock());
        self.write_now(data)
    }
}

impl<U, D, P> UartIoStream for UartStream<U, D, P>
where
    U: UartPort,
    D: DmaPort,
    P: PowerPort,
{
    type Parts = UartParts<U, D, P>;

    fn deinit(self) -> core::result::Result<Self::Parts, PartsError<Self::Parts>> {
        #[allow(unused_mut)]
        let Inner {
            mut uart,
            mut dma,
            mut power,
            ctx,
            ring,
            rx_irq,
            tx_irq,
            #[cfg(feature = "power-manager")]
            energy,
            ..
        } = self.hw.into_inner().into_inner();

        #[cfg(feature = "power-manager")]
        {
            if energy.rx_req_added {
                power.remove_requirement(energy.rx_em);
            }
            if !energy.tx_idle {
                power.remove_requirement(energy.tx_em);
            }
        }

        debug!(
            "uart: stopping DMA channel {} (signal {:#x})",
            ctx.channel.0, ctx.cfg.peripheral_signal
        );
        dma.stop(ctx.channel);
        uart.enable_tx_complete_irq(false);
        uart.enable_rx_data_irq(false);
        uart.set_irq_enabled(rx_irq, false);
        uart.set_irq_enabled(tx_irq, false);
        let released = dma.free_channel(ctx.channel);

        let parts = UartParts {
            uart,
            dma,
            power,
            buffer: ring.into_buffer(),
        };
        match released {
            Ok(()) => {
                info!("uart: stream down, DMA channel {} released", ctx.channel.0);
                Ok(parts)
            }
            Err(e) => {
                error!("uart: releasing DMA channel {} failed: {e}", ctx.channel.0);
                Err(PartsError {
                    error: e.into(),
                    parts,
                })
            }
        }
    }

    fn set_auto_cr_lf(&self, on: bool) {
        self.lf_to_crlf.store(on, Ordering::Release);
    }

    fn auto_cr_lf(&self) -> bool {
        self.lf_to_crlf.load(Ordering::Acquire)
    }

    #[cfg(feature = "power-manager")]
    fn set_rx_energy_mode_restriction(&self, on: bool) -> Result<()> {
        self.hw.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let mode = inner.energy.rx_em;
            if on && !inner.energy.rx_req_added {
                inner.power.add_requirement(mode);
                inner.energy.rx_req_added = true;
                debug!("uart: receive restriction {mode:?} added");
            } else if !on && inner.energy.rx_req_added {
                inner.power.remove_requirement(mode);
                inner.energy.rx_req_added = false;
                debug!("uart: receive restriction {mode:?} removed");
            }
        });
        Ok(())
    }

    #[cfg(feature = "power-manager")]
    fn rx_energy_mode_restriction(&self) -> bool {
        self.hw.lock(|cell| cell.borrow().energy.rx_req_added)
    }

    #[cfg(all(feature = "power-manager", not(feature = "kernel")))]
    fn sleep_on_isr_exit(&self) -> IsrExitAction {
        self.hw
            .lock(|cell| core::mem::take(&mut cell.borrow_mut().isr_exit))
    }

    #[cfg(feature = "kernel")]
    fn set_read_block(&self, on: bool) {
        self.sync.set_block(on);
    }

    #[cfg(feature = "kernel")]
    fn read_block(&self) -> bool {
        self.sync.block()
    }
}
