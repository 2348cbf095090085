//! uart-console: echo console on the simulated peripheral.
//!
//! ```text
//!   peer thread ──inject──▶ SimDma ──▶ UartStream ──▶ echo task
//!        ▲                                              │
//!        └──────────── SimUart tx log ◀── ResponsePrinter
//! ```
//!
//! Usage: `uart-console [config.json]`. Without a path the default
//! configuration is used.

use std::io::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use iostream_uart::adapters::sim::{SimDma, SimPower, SimUart};
use iostream_uart::config::UartStreamConfig;
use iostream_uart::iostream::response::{Field, ResponsePrinter};
use iostream_uart::{UartIoStream, UartStream};

type SimStream = UartStream<SimUart, SimDma, SimPower>;

const SCRIPT: &[&[u8]] = &[b"hello\n", b"status\n", b"quit\n"];

fn load_config() -> Result<UartStreamConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {path}"))?;
            UartStreamConfig::from_json(&text).map_err(|e| anyhow::anyhow!("{path}: {e}"))
        }
        None => Ok(UartStreamConfig::default()),
    }
}

/// Read lines and answer each one until `quit`.
async fn echo(stream: &SimStream) -> iostream_uart::Result<()> {
    let printer = ResponsePrinter::new(stream);
    let mut line: heapless::String<64> = heapless::String::new();
    let mut buf = [0u8; 16];
    loop {
        let n = stream.read_async(&mut buf).await?;
        for &byte in &buf[..n] {
            if byte != b'\n' {
                if line.push(char::from(byte)).is_err() {
                    printer.error(Some("echo"), 1, format_args!("line too long"))?;
                    line.clear();
                }
                continue;
            }
            match line.as_str() {
                "quit" => return Ok(()),
                "status" => {
                    let stats = stream.stats();
                    printer.response(
                        Some("status"),
                        &[
                            Field::new("received", &stats.bytes_received),
                            Field::new("read", &stats.bytes_read),
                            Field::new("peak", &stats.peak_fill),
                        ],
                    )?;
                }
                text => printer.response(Some("echo"), &[Field::new("line", &text)])?,
            }
            // The simulated transmitter completes immediately.
            stream.on_tx_complete_irq();
            line.clear();
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let config = load_config()?;
    let buffer: &'static mut [u8] = Box::leak(vec![0u8; config.rx_buffer_size].into_boxed_slice());
    let uart = SimUart::new();
    let dma = SimDma::new(4, config.peripheral.fifo_depth());
    let stream = UartStream::new(&config, buffer, uart.clone(), dma.clone(), SimPower::new())
        .map_err(|e| anyhow::anyhow!("stream init: {e}"))?;
    let channel = stream.dma_channel();

    std::thread::scope(|scope| -> Result<()> {
        let peer = scope.spawn(|| {
            for chunk in SCRIPT {
                dma.inject(channel, chunk);
                stream.on_rx_irq();
                std::thread::sleep(Duration::from_millis(20));
                let out = uart.take_tx();
                let mut stdout = std::io::stdout().lock();
                if stdout.write_all(&out).is_err() {
                    warn!("console: stdout closed");
                }
            }
        });

        let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
        futures_lite::future::block_on(executor.run(echo(&stream)))
            .map_err(|e| anyhow::anyhow!("echo: {e}"))?;

        peer.join()
            .map_err(|_| anyhow::anyhow!("peer thread panicked"))?;
        Ok(())
    })?;

    let stats = stream.stats();
    info!("console: {} bytes received, {} read", stats.bytes_received, stats.bytes_read);
    let parts = stream
        .deinit()
        .map_err(|e| anyhow::anyhow!("deinit: {e}"))?;
    info!("console: {} bytes of ring returned", parts.buffer.len());
    Ok(())
}
