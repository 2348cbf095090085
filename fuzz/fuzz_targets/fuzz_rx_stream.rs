//! Fuzz target: receive path of `UartStream`
//!
//! Interprets the input as a script of line arrivals and reads against a
//! small ring with flow control on, and asserts that the driver never
//! panics, never reports more bytes than arrived, and never hands out more
//! than the ring can hold.
//!
//! cargo fuzz run fuzz_rx_stream

#![no_main]

use iostream_uart::adapters::sim::{SimDma, SimPower, SimUart};
use iostream_uart::config::UartStreamConfig;
use iostream_uart::{IoStream, UartIoStream, UartStream};
use libfuzzer_sys::fuzz_target;

const RING: usize = 16;

fuzz_target!(|data: &[u8]| {
    let cfg = UartStreamConfig {
        rx_buffer_size: RING,
        sw_flow_control: true,
        ..UartStreamConfig::default()
    };
    let dma = SimDma::new(1, cfg.peripheral.fifo_depth());
    let Ok(stream) = UartStream::new(
        &cfg,
        Box::leak(vec![0u8; RING].into_boxed_slice()),
        SimUart::new(),
        dma.clone(),
        SimPower::new(),
    ) else {
        return;
    };

    // High bit set: read (low bits) bytes. Otherwise: the next (byte) input
    // bytes arrive on the line.
    let mut rest = data;
    while let Some((&op, tail)) = rest.split_first() {
        if op & 0x80 != 0 {
            let mut buf = [0u8; 64];
            let want = usize::from(op & 0x3f);
            let n = stream.read(&mut buf[..want]).expect("read");
            assert!(n <= want);
            assert!(n < RING, "ring returned more than its capacity");
            rest = tail;
        } else {
            let take = usize::from(op).min(tail.len());
            dma.inject(stream.dma_channel(), &tail[..take]);
            stream.on_rx_irq();
            rest = &tail[take..];
        }
        assert!(stream.available() < RING);
        let stats = stream.stats();
        assert!(stats.bytes_read <= stats.bytes_received);
    }

    let _ = stream.write(b"done\n");
    stream.deinit().expect("deinit");
});
