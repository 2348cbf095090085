//! Scheduler mode: read/write locks and blocking reads.

#![cfg(feature = "kernel")]

use std::time::Duration;

use iostream_uart::{IoStream, UartIoStream};

use super::mock_hw::Harness;

#[test]
fn read_block_defaults_off() {
    let h = Harness::with_len(16);
    assert!(!h.stream.read_block());
    h.stream.set_read_block(true);
    assert!(h.stream.read_block());
}

#[test]
fn blocking_read_waits_for_receive_interrupt() {
    let h = Harness::with_len(16);
    h.stream.set_read_block(true);

    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut buf = [0u8; 8];
            let n = h.stream.read(&mut buf).unwrap();
            buf[..n].to_vec()
        });
        std::thread::sleep(Duration::from_millis(50));
        assert!(!reader.is_finished());
        h.rx(b"wake");
        assert_eq!(reader.join().unwrap(), b"wake");
    });
}

#[test]
fn blocked_reader_does_not_hold_up_writer() {
    let h = Harness::with_len(16);
    h.stream.set_read_block(true);

    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut buf = [0u8; 8];
            h.stream.read(&mut buf).unwrap()
        });
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(h.stream.write(b"still here").unwrap(), 10);
        h.rx(b"!");
        assert_eq!(reader.join().unwrap(), 1);
    });
    assert_eq!(h.uart.tx(), b"still here");
}

#[test]
fn blocking_read_returns_immediately_when_data_waits() {
    let h = Harness::with_len(16);
    h.rx(b"ready");
    h.stream.set_read_block(true);
    let mut buf = [0u8; 8];
    assert_eq!(h.stream.read(&mut buf).unwrap(), 5);
}

#[test]
fn read_async_completes_under_block_on() {
    let h = Harness::with_len(16);
    h.rx(b"async");
    let mut buf = [0u8; 8];
    let n = futures_lite::future::block_on(h.stream.read_async(&mut buf)).unwrap();
    assert_eq!(&buf[..n], b"async");
}
