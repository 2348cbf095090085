//! Receive ring, DMA re-arming and transmit path.

use iostream_uart::error::UartError;
use iostream_uart::{Error, IoStream, StreamExt, UartIoStream};

use super::mock_hw::Harness;

#[test]
fn bytes_are_read_in_arrival_order() {
    let h = Harness::with_len(32);
    h.rx(b"hello ");
    h.rx(b"world");
    assert_eq!(h.stream.available(), 11);
    assert_eq!(h.read_all(), b"hello world");
    assert_eq!(h.stream.available(), 0);
}

#[test]
fn empty_ring_reads_zero_without_blocking() {
    let h = Harness::with_len(8);
    let mut buf = [0u8; 4];
    assert_eq!(h.stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn short_buffer_leaves_the_rest_unread() {
    let h = Harness::with_len(16);
    h.rx(b"abcdef");
    let mut buf = [0u8; 4];
    assert_eq!(h.stream.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf, b"abcd");
    assert_eq!(h.stream.available(), 2);
    assert_eq!(h.read_all(), b"ef");
}

#[test]
fn read_after_wraparound_keeps_order() {
    let h = Harness::with_len(8);
    h.rx(b"abcde");
    assert_eq!(h.read_all(), b"abcde");
    // Write cursor at 5: three slots to the end, then the wrap descriptor.
    h.rx(b"fghijk");
    assert_eq!(h.stream.available(), 6);
    assert_eq!(h.read_all(), b"fghijk");
}

#[test]
fn full_ring_keeps_oldest_and_drops_beyond_fifo() {
    // USART: 2-byte FIFO in front of a 7-byte usable ring.
    let h = Harness::with_len(8);
    h.rx(b"0123456789AB");
    assert_eq!(h.stream.available(), 7);
    assert!(!h.dma.is_running(h.channel()));
    assert_eq!(h.dma.fifo_len(h.channel()), 2);
    assert_eq!(h.dma.dropped(h.channel()), 3);

    let mut buf = [0u8; 16];
    let n = h.stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"0123456");
    // Re-arming drained the FIFO into the freed slots.
    assert!(h.dma.is_running(h.channel()));
    assert_eq!(h.read_all(), b"78");
}

#[test]
fn stats_track_traffic() {
    let h = Harness::with_len(16);
    h.rx(b"abcdefgh");
    h.read_all();
    h.rx(b"ij");
    let stats = h.stream.stats();
    assert_eq!(stats.bytes_received, 10);
    assert_eq!(stats.bytes_read, 8);
    assert_eq!(stats.peak_fill, 8);
}

#[test]
fn newline_expanded_only_when_enabled() {
    let h = Harness::with_len(8);
    assert!(h.stream.auto_cr_lf());
    assert_eq!(h.stream.write(b"a\nb\n").unwrap(), 4);
    assert_eq!(h.uart.take_tx(), b"a\r\nb\r\n");

    h.stream.set_auto_cr_lf(false);
    assert!(!h.stream.auto_cr_lf());
    h.stream.write(b"a\nb").unwrap();
    assert_eq!(h.uart.take_tx(), b"a\nb");
}

#[test]
fn existing_carriage_return_still_gets_one_inserted() {
    let h = Harness::with_len(8);
    h.stream.write(b"\r\n").unwrap();
    assert_eq!(h.uart.tx(), b"\r\r\n");
}

#[test]
fn print_goes_through_translation() {
    let h = Harness::with_len(8);
    h.stream.print(format_args!("ch={}\n", 11)).unwrap();
    assert_eq!(h.uart.tx(), b"ch=11\r\n");
}

#[test]
fn transmit_failure_is_reported() {
    let h = Harness::with_len(8);
    h.uart.set_fail_tx(true);
    assert_eq!(h.stream.write(b"x"), Err(Error::Uart(UartError::TxFailed)));
    h.uart.set_fail_tx(false);
    assert_eq!(h.stream.write(b"x").unwrap(), 1);
}

#[test]
fn transmit_fault_mid_write_reports_bytes_sent() {
    let h = Harness::with_len(8);
    h.uart.set_tx_limit(Some(4));
    // 'a', 'b', '\r', '\n' fit; 'c' fails.
    assert_eq!(h.stream.write(b"ab\ncd").unwrap(), 3);
    assert_eq!(h.uart.tx(), b"ab\r\n");
    assert_eq!(h.stream.write(b"cd"), Err(Error::Uart(UartError::TxFailed)));

    h.uart.set_tx_limit(None);
    assert_eq!(h.stream.write(b"cd").unwrap(), 2);
    assert_eq!(h.uart.tx(), b"ab\r\ncd");
}

#[test]
fn getchar_and_putchar() {
    let h = Harness::with_len(8);
    h.rx(b"q");
    assert_eq!(h.stream.getchar().unwrap(), Some(b'q'));
    assert_eq!(h.stream.getchar().unwrap(), None);
    h.stream.putchar(b'!').unwrap();
    assert_eq!(h.uart.tx(), b"!");
}
