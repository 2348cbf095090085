//! Init, deinit and resource ownership.

use iostream_uart::adapters::sim::{SimDma, SimPower, SimUart};
use iostream_uart::config::{PeripheralKind, UartStreamConfig};
use iostream_uart::error::DmaError;
use iostream_uart::ports::DmaPort;
use iostream_uart::{Error, IoStream, UartIoStream, UartParts, UartStream};

use super::mock_hw::{Harness, config, init_logging, leak};

#[test]
fn init_enables_interrupts_and_arms_dma() {
    let h = Harness::with_len(16);
    let cfg = config(16);
    assert!(h.uart.irq_enabled(cfg.rx_irq));
    assert!(h.uart.irq_enabled(cfg.tx_irq));
    assert_eq!(h.dma.allocated_channels(), 1);
    assert!(h.dma.is_running(h.channel()));
}

#[test]
fn deinit_releases_everything_and_returns_buffer() {
    let h = Harness::with_len(16);
    let cfg = config(16);
    h.rx(b"left over");
    let (uart, dma) = (h.uart.clone(), h.dma.clone());

    let parts = h.stream.deinit().unwrap();
    assert!(!uart.irq_enabled(cfg.rx_irq));
    assert!(!uart.irq_enabled(cfg.tx_irq));
    assert!(!uart.tx_complete_irq_enabled());
    assert!(!uart.rx_data_irq_enabled());
    assert_eq!(dma.allocated_channels(), 0);
    assert_eq!(parts.buffer.len(), 16);
    assert_eq!(&parts.buffer[..9], b"left over");
}

#[test]
fn exhausted_controller_fails_init_until_channel_freed() {
    let dma = SimDma::new(1, PeripheralKind::Usart.fifo_depth());
    let first = Harness::with_dma(config(8), dma.clone()).unwrap();

    let second = Harness::with_dma(config(8), dma.clone());
    assert!(matches!(second, Err(Error::Dma(DmaError::NoChannelAvailable))));
    assert_eq!(dma.allocated_channels(), 1);

    first.stream.deinit().unwrap();
    let second = Harness::with_dma(config(8), dma.clone()).unwrap();
    second.rx(b"ok");
    assert_eq!(second.read_all(), b"ok");
}

#[test]
fn buffer_length_must_match_config() {
    let dma = SimDma::new(1, 2);
    let cfg = UartStreamConfig {
        rx_buffer_size: 1,
        ..UartStreamConfig::default()
    };
    assert!(matches!(
        Harness::with_dma(cfg, dma.clone()),
        Err(Error::Config(_))
    ));
    assert_eq!(dma.allocated_channels(), 0);
}

#[test]
fn two_streams_are_independent() {
    let dma = SimDma::new(2, 16);
    let eusart = UartStreamConfig {
        peripheral: PeripheralKind::Eusart,
        ..config(16)
    };
    let a = Harness::with_dma(eusart.clone(), dma.clone()).unwrap();
    let b = Harness::with_dma(eusart, dma.clone()).unwrap();
    assert_ne!(a.channel(), b.channel());
    a.rx(b"to a");
    b.rx(b"to b");
    assert_eq!(a.read_all(), b"to a");
    assert_eq!(b.read_all(), b"to b");
    a.stream.write(b"x").unwrap();
    assert!(b.uart.tx().is_empty());
}

#[test]
fn config_survives_persistence_before_init() {
    let cfg = UartStreamConfig {
        sw_flow_control: true,
        ..config(24)
    };
    let restored = UartStreamConfig::from_bytes(&cfg.to_bytes().unwrap()).unwrap();
    let h = Harness::new(restored);
    h.rx(&[0x13]);
    assert!(!h.stream.remote_xon());
}

#[test]
fn failed_init_hands_back_buffer_for_retry() {
    init_logging();
    let cfg = config(8);
    let dma = SimDma::new(1, 2);
    let mut other = dma.clone();
    let held = other.allocate_channel().unwrap();

    let buffer = leak(8);
    let base = buffer.as_ptr();
    let Err(err) = UartStream::new(&cfg, buffer, SimUart::new(), dma.clone(), SimPower::new())
    else {
        panic!("init must fail while the only channel is held");
    };
    assert_eq!(err.error, Error::Dma(DmaError::NoChannelAvailable));

    other.free_channel(held).unwrap();
    let UartParts {
        uart,
        dma: returned,
        power,
        buffer,
    } = err.into_parts();
    assert_eq!(buffer.as_ptr(), base);
    let stream = UartStream::new(&cfg, buffer, uart, returned, power).unwrap();
    dma.inject(stream.dma_channel(), b"ok");
    let mut out = [0u8; 4];
    assert_eq!(stream.read(&mut out).unwrap(), 2);
    assert_eq!(&out[..2], b"ok");
}

#[test]
fn failed_channel_release_still_returns_parts() {
    let h = Harness::with_len(8);
    let cfg = config(8);
    let mut dma = h.dma.clone();
    dma.free_channel(h.channel()).unwrap();
    let uart = h.uart.clone();

    let Err(err) = h.stream.deinit() else {
        panic!("releasing a freed channel must fail");
    };
    assert_eq!(err.error, Error::Dma(DmaError::InvalidChannel));
    assert!(!uart.irq_enabled(cfg.rx_irq));
    assert!(!uart.irq_enabled(cfg.tx_irq));
    assert_eq!(err.into_parts().buffer.len(), 8);
}
