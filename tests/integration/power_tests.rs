//! Energy-mode requirements and sleep hooks.

#![cfg(feature = "power-manager")]

use iostream_uart::config::UartStreamConfig;
use iostream_uart::power::EnergyMode;
use iostream_uart::{IoStream, UartIoStream};

use super::mock_hw::{Harness, config};

/// Receive in EM2, transmit in EM1, so the two requirements are
/// distinguishable.
fn split_modes(rx_when_sleeping: bool) -> UartStreamConfig {
    UartStreamConfig {
        rx_when_sleeping,
        rx_energy_mode: EnergyMode::Em2,
        tx_energy_mode: EnergyMode::Em1,
        ..config(16)
    }
}

#[test]
fn rx_restriction_asserted_at_init() {
    let h = Harness::new(split_modes(true));
    assert!(h.stream.rx_energy_mode_restriction());
    assert_eq!(h.power.requirements(EnergyMode::Em2), 1);
    assert_eq!(h.power.deepest_allowed(), EnergyMode::Em2);
}

#[test]
fn rx_restriction_not_asserted_when_not_configured() {
    let h = Harness::new(split_modes(false));
    assert!(!h.stream.rx_energy_mode_restriction());
    assert_eq!(h.power.deepest_allowed(), EnergyMode::Em3);
}

#[test]
fn rx_restriction_toggles_idempotently() {
    let h = Harness::new(split_modes(true));
    h.stream.set_rx_energy_mode_restriction(false).unwrap();
    h.stream.set_rx_energy_mode_restriction(false).unwrap();
    assert_eq!(h.power.requirements(EnergyMode::Em2), 0);
    assert!(!h.stream.rx_energy_mode_restriction());

    h.stream.set_rx_energy_mode_restriction(true).unwrap();
    h.stream.set_rx_energy_mode_restriction(true).unwrap();
    assert_eq!(h.power.requirements(EnergyMode::Em2), 1);
}

#[test]
fn tx_requirement_held_until_transmit_complete() {
    let h = Harness::new(split_modes(false));
    h.stream.write(b"a").unwrap();
    assert_eq!(h.power.requirements(EnergyMode::Em1), 1);
    assert!(h.uart.tx_complete_irq_enabled());

    h.stream.write(b"bc").unwrap();
    assert_eq!(h.power.requirements(EnergyMode::Em1), 1);

    h.stream.on_tx_complete_irq();
    assert_eq!(h.power.requirements(EnergyMode::Em1), 0);
    assert!(!h.uart.tx_complete_irq_enabled());

    // A stray completion does not underflow.
    h.stream.on_tx_complete_irq();
    assert_eq!(h.power.requirements(EnergyMode::Em1), 0);
}

#[test]
fn deinit_lifts_all_requirements() {
    let h = Harness::new(split_modes(true));
    let power = h.power.clone();
    h.stream.write(b"pending").unwrap();
    h.stream.deinit().unwrap();
    assert_eq!(power.requirements(EnergyMode::Em1), 0);
    assert_eq!(power.requirements(EnergyMode::Em2), 0);
}

#[test]
fn sleep_hooks_arm_rx_data_interrupt() {
    let h = Harness::with_len(16);
    h.stream.prepare_for_sleep();
    assert!(h.uart.rx_data_irq_enabled());
    h.stream.wakeup();
    assert!(!h.uart.rx_data_irq_enabled());
}

#[cfg(not(feature = "kernel"))]
mod bare {
    use iostream_uart::UartIoStream;
    use iostream_uart::power::IsrExitAction;

    use super::super::mock_hw::Harness;

    #[test]
    fn isr_exit_reports_and_resets() {
        let h = Harness::with_len(16);
        assert_eq!(h.stream.sleep_on_isr_exit(), IsrExitAction::Ignore);

        h.rx(b"x");
        assert_eq!(h.stream.sleep_on_isr_exit(), IsrExitAction::Wakeup);
        assert_eq!(h.stream.sleep_on_isr_exit(), IsrExitAction::Ignore);

        h.stream.on_tx_complete_irq();
        assert_eq!(h.stream.sleep_on_isr_exit(), IsrExitAction::Sleep);
    }

    #[test]
    fn pending_wakeup_survives_tx_complete() {
        let h = Harness::with_len(16);
        h.rx(b"x");
        h.stream.on_tx_complete_irq();
        assert_eq!(h.stream.sleep_on_isr_exit(), IsrExitAction::Wakeup);
    }
}
