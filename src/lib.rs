//! DMA-backed UART byte stream.
//!
//! Exposes the driver, its port traits and the simulation adapters used
//! for host testing. Hardware is reached only through the traits in
//! [`ports`]; a target HAL implements them against real registers.
//!
//! Cargo features select the execution model:
//! - `kernel`: read/write locks and blocking reads under a scheduler
//! - `power-manager`: energy-mode requirements through a [`ports::PowerPort`]

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod iostream;
pub mod ports;
pub mod power;
pub mod uart;

pub use error::{Error, Result};
pub use iostream::{IoStream, NullStream, StreamExt};
pub use uart::{InitResult, PartsError, RxStats, UartIoStream, UartParts, UartStream};
