//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter | Implements | Connects to                         |
//! |---------|------------|-------------------------------------|
//! | `sim`   | UartPort   | in-memory transmit log, IRQ flags   |
//! |         | DmaPort    | in-memory channel pool and FIFO     |
//! |         | PowerPort  | requirement counters                |
//!
//! A target HAL provides its own implementations against the peripheral
//! registers; the driver is unchanged.

pub mod sim;
