//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one part of the stream
//! against the simulated UART, DMA controller and power manager. All tests
//! run on the host with no real hardware required.

mod kernel_tests;
mod lifecycle_tests;
mod power_tests;
mod response_tests;
mod stream_tests;
