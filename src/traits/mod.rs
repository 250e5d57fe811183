//! Trait definitions for hardware abstraction and serial transport.
//!
//! This module defines the seams that let pico-instrument:
//! - Run its control loops against real pins or desktop mocks
//! - Unit-test motion and thermal algorithms with synthetic sensor input
//! - Swap the host link (USB CDC, UART, stdin/stdout)
//!
//! # Submodules
//!
//! - `hardware`: stepper and H-bridge drivers, temperature sensors,
//!   switch outputs, selector input, clock and delay
//! - `io`: serial byte input and status line output

pub mod hardware;
pub mod io;

pub use hardware::*;
pub use io::*;
