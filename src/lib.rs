//! # pico-instrument
//!
//! Multi-channel instrument controller core: stepper positioning,
//! thermoelectric regulation, and the JSON line protocol both share.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for stepper drivers, H-bridges, temperature sensors and switch banks
//! - **Motion control**: Target tracking in bounded pulse bursts with start/stop slow zones
//! - **Thermal control**: Hysteresis band, clamped proportional drive, rate-windowed sensor fault shutdown
//! - **Line protocol**: One JSON command per line in, one JSON status record per line out
//! - **Boot-time selection**: One device bundle per process, chosen from selector lines
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and serial transport abstractions
//! - `codec` - Byte payload text encoding
//! - `telemetry` / `command` - Status line encoder and command line decoder
//! - `motion` / `thermal` - The control algorithms
//! - `devices` - Channel-set bundles built from the control algorithms
//! - `dispatch` / `runner` - Device selection and the main loop
//! - `hal` - Concrete implementations (mock for testing, embedded-hal adapters for boards)
//!
//! ## Example
//!
//! ```rust
//! use pico_instrument::{
//!     config::MotionConfig,
//!     devices::MotorDevice,
//!     dispatch::Dispatcher,
//!     hal::{MockClock, MockDelay, MockSerial, MockSink, MockStepper},
//!     runner::Runner,
//! };
//!
//! let motor = MotorDevice::new(
//!     MockStepper::new(),
//!     MockStepper::new(),
//!     MockDelay::new(),
//!     &MotionConfig::default(),
//! );
//! let dispatcher = Dispatcher::new(0, Box::new(motor));
//! let mut runner = Runner::new(MockSerial::new(), MockSink::new(), MockClock::new(), dispatcher);
//!
//! runner.input_mut().queue_line(r#"{"az_target_pos": 40}"#);
//! runner.poll();
//!
//! let status = runner.sink().last().unwrap();
//! assert!(status.starts_with("{\"sensor_name\":\"motor\",\"status\":\"update\",\"app_id\":0"));
//! assert!(status.contains("\"az_pos\":40"));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Binary-to-text encoding for raw byte payloads.
pub mod codec;
/// Command line decoding and line assembly.
pub mod command;
/// Channel-set bundles selectable at boot.
pub mod devices;
/// Device selection and event routing.
pub mod dispatch;
/// Crate-owned error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Stepper motion control.
pub mod motion;
/// The cooperative main loop.
pub mod runner;
/// Critical-section shared state for dual-context operation.
pub mod shared;
/// Status line encoding.
pub mod telemetry;
/// Thermoelectric regulation.
pub mod thermal;
/// Core traits for hardware abstraction and serial transport.
pub mod traits;

/// Shared configuration system for the board and the host simulator.
pub mod config;

// Re-exports for convenience
pub use command::{ChannelSelector, LineBuffer};
pub use dispatch::{App, Board, ChannelSet, Dispatcher};
pub use error::{DecodeError, TelemetryError};
pub use motion::{MotionChannel, MotionTick, MotionTiming};
pub use runner::{PollReport, Runner};
pub use shared::Shared;
pub use telemetry::{StatusRecord, Value, ValueKind};
pub use thermal::{ConversionGate, FaultPolicy, ThermalChannel, ThermalSetpoint, ThermalState};
pub use traits::{
    // Hardware
    Clock,
    DelayUs,
    Polarity,
    SelectorInput,
    // Transport
    SerialInput,
    StatusSink,
    StepperDriver,
    SwitchOutputs,
    TemperatureSource,
    ThermalDriver,
    ThermalOutput,
};

// Config re-exports
pub use config::{Config, DeviceConfig, MotionConfig, RunnerConfig, ThermalConfig};
