//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and transport traits,
//! enabling development and testing on desktop without a board attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockStepper`] | [`StepperDriver`] | Tracks line levels and pulse edges |
//! | [`MockDelay`] | [`DelayUs`] | Virtual clock recording requested delays |
//! | [`MockBridge`] | [`ThermalDriver`] | Records H-bridge output requests |
//! | [`MockSensors`] | [`TemperatureSource`] | Settable per-sensor readings |
//! | [`MockSwitches`] | [`SwitchOutputs`] | Records the last output mask |
//! | [`MockSelector`] | [`SelectorInput`] | Fixed selector value |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockSerial`] | [`SerialInput`] | Queued inbound bytes |
//! | [`MockSink`] | [`StatusSink`] | Captured status lines |
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::motion::{MotionChannel, MotionTiming};
//! use pico_instrument::hal::{MockStepper, MockDelay};
//!
//! let mut axis = MotionChannel::new(MockStepper::new(), true, MotionTiming::default());
//! let mut delay = MockDelay::new();
//!
//! axis.set_target(3);
//! axis.tick(&mut delay).unwrap();
//!
//! assert_eq!(axis.driver().rising_edges, 3);
//! assert_eq!(axis.driver().direction_level, Some(true));
//! assert!(!axis.driver().enabled);
//! ```
//!
//! [`StepperDriver`]: crate::traits::StepperDriver
//! [`DelayUs`]: crate::traits::DelayUs
//! [`ThermalDriver`]: crate::traits::ThermalDriver
//! [`TemperatureSource`]: crate::traits::TemperatureSource
//! [`SwitchOutputs`]: crate::traits::SwitchOutputs
//! [`SelectorInput`]: crate::traits::SelectorInput
//! [`Clock`]: crate::traits::Clock
//! [`SerialInput`]: crate::traits::SerialInput
//! [`StatusSink`]: crate::traits::StatusSink

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::traits::{
    Clock, DelayUs, SelectorInput, SerialInput, StatusSink, StepperDriver, SwitchOutputs,
    TemperatureSource, ThermalDriver, ThermalOutput,
};

// ============================================================================
// Actuator Mocks
// ============================================================================

/// Mock stepper driver for testing.
///
/// Records line levels and counts pulse edges. Set `fail_writes` to make
/// every line write return `Err(())`.
///
/// # Example
///
/// ```rust
/// use pico_instrument::hal::MockStepper;
/// use pico_instrument::traits::StepperDriver;
///
/// let mut driver = MockStepper::new();
/// driver.set_enabled(true).unwrap();
/// driver.set_pulse(true).unwrap();
/// driver.set_pulse(false).unwrap();
/// driver.release().unwrap();
///
/// assert_eq!(driver.rising_edges, 1);
/// assert_eq!(driver.enable_cycles, 1);
/// assert!(!driver.enabled);
/// ```
#[derive(Debug, Default)]
pub struct MockStepper {
    /// Last direction level written, `None` before the first write.
    pub direction_level: Option<bool>,
    /// Whether the driver stage is enabled.
    pub enabled: bool,
    /// Current pulse line level.
    pub pulse: bool,
    /// Number of low-to-high pulse transitions.
    pub rising_edges: u32,
    /// Number of disabled-to-enabled transitions.
    pub enable_cycles: u32,
    /// Fail every write.
    pub fail_writes: bool,
}

impl MockStepper {
    /// Creates a new mock stepper with all lines low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock stepper whose writes all fail.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), ()> {
        if self.fail_writes {
            Err(())
        } else {
            Ok(())
        }
    }
}

impl StepperDriver for MockStepper {
    type Error = ();

    fn set_direction_level(&mut self, high: bool) -> Result<(), ()> {
        self.check()?;
        self.direction_level = Some(high);
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), ()> {
        self.check()?;
        if enabled && !self.enabled {
            self.enable_cycles += 1;
        }
        self.enabled = enabled;
        Ok(())
    }

    fn set_pulse(&mut self, high: bool) -> Result<(), ()> {
        self.check()?;
        if high && !self.pulse {
            self.rising_edges += 1;
        }
        self.pulse = high;
        Ok(())
    }
}

/// Virtual microsecond delay.
///
/// Returns immediately and records what was requested.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Sum of all requested delays.
    pub total_us: u64,
    /// Each requested delay in call order.
    pub calls: Vec<u32>,
}

impl MockDelay {
    /// Creates a new mock delay with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayUs for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us += u64::from(us);
        self.calls.push(us);
    }
}

/// Mock H-bridge for testing thermal channels.
///
/// # Example
///
/// ```rust
/// use pico_instrument::hal::MockBridge;
/// use pico_instrument::traits::{ThermalDriver, ThermalOutput, Polarity};
///
/// let mut bridge = MockBridge::new();
/// bridge.apply(ThermalOutput::Drive { polarity: Polarity::Forward, level: 200 }).unwrap();
/// bridge.off().unwrap();
///
/// assert_eq!(bridge.last, Some(ThermalOutput::Off));
/// assert_eq!(bridge.history.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockBridge {
    /// Last applied output, `None` before the first write.
    pub last: Option<ThermalOutput>,
    /// Every applied output in order.
    pub history: Vec<ThermalOutput>,
}

impl MockBridge {
    /// Creates a new mock bridge with nothing applied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any output other than `Off` was ever applied.
    pub fn ever_driven(&self) -> bool {
        self.history
            .iter()
            .any(|o| matches!(o, ThermalOutput::Drive { .. }))
    }
}

impl ThermalDriver for MockBridge {
    type Error = ();

    fn apply(&mut self, output: ThermalOutput) -> Result<(), ()> {
        self.last = Some(output);
        self.history.push(output);
        Ok(())
    }
}

/// Mock switch bank.
#[derive(Debug, Default)]
pub struct MockSwitches {
    /// Last written mask, `None` before the first write.
    pub mask: Option<u8>,
    /// Number of writes.
    pub writes: usize,
}

impl MockSwitches {
    /// Creates a new mock switch bank with nothing written.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SwitchOutputs for MockSwitches {
    type Error = ();

    fn write_mask(&mut self, mask: u8) -> Result<(), ()> {
        self.mask = Some(mask);
        self.writes += 1;
        Ok(())
    }
}

// ============================================================================
// Sensor Mocks
// ============================================================================

/// Mock temperature sensors.
///
/// Each sensor returns its current value on every read; `None` simulates a
/// failed read.
///
/// # Example
///
/// ```rust
/// use pico_instrument::hal::MockSensors;
/// use pico_instrument::traits::TemperatureSource;
///
/// let mut sensors = MockSensors::new(&[Some(25.0), None]);
/// sensors.start_conversion();
///
/// assert_eq!(sensors.sensor_count(), 2);
/// assert_eq!(sensors.read_celsius(0), Some(25.0));
/// assert_eq!(sensors.read_celsius(1), None);
/// assert_eq!(sensors.read_celsius(5), None);
/// assert_eq!(sensors.conversions, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockSensors {
    /// Current reading per sensor.
    pub readings: Vec<Option<f32>>,
    /// Number of conversions started.
    pub conversions: u32,
    /// Number of reads performed.
    pub reads: u32,
}

impl MockSensors {
    /// Creates sensors with the given initial readings.
    pub fn new(readings: &[Option<f32>]) -> Self {
        Self {
            readings: readings.to_vec(),
            ..Self::default()
        }
    }

    /// Set the reading of one sensor.
    pub fn set(&mut self, index: usize, reading: Option<f32>) {
        if let Some(slot) = self.readings.get_mut(index) {
            *slot = reading;
        }
    }
}

impl TemperatureSource for MockSensors {
    fn sensor_count(&self) -> usize {
        self.readings.len()
    }

    fn start_conversion(&mut self) {
        self.conversions += 1;
    }

    fn read_celsius(&mut self, index: usize) -> Option<f32> {
        self.reads += 1;
        self.readings.get(index).copied().flatten()
    }
}

/// Mock selector lines.
#[derive(Debug, Default)]
pub struct MockSelector {
    /// Value returned by every read.
    pub value: u8,
    /// Number of reads.
    pub reads: usize,
}

impl MockSelector {
    /// Creates a selector reading `value`.
    pub fn new(value: u8) -> Self {
        Self { value, reads: 0 }
    }
}

impl SelectorInput for MockSelector {
    fn read_selector(&mut self) -> u8 {
        self.reads += 1;
        self.value
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use pico_instrument::hal::MockClock;
/// use pico_instrument::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Transport Mocks
// ============================================================================

/// Mock serial input.
///
/// Bytes come out in the order they were queued.
///
/// # Example
///
/// ```rust
/// use pico_instrument::hal::MockSerial;
/// use pico_instrument::traits::SerialInput;
///
/// let mut serial = MockSerial::new();
/// serial.queue_line("{}");
///
/// assert_eq!(serial.poll_byte(), Some(b'{'));
/// assert_eq!(serial.poll_byte(), Some(b'}'));
/// assert_eq!(serial.poll_byte(), Some(b'\n'));
/// assert_eq!(serial.poll_byte(), None);
/// ```
#[derive(Debug, Default)]
pub struct MockSerial {
    /// Pending inbound bytes.
    pub pending: VecDeque<u8>,
}

impl MockSerial {
    /// Creates a new mock serial port with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// Queue a line followed by `\n`.
    pub fn queue_line(&mut self, line: &str) {
        self.queue_bytes(line.as_bytes());
        self.pending.push_back(b'\n');
    }
}

impl SerialInput for MockSerial {
    fn poll_byte(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }
}

/// Mock status sink capturing every written line.
#[derive(Debug, Default)]
pub struct MockSink {
    /// Lines written, terminators included.
    pub lines: Vec<String>,
}

impl MockSink {
    /// Creates a new mock sink with no lines.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last written line, if any.
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

impl StatusSink for MockSink {
    type Error = ();

    fn write_line(&mut self, line: &str) -> Result<(), ()> {
        self.lines.push(String::from(line));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
