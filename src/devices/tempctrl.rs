//! Thermoelectric temperature control.
//!
//! A [`ThermalBank`] holds the regulated channels. It is driven either
//! directly by [`ThermalDevice`] from the main loop, or from a second
//! execution context through [`ThermalLoop`], with [`SharedThermalDevice`]
//! serving commands and status from the main loop.
//!
//! # Commands
//!
//! | Field | Effect |
//! |-------|--------|
//! | `channel` | 0 or absent: all channels; `n`: channel `n` only |
//! | `temperature` | Target temperature |
//! | `hysteresis` | Dead band half-width |
//! | `gain` | Proportional gain |
//! | `baseline` | Baseline drive |
//! | `clamp` | Drive clamp |
//! | `enable` | Enable or disable regulation |
//! | `cmd` | `set_temp`, `set_hysteresis`, `enable`, `disable`; a verb applies only its own field |
//!
//! Disabling switches the output off immediately. Enabling never clears a
//! permanent sensor-fault shutdown.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::devices::ThermalDevice;
//! use pico_instrument::dispatch::ChannelSet;
//! use pico_instrument::config::ThermalConfig;
//! use pico_instrument::hal::{MockBridge, MockSensors};
//! use pico_instrument::thermal::ThermalState;
//!
//! let sensors = MockSensors::new(&[Some(25.0), Some(32.2)]);
//! let mut tec = ThermalDevice::new(
//!     vec![MockBridge::new(), MockBridge::new()],
//!     sensors,
//!     &ThermalConfig::default(),
//! );
//! tec.init(0);
//! tec.tick(750);
//!
//! assert_eq!(tec.bank().channel(0).unwrap().state(), ThermalState::Active);
//! assert_eq!(tec.bank().channel(1).unwrap().state(), ThermalState::Idle);
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use heapless::String as HString;
use heapless::Vec as HVec;
use serde::Deserialize;

use crate::command::{self, ChannelSelector};
use crate::config::{ThermalConfig, MAX_THERMAL_CHANNELS};
use crate::dispatch::ChannelSet;
use crate::shared::Shared;
use crate::telemetry::StatusRecord;
use crate::thermal::{
    ConversionGate, SensorRange, ThermalChannel, ThermalSetpoint, ThermalSnapshot, ThermalState,
};
use crate::traits::{TemperatureSource, ThermalDriver};

const TEMP_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["temp1", "temp2", "temp3", "temp4"];
const TARGET_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["target1", "target2", "target3", "target4"];
const DRIVE_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["drive1", "drive2", "drive3", "drive4"];
const ENABLED_KEYS: [&str; MAX_THERMAL_CHANNELS] =
    ["enabled1", "enabled2", "enabled3", "enabled4"];
const ACTIVE_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["active1", "active2", "active3", "active4"];
const FAULT_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["fault1", "fault2", "fault3", "fault4"];
const ERRORS_KEYS: [&str; MAX_THERMAL_CHANNELS] = ["errors1", "errors2", "errors3", "errors4"];

/// Thermal command line. Absent fields leave state unchanged.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThermalCommand {
    /// Channel selector (0 = all).
    pub channel: Option<u8>,
    /// Target temperature.
    pub temperature: Option<f32>,
    /// Dead band half-width.
    pub hysteresis: Option<f32>,
    /// Proportional gain.
    pub gain: Option<f32>,
    /// Baseline drive.
    pub baseline: Option<f32>,
    /// Drive clamp.
    pub clamp: Option<f32>,
    /// Enable or disable regulation.
    pub enable: Option<bool>,
    /// Verb form.
    pub cmd: Option<HString<16>>,
}

impl ThermalCommand {
    /// Channels addressed.
    pub fn selector(&self) -> ChannelSelector {
        ChannelSelector::from_field(self.channel)
    }

    /// Requested enable state; the `enable`/`disable` verbs take precedence
    /// over the `enable` field.
    pub fn enable_request(&self) -> Option<bool> {
        match self.cmd.as_deref() {
            Some("enable") => Some(true),
            Some("disable") => Some(false),
            _ => self.enable,
        }
    }

    /// The updates this command carries.
    ///
    /// Without `cmd` every present field applies. A verb applies only its
    /// own field: `set_temp` the temperature, `set_hysteresis` the
    /// hysteresis, `enable`/`disable` the enable state. Unknown verbs
    /// carry nothing.
    pub fn effective(&self) -> Self {
        let Some(verb) = self.cmd.as_deref() else {
            return self.clone();
        };
        let mut only = Self {
            channel: self.channel,
            cmd: self.cmd.clone(),
            ..Self::default()
        };
        match verb {
            "set_temp" => only.temperature = self.temperature,
            "set_hysteresis" => only.hysteresis = self.hysteresis,
            "enable" | "disable" => {}
            other => log::debug!("tempctrl: ignoring verb {:?}", other),
        }
        only
    }
}

/// The regulated channels of one board.
pub struct ThermalBank<D: ThermalDriver> {
    channels: Vec<ThermalChannel<D>>,
    range: SensorRange,
    sensor_count: usize,
}

/// Snapshots of every channel, copied out in one go.
pub type BankSnapshot = HVec<ThermalSnapshot, MAX_THERMAL_CHANNELS>;

impl<D> ThermalBank<D>
where
    D: ThermalDriver,
    D::Error: Debug,
{
    /// One channel per driver (at most [`MAX_THERMAL_CHANNELS`]); channel
    /// `i` takes setpoint `i` from the configuration, or the default
    /// setpoint if the configuration lists fewer.
    pub fn new(drivers: impl IntoIterator<Item = D>, config: &ThermalConfig) -> Self {
        let channels = drivers
            .into_iter()
            .take(MAX_THERMAL_CHANNELS)
            .enumerate()
            .map(|(i, driver)| {
                let setpoint = config
                    .channels
                    .get(i)
                    .copied()
                    .unwrap_or_else(ThermalSetpoint::default);
                ThermalChannel::new(
                    i as u8 + 1,
                    driver,
                    setpoint,
                    config.faults,
                    config.pwm_wrap,
                )
            })
            .collect();
        Self {
            channels,
            range: config.range,
            sensor_count: 0,
        }
    }

    /// Switch every output off.
    pub fn init(&mut self) {
        for ch in &mut self.channels {
            if let Err(e) = ch.init() {
                log::warn!("thermal channel {}: output off failed: {:?}", ch.id(), e);
            }
        }
    }

    /// Apply a decoded command to the addressed channels.
    ///
    /// Values that are not finite are dropped.
    pub fn apply(&mut self, cmd: &ThermalCommand) {
        let cmd = cmd.effective();
        let selector = cmd.selector();
        let enable = cmd.enable_request();
        let temperature = finite("temperature", cmd.temperature);
        let hysteresis = finite("hysteresis", cmd.hysteresis);
        let gain = finite("gain", cmd.gain);
        let baseline = finite("baseline", cmd.baseline);
        let clamp = finite("clamp", cmd.clamp);
        for (i, ch) in self.channels.iter_mut().enumerate() {
            if !selector.matches(i) {
                continue;
            }
            if let Some(t) = temperature {
                ch.set_target(t);
            }
            if let Some(h) = hysteresis {
                ch.set_hysteresis(h);
            }
            if let Some(g) = gain {
                ch.set_gain(g);
            }
            if let Some(b) = baseline {
                ch.set_baseline(b);
            }
            if let Some(c) = clamp {
                ch.set_clamp(c);
            }
            if let Some(enabled) = enable {
                if let Err(e) = ch.set_enabled(enabled) {
                    log::warn!("thermal channel {}: output write failed: {:?}", ch.id(), e);
                }
            }
        }
    }

    /// Run one control step with the readings of this conversion.
    ///
    /// `readings[i]` belongs to channel `i`; missing entries count as
    /// failed reads.
    pub fn control(&mut self, readings: &[Option<f32>], now_ms: u64) {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            let reading = self.range.validate(readings.get(i).copied().flatten());
            if let Err(e) = ch.tick(reading, now_ms) {
                log::warn!("thermal channel {}: output write failed: {:?}", ch.id(), e);
            }
        }
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if the bank has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel at zero-based `index`.
    pub fn channel(&self, index: usize) -> Option<&ThermalChannel<D>> {
        self.channels.get(index)
    }

    /// Sensors found at the last conversion.
    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    /// Record the number of sensors found.
    pub fn set_sensor_count(&mut self, count: usize) {
        self.sensor_count = count;
    }

    /// Copy out every channel's state.
    pub fn snapshot(&self) -> BankSnapshot {
        self.channels.iter().map(ThermalChannel::snapshot).collect()
    }
}

fn finite(field: &str, value: Option<f32>) -> Option<f32> {
    match value {
        Some(v) if !v.is_finite() => {
            log::warn!("tempctrl: ignoring non-finite {}", field);
            None
        }
        other => other,
    }
}

/// Build the `tempctrl` status record.
///
/// `sensors_active` is true when any sensor was found; `sensor_count`
/// carries the number.
pub fn thermal_status(
    app_id: u8,
    channels: &[ThermalSnapshot],
    sensor_count: usize,
) -> StatusRecord {
    let mut record = StatusRecord::new()
        .str("sensor_name", "tempctrl")
        .str("status", "update")
        .int("app_id", i64::from(app_id));
    for (i, ch) in channels.iter().take(MAX_THERMAL_CHANNELS).enumerate() {
        record = record
            .float(TEMP_KEYS[i], ch.measured)
            .float(TARGET_KEYS[i], ch.target)
            .float(DRIVE_KEYS[i], ch.drive)
            .bool(ENABLED_KEYS[i], ch.enabled)
            .bool(ACTIVE_KEYS[i], ch.state == ThermalState::Active)
            .bool(FAULT_KEYS[i], ch.permanently_disabled)
            .int(ERRORS_KEYS[i], i64::from(ch.error_count));
    }
    record
        .bool("sensors_active", sensor_count > 0)
        .int("sensor_count", sensor_count as i64)
}

fn read_all<S: TemperatureSource>(
    sensors: &mut S,
    channels: usize,
) -> HVec<Option<f32>, MAX_THERMAL_CHANNELS> {
    let found = sensors.sensor_count();
    (0..channels.min(MAX_THERMAL_CHANNELS))
        .map(|i| if i < found { sensors.read_celsius(i) } else { None })
        .collect()
}

// ============================================================================
// Single-context device
// ============================================================================

/// Thermal control run from the main loop.
pub struct ThermalDevice<D: ThermalDriver, S: TemperatureSource> {
    bank: ThermalBank<D>,
    sensors: S,
    gate: ConversionGate,
}

impl<D, S> ThermalDevice<D, S>
where
    D: ThermalDriver,
    D::Error: Debug,
    S: TemperatureSource,
{
    /// One channel per driver.
    pub fn new(drivers: impl IntoIterator<Item = D>, sensors: S, config: &ThermalConfig) -> Self {
        Self {
            bank: ThermalBank::new(drivers, config),
            sensors,
            gate: ConversionGate::new(u64::from(config.settle_ms)),
        }
    }

    /// The channels.
    pub fn bank(&self) -> &ThermalBank<D> {
        &self.bank
    }

    /// The sensors.
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// Mutable sensors, for injecting readings in tests and simulation.
    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    fn start_conversion(&mut self, now_ms: u64) {
        self.sensors.start_conversion();
        self.gate.start(now_ms);
    }
}

impl<D, S> ChannelSet for ThermalDevice<D, S>
where
    D: ThermalDriver,
    D::Error: Debug,
    S: TemperatureSource,
{
    fn name(&self) -> &'static str {
        "tempctrl"
    }

    fn init(&mut self, now_ms: u64) {
        self.bank.init();
        let found = self.sensors.sensor_count();
        self.bank.set_sensor_count(found);
        log::info!("tempctrl: {} channels, {} sensors", self.bank.len(), found);
        self.start_conversion(now_ms);
    }

    fn on_command(&mut self, line: &str) {
        if let Some(cmd) = command::decode::<ThermalCommand>(line) {
            self.bank.apply(&cmd);
        }
    }

    fn tick(&mut self, now_ms: u64) {
        if !self.gate.ready(now_ms) {
            return;
        }
        let readings = read_all(&mut self.sensors, self.bank.len());
        self.bank.set_sensor_count(self.sensors.sensor_count());
        self.bank.control(&readings, now_ms);
        self.start_conversion(now_ms);
    }

    fn report_status(&self, app_id: u8) -> StatusRecord {
        thermal_status(app_id, &self.bank.snapshot(), self.bank.sensor_count())
    }
}

// ============================================================================
// Dual-context device
// ============================================================================

/// Control side of a bank shared with another execution context.
///
/// Runs on a timer or second core; sensor reads happen outside the
/// critical section, only the channel update happens inside it.
pub struct ThermalLoop<D: ThermalDriver + 'static, S: TemperatureSource> {
    bank: &'static Shared<ThermalBank<D>>,
    sensors: S,
    gate: ConversionGate,
}

impl<D, S> ThermalLoop<D, S>
where
    D: ThermalDriver + 'static,
    D::Error: Debug,
    S: TemperatureSource,
{
    /// Control loop over a shared bank.
    pub fn new(bank: &'static Shared<ThermalBank<D>>, sensors: S, settle_ms: u64) -> Self {
        Self {
            bank,
            sensors,
            gate: ConversionGate::new(settle_ms),
        }
    }

    /// Start the first conversion.
    pub fn start(&mut self, now_ms: u64) {
        let found = self.sensors.sensor_count();
        self.bank.with(|bank| bank.set_sensor_count(found));
        self.sensors.start_conversion();
        self.gate.start(now_ms);
    }

    /// Run one control step if the conversion has settled.
    ///
    /// Returns whether a step ran.
    pub fn step(&mut self, now_ms: u64) -> bool {
        if !self.gate.ready(now_ms) {
            return false;
        }
        let channels = self.bank.with(|bank| bank.len());
        let readings = read_all(&mut self.sensors, channels);
        let found = self.sensors.sensor_count();
        self.bank.with(|bank| {
            bank.set_sensor_count(found);
            bank.control(&readings, now_ms);
        });
        self.sensors.start_conversion();
        self.gate.start(now_ms);
        true
    }
}

/// Command and status side of a bank shared with a [`ThermalLoop`].
///
/// `tick` does nothing; control runs in the other context.
pub struct SharedThermalDevice<D: ThermalDriver + 'static> {
    bank: &'static Shared<ThermalBank<D>>,
}

impl<D> SharedThermalDevice<D>
where
    D: ThermalDriver + 'static,
    D::Error: Debug,
{
    /// Serve an existing shared bank.
    pub fn new(bank: &'static Shared<ThermalBank<D>>) -> Self {
        Self { bank }
    }

    /// Move `bank` into process-lifetime shared storage and return both
    /// halves.
    pub fn split<S: TemperatureSource>(
        bank: ThermalBank<D>,
        sensors: S,
        settle_ms: u64,
    ) -> (Self, ThermalLoop<D, S>) {
        let shared: &'static Shared<ThermalBank<D>> = Box::leak(Box::new(Shared::new(bank)));
        (Self::new(shared), ThermalLoop::new(shared, sensors, settle_ms))
    }

    /// Consistent copy of every channel.
    pub fn snapshot(&self) -> (BankSnapshot, usize) {
        self.bank.with(|bank| (bank.snapshot(), bank.sensor_count()))
    }
}

impl<D> ChannelSet for SharedThermalDevice<D>
where
    D: ThermalDriver + 'static,
    D::Error: Debug,
{
    fn name(&self) -> &'static str {
        "tempctrl"
    }

    fn init(&mut self, _now_ms: u64) {
        self.bank.with(|bank| bank.init());
    }

    fn on_command(&mut self, line: &str) {
        if let Some(cmd) = command::decode::<ThermalCommand>(line) {
            self.bank.with(|bank| bank.apply(&cmd));
        }
    }

    fn tick(&mut self, _now_ms: u64) {}

    fn report_status(&self, app_id: u8) -> StatusRecord {
        let (channels, sensor_count) = self.snapshot();
        thermal_status(app_id, &channels, sensor_count)
    }
}
