//! Temperature monitoring without regulation.
//!
//! Reads every sensor found on the bus at startup (up to
//! [`MAX_MONITORED_SENSORS`]) once per settled conversion and reports each
//! reading with its validity. A failed or out-of-range read marks the
//! sensor invalid and keeps its last good temperature.
//!
//! If no sensor is found at startup the device never reads and reports
//! `status="not_initialized"`.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::config::ThermalConfig;
//! use pico_instrument::devices::TempMonDevice;
//! use pico_instrument::dispatch::ChannelSet;
//! use pico_instrument::hal::MockSensors;
//!
//! let mut mon = TempMonDevice::new(
//!     MockSensors::new(&[Some(21.5), None]),
//!     &ThermalConfig::default(),
//! );
//! mon.init(0);
//! mon.tick(750);
//!
//! assert_eq!(mon.readings()[0].temperature, 21.5);
//! assert!(mon.readings()[0].valid);
//! assert!(!mon.readings()[1].valid);
//! ```

use heapless::Vec as HVec;

use crate::config::ThermalConfig;
use crate::dispatch::ChannelSet;
use crate::telemetry::StatusRecord;
use crate::thermal::{ConversionGate, SensorRange};
use crate::traits::TemperatureSource;

/// Most sensors one monitor reports.
pub const MAX_MONITORED_SENSORS: usize = 8;

const TEMP_KEYS: [&str; MAX_MONITORED_SENSORS] = [
    "temp1", "temp2", "temp3", "temp4", "temp5", "temp6", "temp7", "temp8",
];
const VALID_KEYS: [&str; MAX_MONITORED_SENSORS] = [
    "valid1", "valid2", "valid3", "valid4", "valid5", "valid6", "valid7", "valid8",
];

/// Latest reading of one sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorReading {
    /// Last good temperature in degrees Celsius, 0 before the first.
    pub temperature: f32,
    /// Whether the last read was good.
    pub valid: bool,
}

/// Reports every sensor on the bus.
pub struct TempMonDevice<S: TemperatureSource> {
    sensors: S,
    gate: ConversionGate,
    range: SensorRange,
    readings: HVec<SensorReading, MAX_MONITORED_SENSORS>,
    initialized: bool,
}

impl<S: TemperatureSource> TempMonDevice<S> {
    /// Monitor using the sensor settle time and range from `config`.
    pub fn new(sensors: S, config: &ThermalConfig) -> Self {
        Self {
            sensors,
            gate: ConversionGate::new(u64::from(config.settle_ms)),
            range: config.range,
            readings: HVec::new(),
            initialized: false,
        }
    }

    /// Whether sensors were found at startup.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One entry per monitored sensor.
    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
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

impl<S: TemperatureSource> ChannelSet for TempMonDevice<S> {
    fn name(&self) -> &'static str {
        "tempmon"
    }

    fn init(&mut self, now_ms: u64) {
        let found = self.sensors.sensor_count();
        if found > MAX_MONITORED_SENSORS {
            log::warn!(
                "tempmon: {} sensors found, monitoring the first {}",
                found,
                MAX_MONITORED_SENSORS
            );
        }
        self.readings = (0..found.min(MAX_MONITORED_SENSORS))
            .map(|_| SensorReading::default())
            .collect();

        self.initialized = !self.readings.is_empty();
        if self.initialized {
            log::info!("tempmon: {} sensors", self.readings.len());
            self.start_conversion(now_ms);
        } else {
            log::warn!("tempmon: no temperature sensors found");
        }
    }

    fn on_command(&mut self, line: &str) {
        log::debug!("tempmon: takes no commands, dropping: {}", line);
    }

    fn tick(&mut self, now_ms: u64) {
        if !self.initialized || !self.gate.ready(now_ms) {
            return;
        }
        for (i, slot) in self.readings.iter_mut().enumerate() {
            match self.range.validate(self.sensors.read_celsius(i)) {
                Some(t) => {
                    slot.temperature = t;
                    slot.valid = true;
                }
                None => slot.valid = false,
            }
        }
        self.start_conversion(now_ms);
    }

    fn report_status(&self, app_id: u8) -> StatusRecord {
        if !self.initialized {
            return StatusRecord::new()
                .str("sensor_name", "tempmon")
                .str("status", "not_initialized")
                .int("app_id", i64::from(app_id))
                .bool("initialized", false);
        }
        let mut record = StatusRecord::new()
            .str("sensor_name", "tempmon")
            .str("status", "update")
            .int("app_id", i64::from(app_id))
            .int("sensor_count", self.readings.len() as i64);
        for (i, reading) in self.readings.iter().enumerate() {
            record = record
                .float(TEMP_KEYS[i], reading.temperature)
                .bool(VALID_KEYS[i], reading.valid);
        }
        record
    }
}
