//! Shared configuration for the board firmware and the host simulator.
//!
//! Uses `heapless` collections for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. Every section deserializes with
//! `#[serde(default)]`, so a partial JSON document only overrides the keys
//! it names.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::config::{Config, RunnerConfig, ThermalConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.runner.status_cadence_ms, 200);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_runner(RunnerConfig::default().with_status_cadence_ms(500))
//!     .with_thermal(ThermalConfig::default().with_pwm_wrap(4000));
//!
//! // Or load overrides from JSON
//! let config = Config::from_json(r#"{"runner": {"status_cadence_ms": 1000}}"#).unwrap();
//! assert_eq!(config.runner.status_cadence_ms, 1000);
//! assert_eq!(config.thermal.channels.len(), 2);
//! ```

use heapless::String as HString;
use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::motion::MotionTiming;
use crate::thermal::{FaultPolicy, SensorRange, ThermalSetpoint};

/// Maximum length for short config strings (device names)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum number of thermal channels on one board
pub const MAX_THERMAL_CHANNELS: usize = 4;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device identification
    pub device: DeviceConfig,
    /// Stepper axes
    pub motion: MotionConfig,
    /// Thermoelectric channels
    pub thermal: ThermalConfig,
    /// Dispatch loop
    pub runner: RunnerConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON document over the defaults.
    ///
    /// Returns `None` if the document is not valid JSON for this shape.
    pub fn from_json(json: &str) -> Option<Self> {
        match serde_json_core::from_str::<Self>(json) {
            Ok((config, _)) => Some(config),
            Err(e) => {
                log::warn!("ignoring invalid configuration: {:?}", e);
                None
            }
        }
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set motion configuration
    pub fn with_motion(mut self, motion: MotionConfig) -> Self {
        self.motion = motion;
        self
    }

    /// Set thermal configuration
    pub fn with_thermal(mut self, thermal: ThermalConfig) -> Self {
        self.thermal = thermal;
        self
    }

    /// Set runner configuration
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Human-readable board name
    pub name: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("pico-instrument"),
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }
}

// ============================================================================
// Motion Config
// ============================================================================

/// Azimuth/elevation stepper configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Azimuth axis timing
    pub az: MotionTiming,
    /// Elevation axis timing
    pub el: MotionTiming,
    /// Direction line level that moves the azimuth axis forward
    pub az_forward_level: bool,
    /// Direction line level that moves the elevation axis forward
    pub el_forward_level: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            az: MotionTiming::default(),
            el: MotionTiming::default(),
            az_forward_level: true,
            el_forward_level: true,
        }
    }
}

impl MotionConfig {
    /// Set the same timing on both axes
    pub fn with_timing(mut self, timing: MotionTiming) -> Self {
        self.az = timing;
        self.el = timing;
        self
    }

    /// Set the azimuth timing
    pub fn with_az(mut self, timing: MotionTiming) -> Self {
        self.az = timing;
        self
    }

    /// Set the elevation timing
    pub fn with_el(mut self, timing: MotionTiming) -> Self {
        self.el = timing;
        self
    }
}

// ============================================================================
// Thermal Config
// ============================================================================

/// Thermoelectric regulation configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// One setpoint per channel; the length is the channel count
    pub channels: HVec<ThermalSetpoint, MAX_THERMAL_CHANNELS>,
    /// PWM level meaning full drive
    pub pwm_wrap: u32,
    /// Minimum time between conversion start and read
    pub settle_ms: u32,
    /// Plausible sensor range
    pub range: SensorRange,
    /// Fault escalation window and threshold
    pub faults: FaultPolicy,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        let mut channels = HVec::new();
        let _ = channels.push(ThermalSetpoint::new(30.0));
        let _ = channels.push(ThermalSetpoint::new(32.0));
        Self {
            channels,
            pwm_wrap: 1000,
            settle_ms: 750,
            range: SensorRange::default(),
            faults: FaultPolicy::default(),
        }
    }
}

impl ThermalConfig {
    /// Replace the channel setpoints (extra entries beyond the capacity are dropped)
    pub fn with_channels(mut self, setpoints: &[ThermalSetpoint]) -> Self {
        self.channels.clear();
        for sp in setpoints.iter().take(MAX_THERMAL_CHANNELS) {
            let _ = self.channels.push(*sp);
        }
        self
    }

    /// Set the PWM wrap
    pub fn with_pwm_wrap(mut self, wrap: u32) -> Self {
        self.pwm_wrap = wrap.max(1);
        self
    }

    /// Set the conversion settle time
    pub fn with_settle_ms(mut self, ms: u32) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the fault policy
    pub fn with_faults(mut self, faults: FaultPolicy) -> Self {
        self.faults = faults;
        self
    }

    /// Set the valid sensor range
    pub fn with_range(mut self, range: SensorRange) -> Self {
        self.range = range;
        self
    }
}

// ============================================================================
// Runner Config
// ============================================================================

/// Dispatch loop configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interval between status lines in milliseconds
    pub status_cadence_ms: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            status_cadence_ms: 200,
        }
    }
}

impl RunnerConfig {
    /// Set the status cadence
    pub fn with_status_cadence_ms(mut self, ms: u32) -> Self {
        self.status_cadence_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.motion.az.pulse_high_us, 600);
        assert_eq!(config.motion.el.max_pulses, 60);
        assert_eq!(config.thermal.channels.len(), 2);
        assert_eq!(config.thermal.channels[0].target, 30.0);
        assert_eq!(config.thermal.channels[1].target, 32.0);
        assert_eq!(config.thermal.pwm_wrap, 1000);
        assert_eq!(config.thermal.settle_ms, 750);
        assert_eq!(config.runner.status_cadence_ms, 200);
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn string_helpers_utf8_boundary() {
        // Each character is 3 bytes; 64 is not a multiple of 3
        let input = "\u{2603}".repeat(30);
        let s = short_string(&input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert_eq!(s.len() % 3, 0);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_device(DeviceConfig::default().with_name("bench-2"))
            .with_motion(MotionConfig::default().with_timing(MotionTiming::default().with_slow_zone(20)))
            .with_runner(RunnerConfig::default().with_status_cadence_ms(50));

        assert_eq!(config.device.name.as_str(), "bench-2");
        assert_eq!(config.motion.az.slow_zone, 20);
        assert_eq!(config.motion.el.slow_zone, 20);
        assert_eq!(config.runner.status_cadence_ms, 50);
    }

    #[test]
    fn thermal_channels_capped() {
        let setpoints = [ThermalSetpoint::default(); 6];
        let thermal = ThermalConfig::default().with_channels(&setpoints);
        assert_eq!(thermal.channels.len(), MAX_THERMAL_CHANNELS);
    }

    #[test]
    fn pwm_wrap_never_zero() {
        assert_eq!(ThermalConfig::default().with_pwm_wrap(0).pwm_wrap, 1);
    }

    #[test]
    fn from_json_partial_override() {
        let config = Config::from_json(
            r#"{"motion": {"az": {"max_pulses": 10}}, "thermal": {"settle_ms": 800}}"#,
        )
        .unwrap();
        assert_eq!(config.motion.az.max_pulses, 10);
        assert_eq!(config.motion.az.pulse_low_us, 600);
        assert_eq!(config.motion.el.max_pulses, 60);
        assert_eq!(config.thermal.settle_ms, 800);
        assert_eq!(config.thermal.pwm_wrap, 1000);
    }

    #[test]
    fn from_json_replaces_channel_list() {
        let config =
            Config::from_json(r#"{"thermal": {"channels": [{"target": 25.0}]}}"#).unwrap();
        assert_eq!(config.thermal.channels.len(), 1);
        assert_eq!(config.thermal.channels[0].target, 25.0);
        assert_eq!(config.thermal.channels[0].hysteresis, 0.5);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(Config::from_json("{").is_none());
        assert!(Config::from_json(r#"{"runner": {"status_cadence_ms": "fast"}}"#).is_none());
    }
}
