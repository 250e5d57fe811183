//! Hysteresis-band thermal regulation with fault-driven shutdown.
//!
//! A [`ThermalChannel`] owns one H-bridge driving a thermoelectric element
//! and regulates the measured temperature against a target.
//!
//! # State machine
//!
//! With `error = target - measured`:
//!
//! - `Idle -> Active` when `|error| > hysteresis`
//! - `Active -> Idle` when `|error| <= hysteresis`; drive goes to 0 and the
//!   output is switched off
//! - while `Active`: `drive = error * gain + sign(error) * baseline`,
//!   clamped to `[-limit, limit]` with `limit = min(|clamp|, 1)`; polarity
//!   follows the sign of the drive and the PWM level is `|drive| * pwm_wrap`
//! - a drive or error that is not finite leaves the output off
//! - disabled or permanently faulted channels are forced `Idle` every tick
//!
//! # Fault escalation
//!
//! Runs before the state machine. An invalid reading restarts the error
//! count if the previous counted error is older than the window, counts
//! the error, and trips a permanent shutdown once the count reaches the
//! threshold. Valid readings do not reset the count, so the trip is
//! rate-based rather than a streak. A permanent shutdown cannot be cleared
//! by any command; only a restart clears it.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::thermal::{ThermalChannel, ThermalSetpoint, FaultPolicy, ThermalState};
//! use pico_instrument::hal::MockBridge;
//!
//! let setpoint = ThermalSetpoint::new(30.0)
//!     .with_hysteresis(0.5)
//!     .with_gain(0.1)
//!     .with_baseline(0.4)
//!     .with_clamp(0.6);
//! let mut tec = ThermalChannel::new(1, MockBridge::new(), setpoint, FaultPolicy::default(), 1000);
//!
//! tec.tick(Some(28.0), 0).unwrap();
//! assert_eq!(tec.state(), ThermalState::Active);
//! assert!((tec.drive() - 0.6).abs() < 1e-6);
//!
//! tec.tick(Some(30.2), 750).unwrap();
//! assert_eq!(tec.state(), ThermalState::Idle);
//! assert_eq!(tec.drive(), 0.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::traits::{Polarity, ThermalDriver, ThermalOutput};

/// Regulation parameters of one thermal channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalSetpoint {
    /// Target temperature in degrees Celsius.
    pub target: f32,
    /// Half-width of the dead band in degrees Celsius.
    pub hysteresis: f32,
    /// Proportional gain (drive per degree of error).
    pub gain: f32,
    /// Drive added in the direction of the error while active.
    pub baseline: f32,
    /// Maximum drive magnitude; values above 1 act as 1.
    pub clamp: f32,
}

impl Default for ThermalSetpoint {
    fn default() -> Self {
        Self {
            target: 30.0,
            hysteresis: 0.5,
            gain: 0.1,
            baseline: 0.0,
            clamp: 0.2,
        }
    }
}

impl ThermalSetpoint {
    /// Default parameters with the given target.
    pub fn new(target: f32) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Set the dead band half-width.
    pub fn with_hysteresis(mut self, hysteresis: f32) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    /// Set the proportional gain.
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Set the baseline drive.
    pub fn with_baseline(mut self, baseline: f32) -> Self {
        self.baseline = baseline;
        self
    }

    /// Set the drive clamp.
    pub fn with_clamp(mut self, clamp: f32) -> Self {
        self.clamp = clamp;
        self
    }

    /// Drive for a given error, clamped to `clamp` and to `[-1, 1]`.
    ///
    /// A drive that is not finite (overflowing or NaN parameters) is zero.
    pub fn drive_for(&self, error: f32) -> f32 {
        let raw = error * self.gain + signum(error) * self.baseline;
        if !raw.is_finite() {
            return 0.0;
        }
        raw.clamp(-self.limit(), self.limit())
    }

    /// Effective drive magnitude limit, in `0..=1`.
    pub fn limit(&self) -> f32 {
        if self.clamp.is_nan() {
            0.0
        } else {
            abs(self.clamp).min(1.0)
        }
    }
}

/// Rate window for sensor fault escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPolicy {
    /// Errors further apart than this restart the count.
    pub window_ms: u64,
    /// Count at which the channel is permanently disabled.
    pub threshold: u32,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self {
            window_ms: 10_000,
            threshold: 5,
        }
    }
}

/// Regulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThermalState {
    /// Inside the dead band (or forced off); output off.
    #[default]
    Idle,
    /// Driving toward the target.
    Active,
}

/// Copyable view of a thermal channel for status reports.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThermalSnapshot {
    /// Channel id (1-based).
    pub id: u8,
    /// Last measured temperature.
    pub measured: f32,
    /// Target temperature.
    pub target: f32,
    /// Signed drive, `|drive| <= min(clamp, 1)`.
    pub drive: f32,
    /// Regulation state.
    pub state: ThermalState,
    /// Enabled by command.
    pub enabled: bool,
    /// Permanently disabled by sensor faults.
    pub permanently_disabled: bool,
    /// Errors counted in the current window.
    pub error_count: u32,
}

/// One thermoelectric channel.
#[derive(Debug)]
pub struct ThermalChannel<D: ThermalDriver> {
    id: u8,
    driver: D,
    pwm_wrap: u32,
    setpoint: ThermalSetpoint,
    policy: FaultPolicy,
    measured: f32,
    drive: f32,
    state: ThermalState,
    enabled: bool,
    permanently_disabled: bool,
    error_count: u32,
    last_error_ms: u64,
    last_update_ms: Option<u64>,
}

impl<D: ThermalDriver> ThermalChannel<D> {
    /// Create an enabled, idle channel.
    ///
    /// The measured temperature starts at the target so the first report
    /// before any conversion shows no error.
    pub fn new(
        id: u8,
        driver: D,
        setpoint: ThermalSetpoint,
        policy: FaultPolicy,
        pwm_wrap: u32,
    ) -> Self {
        Self {
            id,
            driver,
            pwm_wrap,
            setpoint,
            policy,
            measured: setpoint.target,
            drive: 0.0,
            state: ThermalState::Idle,
            enabled: true,
            permanently_disabled: false,
            error_count: 0,
            last_error_ms: 0,
            last_update_ms: None,
        }
    }

    /// Switch the output off so the element starts unpowered.
    pub fn init(&mut self) -> Result<(), D::Error> {
        self.driver.off()
    }

    /// Run one control step.
    ///
    /// `reading` is the sensor value for this channel, `None` if the read
    /// failed. Readings that are not finite count as failures too.
    pub fn tick(&mut self, reading: Option<f32>, now_ms: u64) -> Result<ThermalState, D::Error> {
        let reading = reading.filter(|t| t.is_finite());

        let Some(measured) = reading else {
            self.record_fault(now_ms);
            self.force_idle()?;
            return Ok(self.state);
        };

        self.measured = measured;
        self.last_update_ms = Some(now_ms);

        if !self.enabled || self.permanently_disabled {
            self.force_idle()?;
            return Ok(self.state);
        }

        let error = self.setpoint.target - measured;
        if !error.is_finite() {
            log::warn!(
                "thermal channel {}: target {} out of range",
                self.id,
                self.setpoint.target
            );
            self.force_idle()?;
        } else if abs(error) <= self.setpoint.hysteresis {
            self.force_idle()?;
        } else {
            self.state = ThermalState::Active;
            self.drive = self.setpoint.drive_for(error);
            self.driver.apply(self.output())?;
        }
        Ok(self.state)
    }

    /// Count a sensor fault at `now_ms`.
    pub fn record_fault(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_error_ms) > self.policy.window_ms {
            self.error_count = 0;
        }
        self.error_count = self.error_count.saturating_add(1);
        self.last_error_ms = now_ms;
        log::warn!(
            "thermal channel {}: sensor fault {}/{}",
            self.id,
            self.error_count,
            self.policy.threshold
        );

        if self.error_count >= self.policy.threshold && !self.permanently_disabled {
            self.permanently_disabled = true;
            log::error!(
                "thermal channel {}: {} sensor faults within {} ms, disabled until restart",
                self.id,
                self.error_count,
                self.policy.window_ms
            );
        }
    }

    /// Enable or disable regulation. Disabling switches the output off now.
    ///
    /// Enabling does not clear a permanent shutdown.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), D::Error> {
        self.enabled = enabled;
        if !enabled {
            self.force_idle()?;
        }
        Ok(())
    }

    /// Set the target temperature.
    pub fn set_target(&mut self, target: f32) {
        self.setpoint.target = target;
    }

    /// Set the dead band half-width.
    pub fn set_hysteresis(&mut self, hysteresis: f32) {
        self.setpoint.hysteresis = hysteresis;
    }

    /// Set the proportional gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.setpoint.gain = gain;
    }

    /// Set the baseline drive.
    pub fn set_baseline(&mut self, baseline: f32) {
        self.setpoint.baseline = baseline;
    }

    /// Set the drive clamp.
    pub fn set_clamp(&mut self, clamp: f32) {
        self.setpoint.clamp = clamp;
    }

    /// Channel id (1-based).
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Regulation parameters.
    pub fn setpoint(&self) -> &ThermalSetpoint {
        &self.setpoint
    }

    /// Last measured temperature.
    pub fn measured(&self) -> f32 {
        self.measured
    }

    /// Signed drive.
    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// Regulation state.
    pub fn state(&self) -> ThermalState {
        self.state
    }

    /// Enabled by command.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Permanently disabled by sensor faults.
    pub fn is_permanently_disabled(&self) -> bool {
        self.permanently_disabled
    }

    /// Errors counted in the current window.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Time of the last valid reading.
    pub fn last_update_ms(&self) -> Option<u64> {
        self.last_update_ms
    }

    /// The driver, for inspection.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Copyable view for status reports.
    pub fn snapshot(&self) -> ThermalSnapshot {
        ThermalSnapshot {
            id: self.id,
            measured: self.measured,
            target: self.setpoint.target,
            drive: self.drive,
            state: self.state,
            enabled: self.enabled,
            permanently_disabled: self.permanently_disabled,
            error_count: self.error_count,
        }
    }

    fn force_idle(&mut self) -> Result<(), D::Error> {
        self.state = ThermalState::Idle;
        self.drive = 0.0;
        self.driver.off()
    }

    fn output(&self) -> ThermalOutput {
        let magnitude = abs(self.drive).min(1.0);
        let level = ((magnitude * self.pwm_wrap as f32) as u32).min(self.pwm_wrap);
        if level == 0 {
            ThermalOutput::Off
        } else {
            ThermalOutput::Drive {
                polarity: Polarity::of(self.drive),
                level,
            }
        }
    }
}

/// Plausible sensor output range; readings outside count as faults.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorRange {
    /// Lowest valid reading in degrees Celsius.
    pub min: f32,
    /// Highest valid reading in degrees Celsius.
    pub max: f32,
}

impl Default for SensorRange {
    fn default() -> Self {
        Self {
            min: -55.0,
            max: 125.0,
        }
    }
}

impl SensorRange {
    /// Pass through finite readings inside the range, `None` otherwise.
    pub fn validate(&self, reading: Option<f32>) -> Option<f32> {
        reading.filter(|t| t.is_finite() && *t >= self.min && *t <= self.max)
    }
}

/// Minimum interval between sensor conversions.
///
/// A conversion needs a fixed settle time before its result is valid;
/// reads attempted earlier are skipped rather than waited for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionGate {
    settle_ms: u64,
    started_ms: Option<u64>,
}

impl ConversionGate {
    /// Gate with the given settle time and no conversion started.
    pub fn new(settle_ms: u64) -> Self {
        Self {
            settle_ms,
            started_ms: None,
        }
    }

    /// Record a conversion start.
    pub fn start(&mut self, now_ms: u64) {
        self.started_ms = Some(now_ms);
    }

    /// Whether a started conversion has settled.
    pub fn ready(&self, now_ms: u64) -> bool {
        match self.started_ms {
            Some(start) => now_ms.saturating_sub(start) >= self.settle_ms,
            None => false,
        }
    }

    /// Settle time in milliseconds.
    pub fn settle_ms(&self) -> u64 {
        self.settle_ms
    }
}

#[inline]
fn abs(x: f32) -> f32 {
    if x < 0.0 {
        -x
    } else {
        x
    }
}

#[inline]
fn signum(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockBridge;

    fn channel(setpoint: ThermalSetpoint) -> ThermalChannel<MockBridge> {
        ThermalChannel::new(1, MockBridge::new(), setpoint, FaultPolicy::default(), 1000)
    }

    #[test]
    fn dead_band_keeps_idle() {
        let mut tec = channel(ThermalSetpoint::new(30.0).with_hysteresis(0.5));
        tec.tick(Some(30.4), 0).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.drive(), 0.0);
        assert_eq!(tec.driver().last, Some(ThermalOutput::Off));
    }

    #[test]
    fn outside_band_activates() {
        let mut tec = channel(ThermalSetpoint::new(30.0).with_hysteresis(0.5));
        tec.tick(Some(30.6), 0).unwrap();
        assert_eq!(tec.state(), ThermalState::Active);
        assert!(tec.drive() < 0.0);
    }

    #[test]
    fn proportional_drive_below_clamp() {
        let setpoint = ThermalSetpoint::new(30.0)
            .with_gain(0.1)
            .with_baseline(0.0)
            .with_clamp(1.0);
        let mut tec = channel(setpoint);
        tec.tick(Some(27.0), 0).unwrap();
        assert!((tec.drive() - 0.3).abs() < 1e-6);
        assert_eq!(
            tec.driver().last,
            Some(ThermalOutput::Drive {
                polarity: Polarity::Forward,
                level: 300
            })
        );
    }

    #[test]
    fn baseline_follows_error_sign() {
        let setpoint = ThermalSetpoint::new(30.0)
            .with_gain(0.1)
            .with_baseline(0.2)
            .with_clamp(1.0);
        let mut tec = channel(setpoint);
        tec.tick(Some(31.0), 0).unwrap();
        assert!((tec.drive() + 0.3).abs() < 1e-6);
        assert!(matches!(
            tec.driver().last,
            Some(ThermalOutput::Drive {
                polarity: Polarity::Reverse,
                ..
            })
        ));
    }

    #[test]
    fn drive_is_clamped() {
        let setpoint = ThermalSetpoint::new(30.0)
            .with_gain(5.0)
            .with_baseline(0.4)
            .with_clamp(0.6);
        let mut tec = channel(setpoint);
        tec.tick(Some(10.0), 0).unwrap();
        assert_eq!(tec.drive(), 0.6);
        tec.tick(Some(50.0), 750).unwrap();
        assert_eq!(tec.drive(), -0.6);
    }

    #[test]
    fn clamp_above_one_limits_drive_to_one() {
        let setpoint = ThermalSetpoint::new(30.0).with_gain(1.0).with_clamp(3.0);
        let mut tec = channel(setpoint);
        tec.tick(Some(20.0), 0).unwrap();
        assert_eq!(tec.drive(), 1.0);
        assert_eq!(
            tec.driver().last,
            Some(ThermalOutput::Drive {
                polarity: Polarity::Forward,
                level: 1000
            })
        );
    }

    #[test]
    fn infinite_target_turns_output_off() {
        let mut tec = channel(ThermalSetpoint::new(30.0).with_gain(0.0));
        tec.tick(Some(20.0), 0).unwrap();
        tec.set_target(f32::INFINITY);
        tec.tick(Some(20.0), 750).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.drive(), 0.0);
        assert_eq!(tec.driver().last, Some(ThermalOutput::Off));
    }

    #[test]
    fn non_finite_parameters_never_drive() {
        let cases = [
            ThermalSetpoint::new(30.0).with_gain(f32::INFINITY).with_baseline(f32::NEG_INFINITY),
            ThermalSetpoint::new(30.0).with_gain(f32::NAN),
            ThermalSetpoint::new(30.0).with_baseline(f32::NAN),
            ThermalSetpoint::new(30.0).with_clamp(f32::NAN),
        ];
        for setpoint in cases {
            assert_eq!(setpoint.drive_for(10.0), 0.0, "{:?}", setpoint);
            let mut tec = channel(setpoint);
            tec.tick(Some(20.0), 0).unwrap();
            assert_eq!(tec.drive(), 0.0);
            assert!(!tec.driver().ever_driven());
        }
    }

    #[test]
    fn returning_to_band_turns_off() {
        let mut tec = channel(ThermalSetpoint::new(30.0));
        tec.tick(Some(25.0), 0).unwrap();
        assert_eq!(tec.state(), ThermalState::Active);
        tec.tick(Some(29.9), 750).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.drive(), 0.0);
        assert_eq!(tec.driver().last, Some(ThermalOutput::Off));
    }

    #[test]
    fn disabled_channel_stays_off() {
        let mut tec = channel(ThermalSetpoint::new(30.0));
        tec.tick(Some(20.0), 0).unwrap();
        tec.set_enabled(false).unwrap();
        assert_eq!(tec.driver().last, Some(ThermalOutput::Off));
        tec.tick(Some(20.0), 750).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.drive(), 0.0);
        assert_eq!(tec.measured(), 20.0);
    }

    #[test]
    fn invalid_reading_forces_off_but_recovers() {
        let mut tec = channel(ThermalSetpoint::new(30.0));
        tec.tick(Some(20.0), 0).unwrap();
        assert_eq!(tec.state(), ThermalState::Active);

        tec.tick(None, 750).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.error_count(), 1);
        assert_eq!(tec.measured(), 20.0);

        tec.tick(Some(20.0), 1500).unwrap();
        assert_eq!(tec.state(), ThermalState::Active);
    }

    #[test]
    fn nan_reading_counts_as_fault() {
        let mut tec = channel(ThermalSetpoint::new(30.0));
        tec.tick(Some(f32::NAN), 0).unwrap();
        assert_eq!(tec.error_count(), 1);
        assert_eq!(tec.measured(), 30.0);
    }

    #[test]
    fn fault_burst_trips_permanent_shutdown() {
        let mut tec = channel(ThermalSetpoint::new(30.0));
        for i in 0..5 {
            tec.tick(None, 1000 + i * 100).unwrap();
        }
        assert!(tec.is_permanently_disabled());

        tec.set_enabled(true).unwrap();
        tec.tick(Some(10.0), 5000).unwrap();
        assert_eq!(tec.state(), ThermalState::Idle);
        assert_eq!(tec.drive(), 0.0);
        assert!(tec.is_permanently_disabled());
    }

    #[test]
    fn spread_faults_restart_the_count() {
        let policy = FaultPolicy {
            window_ms: 1000,
            threshold: 3,
        };
        let mut tec = ThermalChannel::new(2, MockBridge::new(), ThermalSetpoint::default(), policy, 1000);
        for i in 0..10 {
            tec.tick(None, i * 1500).unwrap();
        }
        assert_eq!(tec.error_count(), 1);
        assert!(!tec.is_permanently_disabled());
    }

    #[test]
    fn valid_readings_do_not_reset_count() {
        let policy = FaultPolicy {
            window_ms: 1000,
            threshold: 3,
        };
        let mut tec = ThermalChannel::new(1, MockBridge::new(), ThermalSetpoint::default(), policy, 1000);
        tec.tick(None, 100).unwrap();
        tec.tick(Some(30.0), 200).unwrap();
        tec.tick(None, 300).unwrap();
        tec.tick(Some(30.0), 400).unwrap();
        tec.tick(None, 500).unwrap();
        assert!(tec.is_permanently_disabled());
    }

    #[test]
    fn output_level_scales_with_wrap() {
        let setpoint = ThermalSetpoint::new(30.0).with_gain(0.25).with_clamp(1.0);
        let mut tec = ThermalChannel::new(1, MockBridge::new(), setpoint, FaultPolicy::default(), 4000);
        tec.tick(Some(28.0), 0).unwrap();
        assert_eq!(
            tec.driver().last,
            Some(ThermalOutput::Drive {
                polarity: Polarity::Forward,
                level: 2000
            })
        );
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut tec = channel(ThermalSetpoint::new(31.0));
        tec.tick(Some(25.0), 0).unwrap();
        let snap = tec.snapshot();
        assert_eq!(snap.id, 1);
        assert_eq!(snap.measured, 25.0);
        assert_eq!(snap.target, 31.0);
        assert_eq!(snap.state, ThermalState::Active);
        assert!(snap.enabled);
        assert!(!snap.permanently_disabled);
    }

    #[test]
    fn sensor_range_rejects_implausible_readings() {
        let range = SensorRange::default();
        assert_eq!(range.validate(Some(25.0)), Some(25.0));
        assert_eq!(range.validate(Some(-55.0)), Some(-55.0));
        assert_eq!(range.validate(Some(126.0)), None);
        assert_eq!(range.validate(Some(f32::INFINITY)), None);
        assert_eq!(range.validate(None), None);
    }

    #[test]
    fn conversion_gate_enforces_settle_time() {
        let mut gate = ConversionGate::new(750);
        assert!(!gate.ready(10_000));
        gate.start(1000);
        assert!(!gate.ready(1749));
        assert!(gate.ready(1750));
    }
}
