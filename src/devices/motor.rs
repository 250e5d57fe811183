//! Azimuth/elevation stepper pair.
//!
//! # Commands
//!
//! Every field is optional; per-axis fields carry an `az_` or `el_` prefix.
//!
//! | Field | Effect |
//! |-------|--------|
//! | `*_set_pos` | Redefine the current position (and halt there) |
//! | `*_target_pos` | Absolute target |
//! | `*_add_pulses` | Relative move from the current target |
//! | `*_delay_us` | Pulse high and low time |
//! | `*_up_delay_us` | Pulse high time |
//! | `*_dn_delay_us` | Pulse low time |
//! | `*_slowdown` | Slow zone delay factor |
//! | `*_slow_zone` | Slow zone radius in steps |
//! | `*_max_pulses` | Burst size per tick |
//! | `halt` | Both axes stop where they are |
//!
//! Within one command `set_pos` is applied first, then `target_pos`, then
//! `add_pulses`; `halt` is applied last and wins over any target.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::devices::MotorDevice;
//! use pico_instrument::dispatch::ChannelSet;
//! use pico_instrument::config::MotionConfig;
//! use pico_instrument::hal::{MockStepper, MockDelay};
//!
//! let mut motor = MotorDevice::new(MockStepper::new(), MockStepper::new(), MockDelay::new(),
//!     &MotionConfig::default());
//! motor.init(0);
//! motor.on_command(r#"{"az_target_pos": 90, "el_add_pulses": -30}"#);
//! motor.tick(0);
//! motor.tick(1);
//!
//! assert_eq!(motor.azimuth().position(), 90);
//! assert_eq!(motor.elevation().position(), -30);
//! ```

use core::fmt::Debug;

use serde::Deserialize;

use crate::command;
use crate::config::MotionConfig;
use crate::dispatch::ChannelSet;
use crate::motion::MotionChannel;
use crate::telemetry::StatusRecord;
use crate::traits::{DelayUs, StepperDriver};

/// Motor command line. Absent fields leave state unchanged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotorCommand {
    /// Redefine azimuth position.
    pub az_set_pos: Option<i32>,
    /// Azimuth absolute target.
    pub az_target_pos: Option<i32>,
    /// Azimuth relative move.
    pub az_add_pulses: Option<i32>,
    /// Azimuth pulse high and low time.
    pub az_delay_us: Option<u32>,
    /// Azimuth pulse high time.
    pub az_up_delay_us: Option<u32>,
    /// Azimuth pulse low time.
    pub az_dn_delay_us: Option<u32>,
    /// Azimuth slowdown factor.
    pub az_slowdown: Option<u32>,
    /// Azimuth slow zone radius.
    pub az_slow_zone: Option<u32>,
    /// Azimuth burst size.
    pub az_max_pulses: Option<u32>,
    /// Redefine elevation position.
    pub el_set_pos: Option<i32>,
    /// Elevation absolute target.
    pub el_target_pos: Option<i32>,
    /// Elevation relative move.
    pub el_add_pulses: Option<i32>,
    /// Elevation pulse high and low time.
    pub el_delay_us: Option<u32>,
    /// Elevation pulse high time.
    pub el_up_delay_us: Option<u32>,
    /// Elevation pulse low time.
    pub el_dn_delay_us: Option<u32>,
    /// Elevation slowdown factor.
    pub el_slowdown: Option<u32>,
    /// Elevation slow zone radius.
    pub el_slow_zone: Option<u32>,
    /// Elevation burst size.
    pub el_max_pulses: Option<u32>,
    /// Stop both axes in place.
    pub halt: Option<bool>,
}

/// The per-axis half of a [`MotorCommand`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AxisCommand {
    /// Redefine position.
    pub set_pos: Option<i32>,
    /// Absolute target.
    pub target_pos: Option<i32>,
    /// Relative move.
    pub add_pulses: Option<i32>,
    /// Pulse high and low time.
    pub delay_us: Option<u32>,
    /// Pulse high time.
    pub up_delay_us: Option<u32>,
    /// Pulse low time.
    pub dn_delay_us: Option<u32>,
    /// Slowdown factor.
    pub slowdown: Option<u32>,
    /// Slow zone radius.
    pub slow_zone: Option<u32>,
    /// Burst size.
    pub max_pulses: Option<u32>,
}

impl MotorCommand {
    /// Azimuth fields.
    pub fn az(&self) -> AxisCommand {
        AxisCommand {
            set_pos: self.az_set_pos,
            target_pos: self.az_target_pos,
            add_pulses: self.az_add_pulses,
            delay_us: self.az_delay_us,
            up_delay_us: self.az_up_delay_us,
            dn_delay_us: self.az_dn_delay_us,
            slowdown: self.az_slowdown,
            slow_zone: self.az_slow_zone,
            max_pulses: self.az_max_pulses,
        }
    }

    /// Elevation fields.
    pub fn el(&self) -> AxisCommand {
        AxisCommand {
            set_pos: self.el_set_pos,
            target_pos: self.el_target_pos,
            add_pulses: self.el_add_pulses,
            delay_us: self.el_delay_us,
            up_delay_us: self.el_up_delay_us,
            dn_delay_us: self.el_dn_delay_us,
            slowdown: self.el_slowdown,
            slow_zone: self.el_slow_zone,
            max_pulses: self.el_max_pulses,
        }
    }
}

impl AxisCommand {
    /// Apply to one axis.
    pub fn apply<D: StepperDriver>(&self, axis: &mut MotionChannel<D>) {
        if let Some(pos) = self.set_pos {
            axis.redefine_position(pos);
        }
        if let Some(target) = self.target_pos {
            axis.set_target(target);
        }
        if let Some(steps) = self.add_pulses {
            axis.add_steps(steps);
        }

        let timing = axis.timing_mut();
        if let Some(us) = self.delay_us {
            timing.pulse_high_us = us;
            timing.pulse_low_us = us;
        }
        if let Some(us) = self.up_delay_us {
            timing.pulse_high_us = us;
        }
        if let Some(us) = self.dn_delay_us {
            timing.pulse_low_us = us;
        }
        if let Some(factor) = self.slowdown {
            timing.slowdown = factor;
        }
        if let Some(steps) = self.slow_zone {
            timing.slow_zone = steps;
        }
        if let Some(pulses) = self.max_pulses {
            timing.max_pulses = pulses;
        }
    }
}

/// Two stepper axes sharing one delay source.
pub struct MotorDevice<A, E, T>
where
    A: StepperDriver,
    E: StepperDriver,
    T: DelayUs,
{
    az: MotionChannel<A>,
    el: MotionChannel<E>,
    delay: T,
}

impl<A, E, T> MotorDevice<A, E, T>
where
    A: StepperDriver,
    A::Error: Debug,
    E: StepperDriver,
    E::Error: Debug,
    T: DelayUs,
{
    /// Build both axes from their drivers and configuration.
    pub fn new(az: A, el: E, delay: T, config: &MotionConfig) -> Self {
        Self {
            az: MotionChannel::new(az, config.az_forward_level, config.az),
            el: MotionChannel::new(el, config.el_forward_level, config.el),
            delay,
        }
    }

    /// Apply a decoded command.
    pub fn apply(&mut self, cmd: &MotorCommand) {
        cmd.az().apply(&mut self.az);
        cmd.el().apply(&mut self.el);
        if cmd.halt == Some(true) {
            self.az.halt();
            self.el.halt();
        }
    }

    /// Azimuth axis.
    pub fn azimuth(&self) -> &MotionChannel<A> {
        &self.az
    }

    /// Elevation axis.
    pub fn elevation(&self) -> &MotionChannel<E> {
        &self.el
    }

    /// Mutable azimuth axis.
    pub fn azimuth_mut(&mut self) -> &mut MotionChannel<A> {
        &mut self.az
    }

    /// Mutable elevation axis.
    pub fn elevation_mut(&mut self) -> &mut MotionChannel<E> {
        &mut self.el
    }

    /// The delay source.
    pub fn delay(&self) -> &T {
        &self.delay
    }
}

impl<A, E, T> ChannelSet for MotorDevice<A, E, T>
where
    A: StepperDriver,
    A::Error: Debug,
    E: StepperDriver,
    E::Error: Debug,
    T: DelayUs,
{
    fn name(&self) -> &'static str {
        "motor"
    }

    fn init(&mut self, _now_ms: u64) {
        if let Err(e) = self.az.init() {
            log::warn!("az: driver release failed: {:?}", e);
        }
        if let Err(e) = self.el.init() {
            log::warn!("el: driver release failed: {:?}", e);
        }
    }

    fn on_command(&mut self, line: &str) {
        if let Some(cmd) = command::decode::<MotorCommand>(line) {
            self.apply(&cmd);
        }
    }

    fn tick(&mut self, _now_ms: u64) {
        if let Err(e) = self.az.tick(&mut self.delay) {
            log::warn!("az: driver write failed mid-burst: {:?}", e);
            release_after_fault("az", &mut self.az);
        }
        if let Err(e) = self.el.tick(&mut self.delay) {
            log::warn!("el: driver write failed mid-burst: {:?}", e);
            release_after_fault("el", &mut self.el);
        }
    }

    fn report_status(&self, app_id: u8) -> StatusRecord {
        let az = self.az.snapshot();
        let el = self.el.snapshot();
        StatusRecord::new()
            .str("sensor_name", "motor")
            .str("status", "update")
            .int("app_id", i64::from(app_id))
            .int("az_pos", i64::from(az.position))
            .int("az_target_pos", i64::from(az.target))
            .int("el_pos", i64::from(el.position))
            .int("el_target_pos", i64::from(el.target))
    }
}

fn release_after_fault<D>(name: &str, axis: &mut MotionChannel<D>)
where
    D: StepperDriver,
    D::Error: Debug,
{
    if let Err(e) = axis.init() {
        log::error!(
            "{}: driver release failed, stage may still be enabled: {:?}",
            name,
            e
        );
    }
}
