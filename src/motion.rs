//! Target-tracking stepper motion control.
//!
//! A [`MotionChannel`] owns one step/direction driver and tracks a signed
//! step `position` toward a signed `target`. Each call to
//! [`tick`](MotionChannel::tick) emits a bounded burst of pulses, so one
//! control loop can interleave several channels and still poll for
//! commands between bursts.
//!
//! # Velocity shaping
//!
//! Near either end of a move the low phase of every pulse is stretched by
//! `slowdown * pulse_low_us`:
//!
//! - *near start*: fewer than `slow_zone` steps taken since the last
//!   direction change
//! - *near stop*: `|target - position| <= slow_zone` at the start of the tick
//!
//! This gives symmetric ease-in/ease-out without a continuous-time planner.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::motion::{MotionChannel, MotionTiming};
//! use pico_instrument::hal::{MockStepper, MockDelay};
//!
//! let timing = MotionTiming::default().with_max_pulses(10);
//! let mut axis = MotionChannel::new(MockStepper::new(), true, timing);
//! let mut delay = MockDelay::new();
//!
//! axis.set_target(25);
//! while axis.is_moving() {
//!     axis.tick(&mut delay).unwrap();
//! }
//! assert_eq!(axis.position(), 25);
//! assert_eq!(axis.driver().rising_edges, 25);
//! ```

use serde::{Deserialize, Serialize};

use crate::traits::{DelayUs, StepperDriver};

/// Pulse timing and burst size of a motion channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTiming {
    /// Pulse line high time in microseconds.
    pub pulse_high_us: u32,
    /// Pulse line low time in microseconds.
    pub pulse_low_us: u32,
    /// Extra low time near start/stop, as a multiple of `pulse_low_us`.
    pub slowdown: u32,
    /// Step radius of the start/stop slow zones (0 disables shaping).
    pub slow_zone: u32,
    /// Maximum pulses per tick (treated as at least 1).
    pub max_pulses: u32,
}

impl Default for MotionTiming {
    fn default() -> Self {
        Self {
            pulse_high_us: 600,
            pulse_low_us: 600,
            slowdown: 2,
            slow_zone: 0,
            max_pulses: 60,
        }
    }
}

impl MotionTiming {
    /// Set high and low pulse durations.
    pub fn with_pulse_us(mut self, high_us: u32, low_us: u32) -> Self {
        self.pulse_high_us = high_us;
        self.pulse_low_us = low_us;
        self
    }

    /// Set the slowdown factor.
    pub fn with_slowdown(mut self, factor: u32) -> Self {
        self.slowdown = factor;
        self
    }

    /// Set the slow zone radius in steps.
    pub fn with_slow_zone(mut self, steps: u32) -> Self {
        self.slow_zone = steps;
        self
    }

    /// Set the burst size.
    pub fn with_max_pulses(mut self, pulses: u32) -> Self {
        self.max_pulses = pulses;
        self
    }

    /// Extra low-phase delay applied inside the slow zones.
    #[inline]
    pub fn extra_delay_us(&self) -> u32 {
        self.slowdown.saturating_mul(self.pulse_low_us)
    }
}

/// What one [`MotionChannel::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MotionTick {
    /// Direction of the burst (-1, 0 or 1).
    pub direction: i8,
    /// Pulses emitted.
    pub pulses: u32,
    /// Extra low-phase delay applied to each pulse.
    pub extra_delay_us: u32,
}

/// Copyable view of a motion channel for status reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionSnapshot {
    /// Current position in steps.
    pub position: i32,
    /// Target position in steps.
    pub target: i32,
    /// Direction of the last tick.
    pub direction: i8,
}

/// One stepper axis.
#[derive(Debug)]
pub struct MotionChannel<D: StepperDriver> {
    driver: D,
    forward_level: bool,
    timing: MotionTiming,
    position: i32,
    target: i32,
    direction: i8,
    steps_in_direction: u32,
}

impl<D: StepperDriver> MotionChannel<D> {
    /// Create an idle channel at position 0.
    ///
    /// `forward_level` is the direction-line level that moves the axis in
    /// the positive step direction.
    pub fn new(driver: D, forward_level: bool, timing: MotionTiming) -> Self {
        Self {
            driver,
            forward_level,
            timing,
            position: 0,
            target: 0,
            direction: 0,
            steps_in_direction: 0,
        }
    }

    /// Release the driver so the axis starts unpowered.
    pub fn init(&mut self) -> Result<(), D::Error> {
        self.driver.release()
    }

    /// Set an absolute target. Not clamped.
    pub fn set_target(&mut self, target: i32) {
        self.target = target;
    }

    /// Move relative to the current target.
    pub fn add_steps(&mut self, steps: i32) {
        self.target = self.target.saturating_add(steps);
    }

    /// Redefine the current position and halt there.
    pub fn redefine_position(&mut self, position: i32) {
        self.position = position;
        self.target = position;
    }

    /// Stop at the current position.
    pub fn halt(&mut self) {
        self.target = self.position;
    }

    /// Replace the pulse timing.
    pub fn set_timing(&mut self, timing: MotionTiming) {
        self.timing = timing;
    }

    /// Mutable access to the pulse timing.
    pub fn timing_mut(&mut self) -> &mut MotionTiming {
        &mut self.timing
    }

    /// Current pulse timing.
    pub fn timing(&self) -> &MotionTiming {
        &self.timing
    }

    /// Current position in steps.
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Target position in steps.
    pub fn target(&self) -> i32 {
        self.target
    }

    /// Direction computed by the last tick.
    pub fn direction(&self) -> i8 {
        self.direction
    }

    /// Steps taken since the last direction change.
    pub fn steps_in_direction(&self) -> u32 {
        self.steps_in_direction
    }

    /// Returns true while the target has not been reached.
    pub fn is_moving(&self) -> bool {
        self.target != self.position
    }

    /// The driver, for inspection.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Copyable view for status reports.
    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            position: self.position,
            target: self.target,
            direction: self.direction,
        }
    }

    /// Advance toward the target by at most `max_pulses` steps.
    ///
    /// The burst runs to completion; a target change made while it runs is
    /// seen on the next tick.
    pub fn tick<T: DelayUs>(&mut self, delay: &mut T) -> Result<MotionTick, D::Error> {
        let remaining = i64::from(self.target) - i64::from(self.position);
        let direction = remaining.signum() as i8;
        if direction != self.direction {
            self.steps_in_direction = 0;
        }
        self.direction = direction;
        if direction == 0 {
            return Ok(MotionTick::default());
        }

        let distance = remaining.unsigned_abs();
        let pulses = u64::from(self.timing.max_pulses.max(1)).min(distance) as u32;
        let zone = u64::from(self.timing.slow_zone);
        let near_stop = distance <= zone;
        let near_start = u64::from(self.steps_in_direction) < zone;
        let extra_delay_us = if near_start || near_stop {
            self.timing.extra_delay_us()
        } else {
            0
        };

        let level = if direction > 0 {
            self.forward_level
        } else {
            !self.forward_level
        };
        self.driver.set_direction_level(level)?;
        self.driver.set_enabled(true)?;

        let low_us = self.timing.pulse_low_us.saturating_add(extra_delay_us);
        for _ in 0..pulses {
            self.driver.set_pulse(true)?;
            delay.delay_us(self.timing.pulse_high_us);
            self.driver.set_pulse(false)?;
            self.position += i32::from(direction);
            delay.delay_us(low_us);
        }

        self.driver.set_enabled(false)?;
        self.steps_in_direction = self.steps_in_direction.saturating_add(pulses);

        Ok(MotionTick {
            direction,
            pulses,
            extra_delay_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockDelay, MockStepper};

    fn channel(timing: MotionTiming) -> MotionChannel<MockStepper> {
        MotionChannel::new(MockStepper::new(), true, timing)
    }

    #[test]
    fn idle_tick_emits_nothing() {
        let mut axis = channel(MotionTiming::default());
        let mut delay = MockDelay::new();
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick, MotionTick::default());
        assert_eq!(axis.driver().rising_edges, 0);
        assert_eq!(delay.total_us, 0);
    }

    #[test]
    fn burst_is_bounded_by_max_pulses() {
        let mut axis = channel(MotionTiming::default().with_max_pulses(7));
        let mut delay = MockDelay::new();
        axis.set_target(100);
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick.pulses, 7);
        assert_eq!(axis.position(), 7);
    }

    #[test]
    fn zero_max_pulses_still_moves() {
        let mut axis = channel(MotionTiming::default().with_max_pulses(0));
        let mut delay = MockDelay::new();
        axis.set_target(2);
        assert_eq!(axis.tick(&mut delay).unwrap().pulses, 1);
    }

    #[test]
    fn negative_move_uses_inverted_level() {
        let mut axis = channel(MotionTiming::default());
        let mut delay = MockDelay::new();
        axis.set_target(-3);
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick.direction, -1);
        assert_eq!(axis.position(), -3);
        assert_eq!(axis.driver().direction_level, Some(false));
    }

    #[test]
    fn driver_enabled_only_during_burst() {
        let mut axis = channel(MotionTiming::default());
        let mut delay = MockDelay::new();
        axis.set_target(2);
        axis.tick(&mut delay).unwrap();
        assert!(!axis.driver().enabled);
        assert!(!axis.driver().pulse);
        assert_eq!(axis.driver().enable_cycles, 1);
    }

    #[test]
    fn pulse_timing_without_slow_zone() {
        let timing = MotionTiming::default().with_pulse_us(10, 20).with_slow_zone(0);
        let mut axis = channel(timing);
        let mut delay = MockDelay::new();
        axis.set_target(3);
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick.extra_delay_us, 0);
        assert_eq!(delay.total_us, 3 * (10 + 20));
    }

    #[test]
    fn slow_zone_stretches_low_phase() {
        let timing = MotionTiming::default()
            .with_pulse_us(10, 20)
            .with_slowdown(3)
            .with_slow_zone(5);
        let mut axis = channel(timing);
        let mut delay = MockDelay::new();
        axis.set_target(2);
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick.extra_delay_us, 60);
        assert_eq!(delay.total_us, 2 * (10 + 20 + 60));
    }

    #[test]
    fn redefine_position_halts_in_place() {
        let mut axis = channel(MotionTiming::default());
        axis.set_target(500);
        axis.redefine_position(42);
        assert_eq!(axis.position(), 42);
        assert_eq!(axis.target(), 42);
        assert!(!axis.is_moving());
    }

    #[test]
    fn halt_freezes_target() {
        let mut axis = channel(MotionTiming::default().with_max_pulses(5));
        let mut delay = MockDelay::new();
        axis.set_target(100);
        axis.tick(&mut delay).unwrap();
        axis.halt();
        assert_eq!(axis.target(), 5);
        assert_eq!(axis.tick(&mut delay).unwrap().pulses, 0);
    }

    #[test]
    fn add_steps_is_relative_to_target() {
        let mut axis = channel(MotionTiming::default());
        axis.set_target(10);
        axis.add_steps(-15);
        assert_eq!(axis.target(), -5);
    }

    #[test]
    fn reversal_resets_step_counter() {
        let mut axis = channel(MotionTiming::default().with_max_pulses(10));
        let mut delay = MockDelay::new();
        axis.set_target(100);
        axis.tick(&mut delay).unwrap();
        axis.tick(&mut delay).unwrap();
        assert_eq!(axis.steps_in_direction(), 20);

        axis.set_target(0);
        let tick = axis.tick(&mut delay).unwrap();
        assert_eq!(tick.direction, -1);
        assert_eq!(axis.steps_in_direction(), 10);
        assert_eq!(axis.position(), 10);
    }

    #[test]
    fn arrival_resets_step_counter() {
        let mut axis = channel(MotionTiming::default().with_max_pulses(10));
        let mut delay = MockDelay::new();
        axis.set_target(5);
        axis.tick(&mut delay).unwrap();
        axis.tick(&mut delay).unwrap();
        assert_eq!(axis.direction(), 0);
        assert_eq!(axis.steps_in_direction(), 0);
    }
}
