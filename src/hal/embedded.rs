//! Adapters from `embedded-hal` 1.0 pins, PWM channels and delays.
//!
//! Any HAL that implements the 1.0 traits (rp2040-hal, embassy-rp, esp-hal,
//! stm32 HALs...) can drive the control loops through these wrappers.
//!
//! # Example
//!
//! ```ignore
//! use pico_instrument::hal::{HalDelay, PinStepper};
//! use pico_instrument::motion::{MotionChannel, MotionTiming};
//!
//! let driver = PinStepper::new(dir_pin, enable_pin, step_pin).with_active_low_enable(true);
//! let mut az = MotionChannel::new(driver, true, MotionTiming::default());
//! let mut delay = HalDelay::new(timer);
//!
//! az.set_target(1200);
//! az.tick(&mut delay)?;
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use crate::traits::{
    DelayUs, Polarity, SelectorInput, StepperDriver, SwitchOutputs, ThermalDriver, ThermalOutput,
};

/// Step/direction driver on three output pins.
///
/// All three pins must share one error type, which is the case for the
/// GPIO pins of a single HAL.
pub struct PinStepper<Dir, En, Step> {
    dir: Dir,
    enable: En,
    step: Step,
    active_low_enable: bool,
}

impl<Dir, En, Step> PinStepper<Dir, En, Step> {
    /// Wrap the direction, enable and step pins. Enable is active-high.
    pub fn new(dir: Dir, enable: En, step: Step) -> Self {
        Self {
            dir,
            enable,
            step,
            active_low_enable: false,
        }
    }

    /// Treat the enable line as active-low (common on A4988/TMC boards).
    pub fn with_active_low_enable(mut self, active_low: bool) -> Self {
        self.active_low_enable = active_low;
        self
    }

    /// Release the pins.
    pub fn into_inner(self) -> (Dir, En, Step) {
        (self.dir, self.enable, self.step)
    }
}

fn write<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), P::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

impl<E, Dir, En, Step> StepperDriver for PinStepper<Dir, En, Step>
where
    Dir: OutputPin<Error = E>,
    En: OutputPin<Error = E>,
    Step: OutputPin<Error = E>,
{
    type Error = E;

    fn set_direction_level(&mut self, high: bool) -> Result<(), E> {
        write(&mut self.dir, high)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), E> {
        write(&mut self.enable, enabled != self.active_low_enable)
    }

    fn set_pulse(&mut self, high: bool) -> Result<(), E> {
        write(&mut self.step, high)
    }
}

/// H-bridge failure: a polarity pin or the PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError<P, W> {
    /// Polarity pin write failed.
    Pin(P),
    /// Duty cycle write failed.
    Pwm(W),
}

/// H-bridge with two polarity pins and one PWM magnitude channel.
///
/// Thermal levels run `0..=pwm_wrap`; they are rescaled to the channel's
/// own maximum duty.
pub struct PinBridge<A, B, Pwm> {
    in_a: A,
    in_b: B,
    pwm: Pwm,
    pwm_wrap: u32,
}

impl<A, B, Pwm> PinBridge<A, B, Pwm> {
    /// Wrap the polarity pins and PWM channel; `pwm_wrap` is the level that
    /// means full drive.
    pub fn new(in_a: A, in_b: B, pwm: Pwm, pwm_wrap: u32) -> Self {
        Self {
            in_a,
            in_b,
            pwm,
            pwm_wrap: pwm_wrap.max(1),
        }
    }
}

impl<E, A, B, Pwm> ThermalDriver for PinBridge<A, B, Pwm>
where
    A: OutputPin<Error = E>,
    B: OutputPin<Error = E>,
    Pwm: SetDutyCycle,
{
    type Error = BridgeError<E, Pwm::Error>;

    fn apply(&mut self, output: ThermalOutput) -> Result<(), Self::Error> {
        match output {
            ThermalOutput::Off => {
                self.pwm.set_duty_cycle(0).map_err(BridgeError::Pwm)?;
                self.in_a.set_low().map_err(BridgeError::Pin)?;
                self.in_b.set_low().map_err(BridgeError::Pin)
            }
            ThermalOutput::Drive { polarity, level } => {
                let forward = polarity == Polarity::Forward;
                write(&mut self.in_a, forward).map_err(BridgeError::Pin)?;
                write(&mut self.in_b, !forward).map_err(BridgeError::Pin)?;
                let max = u32::from(self.pwm.max_duty_cycle());
                let duty = (u64::from(level.min(self.pwm_wrap)) * u64::from(max)
                    / u64::from(self.pwm_wrap)) as u16;
                self.pwm.set_duty_cycle(duty).map_err(BridgeError::Pwm)
            }
        }
    }
}

/// Eight output pins driven from a bit mask.
pub struct PinSwitches<P> {
    pins: [P; 8],
}

impl<P: OutputPin> PinSwitches<P> {
    /// Wrap eight pins; `pins[i]` follows bit `i`.
    pub fn new(pins: [P; 8]) -> Self {
        Self { pins }
    }
}

impl<P: OutputPin> SwitchOutputs for PinSwitches<P> {
    type Error = P::Error;

    fn write_mask(&mut self, mask: u8) -> Result<(), P::Error> {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            write(pin, mask & (1 << i) != 0)?;
        }
        Ok(())
    }
}

/// Three selector input pins, `pins[0]` the least significant bit.
///
/// A pin that fails to read counts as low.
pub struct PinSelector<P> {
    pins: [P; 3],
    active_low: bool,
}

impl<P: InputPin> PinSelector<P> {
    /// Wrap three pins read active-high.
    pub fn new(pins: [P; 3]) -> Self {
        Self {
            pins,
            active_low: false,
        }
    }

    /// Treat a low pin as a set bit (pull-ups with switches to ground).
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }
}

impl<P: InputPin> SelectorInput for PinSelector<P> {
    fn read_selector(&mut self) -> u8 {
        let active_low = self.active_low;
        self.pins
            .iter_mut()
            .enumerate()
            .fold(0, |value, (i, pin)| {
                let set = if active_low { pin.is_low() } else { pin.is_high() };
                if set.unwrap_or(false) {
                    value | (1 << i)
                } else {
                    value
                }
            })
    }
}

/// Microsecond delay over any `DelayNs` implementor.
pub struct HalDelay<D> {
    inner: D,
}

impl<D: DelayNs> HalDelay<D> {
    /// Wrap a delay provider.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: DelayNs> DelayUs for HalDelay<D> {
    fn delay_us(&mut self, us: u32) {
        self.inner.delay_us(us);
    }
}
