//! Hardware abstraction traits for stepper drivers, thermoelectric drivers,
//! temperature sensors and the boot-time selector.
//!
//! These are the narrow shims the control loops call through. Bus timing,
//! PWM register programming and sensor byte protocols live behind them.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`StepperDriver`] | Direction / pulse / enable lines of a step-dir driver |
//! | [`ThermalDriver`] | Polarity pair + PWM magnitude of an H-bridge |
//! | [`TemperatureSource`] | Conversion-based temperature sensors |
//! | [`SwitchOutputs`] | A bank of eight digital outputs |
//! | [`SelectorInput`] | Boot-time device selection lines |
//! | [`Clock`] | Millisecond time source |
//! | [`DelayUs`] | Blocking microsecond delay |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. With the `embedded-hal` feature,
//! [`crate::hal::embedded`] adapts `OutputPin` / `DelayNs` implementors.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::traits::{StepperDriver, DelayUs};
//! use pico_instrument::hal::{MockStepper, MockDelay};
//!
//! let mut driver = MockStepper::new();
//! let mut delay = MockDelay::new();
//!
//! driver.set_direction_level(true).unwrap();
//! driver.set_enabled(true).unwrap();
//! driver.set_pulse(true).unwrap();
//! delay.delay_us(600);
//! driver.set_pulse(false).unwrap();
//!
//! assert_eq!(driver.rising_edges, 1);
//! assert_eq!(delay.total_us, 600);
//! ```

/// Step/direction stepper driver lines.
///
/// The controller decides *when* lines change; implementations only move
/// the electrical level. The logical-to-electrical mapping of the enable
/// line (many drivers are active-low) belongs to the implementation, the
/// forward polarity of the direction line belongs to the channel.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use pico_instrument::traits::StepperDriver;
///
/// struct MyDriver { /* gpio handles */ }
///
/// impl StepperDriver for MyDriver {
///     type Error = ();
///
///     fn set_direction_level(&mut self, high: bool) -> Result<(), ()> {
///         // gpio_put(dir_pin, high)
///         Ok(())
///     }
///
///     fn set_enabled(&mut self, enabled: bool) -> Result<(), ()> {
///         // active-low enable: gpio_put(enable_pin, !enabled)
///         Ok(())
///     }
///
///     fn set_pulse(&mut self, high: bool) -> Result<(), ()> {
///         // gpio_put(pulse_pin, high)
///         Ok(())
///     }
/// }
/// ```
pub trait StepperDriver {
    /// Error type for line writes.
    type Error;

    /// Drive the direction line to the given electrical level.
    fn set_direction_level(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Enable or release the driver stage.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Drive the pulse (step) line.
    fn set_pulse(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Pulse line low and driver released.
    fn release(&mut self) -> Result<(), Self::Error> {
        self.set_pulse(false)?;
        self.set_enabled(false)
    }
}

/// Polarity of the current through a thermoelectric element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    /// First polarity line high, second low.
    Forward,
    /// First polarity line low, second high.
    Reverse,
}

impl Polarity {
    /// Polarity matching the sign of a signed drive value.
    ///
    /// Zero maps to [`Forward`](Self::Forward); a zero drive never reaches
    /// the bridge as a `Drive` output anyway.
    #[inline]
    pub fn of(drive: f32) -> Self {
        if drive < 0.0 {
            Polarity::Reverse
        } else {
            Polarity::Forward
        }
    }
}

/// Output request for an H-bridge driven thermoelectric element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThermalOutput {
    /// Both polarity lines low, magnitude zero: electrically off.
    Off,
    /// Drive with the given polarity and PWM level (`0..=pwm_wrap`).
    Drive {
        /// Current direction through the element.
        polarity: Polarity,
        /// PWM compare level.
        level: u32,
    },
}

/// H-bridge driver for one thermoelectric channel.
pub trait ThermalDriver {
    /// Error type for output writes.
    type Error;

    /// Apply an output request.
    fn apply(&mut self, output: ThermalOutput) -> Result<(), Self::Error>;

    /// Convenience method to turn the element off.
    fn off(&mut self) -> Result<(), Self::Error> {
        self.apply(ThermalOutput::Off)
    }
}

/// Conversion-based temperature sensors (one per thermal channel).
///
/// The bus protocol is out of scope; implementations start a conversion
/// on all sensors at once and later read back each result.
pub trait TemperatureSource {
    /// Number of sensors found on the bus.
    fn sensor_count(&self) -> usize;

    /// Start a temperature conversion on every sensor.
    fn start_conversion(&mut self);

    /// Read the last conversion result of `index` in degrees Celsius.
    ///
    /// Returns `None` when the read failed (no presence pulse, bad
    /// scratchpad, sensor missing).
    fn read_celsius(&mut self, index: usize) -> Option<f32>;
}

/// Bank of eight digital outputs, bit `i` of the mask driving line `i`.
pub trait SwitchOutputs {
    /// Error type for output writes.
    type Error;

    /// Drive all lines from a bit mask.
    fn write_mask(&mut self, mask: u8) -> Result<(), Self::Error>;
}

/// Boot-time selector lines (DIP switch or strap pins).
pub trait SelectorInput {
    /// Read the selector value once.
    fn read_selector(&mut self) -> u8;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for status cadence, sensor
/// settle times and fault windows.
///
/// # Example
///
/// ```rust
/// use pico_instrument::traits::Clock;
/// use pico_instrument::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// Blocking microsecond delay.
///
/// The pulse loop busy-waits between edges; tests substitute a virtual
/// clock that only records the requested durations.
pub trait DelayUs {
    /// Block for `us` microseconds.
    fn delay_us(&mut self, us: u32);
}
