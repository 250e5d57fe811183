//! Boot-time device selection and event routing.
//!
//! A board reads its selector lines once, builds exactly one
//! [`ChannelSet`] for the selected [`App`], and the [`Dispatcher`] routes
//! commands, ticks and status requests to it for the life of the process.
//! Selector codes without an implementation route to
//! [`UnknownDevice`](crate::devices::UnknownDevice), which reports an error
//! status and never touches an output.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::dispatch::{App, Board, ChannelSet, Dispatcher};
//! use pico_instrument::devices::RfSwitchDevice;
//! use pico_instrument::hal::MockSwitches;
//!
//! struct Bench { selector: u8 }
//!
//! impl Board for Bench {
//!     fn read_selector(&mut self) -> u8 {
//!         self.selector
//!     }
//!
//!     fn build(&mut self, app: App) -> Option<Box<dyn ChannelSet>> {
//!         match app {
//!             App::RfSwitch => Some(Box::new(RfSwitchDevice::new(MockSwitches::new()))),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let dispatcher = Dispatcher::select(&mut Bench { selector: 5 }, 0);
//! assert_eq!(dispatcher.name(), "rfswitch");
//!
//! let unknown = Dispatcher::select(&mut Bench { selector: 3 }, 0);
//! assert_eq!(unknown.name(), "unknown");
//! assert_eq!(unknown.status().render().unwrap().as_str(),
//!     "{\"status\":\"error\",\"app_id\":3,\"error\":\"unimplemented app\"}\n");
//! ```

use alloc::boxed::Box;

use crate::devices::UnknownDevice;
use crate::telemetry::StatusRecord;

/// Mask applied to the raw selector value (three selector lines).
pub const SELECTOR_MASK: u8 = 0x07;

/// The behaviors every device bundle provides.
///
/// Implementations own their drivers and channel state. Driver failures
/// are handled (logged) inside the implementation; nothing here can abort
/// the dispatch loop.
pub trait ChannelSet {
    /// Short device name, also the `sensor_name` status field.
    fn name(&self) -> &'static str;

    /// Bring outputs to their safe initial state.
    fn init(&mut self, now_ms: u64);

    /// Handle one command line. Lines that do not decode are ignored.
    fn on_command(&mut self, line: &str);

    /// Run one control step.
    fn tick(&mut self, now_ms: u64);

    /// Build the current status record.
    fn report_status(&self, app_id: u8) -> StatusRecord;
}

/// Device bundles known to the selector table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum App {
    /// Azimuth/elevation stepper pair.
    Motor = 0,
    /// Thermoelectric temperature control.
    TempCtrl = 1,
    /// Temperature monitoring only.
    TempMon = 2,
    /// Inertial measurement unit.
    Imu = 3,
    /// Lidar range finder.
    Lidar = 4,
    /// RF switch bank.
    RfSwitch = 5,
}

impl App {
    /// Look up a selector value (masked to three bits).
    pub fn from_selector(raw: u8) -> Option<Self> {
        match raw & SELECTOR_MASK {
            0 => Some(App::Motor),
            1 => Some(App::TempCtrl),
            2 => Some(App::TempMon),
            3 => Some(App::Imu),
            4 => Some(App::Lidar),
            5 => Some(App::RfSwitch),
            _ => None,
        }
    }

    /// Numeric id reported as `app_id`.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Table name.
    pub fn name(self) -> &'static str {
        match self {
            App::Motor => "motor",
            App::TempCtrl => "tempctrl",
            App::TempMon => "tempmon",
            App::Imu => "imu",
            App::Lidar => "lidar",
            App::RfSwitch => "rfswitch",
        }
    }
}

/// Board wiring: selector lines plus a factory for the device bundles the
/// board has hardware for.
pub trait Board {
    /// Read the raw selector value. Called once at startup.
    fn read_selector(&mut self) -> u8;

    /// Build the bundle for `app`, or `None` if this board cannot.
    fn build(&mut self, app: App) -> Option<Box<dyn ChannelSet>>;
}

/// Owns the one active channel set.
pub struct Dispatcher {
    app_id: u8,
    app: Option<App>,
    set: Box<dyn ChannelSet>,
}

impl Dispatcher {
    /// Read the selector, build the matching bundle (or the fallback) and
    /// initialize it.
    pub fn select<B: Board + ?Sized>(board: &mut B, now_ms: u64) -> Self {
        let raw = board.read_selector();
        let app_id = raw & SELECTOR_MASK;
        let app = App::from_selector(raw);

        let built = app.and_then(|app| board.build(app).map(|set| (app, set)));
        let mut dispatcher = match built {
            Some((app, set)) => {
                log::info!("selector {}: starting {}", app_id, app.name());
                Self {
                    app_id,
                    app: Some(app),
                    set,
                }
            }
            None => {
                log::warn!("selector {}: no implementation, reporting errors", app_id);
                Self {
                    app_id,
                    app: None,
                    set: Box::new(UnknownDevice::new()),
                }
            }
        };
        dispatcher.set.init(now_ms);
        dispatcher
    }

    /// Wrap an already built channel set. The set is not initialized.
    pub fn new(app_id: u8, set: Box<dyn ChannelSet>) -> Self {
        Self {
            app_id,
            app: App::from_selector(app_id),
            set,
        }
    }

    /// Selector value reported as `app_id`.
    pub fn app_id(&self) -> u8 {
        self.app_id
    }

    /// The selected app, `None` for the fallback.
    pub fn app(&self) -> Option<App> {
        self.app
    }

    /// Name of the active channel set.
    pub fn name(&self) -> &'static str {
        self.set.name()
    }

    /// Route a command line.
    pub fn on_command(&mut self, line: &str) {
        self.set.on_command(line);
    }

    /// Route a tick.
    pub fn tick(&mut self, now_ms: u64) {
        self.set.tick(now_ms);
    }

    /// Build the status record.
    pub fn status(&self) -> StatusRecord {
        self.set.report_status(self.app_id)
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("app_id", &self.app_id)
            .field("app", &self.app)
            .field("set", &self.set.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_table() {
        assert_eq!(App::from_selector(0), Some(App::Motor));
        assert_eq!(App::from_selector(1), Some(App::TempCtrl));
        assert_eq!(App::from_selector(5), Some(App::RfSwitch));
        assert_eq!(App::from_selector(6), None);
        assert_eq!(App::from_selector(7), None);
    }

    #[test]
    fn selector_is_masked_to_three_bits() {
        assert_eq!(App::from_selector(0b1000_0001), Some(App::TempCtrl));
        assert_eq!(App::from_selector(0xff), None);
    }

    #[test]
    fn app_ids_and_names() {
        assert_eq!(App::RfSwitch.id(), 5);
        assert_eq!(App::TempCtrl.name(), "tempctrl");
    }
}
