//! Channel-set bundles selectable at boot.
//!
//! Each bundle implements [`ChannelSet`](crate::dispatch::ChannelSet):
//!
//! - `motor`: azimuth/elevation stepper pair
//! - `tempctrl`: thermoelectric regulation, single or dual context
//! - `tempmon`: temperature monitoring, no outputs
//! - `rfswitch`: eight-way RF switch
//! - `unknown`: error-reporting fallback

pub mod motor;
pub mod rfswitch;
pub mod tempctrl;
pub mod tempmon;
pub mod unknown;

pub use motor::{AxisCommand, MotorCommand, MotorDevice};
pub use rfswitch::{RfSwitchDevice, SwitchCommand};
pub use tempctrl::{
    thermal_status, SharedThermalDevice, ThermalBank, ThermalCommand, ThermalDevice, ThermalLoop,
};
pub use tempmon::{SensorReading, TempMonDevice, MAX_MONITORED_SENSORS};
pub use unknown::UnknownDevice;
