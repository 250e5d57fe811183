//! RF switch bank: eight lines driven from one state byte.
//!
//! `{"sw_state": 5}` closes switches 0 and 2. The mask is written on every
//! tick, so a line glitched by a brown-out is restored within one cycle.

use core::fmt::Debug;

use serde::Deserialize;

use crate::command;
use crate::dispatch::ChannelSet;
use crate::telemetry::StatusRecord;
use crate::traits::SwitchOutputs;

/// RF switch command line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SwitchCommand {
    /// New switch mask, bit `i` driving line `i`.
    pub sw_state: Option<u8>,
}

/// Eight-way RF switch.
pub struct RfSwitchDevice<S: SwitchOutputs> {
    outputs: S,
    state: u8,
}

impl<S> RfSwitchDevice<S>
where
    S: SwitchOutputs,
    S::Error: Debug,
{
    /// All switches open.
    pub fn new(outputs: S) -> Self {
        Self { outputs, state: 0 }
    }

    /// Current mask.
    pub fn state(&self) -> u8 {
        self.state
    }

    /// The output bank.
    pub fn outputs(&self) -> &S {
        &self.outputs
    }

    fn write(&mut self) {
        if let Err(e) = self.outputs.write_mask(self.state) {
            log::warn!("rfswitch: output write failed: {:?}", e);
        }
    }
}

impl<S> ChannelSet for RfSwitchDevice<S>
where
    S: SwitchOutputs,
    S::Error: Debug,
{
    fn name(&self) -> &'static str {
        "rfswitch"
    }

    fn init(&mut self, _now_ms: u64) {
        self.write();
    }

    fn on_command(&mut self, line: &str) {
        if let Some(SwitchCommand {
            sw_state: Some(state),
        }) = command::decode(line)
        {
            self.state = state;
        }
    }

    fn tick(&mut self, _now_ms: u64) {
        self.write();
    }

    fn report_status(&self, app_id: u8) -> StatusRecord {
        StatusRecord::new()
            .str("sensor_name", "rfswitch")
            .str("status", "update")
            .int("app_id", i64::from(app_id))
            .int("sw_state", i64::from(self.state))
    }
}
