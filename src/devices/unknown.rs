//! Fallback for selector codes without an implementation.

use crate::dispatch::ChannelSet;
use crate::telemetry::StatusRecord;

/// Reports an error status every cycle and drives nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownDevice;

impl UnknownDevice {
    /// Creates the fallback device.
    pub fn new() -> Self {
        Self
    }
}

impl ChannelSet for UnknownDevice {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn init(&mut self, _now_ms: u64) {}

    fn on_command(&mut self, line: &str) {
        log::debug!("no device selected, dropping command: {}", line);
    }

    fn tick(&mut self, _now_ms: u64) {}

    fn report_status(&self, app_id: u8) -> StatusRecord {
        StatusRecord::new()
            .str("status", "error")
            .int("app_id", i64::from(app_id))
            .str("error", "unimplemented app")
    }
}
