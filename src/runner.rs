//! The cooperative main loop.
//!
//! One [`Runner::poll`] is one loop iteration:
//!
//! 1. drain pending serial bytes into the line buffer, dispatching every
//!    completed line
//! 2. tick the active channel set
//! 3. if the status cadence has elapsed, render and write one status line
//!
//! Nothing in an iteration blocks indefinitely; the only time spent
//! waiting is inside bounded motion bursts.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::devices::RfSwitchDevice;
//! use pico_instrument::dispatch::Dispatcher;
//! use pico_instrument::hal::{MockClock, MockSerial, MockSink, MockSwitches};
//! use pico_instrument::runner::Runner;
//!
//! let dispatcher = Dispatcher::new(5, Box::new(RfSwitchDevice::new(MockSwitches::new())));
//! let mut runner = Runner::new(MockSerial::new(), MockSink::new(), MockClock::new(), dispatcher);
//!
//! runner.input_mut().queue_line(r#"{"sw_state": 3}"#);
//! runner.poll();
//!
//! assert_eq!(runner.sink().lines.len(), 1);
//! assert!(runner.sink().lines[0].contains("\"sw_state\":3"));
//! ```

use core::fmt::Debug;

use crate::command::{self, LineBuffer, LoopCommand, COMMAND_LINE_CAPACITY};
use crate::config::RunnerConfig;
use crate::dispatch::Dispatcher;
use crate::telemetry::EmitError;
use crate::traits::{Clock, SerialInput, StatusSink};

/// What one [`Runner::poll`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Command lines dispatched.
    pub lines: usize,
    /// Whether a status line was written.
    pub reported: bool,
}

/// Drives a [`Dispatcher`] from a serial input, a status sink and a clock.
pub struct Runner<I, S, C>
where
    I: SerialInput,
    S: StatusSink,
    C: Clock,
{
    input: I,
    sink: S,
    clock: C,
    lines: LineBuffer<COMMAND_LINE_CAPACITY>,
    dispatcher: Dispatcher,
    cadence_ms: u32,
    last_report_ms: Option<u64>,
}

impl<I, S, C> Runner<I, S, C>
where
    I: SerialInput,
    S: StatusSink,
    S::Error: Debug,
    C: Clock,
{
    /// Runner with the default status cadence.
    pub fn new(input: I, sink: S, clock: C, dispatcher: Dispatcher) -> Self {
        Self::with_config(input, sink, clock, dispatcher, &RunnerConfig::default())
    }

    /// Runner with explicit configuration.
    pub fn with_config(
        input: I,
        sink: S,
        clock: C,
        dispatcher: Dispatcher,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            input,
            sink,
            clock,
            lines: LineBuffer::new(),
            dispatcher,
            cadence_ms: config.status_cadence_ms,
            last_report_ms: None,
        }
    }

    /// Run one loop iteration.
    pub fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();

        while let Some(byte) = self.input.poll_byte() {
            if let Some(line) = self.lines.push(byte) {
                if let Some(ms) = command::decode::<LoopCommand>(line).and_then(|c| c.cadence_ms())
                {
                    log::info!("status cadence set to {} ms", ms);
                    self.cadence_ms = ms;
                }
                self.dispatcher.on_command(line);
                report.lines += 1;
            }
        }

        let now_ms = self.clock.now_ms();
        self.dispatcher.tick(now_ms);

        if self.report_due(now_ms) {
            self.last_report_ms = Some(now_ms);
            match self.dispatcher.status().emit(&mut self.sink) {
                Ok(()) => report.reported = true,
                Err(EmitError::Render(e)) => log::warn!("status not sent: {}", e),
                Err(EmitError::Sink(e)) => log::warn!("status write failed: {:?}", e),
            }
        }
        report
    }

    fn report_due(&self, now_ms: u64) -> bool {
        match self.last_report_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.cadence_ms),
        }
    }

    /// Current status cadence.
    pub fn cadence_ms(&self) -> u32 {
        self.cadence_ms
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The serial input.
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// The status sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable clock, for advancing simulated time.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
