//! Desktop bench simulator.
//!
//! Runs the full dispatch loop against mock hardware: command lines are read
//! from stdin, status lines are written to stdout, logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Motor (selector 0) with default configuration
//! cargo run --bin host_sim
//!
//! # Thermal control (selector 1) with a config override file
//! cargo run --bin host_sim -- 1 bench.json
//!
//! # Temperature monitoring (selector 2)
//! cargo run --bin host_sim -- 2
//!
//! # More logging
//! PICO_LOG=debug cargo run --bin host_sim -- 5
//! ```
//!
//! Then type commands such as `{"az_target_pos": 200}` or
//! `{"command": "set_cadence", "ms": 1000}`.

use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{LevelFilter, Log, Metadata, Record};
use pico_instrument::config::Config;
use pico_instrument::devices::{
    MotorDevice, RfSwitchDevice, SharedThermalDevice, TempMonDevice, ThermalBank,
};
use pico_instrument::dispatch::{App, Board, ChannelSet, Dispatcher};
use pico_instrument::hal::{MockBridge, MockSelector, MockSensors, MockStepper, MockSwitches};
use pico_instrument::runner::Runner;
use pico_instrument::traits::{Clock, DelayUs, SelectorInput, SerialInput, StatusSink};

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 10;

/// Second-context thermal loop interval in milliseconds
const THERMAL_INTERVAL_MS: u64 = 50;

/// Simulated sensor reading (room temperature)
const AMBIENT_C: f32 = 22.0;

/// Sensors on the simulated monitoring bus
const MONITORED_SENSORS: usize = 4;

// ============================================================================
// Logging
// ============================================================================

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() -> anyhow::Result<()> {
    let level = std::env::var("PICO_LOG")
        .ok()
        .and_then(|s| LevelFilter::from_str(&s).ok())
        .unwrap_or(LevelFilter::Info);
    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("logger init failed: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

// ============================================================================
// Host transport
// ============================================================================

/// Stdin bytes, fed by a reader thread so polling never blocks.
struct StdinSerial {
    rx: Receiver<u8>,
}

impl StdinSerial {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for byte in stdin.lock().bytes() {
                match byte {
                    Ok(b) => {
                        if tx.send(b).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self { rx }
    }
}

impl SerialInput for StdinSerial {
    fn poll_byte(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(b) => Some(b),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Status lines to stdout, one write and flush per line.
struct StdoutSink;

impl StatusSink for StdoutSink {
    type Error = std::io::Error;

    fn write_line(&mut self, line: &str) -> Result<(), Self::Error> {
        let mut out = std::io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

#[derive(Clone, Copy)]
struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

struct SleepDelay;

impl DelayUs for SleepDelay {
    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

// ============================================================================
// Simulated board
// ============================================================================

struct SimBoard {
    selector: MockSelector,
    config: Config,
    clock: SystemClock,
}

impl Board for SimBoard {
    fn read_selector(&mut self) -> u8 {
        self.selector.read_selector()
    }

    fn build(&mut self, app: App) -> Option<Box<dyn ChannelSet>> {
        match app {
            App::Motor => Some(Box::new(MotorDevice::new(
                MockStepper::new(),
                MockStepper::new(),
                SleepDelay,
                &self.config.motion,
            ))),
            App::TempCtrl => {
                let thermal = &self.config.thermal;
                let drivers = thermal.channels.iter().map(|_| MockBridge::new());
                let readings = vec![Some(AMBIENT_C); thermal.channels.len()];
                let bank = ThermalBank::new(drivers, thermal);
                let (device, mut control) = SharedThermalDevice::split(
                    bank,
                    MockSensors::new(&readings),
                    u64::from(thermal.settle_ms),
                );

                let clock = self.clock;
                thread::spawn(move || {
                    control.start(clock.now_ms());
                    loop {
                        control.step(clock.now_ms());
                        thread::sleep(Duration::from_millis(THERMAL_INTERVAL_MS));
                    }
                });
                Some(Box::new(device))
            }
            App::TempMon => Some(Box::new(TempMonDevice::new(
                MockSensors::new(&[Some(AMBIENT_C); MONITORED_SENSORS]),
                &self.config.thermal,
            ))),
            App::RfSwitch => Some(Box::new(RfSwitchDevice::new(MockSwitches::new()))),
            App::Imu | App::Lidar => None,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let selector = match args.next() {
        Some(s) => s
            .parse::<u8>()
            .with_context(|| format!("selector must be 0-255, got {:?}", s))?,
        None => 0,
    };
    let config = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            Config::from_json(&text).with_context(|| format!("parsing config {}", path))?
        }
        None => Config::default(),
    };

    log::info!("{} starting, selector {}", config.device.name, selector);

    let clock = SystemClock {
        start: Instant::now(),
    };
    let mut board = SimBoard {
        selector: MockSelector::new(selector),
        config: config.clone(),
        clock,
    };
    let dispatcher = Dispatcher::select(&mut board, clock.now_ms());
    let mut runner =
        Runner::with_config(StdinSerial::spawn(), StdoutSink, clock, dispatcher, &config.runner);

    loop {
        runner.poll();
        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
