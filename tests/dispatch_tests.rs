//! Device selection and the main loop, end to end

use pico_instrument::{
    config::{RunnerConfig, ThermalConfig},
    devices::{MotorDevice, RfSwitchDevice, TempMonDevice, ThermalDevice},
    dispatch::{App, Board, ChannelSet, Dispatcher},
    hal::{
        MockBridge, MockClock, MockDelay, MockSelector, MockSensors, MockSerial, MockSink,
        MockStepper, MockSwitches,
    },
    runner::Runner,
    traits::SelectorInput,
};

/// Board with every implemented device; counts builds.
struct Bench {
    selector: MockSelector,
    builds: usize,
}

impl Bench {
    fn new(selector: u8) -> Self {
        Self {
            selector: MockSelector::new(selector),
            builds: 0,
        }
    }
}

impl Board for Bench {
    fn read_selector(&mut self) -> u8 {
        self.selector.read_selector()
    }

    fn build(&mut self, app: App) -> Option<Box<dyn ChannelSet>> {
        self.builds += 1;
        match app {
            App::Motor => Some(Box::new(MotorDevice::new(
                MockStepper::new(),
                MockStepper::new(),
                MockDelay::new(),
                &Default::default(),
            ))),
            App::TempCtrl => Some(Box::new(ThermalDevice::new(
                vec![MockBridge::new(), MockBridge::new()],
                MockSensors::new(&[Some(22.0), Some(22.0)]),
                &ThermalConfig::default(),
            ))),
            App::TempMon => Some(Box::new(TempMonDevice::new(
                MockSensors::new(&[Some(21.0), None, Some(23.5)]),
                &ThermalConfig::default(),
            ))),
            App::RfSwitch => Some(Box::new(RfSwitchDevice::new(MockSwitches::new()))),
            App::Imu | App::Lidar => None,
        }
    }
}

fn parse(line: &str) -> serde_json::Value {
    assert!(line.ends_with('\n'), "status line not terminated: {:?}", line);
    serde_json::from_str(line).unwrap()
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn selector_table() {
    let cases = [
        (0, "motor"),
        (1, "tempctrl"),
        (2, "tempmon"),
        (3, "unknown"),
        (4, "unknown"),
        (5, "rfswitch"),
        (6, "unknown"),
        (7, "unknown"),
    ];
    for (selector, name) in cases {
        let dispatcher = Dispatcher::select(&mut Bench::new(selector), 0);
        assert_eq!(dispatcher.name(), name, "selector {}", selector);
        assert_eq!(dispatcher.app_id(), selector);
    }
}

#[test]
fn selector_is_masked_to_three_bits() {
    let dispatcher = Dispatcher::select(&mut Bench::new(0b1111_1000), 0);
    assert_eq!(dispatcher.app_id(), 0);
    assert_eq!(dispatcher.app(), Some(App::Motor));

    let dispatcher = Dispatcher::select(&mut Bench::new(0x0d), 0);
    assert_eq!(dispatcher.app(), Some(App::RfSwitch));
}

#[test]
fn selector_read_once() {
    let mut bench = Bench::new(1);
    let mut dispatcher = Dispatcher::select(&mut bench, 0);
    dispatcher.tick(0);
    dispatcher.tick(1000);
    assert_eq!(bench.selector.reads, 1);
    assert_eq!(bench.builds, 1);
}

#[test]
fn unknown_codes_never_reach_the_factory() {
    let mut bench = Bench::new(7);
    Dispatcher::select(&mut bench, 0);
    assert_eq!(bench.builds, 0);

    let mut bench = Bench::new(3);
    Dispatcher::select(&mut bench, 0);
    assert_eq!(bench.builds, 1);
}

#[test]
fn unimplemented_app_reports_error() {
    let mut dispatcher = Dispatcher::select(&mut Bench::new(4), 0);
    dispatcher.on_command(r#"{"az_target_pos": 10}"#);
    dispatcher.tick(0);
    let json = parse(&dispatcher.status().render().unwrap());
    assert_eq!(json["status"], "error");
    assert_eq!(json["app_id"], 4);
    assert_eq!(json["error"], "unimplemented app");
}

// ============================================================================
// Runner End to End
// ============================================================================

fn runner(selector: u8) -> Runner<MockSerial, MockSink, MockClock> {
    let dispatcher = Dispatcher::select(&mut Bench::new(selector), 0);
    Runner::new(MockSerial::new(), MockSink::new(), MockClock::new(), dispatcher)
}

#[test]
fn motor_session() {
    let mut r = runner(0);
    r.input_mut().queue_line(r#"{"az_target_pos": 100, "el_target_pos": -20}"#);
    r.poll();

    for _ in 0..5 {
        r.clock_mut().advance(200);
        r.poll();
    }

    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sensor_name"], "motor");
    assert_eq!(json["status"], "update");
    assert_eq!(json["app_id"], 0);
    assert_eq!(json["az_pos"], 100);
    assert_eq!(json["el_pos"], -20);
    assert_eq!(r.sink().lines.len(), 6);
}

#[test]
fn thermal_session() {
    let mut r = runner(1);
    r.input_mut()
        .queue_line(r#"{"cmd": "set_temp", "channel": 2, "temperature": 18.5}"#);
    r.poll();

    r.clock_mut().advance(750);
    r.poll();

    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sensor_name"], "tempctrl");
    assert_eq!(json["app_id"], 1);
    assert_eq!(json["temp1"], 22.0);
    assert_eq!(json["target1"], 30.0);
    assert_eq!(json["target2"], 18.5);
    assert_eq!(json["active1"], true);
    assert_eq!(json["active2"], true);
    assert!(json["drive2"].as_f64().unwrap() < 0.0);
}

#[test]
fn tempmon_session() {
    let mut r = runner(2);
    r.poll();
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sensor_name"], "tempmon");
    assert_eq!(json["status"], "update");
    assert_eq!(json["app_id"], 2);
    assert_eq!(json["sensor_count"], 3);
    assert_eq!(json["valid1"], false);

    r.input_mut().queue_line(r#"{"temperature": 40}"#);
    r.clock_mut().advance(750);
    r.poll();
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["temp1"], 21.0);
    assert_eq!(json["valid1"], true);
    assert_eq!(json["temp2"], 0.0);
    assert_eq!(json["valid2"], false);
    assert_eq!(json["temp3"], 23.5);
    assert_eq!(json["valid3"], true);
}

#[test]
fn tempmon_without_sensors_reports_not_initialized() {
    let mut bench = NoSensors(MockSelector::new(2));
    let mut r = Runner::new(
        MockSerial::new(),
        MockSink::new(),
        MockClock::new(),
        Dispatcher::select(&mut bench, 0),
    );
    r.poll();
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["status"], "not_initialized");
    assert_eq!(json["app_id"], 2);
    assert_eq!(json["initialized"], false);
}

/// Board whose monitoring bus is empty.
struct NoSensors(MockSelector);

impl Board for NoSensors {
    fn read_selector(&mut self) -> u8 {
        self.0.read_selector()
    }

    fn build(&mut self, app: App) -> Option<Box<dyn ChannelSet>> {
        match app {
            App::TempMon => Some(Box::new(TempMonDevice::new(
                MockSensors::new(&[]),
                &ThermalConfig::default(),
            ))),
            _ => None,
        }
    }
}

#[test]
fn rfswitch_session() {
    let mut r = runner(5);
    r.input_mut().queue_line(r#"{"sw_state": 170}"#);
    r.poll();
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sensor_name"], "rfswitch");
    assert_eq!(json["sw_state"], 170);
}

#[test]
fn malformed_lines_are_dropped() {
    let mut r = runner(5);
    r.input_mut().queue_line("");
    r.input_mut().queue_line("not json");
    r.input_mut().queue_line(r#"{"sw_state": "high"}"#);
    r.input_mut().queue_line(r#"{"sw_state": 2"#);
    let report = r.poll();
    assert_eq!(report.lines, 3);
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sw_state"], 0);
}

#[test]
fn overlong_line_is_discarded_up_to_terminator() {
    let mut r = runner(5);
    let padding = " ".repeat(400);
    r.input_mut()
        .queue_line(&format!(r#"{{"sw_state": 1,{}"x": 0}}"#, padding));
    r.input_mut().queue_line(r#"{"sw_state": 4}"#);
    r.poll();
    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["sw_state"], 4);
}

#[test]
fn cadence_from_config_and_command() {
    let dispatcher = Dispatcher::select(&mut Bench::new(5), 0);
    let mut r = Runner::with_config(
        MockSerial::new(),
        MockSink::new(),
        MockClock::new(),
        dispatcher,
        &RunnerConfig::default().with_status_cadence_ms(50),
    );
    assert_eq!(r.cadence_ms(), 50);
    r.poll();
    r.clock_mut().advance(50);
    assert!(r.poll().reported);

    r.input_mut()
        .queue_line(r#"{"cmd": "set_cadence", "ms": 500}"#);
    r.clock_mut().advance(50);
    assert!(!r.poll().reported);
    assert_eq!(r.cadence_ms(), 500);
    r.clock_mut().advance(449);
    assert!(!r.poll().reported);
    r.clock_mut().advance(1);
    assert!(r.poll().reported);
}

#[test]
fn cadence_command_key_reaches_the_loop() {
    let mut r = runner(1);
    r.input_mut()
        .queue_line(r#"{"command": "set_cadence", "ms": 1000}"#);
    r.poll();
    assert_eq!(r.cadence_ms(), 1000);

    r.clock_mut().advance(999);
    assert!(!r.poll().reported);
    r.clock_mut().advance(1);
    assert!(r.poll().reported);

    let json = parse(r.sink().last().unwrap());
    assert_eq!(json["target1"], 30.0);
}

#[test]
fn every_status_line_is_one_json_object() {
    for selector in 0..8 {
        let mut r = runner(selector);
        for _ in 0..3 {
            r.poll();
            r.clock_mut().advance(1000);
        }
        for line in &r.sink().lines {
            let json = parse(line);
            assert!(json.is_object());
            assert_eq!(json["app_id"], selector);
            assert!(json["status"] == "update" || json["status"] == "error");
        }
    }
}
