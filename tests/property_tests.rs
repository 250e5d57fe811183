//! Property tests for the codec and both control algorithms

use pico_instrument::{
    codec,
    hal::{MockBridge, MockDelay, MockStepper},
    DecodeError, FaultPolicy, MotionChannel, MotionTiming, ThermalChannel, ThermalSetpoint,
};
use proptest::prelude::*;

const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

proptest! {
    // ========================================================================
    // Byte Codec
    // ========================================================================

    #[test]
    fn codec_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = codec::encode(&bytes);
        prop_assert_eq!(text.len(), codec::encoded_len(bytes.len()));
        prop_assert!(text.bytes().all(|b| ALPHABET.as_bytes().contains(&b)));
        prop_assert_eq!(codec::decode(&text).unwrap(), bytes);
    }

    #[test]
    fn codec_rejects_bad_length(bytes in proptest::collection::vec(any::<u8>(), 1..64), cut in 1usize..4) {
        let text = codec::encode(&bytes);
        let short = &text[..text.len() - cut];
        prop_assert_eq!(codec::decode(short), Err(DecodeError::InvalidLength(short.len())));
    }

    #[test]
    fn codec_rejects_foreign_characters(
        bytes in proptest::collection::vec(any::<u8>(), 3..64),
        pos in any::<prop::sample::Index>(),
        bad in (0u8..128).prop_filter("outside alphabet", |b| !ALPHABET.as_bytes().contains(b)),
    ) {
        let mut text = codec::encode(&bytes);
        let at = pos.index(text.len());
        text.replace_range(at..at + 1, &char::from(bad).to_string());
        prop_assert!(codec::decode(&text).is_err());
    }

    // ========================================================================
    // Motion
    // ========================================================================

    #[test]
    fn motion_converges_without_overshoot(
        start in -500i32..500,
        target in -500i32..500,
        max_pulses in 1u32..80,
        slow_zone in 0u32..40,
    ) {
        let timing = MotionTiming::default()
            .with_max_pulses(max_pulses)
            .with_slow_zone(slow_zone);
        let mut axis = MotionChannel::new(MockStepper::new(), true, timing);
        let mut delay = MockDelay::new();
        axis.redefine_position(start);
        axis.set_target(target);

        let mut remaining = (target - start).abs();
        let mut ticks = 0;
        while axis.is_moving() {
            let tick = axis.tick(&mut delay).unwrap();
            let now = (target - axis.position()).abs();
            prop_assert!(tick.pulses <= max_pulses);
            prop_assert!(now < remaining);
            prop_assert!((target - axis.position()).signum() * (target - start).signum() >= 0);
            remaining = now;
            ticks += 1;
            prop_assert!(ticks <= 1000);
        }
        prop_assert_eq!(axis.position(), target);
        prop_assert_eq!(axis.driver().rising_edges as i32, (target - start).abs());
    }

    #[test]
    fn reversal_restarts_steps_in_direction(
        first in 1i32..200,
        back in 1i32..200,
        max_pulses in 1u32..50,
    ) {
        let timing = MotionTiming::default().with_max_pulses(max_pulses);
        let mut axis = MotionChannel::new(MockStepper::new(), true, timing);
        let mut delay = MockDelay::new();

        axis.set_target(first);
        axis.tick(&mut delay).unwrap();
        axis.set_target(axis.position() - back);
        let tick = axis.tick(&mut delay).unwrap();

        prop_assert_eq!(tick.direction, -1);
        prop_assert_eq!(axis.steps_in_direction(), tick.pulses);
    }

    // ========================================================================
    // Thermal
    // ========================================================================

    #[test]
    fn drive_never_exceeds_clamp(
        target in -40.0f32..100.0,
        readings in proptest::collection::vec(-55.0f32..125.0, 1..20),
        gain in -5.0f32..5.0,
        baseline in -2.0f32..2.0,
        clamp in 0.0f32..1.0,
        hysteresis in 0.0f32..3.0,
    ) {
        let setpoint = ThermalSetpoint::new(target)
            .with_gain(gain)
            .with_baseline(baseline)
            .with_clamp(clamp)
            .with_hysteresis(hysteresis);
        let mut ch = ThermalChannel::new(1, MockBridge::new(), setpoint, FaultPolicy::default(), 1000);
        for (t, reading) in readings.iter().enumerate() {
            ch.tick(Some(*reading), t as u64).unwrap();
            prop_assert!(ch.drive().abs() <= clamp);
            if (target - reading).abs() <= hysteresis {
                prop_assert_eq!(ch.drive(), 0.0);
            }
        }
    }

    #[test]
    fn drive_stays_within_unit_range(
        target in prop::num::f32::ANY,
        reading in -55.0f32..125.0,
        gain in prop::num::f32::ANY,
        clamp in 0.0f32..10.0,
    ) {
        let setpoint = ThermalSetpoint::new(target).with_gain(gain).with_clamp(clamp);
        let mut ch = ThermalChannel::new(1, MockBridge::new(), setpoint, FaultPolicy::default(), 1000);
        ch.tick(Some(reading), 0).unwrap();
        prop_assert!(ch.drive().is_finite());
        prop_assert!(ch.drive().abs() <= clamp.min(1.0));
    }

    #[test]
    fn faults_within_window_trip(threshold in 1u32..10, spacing in 0u64..1000) {
        let policy = FaultPolicy { window_ms: 1000, threshold };
        let mut ch = ThermalChannel::new(1, MockBridge::new(), ThermalSetpoint::default(), policy, 1000);
        for i in 0..u64::from(threshold) {
            prop_assert!(!ch.is_permanently_disabled());
            ch.tick(None, 1 + i * spacing).unwrap();
        }
        prop_assert!(ch.is_permanently_disabled());
    }

    #[test]
    fn faults_across_windows_do_not_trip(threshold in 2u32..10, extra in 1u64..5000) {
        let policy = FaultPolicy { window_ms: 1000, threshold };
        let mut ch = ThermalChannel::new(1, MockBridge::new(), ThermalSetpoint::default(), policy, 1000);
        for i in 0..u64::from(threshold) * 3 {
            ch.tick(None, i * (1000 + extra)).unwrap();
        }
        prop_assert!(!ch.is_permanently_disabled());
    }
}
