//! Property coverage for the pulse scheduler: pulse counts are exact and
//! intervals match the commanded speed for any speed/resolution pair.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use peel_core::MotionEngine;
use peel_core::mocks::{CountingPulser, TestClock};
use peel_core::util::pulse_interval_us;
use peel_traits::{MicrostepRes, Motion};

fn res_strategy() -> impl Strategy<Value = MicrostepRes> {
    prop_oneof![
        Just(MicrostepRes::Quarter),
        Just(MicrostepRes::Sixteenth)
    ]
}

proptest! {
    #[test]
    fn emits_exactly_the_commanded_pulse_count(
        microsteps in -400i32..400i32,
        rpm in 1u32..500u32,
        res in res_strategy(),
    ) {
        let clock = TestClock::new();
        let mut engine = MotionEngine::new(
            CountingPulser::default(),
            Arc::new(clock.clone()),
            200,
            rpm,
            res,
        );
        engine.start_move(microsteps);
        let mut iterations = 0u32;
        loop {
            let wait = engine.next_action();
            if wait == 0 {
                break;
            }
            clock.advance(Duration::from_micros(wait));
            iterations += 1;
            prop_assert!(iterations <= 1000, "engine never went idle");
        }
        prop_assert_eq!(engine.pulser().pulses, microsteps.unsigned_abs());
        prop_assert_eq!(engine.remaining(), 0);
    }

    #[test]
    fn reported_wait_never_exceeds_the_pulse_interval(
        rpm in 1u32..500u32,
        res in res_strategy(),
    ) {
        let clock = TestClock::new();
        let mut engine = MotionEngine::new(
            CountingPulser::default(),
            Arc::new(clock.clone()),
            200,
            rpm,
            res,
        );
        let interval = pulse_interval_us(rpm, 200, res);
        engine.start_move(10);
        let _ = engine.next_action(); // first pulse, due immediately
        for _ in 0..8 {
            let wait = engine.next_action();
            prop_assert!(wait >= 1 && wait <= interval);
            clock.advance(Duration::from_micros(wait));
        }
    }
}
