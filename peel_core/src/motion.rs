//! The motion engine: a pulse schedule over a black-box step driver.
//!
//! Converts a requested microstep count + speed into timed pulses and
//! reports the remaining wait each tick. Constant-speed semantics only; a
//! stop cancels the remaining count with no deceleration ramp.

use std::sync::Arc;
use std::time::Instant;

use peel_traits::clock::Clock;
use peel_traits::{Direction, MicrostepRes, Motion, StepPulser};

use crate::util::pulse_interval_us;

/// Positive microstep counts move the carriage up, negative down.
pub struct MotionEngine<P: StepPulser> {
    pulser: P,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    steps_per_rev: u32,
    rpm: u32,
    resolution: MicrostepRes,
    interval_us: u64,
    enabled: bool,
    pulses_remaining: u32,
    direction: Direction,
    next_pulse_due_us: u64,
}

impl<P: StepPulser> MotionEngine<P> {
    pub fn new(
        mut pulser: P,
        clock: Arc<dyn Clock + Send + Sync>,
        steps_per_rev: u32,
        rpm: u32,
        resolution: MicrostepRes,
    ) -> Self {
        pulser.set_resolution(resolution);
        pulser.set_enabled(false);
        let epoch = clock.now();
        let interval_us = pulse_interval_us(rpm, steps_per_rev, resolution);
        Self {
            pulser,
            clock,
            epoch,
            steps_per_rev,
            rpm: rpm.max(1),
            resolution,
            interval_us,
            enabled: false,
            pulses_remaining: 0,
            direction: Direction::Down,
            next_pulse_due_us: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn resolution(&self) -> MicrostepRes {
        self.resolution
    }

    /// Access the underlying pulse driver, e.g. to inspect a test double.
    pub fn pulser(&self) -> &P {
        &self.pulser
    }

    fn reclock(&mut self) {
        self.interval_us = pulse_interval_us(self.rpm, self.steps_per_rev, self.resolution);
    }
}

impl<P: StepPulser> Motion for MotionEngine<P> {
    fn start_move(&mut self, microsteps: i32) {
        self.direction = if microsteps >= 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        self.pulser.set_direction(self.direction);
        self.pulses_remaining = microsteps.unsigned_abs();
        // First pulse is due immediately; preempts any in-flight run.
        self.next_pulse_due_us = self.clock.us_since(self.epoch);
        tracing::debug!(
            microsteps,
            rpm = self.rpm,
            interval_us = self.interval_us,
            "move scheduled"
        );
    }

    fn stop(&mut self) {
        if self.pulses_remaining > 0 {
            tracing::debug!(cancelled = self.pulses_remaining, "move stopped");
        }
        self.pulses_remaining = 0;
    }

    fn next_action(&mut self) -> u64 {
        if self.pulses_remaining == 0 {
            return 0;
        }
        let now = self.clock.us_since(self.epoch);
        if now >= self.next_pulse_due_us {
            self.pulser.pulse();
            self.pulses_remaining -= 1;
            if self.pulses_remaining == 0 {
                return 0;
            }
            // Rebase on `now` rather than the ideal due time: a late serviced
            // tick must not trigger a catch-up burst of pulses.
            self.next_pulse_due_us = now + self.interval_us;
            return self.interval_us.max(1);
        }
        (self.next_pulse_due_us - now).max(1)
    }

    fn set_speed(&mut self, rpm: u32) {
        self.rpm = rpm.max(1);
        self.reclock();
    }

    fn set_resolution(&mut self, res: MicrostepRes) {
        self.resolution = res;
        self.pulser.set_resolution(res);
        self.reclock();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.pulser.set_enabled(enabled);
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn remaining(&self) -> u32 {
        self.pulses_remaining
    }

    fn speed_rpm(&self) -> u32 {
        self.rpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CountingPulser, TestClock};
    use std::time::Duration;

    fn engine(clock: &TestClock) -> MotionEngine<CountingPulser> {
        MotionEngine::new(
            CountingPulser::default(),
            Arc::new(clock.clone()),
            200,
            100,
            MicrostepRes::Sixteenth,
        )
    }

    #[test]
    fn emits_exactly_the_requested_pulses() {
        let clock = TestClock::new();
        let mut m = engine(&clock);
        m.start_move(-5);
        let mut emitted = 0u32;
        loop {
            let wait = m.next_action();
            if wait == 0 {
                break;
            }
            clock.advance(Duration::from_micros(wait));
            emitted += 1;
            assert!(emitted < 100, "engine never went idle");
        }
        assert_eq!(m.pulser.pulses, 5);
        assert_eq!(m.remaining(), 0);
        assert_eq!(m.next_action(), 0);
    }

    #[test]
    fn stop_cancels_remaining_count() {
        let clock = TestClock::new();
        let mut m = engine(&clock);
        m.start_move(1000);
        assert!(m.next_action() > 0);
        m.stop();
        assert_eq!(m.next_action(), 0);
        assert_eq!(m.pulser.pulses, 1);
    }

    #[test]
    fn start_move_preempts_in_flight_run() {
        let clock = TestClock::new();
        let mut m = engine(&clock);
        m.start_move(1000);
        let _ = m.next_action();
        m.start_move(-3);
        assert_eq!(m.remaining(), 3);
        assert_eq!(m.direction(), Direction::Down);
    }

    #[test]
    fn wait_is_never_zero_while_pulses_remain() {
        let clock = TestClock::new();
        let mut m = engine(&clock);
        m.start_move(2);
        let wait = m.next_action(); // first pulse due immediately
        assert!(wait >= 1);
        assert_eq!(m.remaining(), 1);
    }

    #[test]
    fn set_speed_changes_subsequent_interval() {
        let clock = TestClock::new();
        let mut m = engine(&clock);
        m.start_move(10);
        let _ = m.next_action();
        let before = m.next_action();
        m.set_speed(200);
        clock.advance(Duration::from_micros(before));
        let _ = m.next_action(); // pulse at the old due time
        let after = m.next_action();
        assert!(after < before);
    }
}
