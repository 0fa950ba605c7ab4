//! Unit conversions and timing helpers for the control kernel.

use peel_traits::MicrostepRes;

/// Number of microseconds in one minute.
pub const MICROS_PER_MIN: u64 = 60_000_000;

/// Standard gravity in m/s², the grams to newtons conversion base.
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Slack below which a tick services nothing but the motion engine,
/// keeping step timing jitter-free.
pub const GUARD_US: u64 = 100;

/// Microseconds between step pulses for a given shaft speed.
/// - Clamps `rpm` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn pulse_interval_us(rpm: u32, steps_per_rev: u32, res: MicrostepRes) -> u64 {
    let pulses_per_min =
        u64::from(rpm.max(1)) * u64::from(steps_per_rev.max(1)) * u64::from(res.factor());
    (MICROS_PER_MIN / pulses_per_min).max(1)
}

/// Convert calibrated load-cell units (grams) to newtons.
#[inline]
pub fn grams_to_newtons(grams: f32) -> f32 {
    grams / 1000.0 * STANDARD_GRAVITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kilogram_is_standard_gravity_newtons() {
        assert!((grams_to_newtons(1000.0) - STANDARD_GRAVITY).abs() < 1e-6);
    }

    #[test]
    fn interval_scales_with_resolution() {
        // 60 rpm, 200 steps/rev, sixteenth: 1 rev/s = 3200 pulses/s = 312 us
        let fine = pulse_interval_us(60, 200, MicrostepRes::Sixteenth);
        let coarse = pulse_interval_us(60, 200, MicrostepRes::Quarter);
        assert_eq!(fine, 312);
        assert_eq!(coarse, 1250);
        assert_eq!(coarse, fine * 4 + 2); // integer division remainder
    }

    #[test]
    fn zero_rpm_is_clamped() {
        let v = pulse_interval_us(0, 200, MicrostepRes::Quarter);
        assert!(v >= 1);
    }
}
