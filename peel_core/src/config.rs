//! Runtime configuration for the control kernel.
//!
//! These are the structs `Controller` runs with. They are separate from the
//! TOML-deserialized schema in `peel_config`.

use peel_traits::MicrostepRes;

/// Motion geometry and speed defaults.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Full motor steps per shaft revolution.
    pub steps_per_rev: u32,
    /// Speed applied at boot and until the host sends `R`.
    pub default_rpm: u32,
    /// Below this commanded speed `R` also selects the coarser resolution.
    pub res_switch_rpm: u32,
    /// Length of a switch-triggered jog, in microsteps.
    pub jog_microsteps: u32,
    /// Full carriage travel between the switches, in microsteps. Testing and
    /// Resetting moves are scheduled for this distance; a limit edge ends
    /// them early.
    pub travel_microsteps: u32,
    /// Back-off distance after the reset run touches the lower switch.
    pub reset_height_microsteps: u32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            steps_per_rev: 200,
            default_rpm: 100,
            res_switch_rpm: 40,
            jog_microsteps: 800,
            travel_microsteps: 160_000,
            reset_height_microsteps: 1600,
        }
    }
}

/// Force sampling and overload cutoff.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Minimum milliseconds between force samples (logging interval).
    pub interval_ms: u64,
    /// Rated maximum load of the cell, grams.
    pub rated_max_g: f32,
    /// Fraction of rated load that trips the cutoff while Testing.
    pub overload_fraction: f32,
}

impl SamplingCfg {
    /// Overload threshold in grams.
    pub fn overload_g(&self) -> f32 {
        self.rated_max_g * self.overload_fraction
    }
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            rated_max_g: 1000.0,
            overload_fraction: 0.8,
        }
    }
}

/// Calibration wizard parameters.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Readings averaged for tare and for the known-weight measurement.
    pub samples: u8,
    /// Upper bound on each blocking operator wait.
    pub operator_timeout_ms: u64,
    /// Maximum digits accepted during weight entry.
    pub max_weight_digits: usize,
    /// Defaults applied when the persisted record carries the NaN sentinel.
    pub default_scale: f32,
    pub default_offset: i32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 20,
            operator_timeout_ms: 30_000,
            max_weight_digits: 5,
            default_scale: 420.0,
            default_offset: 0,
        }
    }
}

/// Resolution the kernel selects for a commanded speed.
pub fn resolution_for_rpm(rpm: u32, res_switch_rpm: u32) -> MicrostepRes {
    if rpm < res_switch_rpm {
        MicrostepRes::Quarter
    } else {
        MicrostepRes::Sixteenth
    }
}
