#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the peel test fixture.
//!
//! `Config` and sub-structs are deserialized from TOML and validated. Every
//! section except `[pins]` is optional and falls back to firmware defaults.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_en: Option<u8>,
    /// Microstep select lines of the step driver.
    pub ms1: Option<u8>,
    pub ms2: Option<u8>,
    pub ms3: Option<u8>,
    pub limit_lower: u8,
    pub limit_upper: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionToml {
    /// Full motor steps per shaft revolution.
    pub steps_per_rev: u32,
    pub default_rpm: u32,
    /// Below this rpm the coarser microstep resolution is selected.
    pub res_switch_rpm: u32,
    pub jog_microsteps: u32,
    pub travel_microsteps: u32,
    pub reset_height_microsteps: u32,
}

impl Default for MotionToml {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SamplingToml {
    /// Milliseconds between force log lines.
    pub interval_ms: u64,
    pub rated_max_g: f32,
    /// Fraction of the rated load that trips the overload cutoff.
    pub overload_fraction: f32,
}

impl Default for SamplingToml {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            rated_max_g: 1000.0,
            overload_fraction: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationToml {
    /// Readings averaged per tare / known-weight measurement.
    pub samples: u8,
    pub operator_timeout_ms: u64,
    pub max_weight_digits: usize,
    pub default_scale: f32,
    pub default_offset: i32,
}

impl Default for CalibrationToml {
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub motion: MotionToml,
    #[serde(default)]
    pub sampling: SamplingToml,
    #[serde(default)]
    pub calibration: CalibrationToml,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_path(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Motion
        if self.motion.steps_per_rev == 0 {
            eyre::bail!("motion.steps_per_rev must be > 0");
        }
        if self.motion.default_rpm == 0 {
            eyre::bail!("motion.default_rpm must be > 0");
        }
        if self.motion.default_rpm > 2000 {
            eyre::bail!("motion.default_rpm is unreasonably large (>2000)");
        }
        if self.motion.jog_microsteps == 0 {
            eyre::bail!("motion.jog_microsteps must be > 0");
        }
        if self.motion.travel_microsteps == 0 {
            eyre::bail!("motion.travel_microsteps must be > 0");
        }
        if self.motion.reset_height_microsteps > self.motion.travel_microsteps {
            eyre::bail!("motion.reset_height_microsteps must not exceed travel_microsteps");
        }

        // Sampling
        if self.sampling.interval_ms == 0 {
            eyre::bail!("sampling.interval_ms must be >= 1");
        }
        if self.sampling.rated_max_g <= 0.0 {
            eyre::bail!("sampling.rated_max_g must be > 0");
        }
        if !(self.sampling.overload_fraction > 0.0 && self.sampling.overload_fraction <= 1.0) {
            eyre::bail!("sampling.overload_fraction must be in (0.0, 1.0]");
        }

        // Calibration
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }
        if self.calibration.operator_timeout_ms == 0 {
            eyre::bail!("calibration.operator_timeout_ms must be >= 1");
        }
        if self.calibration.max_weight_digits == 0 || self.calibration.max_weight_digits > 9 {
            eyre::bail!("calibration.max_weight_digits must be in [1, 9]");
        }
        if self.calibration.default_scale == 0.0 || !self.calibration.default_scale.is_finite() {
            eyre::bail!("calibration.default_scale must be finite and non-zero");
        }

        Ok(())
    }
}
