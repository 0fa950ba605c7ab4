//! Interval-gated force sampling and the overload cutoff.

use peel_traits::LoadCell;

use crate::config::SamplingCfg;
use crate::error::{Result, map_hw_error};
use crate::util::grams_to_newtons;

/// One force reading. Ephemeral; not retained beyond the producing tick.
#[derive(Debug, Clone, Copy)]
pub struct ForceSample {
    /// Calibrated load-cell units, grams.
    pub raw_units: f32,
    pub newtons: f32,
    pub timestamp_ms: u64,
}

/// Polls the load cell at the configured interval. Non-blocking: returns
/// nothing when the interval has not elapsed or the ADC is not ready.
#[derive(Debug)]
pub struct ForceSampler {
    cfg: SamplingCfg,
    last_sample_ms: Option<u64>,
}

impl ForceSampler {
    pub fn new(cfg: SamplingCfg) -> Self {
        Self {
            cfg,
            last_sample_ms: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.cfg.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) {
        self.cfg.interval_ms = interval_ms.max(1);
    }

    /// Clear pacing state so the first poll of a new test samples promptly.
    pub fn reset(&mut self) {
        self.last_sample_ms = None;
    }

    /// Sample if the interval elapsed and a conversion is ready.
    pub fn poll<L: LoadCell>(&mut self, now_ms: u64, cell: &mut L) -> Result<Option<ForceSample>> {
        if let Some(last) = self.last_sample_ms
            && now_ms.saturating_sub(last) < self.cfg.interval_ms
        {
            return Ok(None);
        }
        if !cell.is_ready() {
            // Sensor-not-ready defers to the next tick; never an error.
            return Ok(None);
        }
        let grams = cell
            .read_units()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        self.last_sample_ms = Some(now_ms);
        Ok(Some(ForceSample {
            raw_units: grams,
            newtons: grams_to_newtons(grams),
            timestamp_ms: now_ms,
        }))
    }

    /// Overload check, applied only while a test is active.
    pub fn is_overload(&self, sample: &ForceSample) -> bool {
        sample.raw_units > self.cfg.overload_g()
    }
}
