//! Two-phase interactive calibration.
//!
//! The one deliberately blocking routine in the kernel: it suspends motion,
//! switch handling and force sampling until the operator completes both
//! prompts. Each blocking wait is bounded by `operator_timeout_ms`; on any
//! error the previous calibration stays in effect.

use std::time::Duration;

use peel_traits::clock::Clock;
use peel_traits::{HostLink, LoadCell, NvStore};

use crate::config::CalibrationCfg;
use crate::error::CalibrationError;
use crate::nv::CalibrationRecord;

/// Run the wizard to completion. Persists the offset after tare and the
/// full record after the scale is derived.
pub fn run_wizard<L, H, N>(
    cell: &mut L,
    link: &mut H,
    store: &mut N,
    clock: &(dyn Clock + Send + Sync),
    cfg: &CalibrationCfg,
    current: CalibrationRecord,
) -> Result<CalibrationRecord, CalibrationError>
where
    L: LoadCell,
    H: HostLink,
    N: NvStore,
{
    let timeout = Duration::from_millis(cfg.operator_timeout_ms);

    drain(link);
    link.write_line("Status: Calibration started. Remove all weight, then send any character.");
    wait_any_byte(link, clock, timeout)?;

    cell.tare(cfg.samples)
        .map_err(|e| CalibrationError::Sensor(e.to_string()))?;
    let offset = cell.offset();
    CalibrationRecord {
        scale: current.scale,
        offset,
    }
    .save(store);
    link.write_line(&format!("Status: Tare complete. offset={offset}"));

    drain(link);
    link.write_line("Status: Place the known weight and enter its mass in grams.");
    let grams = read_weight(link, clock, timeout, cfg.max_weight_digits)?;
    if grams == 0 {
        return Err(CalibrationError::InvalidWeight);
    }

    let avg = cell
        .read_average(cfg.samples)
        .map_err(|e| CalibrationError::Sensor(e.to_string()))?;
    let scale = (avg - offset as f32) / grams as f32;
    if !scale.is_normal() {
        // A flat reading would persist a zero scale and divide every later
        // read by it.
        return Err(CalibrationError::DegenerateScale);
    }
    cell.set_scale(scale);

    let record = CalibrationRecord { scale, offset };
    record.save(store);
    tracing::info!(scale, offset, grams, "calibration persisted");
    link.write_line(&format!(
        "Status: Calibration complete. scale={scale} offset={offset}"
    ));
    link.write_line("Finished!");
    Ok(record)
}

/// Discard any buffered host input.
fn drain<H: HostLink>(link: &mut H) {
    while link.read_byte().is_some() {}
}

fn wait_any_byte<H: HostLink>(
    link: &mut H,
    clock: &(dyn Clock + Send + Sync),
    timeout: Duration,
) -> Result<u8, CalibrationError> {
    let start = clock.now();
    loop {
        if let Some(b) = link.read_byte() {
            return Ok(b);
        }
        if clock.now().saturating_duration_since(start) >= timeout {
            return Err(CalibrationError::Timeout);
        }
        clock.sleep(Duration::from_millis(1));
    }
}

/// Accumulate a base-10 gram value until a newline. Non-digit bytes are
/// silently ignored; the digit count is bounded.
fn read_weight<H: HostLink>(
    link: &mut H,
    clock: &(dyn Clock + Send + Sync),
    timeout: Duration,
    max_digits: usize,
) -> Result<u32, CalibrationError> {
    let start = clock.now();
    let mut digits = 0usize;
    let mut value: u32 = 0;
    loop {
        match link.read_byte() {
            Some(b'\n') => return Ok(value),
            Some(b) if b.is_ascii_digit() => {
                digits += 1;
                if digits > max_digits {
                    return Err(CalibrationError::TooManyDigits(max_digits));
                }
                value = value * 10 + u32::from(b - b'0');
            }
            Some(_) => {}
            None => {
                if clock.now().saturating_duration_since(start) >= timeout {
                    return Err(CalibrationError::Timeout);
                }
                clock.sleep(Duration::from_millis(1));
            }
        }
    }
}
