//! Persisted calibration record.
//!
//! Two fixed fields in non-volatile storage: the f32 scale factor at
//! `SCALE_ADDR` and the i32 tare offset at `OFFSET_ADDR`. Erased storage
//! reads the scale as NaN; that sentinel selects the built-in defaults for
//! the whole record.

use peel_traits::NvStore;

use crate::config::CalibrationCfg;

pub const SCALE_ADDR: usize = 0;
pub const OFFSET_ADDR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// Raw counts per gram.
    pub scale: f32,
    /// Tare baseline in raw counts.
    pub offset: i32,
}

impl CalibrationRecord {
    /// Load from storage, falling back to configured defaults on the NaN
    /// sentinel. Called once at boot.
    pub fn load<N: NvStore>(store: &mut N, cfg: &CalibrationCfg) -> Self {
        let scale = store.read_f32(SCALE_ADDR);
        if scale.is_nan() {
            tracing::info!("no persisted calibration, using defaults");
            return Self {
                scale: cfg.default_scale,
                offset: cfg.default_offset,
            };
        }
        Self {
            scale,
            offset: store.read_i32(OFFSET_ADDR),
        }
    }

    pub fn save<N: NvStore>(&self, store: &mut N) {
        store.write_f32(SCALE_ADDR, self.scale);
        store.write_i32(OFFSET_ADDR, self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemStore;

    #[test]
    fn erased_store_yields_defaults() {
        let mut store = MemStore::new();
        let cfg = CalibrationCfg::default();
        let rec = CalibrationRecord::load(&mut store, &cfg);
        assert_eq!(rec.scale, cfg.default_scale);
        assert_eq!(rec.offset, cfg.default_offset);
    }

    #[test]
    fn save_load_round_trip() {
        let mut store = MemStore::new();
        let rec = CalibrationRecord {
            scale: 417.25,
            offset: -12_345,
        };
        rec.save(&mut store);
        let back = CalibrationRecord::load(&mut store, &CalibrationCfg::default());
        assert_eq!(back, rec);
    }
}
