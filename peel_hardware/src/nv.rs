//! Non-volatile calibration storage.
//!
//! Models a small EEPROM: a fixed-size byte image that reads 0xFF everywhere
//! until written, so an f32 field on erased storage reads NaN.

use std::path::PathBuf;

use peel_traits::NvStore;

use crate::error::Result;

pub const IMAGE_LEN: usize = 64;

/// Volatile image, lost on drop. The default store for simulated runs.
#[derive(Debug)]
pub struct MemNvStore {
    bytes: [u8; IMAGE_LEN],
}

impl Default for MemNvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemNvStore {
    pub fn new() -> Self {
        Self {
            bytes: [0xFF; IMAGE_LEN],
        }
    }
}

fn read4(bytes: &[u8; IMAGE_LEN], addr: usize) -> [u8; 4] {
    let mut out = [0xFF; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        if let Some(b) = bytes.get(addr + i) {
            *slot = *b;
        }
    }
    out
}

fn write4(bytes: &mut [u8; IMAGE_LEN], addr: usize, value: [u8; 4]) {
    for (i, v) in value.iter().enumerate() {
        if let Some(slot) = bytes.get_mut(addr + i) {
            *slot = *v;
        }
    }
}

impl NvStore for MemNvStore {
    fn read_f32(&mut self, addr: usize) -> f32 {
        f32::from_le_bytes(read4(&self.bytes, addr))
    }
    fn write_f32(&mut self, addr: usize, value: f32) {
        write4(&mut self.bytes, addr, value.to_le_bytes());
    }
    fn read_i32(&mut self, addr: usize) -> i32 {
        i32::from_le_bytes(read4(&self.bytes, addr))
    }
    fn write_i32(&mut self, addr: usize, value: i32) {
        write4(&mut self.bytes, addr, value.to_le_bytes());
    }
}

/// File-backed image so calibration survives restarts. The whole image is
/// rewritten on every store; at 64 bytes that is cheaper than tracking
/// dirtiness.
#[derive(Debug)]
pub struct FileNvStore {
    path: PathBuf,
    bytes: [u8; IMAGE_LEN],
}

impl FileNvStore {
    /// Open or create the image file. A short or missing file reads as
    /// erased beyond its length.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut bytes = [0xFF; IMAGE_LEN];
        match std::fs::read(&path) {
            Ok(data) => {
                for (slot, b) in bytes.iter_mut().zip(data.iter()) {
                    *slot = *b;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(?path, "no calibration image yet");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self { path, bytes })
    }

    fn flush(&self) {
        if let Err(e) = std::fs::write(&self.path, self.bytes) {
            // A failed flush only costs persistence across restarts.
            tracing::warn!(path = ?self.path, error = %e, "calibration image write failed");
        }
    }
}

impl NvStore for FileNvStore {
    fn read_f32(&mut self, addr: usize) -> f32 {
        f32::from_le_bytes(read4(&self.bytes, addr))
    }
    fn write_f32(&mut self, addr: usize, value: f32) {
        write4(&mut self.bytes, addr, value.to_le_bytes());
        self.flush();
    }
    fn read_i32(&mut self, addr: usize) -> i32 {
        i32::from_le_bytes(read4(&self.bytes, addr))
    }
    fn write_i32(&mut self, addr: usize, value: i32) {
        write4(&mut self.bytes, addr, value.to_le_bytes());
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_mem_store_reads_nan_and_minus_one() {
        let mut s = MemNvStore::new();
        assert!(s.read_f32(0).is_nan());
        assert_eq!(s.read_i32(4), -1);
    }

    #[test]
    fn mem_store_round_trips_values() {
        let mut s = MemNvStore::new();
        s.write_f32(0, 417.5);
        s.write_i32(4, -8123);
        assert_eq!(s.read_f32(0), 417.5);
        assert_eq!(s.read_i32(4), -8123);
    }

    #[test]
    fn out_of_range_addresses_read_erased() {
        let mut s = MemNvStore::new();
        s.write_f32(IMAGE_LEN + 8, 1.0); // silently dropped
        assert!(s.read_f32(IMAGE_LEN + 8).is_nan());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("calibration.bin");
        {
            let mut s = FileNvStore::open(&path).expect("open");
            assert!(s.read_f32(0).is_nan());
            s.write_f32(0, 5.25);
            s.write_i32(4, 8000);
        }
        let mut s = FileNvStore::open(&path).expect("reopen");
        assert_eq!(s.read_f32(0), 5.25);
        assert_eq!(s.read_i32(4), 8000);
        assert!(s.read_f32(8).is_nan()); // untouched field stays erased
    }
}
