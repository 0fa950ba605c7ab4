//! Test fakes for the control kernel.
//!
//! Handle-based where the controller takes ownership: cloning a fake shares
//! its state, so a test can keep a handle and observe or drive the side the
//! controller owns.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use peel_traits::clock::Clock;
use peel_traits::{Direction, HostLink, LimitSwitches, LoadCell, MicrostepRes, Motion, NvStore,
    StepPulser};

/// Deterministic clock whose time advances only via `advance` or `sleep`.
#[derive(Debug, Clone)]
pub struct TestClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Pulse driver that just counts what it was told to do.
#[derive(Debug, Default)]
pub struct CountingPulser {
    pub pulses: u32,
    pub direction: Option<Direction>,
    pub enabled: bool,
    pub resolution: Option<MicrostepRes>,
}

impl StepPulser for CountingPulser {
    fn set_direction(&mut self, dir: Direction) {
        self.direction = Some(dir);
    }
    fn pulse(&mut self) {
        self.pulses += 1;
    }
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
    fn set_resolution(&mut self, res: MicrostepRes) {
        self.resolution = Some(res);
    }
}

#[derive(Debug, Default)]
struct FakeMotionState {
    moves: Vec<i32>,
    stops: u32,
    remaining: u32,
    rpm: u32,
    resolution: Option<MicrostepRes>,
    enabled: bool,
    /// What `next_action` reports while a run is in flight.
    wait_us: u64,
}

/// Motion capability fake. `next_action` reports a fixed wait while a run is
/// in flight; tests finish or stall runs explicitly.
#[derive(Debug, Clone)]
pub struct FakeMotion(Arc<Mutex<FakeMotionState>>);

impl Default for FakeMotion {
    fn default() -> Self {
        // Default wait is comfortably above the guard threshold, so ticks
        // keep servicing while a run is in flight.
        Self(Arc::new(Mutex::new(FakeMotionState {
            rpm: 100,
            wait_us: 1000,
            ..FakeMotionState::default()
        })))
    }
}

impl FakeMotion {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeMotionState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pretend the in-flight run completed.
    pub fn finish_move(&self) {
        self.state().remaining = 0;
    }

    /// Start a run through the shared handle, as if the owner had.
    pub fn start_move_handle(&self, microsteps: i32) {
        let mut s = self.state();
        s.moves.push(microsteps);
        s.remaining = microsteps.unsigned_abs();
    }

    /// Report this wait from `next_action` while a run is in flight.
    pub fn set_wait_us(&self, wait_us: u64) {
        self.state().wait_us = wait_us;
    }

    pub fn moves(&self) -> Vec<i32> {
        self.state().moves.clone()
    }

    pub fn stops(&self) -> u32 {
        self.state().stops
    }

    pub fn last_move(&self) -> Option<i32> {
        self.state().moves.last().copied()
    }

    pub fn resolution(&self) -> Option<MicrostepRes> {
        self.state().resolution
    }
}

impl Motion for FakeMotion {
    fn start_move(&mut self, microsteps: i32) {
        let mut s = self.state();
        s.moves.push(microsteps);
        s.remaining = microsteps.unsigned_abs();
    }
    fn stop(&mut self) {
        let mut s = self.state();
        s.stops += 1;
        s.remaining = 0;
    }
    fn next_action(&mut self) -> u64 {
        let s = self.state();
        if s.remaining == 0 { 0 } else { s.wait_us }
    }
    fn set_speed(&mut self, rpm: u32) {
        self.state().rpm = rpm.max(1);
    }
    fn set_resolution(&mut self, res: MicrostepRes) {
        self.state().resolution = Some(res);
    }
    fn set_enabled(&mut self, enabled: bool) {
        self.state().enabled = enabled;
    }
    fn enabled(&self) -> bool {
        self.state().enabled
    }
    fn remaining(&self) -> u32 {
        self.state().remaining
    }
    fn speed_rpm(&self) -> u32 {
        self.state().rpm
    }
}

/// Load cell that replays a scripted sequence of raw readings (the last
/// value repeats). Calibrated units follow the HX711 convention:
/// units = (raw - offset) / scale.
#[derive(Debug)]
pub struct ScriptedCell {
    seq: Vec<f32>,
    idx: usize,
    ready: bool,
    scale: f32,
    offset: i32,
}

impl ScriptedCell {
    pub fn constant(raw: f32) -> Self {
        Self::sequence(vec![raw])
    }

    pub fn sequence(seq: Vec<f32>) -> Self {
        Self {
            seq,
            idx: 0,
            ready: true,
            scale: 1.0,
            offset: 0,
        }
    }

    pub fn append(&mut self, more: Vec<f32>) {
        self.seq.extend(more);
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    fn next_raw(&mut self) -> f32 {
        let v = self
            .seq
            .get(self.idx)
            .or_else(|| self.seq.last())
            .copied()
            .unwrap_or(0.0);
        if self.idx < self.seq.len() {
            self.idx += 1;
        }
        v
    }
}

impl LoadCell for ScriptedCell {
    fn is_ready(&mut self) -> bool {
        self.ready
    }

    fn read_units(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>> {
        let raw = self.next_raw();
        Ok((raw - self.offset as f32) / self.scale)
    }

    fn read_average(&mut self, samples: u8) -> Result<f32, Box<dyn Error + Send + Sync>> {
        let n = samples.max(1);
        let sum: f32 = (0..n).map(|_| self.next_raw()).sum();
        Ok(sum / f32::from(n))
    }

    fn tare(&mut self, samples: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        let avg = self.read_average(samples)?;
        self.offset = avg.round() as i32;
        Ok(())
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }
    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }
    fn scale(&self) -> f32 {
        self.scale
    }
    fn offset(&self) -> i32 {
        self.offset
    }
}

#[derive(Debug, Default)]
struct PipeLinkState {
    /// `None` entries are boundaries: one read returns nothing, modelling
    /// input that arrives only after a drain.
    input: VecDeque<Option<u8>>,
    output: Vec<String>,
}

/// In-memory host link. Cloning shares the pipe.
#[derive(Debug, Clone, Default)]
pub struct PipeLink(Arc<Mutex<PipeLinkState>>);

impl PipeLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PipeLinkState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let mut s = self.state();
        s.input.extend(bytes.iter().copied().map(Some));
    }

    pub fn push_line(&mut self, line: &str) {
        self.push_bytes(line.as_bytes());
        self.push_bytes(b"\n");
    }

    /// Mark a point before which a drain stops consuming.
    pub fn push_boundary(&mut self) {
        self.state().input.push_back(None);
    }

    pub fn output(&self) -> Vec<String> {
        self.state().output.clone()
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.state().output)
    }
}

impl HostLink for PipeLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.state().input.pop_front().flatten()
    }

    fn write_line(&mut self, line: &str) {
        self.state().output.push(line.to_string());
    }
}

/// Byte-backed store initialized to erased (0xFF) flash, so fresh loads see
/// the NaN sentinel.
#[derive(Debug)]
pub struct MemStore {
    bytes: Vec<u8>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            bytes: vec![0xFF; 64],
        }
    }

    fn slot(&mut self, addr: usize) -> &mut [u8] {
        if addr + 4 > self.bytes.len() {
            self.bytes.resize(addr + 4, 0xFF);
        }
        &mut self.bytes[addr..addr + 4]
    }
}

impl NvStore for MemStore {
    fn read_f32(&mut self, addr: usize) -> f32 {
        let s = self.slot(addr);
        f32::from_le_bytes([s[0], s[1], s[2], s[3]])
    }
    fn write_f32(&mut self, addr: usize, value: f32) {
        self.slot(addr).copy_from_slice(&value.to_le_bytes());
    }
    fn read_i32(&mut self, addr: usize) -> i32 {
        let s = self.slot(addr);
        i32::from_le_bytes([s[0], s[1], s[2], s[3]])
    }
    fn write_i32(&mut self, addr: usize, value: i32) {
        self.slot(addr).copy_from_slice(&value.to_le_bytes());
    }
}

/// Limit switches a test can flip while the controller owns the other clone.
#[derive(Debug, Clone, Default)]
pub struct LeverSwitches {
    lower: Arc<AtomicBool>,
    upper: Arc<AtomicBool>,
}

impl LeverSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lower(&self, engaged: bool) {
        self.lower.store(engaged, Ordering::Relaxed);
    }

    pub fn set_upper(&self, engaged: bool) {
        self.upper.store(engaged, Ordering::Relaxed);
    }
}

impl LimitSwitches for LeverSwitches {
    fn lower_engaged(&mut self) -> bool {
        self.lower.load(Ordering::Relaxed)
    }
    fn upper_engaged(&mut self) -> bool {
        self.upper.load(Ordering::Relaxed)
    }
}
