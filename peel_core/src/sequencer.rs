//! The test sequencer: one cooperative `tick` that services motion, host
//! commands, limit switches and force sampling in priority order.
//!
//! Priority rule: when the next step pulse is due within `GUARD_US`
//! microseconds, the tick returns immediately after servicing motion so the
//! pulse train stays jitter-free. Everything else runs on slack ticks.

use std::sync::Arc;
use std::time::Instant;

use peel_traits::clock::{Clock, MonotonicClock};
use peel_traits::{Direction, HostLink, LimitSwitches, LoadCell, Motion, NvStore};

use crate::calibrate::run_wizard;
use crate::command::{Command, MAX_LINE_BYTES, parse_line};
use crate::config::{CalibrationCfg, MotionCfg, SamplingCfg, resolution_for_rpm};
use crate::edge::{Edge, EdgeDetector};
use crate::error::{BuildError, ProtocolError, Result};
use crate::force::ForceSampler;
use crate::nv::CalibrationRecord;
use crate::status::{TestState, TickActivity};
use crate::util::GUARD_US;

/// Owns every capability and runs the control loop one tick at a time.
/// Single-threaded by construction; only `Calibrate` blocks.
pub struct Controller<M, L, H, N, W>
where
    M: Motion,
    L: LoadCell,
    H: HostLink,
    N: NvStore,
    W: LimitSwitches,
{
    motion: M,
    cell: L,
    link: H,
    store: N,
    switches: W,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    motion_cfg: MotionCfg,
    cal_cfg: CalibrationCfg,
    state: TestState,
    edges: EdgeDetector,
    sampler: ForceSampler,
    calibration: CalibrationRecord,
    line_buf: String,
    line_over: bool,
}

impl<M, L, H, N, W> Controller<M, L, H, N, W>
where
    M: Motion,
    L: LoadCell,
    H: HostLink,
    N: NvStore,
    W: LimitSwitches,
{
    pub fn state(&self) -> TestState {
        self.state
    }

    pub fn calibration(&self) -> CalibrationRecord {
        self.calibration
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Run one cooperative tick. Never blocks except through `Calibrate`.
    pub fn tick(&mut self) -> Result<TickActivity> {
        let wait = self.motion.next_action();
        if wait != 0 && wait <= GUARD_US {
            return Ok(TickActivity::MotionBusy);
        }
        self.poll_host()?;
        self.service_switches();
        self.service_state()?;
        Ok(TickActivity::Serviced)
    }

    /// Assemble newline-terminated lines from the host and dispatch each
    /// complete one. Protocol faults are reported and never change state.
    /// Lines over `MAX_LINE_BYTES` are dropped wholesale once the newline
    /// arrives, so the buffer cannot grow without bound.
    fn poll_host(&mut self) -> Result<()> {
        while let Some(byte) = self.link.read_byte() {
            if byte != b'\n' {
                if self.line_buf.len() < MAX_LINE_BYTES {
                    self.line_buf.push(char::from(byte));
                } else {
                    self.line_over = true;
                }
                continue;
            }
            let line = std::mem::take(&mut self.line_buf);
            if std::mem::take(&mut self.line_over) {
                let e = ProtocolError::LineTooLong(MAX_LINE_BYTES);
                tracing::warn!(error = %e, "rejected host line");
                self.link.write_line(&format!("Error: {e}"));
                continue;
            }
            match parse_line(&line) {
                Ok(cmd) => self.dispatch(cmd)?,
                Err(ProtocolError::EmptyLine) => {}
                Err(e) => {
                    tracing::warn!(%line, error = %e, "rejected host line");
                    self.link.write_line(&format!("Error: {e}"));
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, cmd: Command) -> Result<()> {
        if matches!(self.state, TestState::Testing { .. })
            && !matches!(cmd, Command::StopAll | Command::QueryStatus)
        {
            self.link.write_line("Error: test in progress");
            return Ok(());
        }
        match cmd {
            Command::StartTest => self.start_test(),
            Command::StopAll => self.stop_all(),
            Command::Reset => self.start_reset(),
            Command::Calibrate => self.calibrate(),
            Command::SetSpeed(rpm) => {
                self.motion.set_speed(rpm);
                self.motion
                    .set_resolution(resolution_for_rpm(rpm, self.motion_cfg.res_switch_rpm));
                tracing::info!(rpm, "speed set");
            }
            Command::SetInterval(ms) => {
                self.sampler.set_interval_ms(ms);
                tracing::info!(interval_ms = self.sampler.interval_ms(), "interval set");
            }
            Command::QueryStatus => {
                let reply = format!(
                    "R:{},I:{}",
                    self.motion.speed_rpm(),
                    self.sampler.interval_ms()
                );
                self.link.write_line(&reply);
            }
        }
        Ok(())
    }

    fn start_test(&mut self) {
        self.sampler.reset();
        self.motion.set_enabled(true);
        self.motion
            .start_move(-move_len(self.motion_cfg.travel_microsteps));
        self.state = TestState::Testing {
            direction: Direction::Down,
            started_ms: self.now_ms(),
        };
        tracing::info!("test started");
    }

    fn stop_all(&mut self) {
        self.motion.stop();
        self.motion.set_enabled(false);
        self.state = TestState::Idle;
        tracing::info!("stopped");
    }

    fn start_reset(&mut self) {
        self.motion.set_enabled(true);
        if self.switches.lower_engaged() {
            // Already resting on the switch: no rising edge will come, so
            // go straight to the back-off.
            self.motion
                .start_move(move_len(self.motion_cfg.reset_height_microsteps));
            self.state = TestState::Resetting {
                reached_bottom: true,
            };
        } else {
            self.motion
                .start_move(-move_len(self.motion_cfg.travel_microsteps));
            self.state = TestState::Resetting {
                reached_bottom: false,
            };
        }
        tracing::info!("reset started");
    }

    /// The only blocking path: motion is halted first, then the wizard owns
    /// the host link until it finishes or fails.
    fn calibrate(&mut self) {
        self.motion.stop();
        self.motion.set_enabled(false);
        match run_wizard(
            &mut self.cell,
            &mut self.link,
            &mut self.store,
            self.clock.as_ref(),
            &self.cal_cfg,
            self.calibration,
        ) {
            Ok(record) => self.calibration = record,
            Err(e) => {
                tracing::warn!(error = %e, "calibration aborted");
                self.link.write_line(&format!("Error: {e}"));
            }
        }
        self.state = TestState::Idle;
    }

    fn service_switches(&mut self) {
        let lower = self.switches.lower_engaged();
        let upper = self.switches.upper_engaged();
        let scan = self.edges.scan(lower, upper);
        match self.state {
            TestState::Idle => {
                match scan.edge {
                    Edge::Lower => self.jog(Direction::Down),
                    Edge::Upper => self.jog(Direction::Up),
                    Edge::None => {}
                }
                if scan.released {
                    // Jog ends the instant the lever is let go.
                    self.motion.stop();
                    self.motion.set_enabled(false);
                }
            }
            TestState::Testing { direction, .. } => {
                let end_of_travel = match direction {
                    Direction::Down => scan.edge == Edge::Lower,
                    Direction::Up => scan.edge == Edge::Upper,
                };
                if end_of_travel {
                    self.motion.stop();
                    self.motion.set_enabled(false);
                    self.state = TestState::Idle;
                    let msg = match direction {
                        Direction::Down => "Status: BOTTOM REACHED",
                        Direction::Up => "Status: TOP REACHED",
                    };
                    self.link.write_line(msg);
                    tracing::info!(?direction, "test ended at limit");
                }
            }
            TestState::Resetting { reached_bottom } => {
                if !reached_bottom && scan.edge == Edge::Lower {
                    // Touched bottom; back off to the start height.
                    self.motion.stop();
                    self.motion
                        .start_move(move_len(self.motion_cfg.reset_height_microsteps));
                    self.state = TestState::Resetting {
                        reached_bottom: true,
                    };
                }
            }
        }
    }

    fn jog(&mut self, direction: Direction) {
        let steps = move_len(self.motion_cfg.jog_microsteps);
        self.motion.set_enabled(true);
        self.motion.start_move(match direction {
            Direction::Up => steps,
            Direction::Down => -steps,
        });
    }

    fn service_state(&mut self) -> Result<()> {
        match self.state {
            TestState::Idle => {}
            TestState::Testing { .. } => {
                let now_ms = self.now_ms();
                if let Some(sample) = self.sampler.poll(now_ms, &mut self.cell)? {
                    let position = self
                        .motion_cfg
                        .travel_microsteps
                        .saturating_sub(self.motion.remaining());
                    self.link
                        .write_line(&format!("{position},{}", sample.newtons));
                    if self.sampler.is_overload(&sample) {
                        tracing::warn!(grams = sample.raw_units, "overload cutoff");
                        self.motion.stop();
                        self.motion.set_enabled(false);
                        self.state = TestState::Idle;
                        self.link.write_line("Status: Max Load Exceeded");
                    }
                }
            }
            TestState::Resetting { reached_bottom } => {
                if reached_bottom && self.motion.remaining() == 0 {
                    self.motion.set_enabled(false);
                    self.state = TestState::Idle;
                    self.link.write_line("Status: Reset complete");
                    tracing::info!("reset complete");
                }
            }
        }
        Ok(())
    }
}

/// Move lengths come from `u32` config fields; clamp rather than wrap if a
/// pathological value exceeds `i32::MAX` microsteps.
fn move_len(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Builder for [`Controller`]. Every capability is required; configs default.
pub struct ControllerBuilder<M, L, H, N, W> {
    motion: Option<M>,
    cell: Option<L>,
    link: Option<H>,
    store: Option<N>,
    switches: Option<W>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    motion_cfg: MotionCfg,
    sampling_cfg: SamplingCfg,
    cal_cfg: CalibrationCfg,
}

impl<M, L, H, N, W> Default for ControllerBuilder<M, L, H, N, W> {
    fn default() -> Self {
        Self {
            motion: None,
            cell: None,
            link: None,
            store: None,
            switches: None,
            clock: None,
            motion_cfg: MotionCfg::default(),
            sampling_cfg: SamplingCfg::default(),
            cal_cfg: CalibrationCfg::default(),
        }
    }
}

impl<M, L, H, N, W> ControllerBuilder<M, L, H, N, W>
where
    M: Motion,
    L: LoadCell,
    H: HostLink,
    N: NvStore,
    W: LimitSwitches,
{
    #[must_use]
    pub fn motion(mut self, motion: M) -> Self {
        self.motion = Some(motion);
        self
    }

    #[must_use]
    pub fn load_cell(mut self, cell: L) -> Self {
        self.cell = Some(cell);
        self
    }

    #[must_use]
    pub fn link(mut self, link: H) -> Self {
        self.link = Some(link);
        self
    }

    #[must_use]
    pub fn store(mut self, store: N) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn switches(mut self, switches: W) -> Self {
        self.switches = Some(switches);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn motion_cfg(mut self, cfg: MotionCfg) -> Self {
        self.motion_cfg = cfg;
        self
    }

    #[must_use]
    pub fn sampling_cfg(mut self, cfg: SamplingCfg) -> Self {
        self.sampling_cfg = cfg;
        self
    }

    #[must_use]
    pub fn calibration_cfg(mut self, cfg: CalibrationCfg) -> Self {
        self.cal_cfg = cfg;
        self
    }

    /// Validate, load the persisted calibration and apply boot defaults.
    pub fn build(self) -> std::result::Result<Controller<M, L, H, N, W>, BuildError> {
        let mut motion = self.motion.ok_or(BuildError::MissingMotion)?;
        let mut cell = self.cell.ok_or(BuildError::MissingLoadCell)?;
        let link = self.link.ok_or(BuildError::MissingLink)?;
        let mut store = self.store.ok_or(BuildError::MissingStore)?;
        let switches = self.switches.ok_or(BuildError::MissingSwitches)?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock) as Arc<dyn Clock + Send + Sync>);

        if self.motion_cfg.travel_microsteps == 0 {
            return Err(BuildError::InvalidConfig("travel_microsteps must be > 0"));
        }
        if self.motion_cfg.jog_microsteps == 0 {
            return Err(BuildError::InvalidConfig("jog_microsteps must be > 0"));
        }
        if self.sampling_cfg.rated_max_g <= 0.0 {
            return Err(BuildError::InvalidConfig("rated_max_g must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.sampling_cfg.overload_fraction)
            || self.sampling_cfg.overload_fraction == 0.0
        {
            return Err(BuildError::InvalidConfig(
                "overload_fraction must be in (0, 1]",
            ));
        }

        let calibration = CalibrationRecord::load(&mut store, &self.cal_cfg);
        cell.set_scale(calibration.scale);
        cell.set_offset(calibration.offset);

        let rpm = self.motion_cfg.default_rpm;
        motion.set_speed(rpm);
        motion.set_resolution(resolution_for_rpm(rpm, self.motion_cfg.res_switch_rpm));
        motion.set_enabled(false);

        let epoch = clock.now();
        Ok(Controller {
            motion,
            cell,
            link,
            store,
            switches,
            clock,
            epoch,
            motion_cfg: self.motion_cfg,
            sampler: ForceSampler::new(self.sampling_cfg),
            cal_cfg: self.cal_cfg,
            state: TestState::Idle,
            edges: EdgeDetector::new(),
            calibration,
            line_buf: String::new(),
            line_over: false,
        })
    }
}
