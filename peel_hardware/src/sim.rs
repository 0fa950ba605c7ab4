//! Simulated fixture: a shared mechanical model behind the pulse, switch and
//! load-cell interfaces.
//!
//! The model is a carriage on a vertical axis. Position is counted in pulses
//! from the top; pulses move it one unit in the set direction while the
//! driver is enabled. The limit switches engage at the ends of travel and
//! the load cell reads a tension that grows as the carriage pulls past the
//! specimen slack.

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use peel_traits::{Direction, LimitSwitches, LoadCell, MicrostepRes, StepPulser};

/// Mechanical parameters of the simulated fixture.
#[derive(Debug, Clone)]
pub struct SimRigCfg {
    /// Carriage position at the upper switch (pulses from origin).
    pub upper_at: i64,
    /// Carriage position at the lower switch.
    pub lower_at: i64,
    /// Starting carriage position.
    pub start_at: i64,
    /// Free travel before the specimen takes load, in pulses.
    pub slack_pulses: i64,
    /// Raw ADC counts added per pulse of tension.
    pub counts_per_pulse: f32,
    /// Raw ADC counts with no load applied.
    pub baseline_counts: f32,
}

impl Default for SimRigCfg {
    fn default() -> Self {
        Self {
            upper_at: 0,
            lower_at: -200_000,
            start_at: -1000,
            slack_pulses: 2000,
            counts_per_pulse: 0.05,
            baseline_counts: 8000.0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    cfg: SimRigCfg,
    position: i64,
    direction: Direction,
    enabled: bool,
    resolution: MicrostepRes,
}

impl SimState {
    /// Pulses of tension currently on the specimen.
    fn tension(&self) -> i64 {
        (self.cfg.start_at - self.position - self.cfg.slack_pulses).max(0)
    }

    fn raw_counts(&self) -> f32 {
        self.cfg.baseline_counts + self.tension() as f32 * self.cfg.counts_per_pulse
    }
}

/// Handle to the shared model. Clone freely; the fixture is single-threaded.
pub struct SimRig {
    state: Rc<RefCell<SimState>>,
}

impl SimRig {
    pub fn new(cfg: SimRigCfg) -> Self {
        let start = cfg.start_at;
        Self {
            state: Rc::new(RefCell::new(SimState {
                cfg,
                position: start,
                direction: Direction::Down,
                enabled: false,
                resolution: MicrostepRes::Sixteenth,
            })),
        }
    }

    pub fn pulser(&self) -> SimPulser {
        SimPulser {
            state: Rc::clone(&self.state),
        }
    }

    pub fn switches(&self) -> SimSwitches {
        SimSwitches {
            state: Rc::clone(&self.state),
        }
    }

    pub fn load_cell(&self) -> SimLoadCell {
        SimLoadCell {
            state: Rc::clone(&self.state),
            scale: 1.0,
            offset: 0,
        }
    }

    pub fn position(&self) -> i64 {
        self.state.borrow().position
    }

    /// Teleport the carriage, e.g. to stage a scenario.
    pub fn set_position(&self, position: i64) {
        self.state.borrow_mut().position = position;
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new(SimRigCfg::default())
    }
}

pub struct SimPulser {
    state: Rc<RefCell<SimState>>,
}

impl StepPulser for SimPulser {
    fn set_direction(&mut self, dir: Direction) {
        self.state.borrow_mut().direction = dir;
    }

    fn pulse(&mut self) {
        let mut s = self.state.borrow_mut();
        if !s.enabled {
            return;
        }
        let delta = match s.direction {
            Direction::Up => 1,
            Direction::Down => -1,
        };
        // The frame is rigid; travel hard-stops just past the switches.
        let lo = s.cfg.lower_at - 100;
        let hi = s.cfg.upper_at + 100;
        s.position = (s.position + delta).clamp(lo, hi);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn set_resolution(&mut self, res: MicrostepRes) {
        self.state.borrow_mut().resolution = res;
    }
}

pub struct SimSwitches {
    state: Rc<RefCell<SimState>>,
}

impl LimitSwitches for SimSwitches {
    fn lower_engaged(&mut self) -> bool {
        let s = self.state.borrow();
        s.position <= s.cfg.lower_at
    }

    fn upper_engaged(&mut self) -> bool {
        let s = self.state.borrow();
        s.position >= s.cfg.upper_at
    }
}

/// HX711-style front end over the model: raw counts from the mechanical
/// tension, calibrated units via the usual (raw - offset) / scale.
pub struct SimLoadCell {
    state: Rc<RefCell<SimState>>,
    scale: f32,
    offset: i32,
}

impl LoadCell for SimLoadCell {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn read_units(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>> {
        let raw = self.state.borrow().raw_counts();
        Ok((raw - self.offset as f32) / self.scale)
    }

    fn read_average(&mut self, samples: u8) -> Result<f32, Box<dyn Error + Send + Sync>> {
        // The model is noiseless, so the average is a single read.
        let _ = samples;
        Ok(self.state.borrow().raw_counts())
    }

    fn tare(&mut self, samples: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        let avg = self.read_average(samples)?;
        self.offset = avg.round() as i32;
        tracing::debug!(offset = self.offset, "sim load cell tared");
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn pulses_move_only_while_enabled() {
        let rig = SimRig::default();
        let mut p = rig.pulser();
        p.set_direction(Direction::Down);
        p.pulse();
        assert_eq!(rig.position(), -1000);

        p.set_enabled(true);
        p.pulse();
        p.pulse();
        assert_eq!(rig.position(), -1002);

        p.set_direction(Direction::Up);
        p.pulse();
        assert_eq!(rig.position(), -1001);
    }

    #[rstest]
    #[case(-1000, false, false)]
    #[case(-199_999, false, false)]
    #[case(-200_000, true, false)]
    #[case(-200_050, true, false)]
    #[case(0, false, true)]
    fn switches_engage_at_ends_of_travel(
        #[case] position: i64,
        #[case] lower: bool,
        #[case] upper: bool,
    ) {
        let rig = SimRig::default();
        let mut sw = rig.switches();
        rig.set_position(position);
        assert_eq!(sw.lower_engaged(), lower);
        assert_eq!(sw.upper_engaged(), upper);
    }

    #[test]
    fn tension_builds_past_the_slack() {
        let rig = SimRig::default();
        let mut cell = rig.load_cell();

        // Inside the slack: baseline only.
        rig.set_position(-2000);
        let unloaded = cell.read_units().unwrap();
        assert!((unloaded - 8000.0).abs() < 1e-3);

        // 1000 pulses of tension at 0.05 counts each.
        rig.set_position(-4000);
        let loaded = cell.read_units().unwrap();
        assert!((loaded - 8050.0).abs() < 1e-3);
    }

    #[test]
    fn tare_and_scale_calibrate_the_reading() {
        let rig = SimRig::default();
        let mut cell = rig.load_cell();
        rig.set_position(-2000);
        cell.tare(20).unwrap();
        cell.set_scale(0.05); // one gram per pulse of tension

        rig.set_position(-3500); // 500 pulses of tension
        let grams = cell.read_units().unwrap();
        assert!((grams - 500.0).abs() < 1e-3);
    }
}
