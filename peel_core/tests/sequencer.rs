//! End-to-end state machine coverage against the in-memory fakes: command
//! dispatch, limit handling, force logging, overload and reset.

use std::sync::Arc;

use peel_core::mocks::{FakeMotion, LeverSwitches, MemStore, PipeLink, ScriptedCell, TestClock};
use peel_core::{
    CalibrationRecord, Controller, ControllerBuilder, MotionCfg, TestState,
};
use peel_traits::Motion;

type Rig = Controller<FakeMotion, ScriptedCell, PipeLink, MemStore, LeverSwitches>;

const TRAVEL: u32 = 160_000;
const JOG: u32 = 800;
const RESET_HEIGHT: u32 = 1600;

/// Build a controller over shared handles with an identity calibration
/// (scale 1, offset 0) already persisted, so scripted raw values read back
/// as grams unchanged.
fn rig(cell: ScriptedCell) -> (Rig, FakeMotion, PipeLink, LeverSwitches, TestClock) {
    let motion = FakeMotion::new();
    let link = PipeLink::new();
    let switches = LeverSwitches::new();
    let clock = TestClock::new();
    let mut store = MemStore::new();
    CalibrationRecord {
        scale: 1.0,
        offset: 0,
    }
    .save(&mut store);
    let controller = ControllerBuilder::default()
        .motion(motion.clone())
        .load_cell(cell)
        .link(link.clone())
        .store(store)
        .switches(switches.clone())
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("valid rig");
    (controller, motion, link, switches, clock)
}

fn force_grams(line: &str) -> Option<(u32, f32)> {
    let (pos, newtons) = line.split_once(',')?;
    let newtons: f32 = newtons.parse().ok()?;
    Some((pos.parse().ok()?, newtons / 9.80665 * 1000.0))
}

#[test]
fn start_test_drives_full_travel_down_and_logs_force() {
    let (mut c, motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(500.0));
    link.push_line("A");
    c.tick().unwrap();

    assert!(matches!(c.state(), TestState::Testing { .. }));
    assert_eq!(motion.last_move(), Some(-(TRAVEL as i32)));

    // First sample lands on the same tick; position is still zero.
    let out = link.take_output();
    assert_eq!(out.len(), 1);
    let (pos, grams) = force_grams(&out[0]).expect("force line");
    assert_eq!(pos, 0);
    assert!((grams - 500.0).abs() < 0.01);
}

#[test]
fn force_log_position_tracks_progress() {
    let (mut c, motion, mut link, _sw, clock) = rig(ScriptedCell::constant(500.0));
    link.push_line("A");
    c.tick().unwrap();
    let _ = link.take_output();

    // Pretend 40k microsteps have been emitted, then let the interval lapse.
    let remaining = TRAVEL - 40_000;
    motion.start_move_handle(-(remaining as i32));
    clock.advance(std::time::Duration::from_millis(1000));
    c.tick().unwrap();

    let out = link.take_output();
    let (pos, _) = force_grams(&out[0]).expect("force line");
    assert_eq!(pos, 40_000);
}

#[test]
fn overload_cuts_motion_and_reports() {
    // 900 g exceeds 80 % of the 1000 g rating.
    let (mut c, motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(900.0));
    link.push_line("A");
    c.tick().unwrap();

    assert_eq!(c.state(), TestState::Idle);
    assert!(motion.stops() >= 1);
    assert!(!motion.enabled());
    let out = link.take_output();
    assert_eq!(out.last().map(String::as_str), Some("Status: Max Load Exceeded"));
}

#[test]
fn boundary_load_below_cutoff_keeps_testing() {
    let (mut c, _motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(799.0));
    link.push_line("A");
    c.tick().unwrap();
    assert!(matches!(c.state(), TestState::Testing { .. }));
}

#[test]
fn lower_limit_ends_a_downward_test() {
    let (mut c, motion, mut link, switches, _clock) = rig(ScriptedCell::constant(100.0));
    link.push_line("A");
    c.tick().unwrap();
    let _ = link.take_output();

    switches.set_lower(true);
    c.tick().unwrap();

    assert_eq!(c.state(), TestState::Idle);
    assert!(motion.stops() >= 1);
    let out = link.take_output();
    assert!(out.iter().any(|l| l == "Status: BOTTOM REACHED"));
}

#[test]
fn stop_command_is_honored_mid_test() {
    let (mut c, motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(100.0));
    link.push_line("A");
    c.tick().unwrap();
    link.push_line("B");
    c.tick().unwrap();

    assert_eq!(c.state(), TestState::Idle);
    assert!(motion.stops() >= 1);
    assert!(!motion.enabled());
}

#[test]
fn only_stop_and_status_are_honored_mid_test() {
    let (mut c, motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(100.0));
    link.push_line("A");
    c.tick().unwrap();
    let _ = link.take_output();

    link.push_line("R50");
    link.push_line("C");
    link.push_line("S");
    c.tick().unwrap();

    let out = link.take_output();
    assert_eq!(
        out.iter().filter(|l| *l == "Error: test in progress").count(),
        2
    );
    assert!(out.iter().any(|l| l == "R:100,I:1000"));
    assert_eq!(motion.speed_rpm(), 100); // R50 did not land
    assert!(matches!(c.state(), TestState::Testing { .. }));
}

#[test]
fn reset_touches_bottom_backs_off_and_completes() {
    let (mut c, motion, mut link, switches, _clock) = rig(ScriptedCell::constant(0.0));
    link.push_line("C");
    c.tick().unwrap();
    assert_eq!(
        c.state(),
        TestState::Resetting {
            reached_bottom: false
        }
    );
    assert_eq!(motion.last_move(), Some(-(TRAVEL as i32)));

    switches.set_lower(true);
    c.tick().unwrap();
    assert_eq!(
        c.state(),
        TestState::Resetting {
            reached_bottom: true
        }
    );
    assert_eq!(motion.last_move(), Some(RESET_HEIGHT as i32));

    // Switch releases on the way up; that must not cancel the back-off.
    switches.set_lower(false);
    c.tick().unwrap();
    assert_eq!(
        c.state(),
        TestState::Resetting {
            reached_bottom: true
        }
    );

    motion.finish_move();
    c.tick().unwrap();
    assert_eq!(c.state(), TestState::Idle);
    assert!(!motion.enabled());
    assert!(link.output().iter().any(|l| l == "Status: Reset complete"));
}

#[test]
fn reset_from_an_engaged_lower_switch_backs_off_immediately() {
    let (mut c, motion, mut link, switches, _clock) = rig(ScriptedCell::constant(0.0));
    switches.set_lower(true);
    link.push_line("C");
    c.tick().unwrap();

    // No rising edge will ever come; the touch is taken as already done.
    assert_eq!(
        c.state(),
        TestState::Resetting {
            reached_bottom: true
        }
    );
    assert_eq!(motion.last_move(), Some(RESET_HEIGHT as i32));

    motion.finish_move();
    c.tick().unwrap();
    assert_eq!(c.state(), TestState::Idle);
    assert!(link.output().iter().any(|l| l == "Status: Reset complete"));
}

#[test]
fn idle_switch_edges_jog_and_release_stops() {
    let (mut c, motion, _link, switches, _clock) = rig(ScriptedCell::constant(0.0));

    switches.set_lower(true);
    c.tick().unwrap();
    assert_eq!(motion.last_move(), Some(-(JOG as i32)));
    assert!(motion.enabled());

    // Held switch keeps the single jog; no re-trigger.
    c.tick().unwrap();
    assert_eq!(motion.moves().len(), 1);

    switches.set_lower(false);
    let stops_before = motion.stops();
    c.tick().unwrap();
    assert_eq!(motion.stops(), stops_before + 1);
    assert!(!motion.enabled());

    switches.set_upper(true);
    c.tick().unwrap();
    assert_eq!(motion.last_move(), Some(JOG as i32));
}

#[test]
fn calibrate_command_runs_the_wizard_to_completion() {
    let mut cell = ScriptedCell::sequence(vec![8000.0; 20]);
    cell.append(vec![10500.0; 20]);
    let (mut c, motion, mut link, _sw, _clock) = rig(cell);

    link.push_line("D");
    link.push_boundary();
    link.push_bytes(b"x");
    link.push_boundary();
    link.push_bytes(b"500\n");
    c.tick().unwrap();

    assert_eq!(c.state(), TestState::Idle);
    assert!(!motion.enabled());
    let rec = c.calibration();
    assert_eq!(rec.offset, 8000);
    assert!((rec.scale - 5.0).abs() < 1e-6);
    assert!(link.output().iter().any(|l| l == "Finished!"));
}

#[test]
fn failed_calibration_keeps_the_previous_record() {
    // No operator input: the wizard times out.
    let (mut c, _motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(0.0));
    let before = c.calibration();
    link.push_line("D");
    c.tick().unwrap();

    assert_eq!(c.calibration(), before);
    assert!(
        link.output()
            .iter()
            .any(|l| l.starts_with("Error: timed out"))
    );
}

#[test]
fn speed_change_applies_to_the_next_move() {
    let (mut c, motion, mut link, switches, _clock) = rig(ScriptedCell::constant(0.0));
    link.push_line("R30");
    c.tick().unwrap();
    assert_eq!(motion.speed_rpm(), 30);

    switches.set_upper(true);
    c.tick().unwrap();
    assert_eq!(motion.last_move(), Some(JOG as i32));
}

#[test]
fn split_command_lines_are_assembled_across_ticks() {
    let (mut c, motion, mut link, _sw, _clock) = rig(ScriptedCell::constant(0.0));
    link.push_bytes(b"R2");
    c.tick().unwrap();
    assert_eq!(motion.speed_rpm(), 100); // nothing dispatched yet
    link.push_bytes(b"50\n");
    c.tick().unwrap();
    assert_eq!(motion.speed_rpm(), 250);
}

#[test]
fn custom_motion_cfg_drives_move_lengths() {
    let motion = FakeMotion::new();
    let mut link = PipeLink::new();
    let switches = LeverSwitches::new();
    let mut c: Rig = ControllerBuilder::default()
        .motion(motion.clone())
        .load_cell(ScriptedCell::constant(0.0))
        .link(link.clone())
        .store(MemStore::new())
        .switches(switches.clone())
        .clock(Arc::new(TestClock::new()))
        .motion_cfg(MotionCfg {
            travel_microsteps: 1000,
            jog_microsteps: 10,
            ..MotionCfg::default()
        })
        .build()
        .expect("valid rig");

    link.push_line("C");
    c.tick().unwrap();
    assert_eq!(motion.last_move(), Some(-1000));

    link.push_line("B");
    c.tick().unwrap();
    switches.set_upper(true);
    c.tick().unwrap();
    assert_eq!(motion.last_move(), Some(10));
}
