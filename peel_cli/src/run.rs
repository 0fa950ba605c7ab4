//! Kernel assembly and the top-level run loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use peel_core::{
    CalibrationCfg, Controller, ControllerBuilder, MotionCfg, MotionEngine, SamplingCfg,
    TickActivity, resolution_for_rpm,
};
use peel_hardware::{FileNvStore, MemNvStore, SimRig, SimRigCfg};
use peel_traits::clock::{Clock, MonotonicClock};
use peel_traits::{HostLink, NvStore};

use crate::link::StdioLink;

fn motion_cfg(t: &peel_config::MotionToml) -> MotionCfg {
    MotionCfg {
        steps_per_rev: t.steps_per_rev,
        default_rpm: t.default_rpm,
        res_switch_rpm: t.res_switch_rpm,
        jog_microsteps: t.jog_microsteps,
        travel_microsteps: t.travel_microsteps,
        reset_height_microsteps: t.reset_height_microsteps,
    }
}

fn sampling_cfg(t: &peel_config::SamplingToml) -> SamplingCfg {
    SamplingCfg {
        interval_ms: t.interval_ms,
        rated_max_g: t.rated_max_g,
        overload_fraction: t.overload_fraction,
    }
}

fn calibration_cfg(t: &peel_config::CalibrationToml) -> CalibrationCfg {
    CalibrationCfg {
        samples: t.samples,
        operator_timeout_ms: t.operator_timeout_ms,
        max_weight_digits: t.max_weight_digits,
        default_scale: t.default_scale,
        default_offset: t.default_offset,
    }
}

fn build_controller<H: HostLink>(
    cfg: &peel_config::Config,
    link: H,
    store: Box<dyn NvStore>,
) -> eyre::Result<
    Controller<MotionEngine<peel_hardware::SimPulser>, peel_hardware::SimLoadCell, H, Box<dyn NvStore>, peel_hardware::SimSwitches>,
> {
    let rig = SimRig::new(SimRigCfg::default());
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock);
    let motion = MotionEngine::new(
        rig.pulser(),
        Arc::clone(&clock),
        cfg.motion.steps_per_rev,
        cfg.motion.default_rpm,
        resolution_for_rpm(cfg.motion.default_rpm, cfg.motion.res_switch_rpm),
    );
    ControllerBuilder::default()
        .motion(motion)
        .load_cell(rig.load_cell())
        .link(link)
        .store(store)
        .switches(rig.switches())
        .clock(clock)
        .motion_cfg(motion_cfg(&cfg.motion))
        .sampling_cfg(sampling_cfg(&cfg.sampling))
        .calibration_cfg(calibration_cfg(&cfg.calibration))
        .build()
        .map_err(|e| eyre::eyre!("assemble controller: {e}"))
}

fn open_store(nv: Option<&Path>) -> eyre::Result<Box<dyn NvStore>> {
    Ok(match nv {
        Some(path) => Box::new(
            FileNvStore::open(path).wrap_err_with(|| format!("open calibration image {path:?}"))?,
        ),
        None => Box::new(MemNvStore::new()),
    })
}

/// Bridge the serial protocol to stdin/stdout and tick until shutdown.
pub fn run(
    cfg: &peel_config::Config,
    force_log: Option<&Path>,
    nv: Option<&Path>,
    duration_ms: Option<u64>,
) -> eyre::Result<()> {
    let link = StdioLink::spawn(force_log)?;
    let mut controller = build_controller(cfg, link, open_store(nv)?)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let deadline = duration_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    tracing::info!("fixture running, send commands on stdin");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if let Some(d) = deadline
            && Instant::now() >= d
        {
            break;
        }
        match controller.tick()? {
            // A pulse is imminent; go straight back to the engine.
            TickActivity::MotionBusy => std::hint::spin_loop(),
            TickActivity::Serviced => std::thread::sleep(Duration::from_micros(200)),
        }
    }
    Ok(())
}

/// Boot the kernel against the rig and make sure it answers a status query.
pub fn self_check(cfg: &peel_config::Config) -> eyre::Result<()> {
    let mut link = peel_core::mocks::PipeLink::new();
    link.push_line("S");
    let mut controller = build_controller(cfg, link.clone(), open_store(None)?)?;
    for _ in 0..100 {
        controller.tick()?;
    }
    let expected = format!(
        "R:{},I:{}",
        cfg.motion.default_rpm, cfg.sampling.interval_ms
    );
    if !link.output().iter().any(|l| *l == expected) {
        eyre::bail!("kernel did not answer the status query");
    }
    println!("self-check ok");
    Ok(())
}
