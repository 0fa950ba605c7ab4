#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control kernel for a motorized peel test fixture (hardware-agnostic).
//!
//! All hardware access goes through the capability traits in `peel_traits`;
//! this crate holds the logic that turns host commands, limit-switch levels
//! and load-cell readings into motion and force logs.
//!
//! ## Architecture
//!
//! - **Motion**: non-blocking constant-speed pulse scheduling (`motion`)
//! - **Commands**: the one-letter serial protocol (`command`)
//! - **Sequencer**: the cooperative tick and test state machine (`sequencer`)
//! - **Force**: interval-gated sampling and the overload cutoff (`force`)
//! - **Calibration**: the blocking two-phase wizard (`calibrate`) and the
//!   persisted scale/offset record (`nv`)

pub mod calibrate;
pub mod command;
pub mod config;
pub mod edge;
pub mod error;
pub mod force;
pub mod mocks;
pub mod motion;
pub mod nv;
pub mod sequencer;
pub mod status;
pub mod util;

pub use calibrate::run_wizard;
pub use command::{Command, parse_line};
pub use config::{CalibrationCfg, MotionCfg, SamplingCfg, resolution_for_rpm};
pub use edge::{Edge, EdgeDetector, SwitchScan};
pub use error::{BuildError, CalibrationError, KernelError, ProtocolError, Result};
pub use force::{ForceSample, ForceSampler};
pub use motion::MotionEngine;
pub use nv::CalibrationRecord;
pub use sequencer::{Controller, ControllerBuilder};
pub use status::{TestState, TickActivity};
