#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Fixture hardware backends for the capability traits in `peel_traits`.
//!
//! Only the simulated rig is built here; real GPIO backends plug in behind
//! the same traits without touching the kernel.

pub mod error;
pub mod nv;
pub mod sim;

pub use error::{HwError, Result};
pub use nv::{FileNvStore, MemNvStore};
pub use sim::{SimLoadCell, SimPulser, SimRig, SimRigCfg, SimSwitches};
