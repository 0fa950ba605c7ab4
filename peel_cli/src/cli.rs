//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "peel", version, about = "Peel test fixture CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/peel_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fixture kernel against the simulated rig, bridging the
    /// serial protocol to stdin/stdout
    Run {
        /// Append force samples to this CSV file (position,newtons)
        #[arg(long, value_name = "FILE")]
        force_log: Option<PathBuf>,
        /// Calibration image file; omitted means volatile storage
        #[arg(long, value_name = "FILE")]
        nv: Option<PathBuf>,
        /// Exit after this many milliseconds (default: run until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Quick health check (kernel boots and answers a status query)
    SelfCheck,
}
