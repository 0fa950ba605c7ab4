#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Peel fixture CLI: loads the config, wires the kernel to the simulated
//! rig and bridges the serial protocol to the terminal.

mod cli;
mod link;
mod run;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, FILE_GUARD};

fn init_logging(args: &Cli, logging: &peel_config::Logging) -> eyre::Result<()> {
    let level = logging.level.as_deref().unwrap_or(&args.log_level);
    let filter = EnvFilter::try_new(level).wrap_err_with(|| format!("bad log level {level:?}"))?;

    match &logging.file {
        Some(path) => {
            let rotation = logging.rotation.as_deref().unwrap_or("never");
            let dir = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file = std::path::Path::new(path)
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {path}"))?;
            let appender = match rotation {
                "daily" => tracing_appender::rolling::daily(dir, file),
                "hourly" => tracing_appender::rolling::hourly(dir, file),
                "never" => tracing_appender::rolling::never(dir, file),
                other => eyre::bail!("logging.rotation must be never|daily|hourly, got {other}"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .json()
                .init();
        }
        None if args.json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let cfg = peel_config::load_path(&args.config)?;
    init_logging(&args, &cfg.logging)?;

    match &args.cmd {
        Commands::Run {
            force_log,
            nv,
            duration_ms,
        } => run::run(&cfg, force_log.as_deref(), nv.as_deref(), *duration_ms),
        Commands::SelfCheck => run::self_check(&cfg),
    }
}
