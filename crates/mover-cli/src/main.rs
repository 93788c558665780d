#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions)]

//! Entry point for the `mover` binary: parses CLI flags, loads
//! configuration, acquires the single-instance lock, and drives one
//! demote-then-promote pass across every configured mapping.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use mover_model::RunContext;
use mover_runtime::{Driver, PidLock, RuntimeError};
use mover_telemetry::{LogFormat, LoggingConfig, init_logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.to_lowercase(),
        format: LogFormat::infer(),
        log_file: cli.log_file.clone(),
        ..LoggingConfig::default()
    };
    if let Err(source) = init_logging(&logging) {
        eprintln!("error: failed to initialize logging: {source}");
        return ExitCode::FAILURE;
    }

    let config = match mover_config::load(&cli.config) {
        Ok(config) => config,
        Err(source) => {
            error!(error = %source, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let lock = match PidLock::acquire(&cli.lock_file) {
        Ok(lock) => lock,
        Err(RuntimeError::LockHeld { path }) => {
            info!(path = %path.display(), "another instance already holds the lock, exiting");
            return ExitCode::SUCCESS;
        }
        Err(source) => {
            error!(error = %source, "failed to acquire lock");
            return ExitCode::FAILURE;
        }
    };

    for mapping in &config.mappings {
        if let Some(free) = free_bytes(&mapping.source.root) {
            info!(mapping = %mapping.name, free_bytes = free, "starting source tier free space");
        }
    }

    let driver = Driver::from_config(&config);
    let ctx = RunContext::now_real(cli.dry_run);

    let outcomes = match driver.run(&ctx).await {
        Ok(outcomes) => outcomes,
        Err(source) => {
            error!(error = %source, "run failed");
            drop(lock);
            return ExitCode::FAILURE;
        }
    };

    for (name, outcome) in outcomes {
        let mapping = config.mappings.iter().find(|candidate| candidate.name == name);
        let ending_free = mapping.and_then(|mapping| free_bytes(&mapping.source.root));

        info!(
            mapping = %name,
            demoted_groups = outcome.demote.groups_moved,
            bytes_freed_by_demotion = outcome.demote.bytes_freed,
            orphan_bytes_reclaimed_by_demotion = outcome.demote.orphan_bytes_reclaimed,
            promoted_groups = outcome.promote.groups_moved,
            bytes_consumed_by_promotion = outcome.promote.bytes_freed,
            orphan_bytes_reclaimed_by_promotion = outcome.promote.orphan_bytes_reclaimed,
            ending_free_bytes = ending_free,
            dry_run = cli.dry_run,
            "mapping run summary",
        );
    }

    drop(lock);
    ExitCode::SUCCESS
}

/// Bytes available on the filesystem backing `root`, or `None` if it
/// could not be statted (e.g. the tier root does not exist).
fn free_bytes(root: &Path) -> Option<u64> {
    let stats = nix::sys::statvfs::statvfs(root).ok()?;
    Some(stats.fragment_size().saturating_mul(stats.blocks_available()))
}
