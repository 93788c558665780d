//! Command-line surface for the `mover` binary.

use std::path::PathBuf;

use clap::Parser;

/// Default pidfile path when `--lock-file` is not given.
pub const DEFAULT_LOCK_FILE: &str = "/tmp/cache_mover.lock";

/// Move hardlinked media between a fast and a slow storage tier,
/// respecting active seeds, active playback, and configured thresholds.
#[derive(Debug, Parser)]
#[command(name = "mover", version, about)]
pub struct Cli {
    /// Path to the YAML configuration document.
    #[arg(long)]
    pub config: PathBuf,

    /// Plan moves and log what would happen, without touching the
    /// filesystem or pausing/resuming any seed.
    #[arg(long)]
    pub dry_run: bool,

    /// Minimum log level to emit.
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Optional path to a rotating log file written alongside stdout.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Pidfile used to guarantee a single concurrent run.
    #[arg(long, default_value = DEFAULT_LOCK_FILE)]
    pub lock_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_config_flag() {
        let cli = Cli::parse_from(["mover", "--config", "/etc/mover.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/mover.yaml"));
        assert!(!cli.dry_run);
        assert_eq!(cli.log_level, "INFO");
        assert_eq!(cli.lock_file, PathBuf::from(DEFAULT_LOCK_FILE));
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::parse_from([
            "mover",
            "--config",
            "/etc/mover.yaml",
            "--dry-run",
            "--log-level",
            "DEBUG",
            "--log-file",
            "/var/log/mover.log",
            "--lock-file",
            "/var/run/mover.lock",
        ]);
        assert!(cli.dry_run);
        assert_eq!(cli.log_level, "DEBUG");
        assert_eq!(cli.log_file, Some(PathBuf::from("/var/log/mover.log")));
        assert_eq!(cli.lock_file, PathBuf::from("/var/run/mover.lock"));
    }
}
