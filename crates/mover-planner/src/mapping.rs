//! A single source/destination tier pair plus the policy and external
//! clients governing moves between them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use globset::GlobSet;
use mover_clients::{MediaPlayer, SeedingClient};
use mover_model::{RunContext, Tier, TierUsage};
use tracing::warn;

use crate::error::{PlannerError, PlannerResult};

/// One tier mapping: a fast/slow tier pair, the thresholds and age
/// window governing moves, and the external systems that may cover
/// files under it.
pub struct Mapping {
    /// Human-readable label used in logs.
    pub name: String,
    /// Fast tier, demoted from and promoted into.
    pub source: Tier,
    /// Slow tier, demoted into and promoted from.
    pub destination: Tier,
    /// Demote once source usage meets or exceeds this percent.
    pub demote_threshold_percent: f64,
    /// Promote while it would keep source usage under this percent.
    /// `None` disables promotion for this mapping.
    pub promote_threshold_percent: Option<f64>,
    /// Minimum file age before demotion eligibility.
    pub min_age: Duration,
    /// Maximum file age before demotion eligibility ends.
    pub max_age: Duration,
    /// Compiled ignore pattern set, matched against paths relative to
    /// `source`.
    pub ignore: GlobSet,
    /// Seed clients that may cover files under this mapping.
    pub seeders: Vec<Arc<dyn SeedingClient>>,
    /// Media players that may cover files under this mapping.
    pub media_players: Vec<Arc<dyn MediaPlayer>>,
}

impl Mapping {
    /// Whether `path` (relative to `source`) matches an ignore pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.strip_prefix(&self.source.root)
            .map(|relative| self.ignore.is_match(relative))
            .unwrap_or(false)
    }

    /// Current live usage of the source tier's filesystem.
    ///
    /// # Errors
    /// Returns [`PlannerError::Capacity`] if `statvfs` fails (e.g. the
    /// tier root does not exist).
    pub fn source_usage(&self) -> PlannerResult<TierUsage> {
        tier_usage(&self.source.root)
    }

    /// Current live usage of the destination tier's filesystem.
    ///
    /// # Errors
    /// Returns [`PlannerError::Capacity`] if `statvfs` fails.
    pub fn destination_usage(&self) -> PlannerResult<TierUsage> {
        tier_usage(&self.destination.root)
    }

    /// Whether any attached media player reports active playback for
    /// `path`. Every player is raced concurrently within this task; the
    /// moment one reports `true` the remaining, still-pending checks are
    /// dropped (and therefore cancelled at their next await point)
    /// rather than awaited to completion.
    ///
    /// An unreachable media player is logged and contributes no signal
    /// rather than aborting the run; only a `true` result from some
    /// other player, or a final `false`, is returned.
    pub async fn is_active(&self, path: &Path, ctx: &RunContext) -> bool {
        if self.media_players.is_empty() {
            return false;
        }

        let mut pending: FuturesUnordered<_> = self
            .media_players
            .iter()
            .map(|player| player.is_active(path, ctx))
            .collect();

        while let Some(result) = pending.next().await {
            match result {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "media player unreachable checking active playback"),
            }
        }

        false
    }
}

#[cfg(unix)]
fn tier_usage(root: &Path) -> PlannerResult<TierUsage> {
    let stats = nix::sys::statvfs::statvfs(root).map_err(|errno| PlannerError::Capacity {
        root: root.to_path_buf(),
        source: std::io::Error::other(errno.to_string()),
    })?;
    let block_size = stats.fragment_size();
    let total_bytes = block_size.saturating_mul(stats.blocks());
    let available_bytes = block_size.saturating_mul(stats.blocks_available());
    let used_bytes = total_bytes.saturating_sub(available_bytes);
    Ok(TierUsage {
        total_bytes,
        used_bytes,
    })
}

#[cfg(not(unix))]
fn tier_usage(root: &Path) -> PlannerResult<TierUsage> {
    let _ = root;
    Ok(TierUsage {
        total_bytes: 0,
        used_bytes: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::GlobSetBuilder;

    fn empty_mapping(source: &Path, destination: &Path) -> Mapping {
        Mapping {
            name: "test".to_string(),
            source: Tier::new("source", source),
            destination: Tier::new("destination", destination),
            demote_threshold_percent: 90.0,
            promote_threshold_percent: None,
            min_age: Duration::from_secs(0),
            max_age: Duration::from_secs(3_600_000),
            ignore: GlobSetBuilder::new().build().expect("empty globset"),
            seeders: Vec::new(),
            media_players: Vec::new(),
        }
    }

    #[test]
    fn is_ignored_defaults_to_false_with_no_patterns() {
        let mapping = empty_mapping(Path::new("/fast"), Path::new("/slow"));
        assert!(!mapping.is_ignored(Path::new("/fast/movie.mkv")));
    }

    #[tokio::test]
    async fn is_active_with_no_players_is_false() {
        let mapping = empty_mapping(Path::new("/fast"), Path::new("/slow"));
        let ctx = RunContext::new(chrono::Utc::now(), true);
        assert!(!mapping.is_active(Path::new("/fast/a.mkv"), &ctx).await);
    }
}
