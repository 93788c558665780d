//! Demotion and promotion plan construction for a single [`Mapping`].

use std::collections::HashMap;
use std::path::PathBuf;

use futures_util::StreamExt;
use futures_util::stream::{self};
use mover_clients::{MediaPlayer, SeedingClient};
use mover_model::{FileEntry, InodeGroup, MediaSignal, MovePlan, PlannedMove, RunContext, SortKey};
use tracing::{debug, instrument, warn};

use crate::error::PlannerResult;
use crate::mapping::Mapping;
use crate::walk::walk_and_group;

/// Upper bound on concurrent per-group signal/active checks, so a mapping
/// with thousands of files does not open thousands of sockets at once.
fn concurrency_limit() -> usize {
    std::thread::available_parallelism()
        .map_or(4, std::num::NonZeroUsize::get)
        .min(4)
}

/// Build the demotion plan for `mapping`: the ordered set of inode groups
/// to move from its source tier to its destination tier so that source
/// usage drops back under `demote_threshold_percent`.
///
/// An unreachable seed client or media player is logged and contributes
/// no signal for this run rather than aborting it.
///
/// # Errors
/// Returns an error if the source tree cannot be walked or tier
/// capacity cannot be read.
#[instrument(skip(mapping, ctx), fields(mapping = %mapping.name))]
pub async fn plan_demotion(mapping: &Mapping, ctx: &RunContext) -> PlannerResult<MovePlan> {
    let mut plan = MovePlan::default();

    let usage = mapping.source_usage()?;
    if usage.percent_used() < mapping.demote_threshold_percent {
        debug!(percent_used = usage.percent_used(), "source tier under demote threshold, nothing to plan");
        return Ok(plan);
    }

    for seeder in &mapping.seeders {
        if let Err(err) = seeder.scan(&mapping.source.root, ctx).await {
            warn!(root = %mapping.source.root.display(), error = %err, "seed client unreachable, treating as no torrents");
        }
    }

    let groups = walk_and_group(&mapping.source.root, ctx)?;
    let eligible: Vec<InodeGroup> = groups
        .into_iter()
        .filter(|group| !group.paths().any(|path| mapping.is_ignored(path)))
        .filter(|group| within_age_window(mapping, group, ctx))
        .collect();

    let limit = concurrency_limit();
    let mut scored: Vec<(InodeGroup, SortKey)> = stream::iter(eligible)
        .map(|group| async move {
            let active = mapping.is_active(&group.leader.path, ctx).await;
            if active {
                return None;
            }
            let seeding: Vec<_> = mapping
                .seeders
                .iter()
                .flat_map(|seeder| seeder.sort_signals(&group.leader.path, ctx))
                .collect();
            let media = mapping
                .media_players
                .iter()
                .map(|player| player.sort_signal(&group.leader.path))
                .fold(MediaSignal::absent(), MediaSignal::merge);
            let sort_key = SortKey::build(&group, media, &seeding);
            Some((group, sort_key))
        })
        .buffer_unordered(limit)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    scored.sort_by_key(|(_, key)| *key);

    let mut projected_used = usage.used_bytes;
    #[allow(clippy::cast_precision_loss)]
    let target = usage.total_bytes as f64 * mapping.demote_threshold_percent / 100.0;
    for (group, sort_key) in scored {
        #[allow(clippy::cast_precision_loss)]
        let projected_used_f64 = projected_used as f64;
        if projected_used_f64 < target {
            break;
        }
        projected_used = projected_used.saturating_sub(group.size_bytes());
        if !ctx.dry_run() {
            for seeder in &mapping.seeders {
                if let Err(err) = seeder.pause(&group.leader.path, ctx).await {
                    warn!(path = %group.leader.path.display(), error = %err, "failed to pause seeder ahead of move");
                }
            }
        }
        plan.push(PlannedMove {
            group,
            destination_root: mapping.destination.root.clone(),
            sort_key,
        });
    }

    Ok(plan)
}

fn within_age_window(mapping: &Mapping, group: &InodeGroup, ctx: &RunContext) -> bool {
    let Some(birth) = group.min_birth_time() else {
        return true;
    };
    let age = ctx.now().signed_duration_since(birth);
    let Ok(age) = age.to_std() else {
        return true;
    };
    age >= mapping.min_age && age <= mapping.max_age
}

/// Build the promotion plan for `mapping`: the ordered set of
/// continue-watching inode groups to move from its destination tier back
/// to its source tier, bounded by `promote_threshold_percent`.
///
/// Returns an empty plan when the mapping has no `promote_threshold_percent`
/// configured, since promotion is opt-in per mapping.
///
/// An unreachable media player is logged and contributes no
/// continue-watching entries for this run rather than aborting it.
///
/// # Errors
/// Returns an error if source tier capacity cannot be read.
#[instrument(skip(mapping, ctx), fields(mapping = %mapping.name))]
pub async fn plan_promotion(mapping: &Mapping, ctx: &RunContext) -> PlannerResult<MovePlan> {
    let mut plan = MovePlan::default();

    let Some(promote_threshold_percent) = mapping.promote_threshold_percent else {
        return Ok(plan);
    };

    for player in &mapping.media_players {
        if let Err(err) = player.refresh(ctx).await {
            warn!(error = %err, "media player unreachable, treating as no continue-watching signal");
        }
    }

    let mut entries = Vec::new();
    for player in &mapping.media_players {
        match player.continue_watching(ctx).await {
            Ok(items) => entries.extend(items),
            Err(err) => warn!(error = %err, "failed to fetch continue-watching queue from media player"),
        }
    }
    entries.sort_by_key(|entry| (entry.recency_rank, entry.bucket_index));

    let mut by_inode: HashMap<(u64, u64), Vec<FileEntry>> = HashMap::new();
    let mut order: Vec<(u64, u64)> = Vec::new();
    for entry in entries {
        if mapping.is_ignored(&entry.destination_path) {
            continue;
        }
        let Ok((inode, device, size_bytes)) = ctx.stat(&entry.destination_path) else {
            continue;
        };
        let birth_time = ctx.birth_time(&entry.destination_path);
        let key = (device, inode);
        if !by_inode.contains_key(&key) {
            order.push(key);
        }
        by_inode.entry(key).or_default().push(FileEntry {
            path: entry.destination_path,
            inode,
            device,
            size_bytes,
            birth_time,
        });
    }

    let source_usage = mapping.source_usage()?;
    #[allow(clippy::cast_precision_loss)]
    let target = source_usage.total_bytes as f64 * promote_threshold_percent / 100.0;
    let mut projected_used = source_usage.used_bytes;

    for key in order {
        let Some(entries) = by_inode.remove(&key) else {
            continue;
        };
        let group = InodeGroup::from_entries(entries);
        #[allow(clippy::cast_precision_loss)]
        let projected_after = projected_used as f64 + group.size_bytes() as f64;
        if projected_after > target {
            break;
        }
        projected_used += group.size_bytes();
        let sort_key = SortKey::build(&group, MediaSignal::absent(), &[]);
        plan.push(PlannedMove {
            group,
            destination_root: mapping.source.root.clone(),
            sort_key,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use globset::GlobSetBuilder;
    use mover_model::Tier;
    use std::path::Path;
    use std::time::Duration;

    fn mapping(source: &Path, destination: &Path) -> Mapping {
        Mapping {
            name: "test".to_string(),
            source: Tier::new("source", source),
            destination: Tier::new("destination", destination),
            demote_threshold_percent: 0.0,
            promote_threshold_percent: None,
            min_age: Duration::from_secs(0),
            max_age: Duration::from_secs(3_600_000),
            ignore: GlobSetBuilder::new().build().expect("empty globset"),
            seeders: Vec::new(),
            media_players: Vec::new(),
        }
    }

    #[tokio::test]
    async fn demotion_skips_when_usage_below_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");
        let mut m = mapping(dir.path(), dest.path());
        m.demote_threshold_percent = 101.0;
        let ctx = RunContext::new(Utc::now(), true);
        let plan = plan_demotion(&m, &ctx).await.expect("plan");
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn promotion_is_empty_without_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");
        let m = mapping(dir.path(), dest.path());
        let ctx = RunContext::new(Utc::now(), true);
        let plan = plan_promotion(&m, &ctx).await.expect("plan");
        assert!(plan.is_empty());
    }
}
