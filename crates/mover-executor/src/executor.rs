//! Hardlink-preserving move execution.
//!
//! A move never relies on `rename`: the leader is copied to its new
//! location, every sibling is recreated as a hardlink to that new copy,
//! and only once every copy and link has succeeded are the original
//! paths removed — siblings first, leader last. A failure at any point
//! before that leaves the original tree untouched; nothing is deleted
//! until every replacement path exists.

use std::fs;
use std::path::{Path, PathBuf};

use mover_clients::SeedingClient;
use mover_model::{InodeGroup, MovePlan, PlannedMove, RunContext};
use mover_planner::Mapping;
use tracing::{info, instrument, warn};

use crate::error::{ExecutorError, ExecutorResult};

/// Summary of one `execute` call against a single mapping's plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionReport {
    /// Number of inode groups actually (or, in dry-run, would-be) moved.
    pub groups_moved: usize,
    /// Bytes freed on the plan's origin tier.
    pub bytes_freed: u64,
    /// Bytes reclaimed from pre-existing orphan siblings at the
    /// destination (stale copies from an earlier, interrupted run).
    pub orphan_bytes_reclaimed: u64,
    /// Whether this report describes a dry run (no filesystem mutation).
    pub dry_run: bool,
}

/// Execute every planned move in `plan` against `mapping`'s tiers, then
/// resume any torrents `mapping`'s seed clients paused while the plan was
/// built, regardless of whether execution succeeded.
///
/// # Errors
/// Returns the first [`ExecutorError`] encountered while moving a group.
/// Groups processed before the failing one remain moved; the plan is not
/// rolled back, since each group's move is independently fail-atomic.
#[instrument(skip(mapping, plan, ctx), fields(mapping = %mapping.name, moves = plan.moves.len()))]
pub async fn execute(mapping: &Mapping, plan: &MovePlan, ctx: &RunContext) -> ExecutorResult<ExecutionReport> {
    let mut report = ExecutionReport {
        dry_run: ctx.dry_run(),
        ..ExecutionReport::default()
    };

    let mut failure = None;
    for planned in &plan.moves {
        match move_group(mapping, planned, ctx).await {
            Ok(Some(orphan_bytes)) => {
                report.groups_moved += 1;
                report.bytes_freed += planned.group.size_bytes();
                report.orphan_bytes_reclaimed += orphan_bytes;
            }
            Ok(None) => {}
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    for seeder in &mapping.seeders {
        if ctx.dry_run() {
            continue;
        }
        if let Err(err) = seeder.resume_all(ctx).await {
            warn!(error = %err, mapping = %mapping.name, "failed to resume paused torrents after execution");
        }
    }

    failure.map_or(Ok(report), Err)
}

/// Move a single planned inode group, or report why it was skipped.
///
/// Returns `Ok(None)` when the group was skipped because its leader is
/// currently active (the inode may have started playing between
/// planning and execution), and `Ok(Some(orphan_bytes))` otherwise,
/// where `orphan_bytes` is the size of any pre-existing, differently
/// sized sibling paths deleted at the destination.
async fn move_group(mapping: &Mapping, planned: &PlannedMove, ctx: &RunContext) -> ExecutorResult<Option<u64>> {
    if mapping.is_active(&planned.group.leader.path, ctx).await {
        info!(leader = %planned.group.leader.path.display(), "skipping group: currently active");
        return Ok(None);
    }

    let current_root = current_root_of(mapping, &planned.group)?;

    if ctx.dry_run() {
        info!(
            leader = %planned.group.leader.path.display(),
            destination = %planned.destination_root.display(),
            hardlinks = planned.group.hardlink_count(),
            "dry run: would move group"
        );
        return Ok(Some(0));
    }

    let leader_dest = rebase(&planned.group.leader.path, current_root, &planned.destination_root)?;
    copy_file("move_group.copy_leader", &planned.group.leader.path, &leader_dest)?;

    let mut sibling_dests = Vec::with_capacity(planned.group.siblings.len());
    let mut orphan_bytes = 0;
    for sibling in &planned.group.siblings {
        let sibling_dest = rebase(&sibling.path, current_root, &planned.destination_root)?;
        orphan_bytes += hard_link("move_group.link_sibling", &leader_dest, &sibling_dest, sibling.size_bytes)?;
        sibling_dests.push(sibling_dest);
    }

    for sibling in &planned.group.siblings {
        remove_file("move_group.remove_sibling", &sibling.path)?;
    }
    remove_file("move_group.remove_leader", &planned.group.leader.path)?;

    for sibling in &planned.group.siblings {
        remove_empty_ancestors(&sibling.path, current_root);
    }
    remove_empty_ancestors(&planned.group.leader.path, current_root);

    info!(
        leader = %leader_dest.display(),
        hardlinks = 1 + sibling_dests.len(),
        bytes = planned.group.size_bytes(),
        orphan_bytes,
        "moved group"
    );

    Ok(Some(orphan_bytes))
}

fn current_root_of<'a>(mapping: &'a Mapping, group: &InodeGroup) -> ExecutorResult<&'a Path> {
    if mapping.source.contains(&group.leader.path) {
        Ok(&mapping.source.root)
    } else if mapping.destination.contains(&group.leader.path) {
        Ok(&mapping.destination.root)
    } else {
        Err(ExecutorError::UnrootedPath {
            path: group.leader.path.clone(),
        })
    }
}

fn rebase(path: &Path, current_root: &Path, destination_root: &Path) -> ExecutorResult<PathBuf> {
    let relative = path
        .strip_prefix(current_root)
        .map_err(|_| ExecutorError::UnrootedPath { path: path.to_path_buf() })?;
    Ok(destination_root.join(relative))
}

/// Copy `source` to `destination`, preserving mtime and owner/group,
/// skipping the copy entirely if `destination` already exists with the
/// same size as `source` (the copy is treated as already done).
fn copy_file(operation: &'static str, source: &Path, destination: &Path) -> ExecutorResult<()> {
    let metadata = fs::metadata(source).map_err(|err| ExecutorError::io(operation, source, err))?;

    if let Some(parent) = destination.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|err| ExecutorError::io(operation, parent, err))?;
            if let Some(source_parent) = source.parent() {
                chown_dir_like(parent, source_parent);
            }
        }
    }

    if same_size(destination, metadata.len()) {
        return Ok(());
    }

    fs::copy(source, destination).map_err(|err| ExecutorError::io(operation, destination, err))?;

    if let Ok(modified) = metadata.modified() {
        match fs::File::open(destination) {
            Ok(file) => {
                if let Err(err) = file.set_modified(modified) {
                    warn!(error = %err, path = %destination.display(), "failed to preserve mtime on copy");
                }
            }
            Err(err) => warn!(error = %err, path = %destination.display(), "failed to reopen copy to preserve mtime"),
        }
    }

    chown_like(destination, &metadata);

    Ok(())
}

/// Hardlink `sibling_dest` to `leader_dest`, returning the number of
/// bytes reclaimed from a pre-existing, differently sized path at
/// `sibling_dest` (an orphan left by an earlier, interrupted run).
///
/// If `sibling_dest` already exists with `sibling_size`, the link is
/// assumed already done and skipped.
fn hard_link(operation: &'static str, leader_dest: &Path, sibling_dest: &Path, sibling_size: u64) -> ExecutorResult<u64> {
    if let Some(parent) = sibling_dest.parent() {
        fs::create_dir_all(parent).map_err(|err| ExecutorError::io(operation, parent, err))?;
    }

    if same_size(sibling_dest, sibling_size) {
        return Ok(0);
    }

    let orphan_bytes = match fs::metadata(sibling_dest) {
        Ok(existing) => {
            fs::remove_file(sibling_dest).map_err(|err| ExecutorError::io(operation, sibling_dest, err))?;
            existing.len()
        }
        Err(_) => 0,
    };

    fs::hard_link(leader_dest, sibling_dest).map_err(|err| ExecutorError::io(operation, sibling_dest, err))?;
    Ok(orphan_bytes)
}

/// Whether `path` exists on disk with exactly `size` bytes.
fn same_size(path: &Path, size: u64) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.len() == size)
}

#[cfg(unix)]
fn chown_like(destination: &Path, source_metadata: &fs::Metadata) {
    use std::os::unix::fs::MetadataExt;
    use tracing::error;

    let uid = nix::unistd::Uid::from_raw(source_metadata.uid());
    let gid = nix::unistd::Gid::from_raw(source_metadata.gid());
    if let Err(err) = nix::unistd::chown(destination, Some(uid), Some(gid)) {
        error!(error = %err, path = %destination.display(), "failed to preserve ownership on copy");
    }
}

#[cfg(not(unix))]
fn chown_like(_destination: &Path, _source_metadata: &fs::Metadata) {}

#[cfg(unix)]
fn chown_dir_like(destination_dir: &Path, source_dir: &Path) {
    use std::os::unix::fs::MetadataExt;
    use tracing::error;

    let Ok(source_metadata) = fs::metadata(source_dir) else {
        return;
    };
    let uid = nix::unistd::Uid::from_raw(source_metadata.uid());
    let gid = nix::unistd::Gid::from_raw(source_metadata.gid());
    if let Err(err) = nix::unistd::chown(destination_dir, Some(uid), Some(gid)) {
        error!(error = %err, path = %destination_dir.display(), "failed to preserve directory ownership on create");
    }
}

#[cfg(not(unix))]
fn chown_dir_like(_destination_dir: &Path, _source_dir: &Path) {}

fn remove_file(operation: &'static str, path: &Path) -> ExecutorResult<()> {
    fs::remove_file(path).map_err(|err| ExecutorError::io(operation, path, err))
}

/// Remove directories bottom-up from `path`'s parent up to (but not
/// including) `root`, stopping as soon as one is non-empty.
fn remove_empty_ancestors(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match fs::read_dir(dir) {
            Ok(mut entries) if entries.next().is_none() => {
                if let Err(err) = fs::remove_dir(dir) {
                    warn!(error = %err, path = %dir.display(), "failed to remove empty directory");
                    break;
                }
            }
            Ok(_) => break,
            Err(err) => {
                warn!(error = %err, path = %dir.display(), "failed to inspect directory for cleanup");
                break;
            }
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use globset::GlobSetBuilder;
    use mover_model::{FileEntry, SortKey, Tier};
    use std::time::Duration;

    fn mapping(source: &Path, destination: &Path) -> Mapping {
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

    #[tokio::test]
    async fn moves_single_file_and_cleans_up_empty_dir() {
        let source = tempfile::tempdir().expect("tempdir");
        let destination = tempfile::tempdir().expect("tempdir");
        let show_dir = source.path().join("show");
        fs::create_dir_all(&show_dir).expect("mkdir");
        let file_path = show_dir.join("episode.mkv");
        fs::write(&file_path, b"hello").expect("write");

        let ctx = RunContext::new(Utc::now(), false);
        let (inode, device, size_bytes) = ctx.stat(&file_path).expect("stat");
        let group = InodeGroup::from_entries(vec![FileEntry {
            path: file_path.clone(),
            inode,
            device,
            size_bytes,
            birth_time: None,
        }]);
        let sort_key = SortKey::build(&group, mover_model::MediaSignal::absent(), &[]);
        let mut plan = MovePlan::default();
        plan.push(PlannedMove {
            group,
            destination_root: destination.path().to_path_buf(),
            sort_key,
        });

        let mapping = mapping(source.path(), destination.path());
        let report = execute(&mapping, &plan, &ctx).await.expect("execute");

        assert_eq!(report.groups_moved, 1);
        assert_eq!(report.bytes_freed, 5);
        assert!(!file_path.exists());
        assert!(!show_dir.exists());
        assert!(destination.path().join("show").join("episode.mkv").exists());
    }

    #[tokio::test]
    async fn dry_run_mutates_nothing() {
        let source = tempfile::tempdir().expect("tempdir");
        let destination = tempfile::tempdir().expect("tempdir");
        let file_path = source.path().join("episode.mkv");
        fs::write(&file_path, b"hello").expect("write");

        let ctx = RunContext::new(Utc::now(), true);
        let (inode, device, size_bytes) = ctx.stat(&file_path).expect("stat");
        let group = InodeGroup::from_entries(vec![FileEntry {
            path: file_path.clone(),
            inode,
            device,
            size_bytes,
            birth_time: None,
        }]);
        let sort_key = SortKey::build(&group, mover_model::MediaSignal::absent(), &[]);
        let mut plan = MovePlan::default();
        plan.push(PlannedMove {
            group,
            destination_root: destination.path().to_path_buf(),
            sort_key,
        });

        let mapping = mapping(source.path(), destination.path());
        let report = execute(&mapping, &plan, &ctx).await.expect("execute");

        assert!(report.dry_run);
        assert!(file_path.exists());
        assert!(!destination.path().join("episode.mkv").exists());
    }

    #[tokio::test]
    async fn preserves_hardlinks_at_destination() {
        let source = tempfile::tempdir().expect("tempdir");
        let destination = tempfile::tempdir().expect("tempdir");
        let a = source.path().join("a.mkv");
        fs::write(&a, b"hello").expect("write");
        let b = source.path().join("b.mkv");
        fs::hard_link(&a, &b).expect("hardlink");

        let ctx = RunContext::new(Utc::now(), false);
        let (inode, device, size_bytes) = ctx.stat(&a).expect("stat");
        let group = InodeGroup::from_entries(vec![
            FileEntry { path: a.clone(), inode, device, size_bytes, birth_time: None },
            FileEntry { path: b.clone(), inode, device, size_bytes, birth_time: None },
        ]);
        let sort_key = SortKey::build(&group, mover_model::MediaSignal::absent(), &[]);
        let mut plan = MovePlan::default();
        plan.push(PlannedMove {
            group,
            destination_root: destination.path().to_path_buf(),
            sort_key,
        });

        let mapping = mapping(source.path(), destination.path());
        execute(&mapping, &plan, &ctx).await.expect("execute");

        let dest_a = destination.path().join("a.mkv");
        let dest_b = destination.path().join("b.mkv");
        assert!(dest_a.exists());
        assert!(dest_b.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(fs::metadata(&dest_a).unwrap().ino(), fs::metadata(&dest_b).unwrap().ino());
        }
    }

    #[tokio::test]
    async fn rerun_against_an_already_moved_leader_is_a_no_op() {
        let source = tempfile::tempdir().expect("tempdir");
        let destination = tempfile::tempdir().expect("tempdir");
        let file_path = source.path().join("episode.mkv");
        fs::write(&file_path, b"hello").expect("write");
        let dest_path = destination.path().join("episode.mkv");
        fs::write(&dest_path, b"hello").expect("write");

        let ctx = RunContext::new(Utc::now(), false);
        let (inode, device, size_bytes) = ctx.stat(&file_path).expect("stat");
        let group = InodeGroup::from_entries(vec![FileEntry {
            path: file_path.clone(),
            inode,
            device,
            size_bytes,
            birth_time: None,
        }]);
        let sort_key = SortKey::build(&group, mover_model::MediaSignal::absent(), &[]);
        let mut plan = MovePlan::default();
        plan.push(PlannedMove {
            group,
            destination_root: destination.path().to_path_buf(),
            sort_key,
        });

        let mapping = mapping(source.path(), destination.path());
        let report = execute(&mapping, &plan, &ctx).await.expect("execute");

        assert_eq!(report.groups_moved, 1);
        assert_eq!(report.orphan_bytes_reclaimed, 0);
        assert!(!file_path.exists());
        assert_eq!(fs::read(&dest_path).expect("read"), b"hello");
    }

    #[tokio::test]
    async fn sibling_orphan_at_destination_is_replaced_and_credited() {
        let source = tempfile::tempdir().expect("tempdir");
        let destination = tempfile::tempdir().expect("tempdir");
        let a = source.path().join("a.mkv");
        fs::write(&a, b"hello").expect("write");
        let b = source.path().join("b.mkv");
        fs::hard_link(&a, &b).expect("hardlink");

        let dest_b = destination.path().join("b.mkv");
        fs::write(&dest_b, b"stale-leftover").expect("write");

        let ctx = RunContext::new(Utc::now(), false);
        let (inode, device, size_bytes) = ctx.stat(&a).expect("stat");
        let group = InodeGroup::from_entries(vec![
            FileEntry { path: a.clone(), inode, device, size_bytes, birth_time: None },
            FileEntry { path: b.clone(), inode, device, size_bytes, birth_time: None },
        ]);
        let sort_key = SortKey::build(&group, mover_model::MediaSignal::absent(), &[]);
        let mut plan = MovePlan::default();
        plan.push(PlannedMove {
            group,
            destination_root: destination.path().to_path_buf(),
            sort_key,
        });

        let mapping = mapping(source.path(), destination.path());
        let report = execute(&mapping, &plan, &ctx).await.expect("execute");

        assert_eq!(report.orphan_bytes_reclaimed, "stale-leftover".len() as u64);
        let dest_a = destination.path().join("a.mkv");
        assert_eq!(fs::read(&dest_b).expect("read"), b"hello");
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(fs::metadata(&dest_a).unwrap().ino(), fs::metadata(&dest_b).unwrap().ino());
        }
    }
}
