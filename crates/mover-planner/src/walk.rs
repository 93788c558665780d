//! Deterministic directory walk and hardlink grouping.

use std::collections::HashMap;
use std::path::Path;

use mover_model::{FileEntry, InodeGroup, RunContext};
use walkdir::WalkDir;

use crate::error::{PlannerError, PlannerResult};

/// Walk `root` depth-first in sorted order, stat every regular file, and
/// group them by `(device, inode)` so hardlinked copies of the same
/// content move together.
///
/// # Errors
/// Returns [`PlannerError::Walk`] if the directory tree cannot be
/// traversed (e.g. a permission error on a subdirectory).
pub fn walk_and_group(root: &Path, ctx: &RunContext) -> PlannerResult<Vec<InodeGroup>> {
    let mut buckets: HashMap<(u64, u64), Vec<FileEntry>> = HashMap::new();

    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker {
        let entry = entry.map_err(|source| PlannerError::Walk {
            root: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok((inode, device, size_bytes)) = ctx.stat(path) else {
            continue;
        };
        let birth_time = ctx.birth_time(path);

        buckets
            .entry((device, inode))
            .or_default()
            .push(FileEntry {
                path: path.to_path_buf(),
                inode,
                device,
                size_bytes,
                birth_time,
            });
    }

    let mut groups: Vec<InodeGroup> = buckets.into_values().map(InodeGroup::from_entries).collect();
    groups.sort_by(|a, b| a.leader.path.cmp(&b.leader.path));
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn groups_hardlinked_files_together() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.mkv");
        std::fs::write(&a, b"hello").expect("write");
        let b = dir.path().join("b.mkv");
        std::fs::hard_link(&a, &b).expect("hardlink");
        let c = dir.path().join("c.mkv");
        std::fs::write(&c, b"other").expect("write");

        let ctx = RunContext::new(Utc::now(), true);
        let groups = walk_and_group(dir.path(), &ctx).expect("walk");

        assert_eq!(groups.len(), 2);
        let hardlinked = groups
            .iter()
            .find(|g| g.hardlink_count() == 2)
            .expect("expected a 2-member group");
        assert_eq!(hardlinked.size_bytes(), 5);
    }

    #[test]
    fn walk_is_deterministic_across_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["z.mkv", "a.mkv", "m.mkv"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        let ctx = RunContext::new(Utc::now(), true);
        let first = walk_and_group(dir.path(), &ctx).expect("walk");
        let second = walk_and_group(dir.path(), &ctx).expect("walk");
        let first_paths: Vec<_> = first.iter().map(|g| g.leader.path.clone()).collect();
        let second_paths: Vec<_> = second.iter().map(|g| g.leader.path.clone()).collect();
        assert_eq!(first_paths, second_paths);
    }
}
