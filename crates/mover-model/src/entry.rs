//! On-disk file entries and hardlink grouping.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// A single file observed on a source tier during a directory walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of this hardlink on the source tier.
    pub path: PathBuf,
    /// Inode number backing the file's content, used to detect hardlinks.
    pub inode: u64,
    /// Device number the inode belongs to; inode numbers are only
    /// comparable within the same device.
    pub device: u64,
    /// Size in bytes of the underlying content (identical across all
    /// hardlinks sharing the same inode).
    pub size_bytes: u64,
    /// Filesystem birth time, when the platform exposes one.
    pub birth_time: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Identifier that uniquely names the inode this entry's content lives
    /// at, scoped to the device it was observed on.
    #[must_use]
    pub const fn inode_key(&self) -> (u64, u64) {
        (self.device, self.inode)
    }
}

/// A set of [`FileEntry`] values that share a single inode (i.e. are
/// hardlinks of the same on-disk content), plus the leader path chosen to
/// represent the group during a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeGroup {
    /// The path first observed for this inode during the directory walk.
    /// The leader is copied when the group is moved; every other path is
    /// recreated as a hardlink to the leader's new location.
    pub leader: FileEntry,
    /// Every additional path sharing the leader's inode, in walk order.
    pub siblings: Vec<FileEntry>,
}

impl InodeGroup {
    /// Construct a group from a non-empty, already-partitioned vector of
    /// entries sharing one inode. The first entry becomes the leader.
    ///
    /// # Panics
    /// Panics if `entries` is empty; callers are expected to only invoke
    /// this once a bucket has at least one member.
    #[must_use]
    pub fn from_entries(mut entries: Vec<FileEntry>) -> Self {
        assert!(
            !entries.is_empty(),
            "InodeGroup requires at least one entry"
        );
        let leader = entries.remove(0);
        Self {
            leader,
            siblings: entries,
        }
    }

    /// Total number of paths (leader plus siblings) referencing this inode.
    #[must_use]
    pub fn hardlink_count(&self) -> usize {
        1 + self.siblings.len()
    }

    /// Size in bytes of the shared content. All members share this value.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.leader.size_bytes
    }

    /// Iterate over every path in the group, leader first.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.leader.path.as_path())
            .chain(self.siblings.iter().map(|entry| entry.path.as_path()))
    }

    /// Earliest birth time observed across the group's members, used as the
    /// final tiebreaker in the demotion sort key.
    #[must_use]
    pub fn min_birth_time(&self) -> Option<DateTime<Utc>> {
        self.paths_iter_entries()
            .filter_map(|entry| entry.birth_time)
            .min()
    }

    fn paths_iter_entries(&self) -> impl Iterator<Item = &FileEntry> {
        std::iter::once(&self.leader).chain(self.siblings.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, inode: u64) -> FileEntry {
        FileEntry {
            path: PathBuf::from(path),
            inode,
            device: 1,
            size_bytes: 1024,
            birth_time: None,
        }
    }

    #[test]
    fn from_entries_picks_first_as_leader() {
        let group = InodeGroup::from_entries(vec![entry("/a/1.mkv", 7), entry("/a/2.mkv", 7)]);
        assert_eq!(group.leader.path, PathBuf::from("/a/1.mkv"));
        assert_eq!(group.hardlink_count(), 2);
    }

    #[test]
    #[should_panic(expected = "at least one entry")]
    fn from_entries_rejects_empty() {
        let _ = InodeGroup::from_entries(Vec::new());
    }

    #[test]
    fn paths_iterates_leader_then_siblings() {
        let group = InodeGroup::from_entries(vec![entry("/a/1.mkv", 7), entry("/a/2.mkv", 7)]);
        let paths: Vec<_> = group.paths().collect();
        assert_eq!(paths, vec![Path::new("/a/1.mkv"), Path::new("/a/2.mkv")]);
    }
}
