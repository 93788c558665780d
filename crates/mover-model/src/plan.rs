//! Demotion/promotion ordering and move plans.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::entry::InodeGroup;
use crate::signals::{MediaSignal, SeedingSignal};

/// Lexicographic sort key used to order [`InodeGroup`]s for demotion.
///
/// Groups are demoted in ascending order of this key: the group that
/// sorts first is the best demotion candidate. Every field below is
/// defined so that "smaller" means "safer/cheaper to demote", with ties
/// broken by the next field in declaration order and, ultimately, by
/// birth time.
///
/// The `has_torrent` dimension is intentionally inverted relative to
/// naive intuition: covered-by-a-torrent sorts *earlier* than
/// not-covered, because a file still being tracked by the seed client has
/// an external integrity/seeding guarantee the tier move does not need to
/// protect against re-download, whereas an uncovered file is the user's
/// only copy and is moved more conservatively. This resolves the
/// corresponding design ambiguity in favor of protecting un-torrented
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    /// `false` (not part of any continue-watching queue) sorts before
    /// `true`, so in-progress series/movies are demoted last.
    pub continue_watching: bool,
    /// Number of users who have not yet watched this content. Lower counts
    /// (more people have already finished it) demote first.
    pub unwatched_user_count: u32,
    /// `0` when at least one torrent covers this inode group, `1`
    /// otherwise. See struct-level docs for the rationale.
    pub has_torrent_inverted: u8,
    /// Maximum ETA, in seconds, across torrents covering this group.
    /// `0` when no covering torrent reports an ETA (including when there
    /// is no covering torrent at all).
    pub torrent_eta_max_secs: i64,
    /// Negative of the minimum completion age, in seconds, across
    /// covering torrents. Older completions (larger age, more negative
    /// key) sort first. `0` when no covering torrent has completed.
    pub negated_min_completion_age_secs: i64,
    /// Negative of the minimum seed count across covering torrents.
    /// Higher seed counts (more negative key) sort first, since
    /// well-seeded content is least at risk from losing its fast-tier
    /// copy. `0` when there is no covering torrent.
    pub negated_min_seed_count: i64,
    /// Number of distinct torrents covering this group. Fewer covering
    /// torrents sort first.
    pub torrent_coverage_count: usize,
    /// Negative of the group's size in bytes. Larger files sort first,
    /// since demoting them frees capacity fastest.
    pub negated_size_bytes: i64,
    /// Earliest birth time across the group's members; final tiebreak,
    /// with older files sorting first. Missing birth times sort last
    /// (via [`Option`]'s default ordering, `None` > `Some`, is inverted
    /// here to `None` sorting last by using [`BirthTimeRank`]).
    pub birth_time_rank: BirthTimeRank,
}

/// Ordering wrapper so that a missing birth time sorts after every known
/// birth time, rather than `Option`'s default "`None` < `Some`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BirthTimeRank {
    /// A birth time was available.
    Known(DateTime<Utc>),
    /// No birth time was available for any member of the group.
    Unknown,
}

impl SortKey {
    /// Build a sort key from a group's own attributes plus whatever
    /// seeding/media signals the planner collected for its paths.
    #[must_use]
    pub fn build(
        group: &InodeGroup,
        media: MediaSignal,
        seeding: &[SeedingSignal],
    ) -> Self {
        let has_torrent = !seeding.is_empty();
        let torrent_eta_max_secs = seeding
            .iter()
            .filter_map(|s| s.eta)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .max()
            .unwrap_or(0);
        let min_completion_age_secs = seeding
            .iter()
            .filter_map(|s| s.completion_age)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .min();
        let min_seed_count = seeding.iter().map(|s| s.seed_count).min();
        let size_bytes = i64::try_from(group.size_bytes()).unwrap_or(i64::MAX);
        let birth_time_rank = group
            .min_birth_time()
            .map_or(BirthTimeRank::Unknown, BirthTimeRank::Known);

        Self {
            continue_watching: media.continue_watching,
            unwatched_user_count: media.unwatched_user_count,
            has_torrent_inverted: u8::from(!has_torrent),
            torrent_eta_max_secs,
            negated_min_completion_age_secs: -min_completion_age_secs.unwrap_or(0),
            negated_min_seed_count: -min_seed_count.unwrap_or(0),
            torrent_coverage_count: seeding.len(),
            negated_size_bytes: -size_bytes,
            birth_time_rank,
        }
    }
}

/// A single planned hardlink-preserving move of one [`InodeGroup`] from a
/// source tier to a destination tier.
#[derive(Debug, Clone)]
pub struct PlannedMove {
    /// Group of hardlinked paths to move together.
    pub group: InodeGroup,
    /// Root-relative destination root the group's paths are rewritten
    /// into (the Executor joins this with each path's relative suffix).
    pub destination_root: PathBuf,
    /// Sort key the group was ordered by, retained for logging/audit.
    pub sort_key: SortKey,
}

/// The full set of moves selected for one mapping's run, plus accounting
/// metadata describing why the plan stopped where it did.
#[derive(Debug, Clone, Default)]
pub struct MovePlan {
    /// Moves selected for execution, in the order they should run.
    pub moves: Vec<PlannedMove>,
    /// Total bytes the plan expects to free on the source tier once every
    /// move in `moves` completes.
    pub projected_bytes_freed: u64,
}

impl MovePlan {
    /// Append a move to the plan, updating the running byte total.
    pub fn push(&mut self, planned: PlannedMove) {
        self.projected_bytes_freed += planned.group.size_bytes();
        self.moves.push(planned);
    }

    /// Whether the plan has no moves to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FileEntry;

    fn group(size: u64) -> InodeGroup {
        InodeGroup::from_entries(vec![FileEntry {
            path: PathBuf::from("/fast/a.mkv"),
            inode: 1,
            device: 1,
            size_bytes: size,
            birth_time: None,
        }])
    }

    #[test]
    fn continue_watching_sorts_last() {
        let not_watching = SortKey::build(&group(10), MediaSignal::absent(), &[]);
        let watching = SortKey::build(
            &group(10),
            MediaSignal {
                continue_watching: true,
                unwatched_user_count: 0,
            },
            &[],
        );
        assert!(not_watching < watching);
    }

    #[test]
    fn has_torrent_sorts_before_uncovered() {
        let uncovered = SortKey::build(&group(10), MediaSignal::absent(), &[]);
        let covered = SortKey::build(
            &group(10),
            MediaSignal::absent(),
            &[SeedingSignal {
                eta: None,
                completion_age: None,
                seed_count: 5,
            }],
        );
        assert!(covered < uncovered);
    }

    #[test]
    fn larger_files_sort_first_on_remaining_ties() {
        let small = SortKey::build(&group(10), MediaSignal::absent(), &[]);
        let large = SortKey::build(&group(1_000_000), MediaSignal::absent(), &[]);
        assert!(large < small);
    }

    #[test]
    fn move_plan_accumulates_bytes() {
        let mut plan = MovePlan::default();
        let g = group(2048);
        let sort_key = SortKey::build(&g, MediaSignal::absent(), &[]);
        plan.push(PlannedMove {
            group: g,
            destination_root: PathBuf::from("/slow"),
            sort_key,
        });
        assert_eq!(plan.projected_bytes_freed, 2048);
        assert!(!plan.is_empty());
    }
}
