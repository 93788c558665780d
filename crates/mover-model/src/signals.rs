//! Signals contributed by external systems (seed clients, media players)
//! that feed into the demotion sort key.

use std::time::Duration;

/// Per-path signal contributed by a seeding client (e.g. qBittorrent).
///
/// A path may be covered by more than one torrent (e.g. a season pack and
/// an individual episode torrent both referencing the same file); in that
/// case the planner folds multiple signals together, taking the maximum
/// ETA and the minimum completion age / seed count, as specified by the
/// sort key's tie-break rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedingSignal {
    /// Time remaining until the covering torrent is expected to complete,
    /// `None` when the torrent is already complete or has no ETA estimate.
    pub eta: Option<Duration>,
    /// Time elapsed since the covering torrent completed. `None` when the
    /// torrent has not completed yet.
    pub completion_age: Option<Duration>,
    /// Number of seeds currently reported for the covering torrent.
    pub seed_count: i64,
}

/// Per-path signal contributed by a media player (e.g. Plex, Jellyfin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaSignal {
    /// Whether this path is part of an active "continue watching" queue
    /// entry for at least one user.
    pub continue_watching: bool,
    /// Number of users for whom this path has not yet been watched.
    pub unwatched_user_count: u32,
}

impl MediaSignal {
    /// The signal used when no media player reports on a path at all.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            continue_watching: false,
            unwatched_user_count: 0,
        }
    }

    /// Combine two signals observed from different media players covering
    /// the same path: continue-watching is OR'd, unwatched counts sum.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            continue_watching: self.continue_watching || other.continue_watching,
            unwatched_user_count: self.unwatched_user_count + other.unwatched_user_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_signal_merge_combines_fields() {
        let a = MediaSignal {
            continue_watching: false,
            unwatched_user_count: 2,
        };
        let b = MediaSignal {
            continue_watching: true,
            unwatched_user_count: 1,
        };
        let merged = a.merge(b);
        assert!(merged.continue_watching);
        assert_eq!(merged.unwatched_user_count, 3);
    }

    #[test]
    fn absent_signal_is_neutral() {
        let absent = MediaSignal::absent();
        assert!(!absent.continue_watching);
        assert_eq!(absent.unwatched_user_count, 0);
    }
}
