//! Media-player integration: playback state and "continue watching"
//! signals used to protect actively-consumed content from demotion and
//! to prioritise promoting content a user is partway through.

pub mod jellyfin;
pub mod plex;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mover_model::{MediaSignal, RunContext};

use crate::error::ClientResult;

/// One entry in a media player's "continue watching" priority queue,
/// already rewritten onto the destination tier.
#[derive(Debug, Clone)]
pub struct ContinueWatchingEntry {
    /// Sort key: more recently watched sorts first (smaller is earlier).
    pub recency_rank: i64,
    /// Position within the bucket (season/episode order, or media-part
    /// index for movies), used as a secondary tiebreak.
    pub bucket_index: usize,
    /// Destination-tier path of the file to promote.
    pub destination_path: PathBuf,
}

/// A media server able to report playback activity and per-path
/// watch/continue-watching signals.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Populate internal unwatched/continue-watching caches. Idempotent;
    /// callers should invoke this once before reading signals.
    async fn refresh(&self, ctx: &RunContext) -> ClientResult<()>;

    /// Whether `path` is the subject of any currently active playback
    /// session. Implementations race per-session checks and return as
    /// soon as the first one reports `true`.
    async fn is_active(&self, path: &Path, ctx: &RunContext) -> ClientResult<bool>;

    /// Continue-watching and unwatched-count signal for `path`, used as
    /// the leading dimensions of the demotion sort key.
    fn sort_signal(&self, path: &Path) -> MediaSignal;

    /// The continue-watching queue, already capped and ordered, for
    /// promotion candidate discovery.
    async fn continue_watching(&self, ctx: &RunContext) -> ClientResult<Vec<ContinueWatchingEntry>>;
}
