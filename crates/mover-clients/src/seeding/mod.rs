//! Seeding-client integration: torrents pinning files to the fast tier.

pub mod qbit;

use std::path::Path;

use async_trait::async_trait;
use mover_model::{RunContext, SeedingSignal};

use crate::error::ClientResult;

/// A seed-box client able to answer "what is seeding this path" and pause
/// the torrents covering a path before it is moved between tiers.
#[async_trait]
pub trait SeedingClient: Send + Sync {
    /// Index every torrent under `root`, keyed by the inode of its
    /// content. Calling this more than once for the same root is a no-op.
    async fn scan(&self, root: &Path, ctx: &RunContext) -> ClientResult<()>;

    /// Pause every torrent covering `path`'s inode, if not already
    /// paused by this client during the current run.
    async fn pause(&self, path: &Path, ctx: &RunContext) -> ClientResult<()>;

    /// Resume every torrent this client has paused, in LIFO order.
    ///
    /// A no-op under `ctx.dry_run()`, since pausing itself is gated by
    /// dry-run and so nothing was ever paused for this client to undo.
    async fn resume_all(&self, ctx: &RunContext) -> ClientResult<()>;

    /// Signals contributed by torrents covering `path`'s inode. Empty
    /// when no torrent covers the path.
    fn sort_signals(&self, path: &Path, ctx: &RunContext) -> Vec<SeedingSignal>;
}
