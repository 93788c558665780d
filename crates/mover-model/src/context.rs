//! Explicit per-run state, replacing ambient globals.
//!
//! The original implementation threaded "now" and "dry run" through module
//! level globals and memoized stat lookups in process-wide caches. Here
//! they are collected into one `RunContext` value created once per
//! invocation and passed by reference everywhere it is needed, so a test
//! can construct an isolated context without mutating shared state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{ModelError, ModelResult};

/// Per-run configuration and memoization state.
pub struct RunContext {
    now: DateTime<Utc>,
    dry_run: bool,
    stat_cache: Mutex<HashMap<PathBuf, CachedStat>>,
    birth_cache: Mutex<HashMap<PathBuf, Option<DateTime<Utc>>>>,
}

#[derive(Clone, Copy)]
struct CachedStat {
    inode: u64,
    device: u64,
    size_bytes: u64,
}

impl RunContext {
    /// Construct a context for a run starting at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            now,
            dry_run,
            stat_cache: Mutex::new(HashMap::new()),
            birth_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Construct a context anchored to the current wall-clock time.
    #[must_use]
    pub fn now_real(dry_run: bool) -> Self {
        Self::new(Utc::now(), dry_run)
    }

    /// The timestamp this run treats as "now" for age-window and
    /// continue-watching cutoff computations.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Whether this run must not mutate the filesystem.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Fetch (and cache) `(inode, device, size_bytes)` for a path.
    ///
    /// # Errors
    /// Returns [`ModelError::Metadata`] if the underlying `stat` call
    /// fails, e.g. the path vanished mid-walk.
    pub fn stat(&self, path: &Path) -> ModelResult<(u64, u64, u64)> {
        if let Some(cached) = self
            .stat_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(path)
        {
            return Ok((cached.inode, cached.device, cached.size_bytes));
        }

        let metadata = std::fs::symlink_metadata(path).map_err(|source| ModelError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        let cached = platform_stat(&metadata);

        self.stat_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.to_path_buf(), cached);

        Ok((cached.inode, cached.device, cached.size_bytes))
    }

    /// Fetch (and cache) the birth time for a path, when the platform
    /// exposes one.
    pub fn birth_time(&self, path: &Path) -> Option<DateTime<Utc>> {
        if let Some(cached) = self
            .birth_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(path)
        {
            return *cached;
        }

        let birth = std::fs::metadata(path)
            .and_then(|m| m.created())
            .ok()
            .map(DateTime::<Utc>::from);

        self.birth_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.to_path_buf(), birth);

        birth
    }

    /// Drop every cached stat/birth-time entry. Used between the demotion
    /// and promotion phases of a single mapping, since a completed move
    /// invalidates cached metadata for both the old and new paths.
    pub fn invalidate_caches(&self) {
        self.stat_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.birth_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[cfg(unix)]
fn platform_stat(metadata: &std::fs::Metadata) -> CachedStat {
    use std::os::unix::fs::MetadataExt;
    CachedStat {
        inode: metadata.ino(),
        device: metadata.dev(),
        size_bytes: metadata.len(),
    }
}

#[cfg(not(unix))]
fn platform_stat(metadata: &std::fs::Metadata) -> CachedStat {
    CachedStat {
        inode: 0,
        device: 0,
        size_bytes: metadata.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stat_is_cached_across_calls() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"hello").expect("write");
        let ctx = RunContext::new(Utc::now(), false);

        let first = ctx.stat(file.path()).expect("stat");
        let second = ctx.stat(file.path()).expect("cached stat");
        assert_eq!(first, second);
        assert_eq!(first.2, 5);
    }

    #[test]
    fn invalidate_caches_clears_entries() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let ctx = RunContext::new(Utc::now(), true);
        ctx.stat(file.path()).expect("stat");
        ctx.invalidate_caches();
        assert!(ctx.dry_run());
    }
}
