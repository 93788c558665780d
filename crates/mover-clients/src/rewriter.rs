//! Translates paths advertised by external systems (seed clients, media
//! players) into paths rooted at one of our storage tiers.
//!
//! External systems only ever know about a single canonical root for a
//! piece of content (wherever it happened to live when they indexed it).
//! When that content has been demoted or promoted between tiers, we need
//! to re-root the path the external system reports onto the tier we are
//! currently asking about. A rewrite is pure and infallible: a path that
//! is not under the "from" root is returned unchanged, matching the
//! "never fails" contract external callers rely on.

use std::path::{Path, PathBuf};

/// Re-roots paths between an externally-advertised root and a tier root.
pub trait PathRewriter: Send + Sync {
    /// Rewrite a path as reported by the external system into the
    /// equivalent path on the source tier.
    fn on_source(&self, path: &Path) -> PathBuf;

    /// Rewrite a path as reported by the external system into the
    /// equivalent path on the destination tier.
    fn on_destination(&self, path: &Path) -> PathBuf;
}

/// Rewrites paths that are rooted at some external "canonical" prefix
/// (e.g. the path an app was configured with before a tier was
/// introduced) onto a tier root.
#[derive(Debug, Clone)]
pub struct RealRewriter {
    canonical_root: PathBuf,
    source_root: PathBuf,
    destination_root: PathBuf,
}

impl RealRewriter {
    /// Construct a rewriter translating paths rooted at `canonical_root`
    /// onto `source_root`/`destination_root`.
    #[must_use]
    pub fn new(
        canonical_root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            canonical_root: canonical_root.into(),
            source_root: source_root.into(),
            destination_root: destination_root.into(),
        }
    }

    fn rewrite(&self, path: &Path, target_root: &Path) -> PathBuf {
        match path.strip_prefix(&self.canonical_root) {
            Ok(relative) => target_root.join(relative),
            Err(_) => path.to_path_buf(),
        }
    }
}

impl PathRewriter for RealRewriter {
    fn on_source(&self, path: &Path) -> PathBuf {
        self.rewrite(path, &self.source_root)
    }

    fn on_destination(&self, path: &Path) -> PathBuf {
        self.rewrite(path, &self.destination_root)
    }
}

/// No-op rewriter for setups where the external system already reports
/// paths rooted directly at a tier: `on_source` treats the path as
/// already rooted at `source_root` and re-roots it onto `destination_root`
/// (and vice versa for `on_destination`).
#[derive(Debug, Clone)]
pub struct NoopRewriter {
    source_root: PathBuf,
    destination_root: PathBuf,
}

impl NoopRewriter {
    /// Construct a rewriter that treats paths as already living under
    /// either tier root.
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
        }
    }

    fn rewrite(&self, path: &Path, from: &Path, to: &Path) -> PathBuf {
        match path.strip_prefix(from) {
            Ok(relative) => to.join(relative),
            Err(_) => path.to_path_buf(),
        }
    }
}

impl PathRewriter for NoopRewriter {
    fn on_source(&self, path: &Path) -> PathBuf {
        if path.starts_with(&self.source_root) {
            path.to_path_buf()
        } else {
            self.rewrite(path, &self.destination_root, &self.source_root)
        }
    }

    fn on_destination(&self, path: &Path) -> PathBuf {
        if path.starts_with(&self.destination_root) {
            path.to_path_buf()
        } else {
            self.rewrite(path, &self.source_root, &self.destination_root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_rewriter_reroots_onto_source_and_destination() {
        let rewriter = RealRewriter::new("/library", "/fast", "/slow");
        let canonical = Path::new("/library/movies/a.mkv");
        assert_eq!(
            rewriter.on_source(canonical),
            PathBuf::from("/fast/movies/a.mkv")
        );
        assert_eq!(
            rewriter.on_destination(canonical),
            PathBuf::from("/slow/movies/a.mkv")
        );
    }

    #[test]
    fn real_rewriter_passes_through_unrelated_paths() {
        let rewriter = RealRewriter::new("/library", "/fast", "/slow");
        let unrelated = Path::new("/other/movies/a.mkv");
        assert_eq!(rewriter.on_source(unrelated), unrelated.to_path_buf());
    }

    #[test]
    fn noop_rewriter_reroots_between_tiers() {
        let rewriter = NoopRewriter::new("/fast", "/slow");
        let on_slow = Path::new("/slow/movies/a.mkv");
        assert_eq!(
            rewriter.on_source(on_slow),
            PathBuf::from("/fast/movies/a.mkv")
        );

        let on_fast = Path::new("/fast/movies/a.mkv");
        assert_eq!(rewriter.on_source(on_fast), on_fast.to_path_buf());
    }
}
