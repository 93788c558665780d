//! Storage tier descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single storage tier: a root directory plus a human-readable label.
///
/// Tiers are opaque to the planner beyond their root path; capacity is read
/// live from the filesystem at plan time rather than cached on this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Short, stable label used in logs (e.g. `"fast"`, `"slow"`).
    pub label: String,
    /// Absolute root of the tier on disk.
    pub root: PathBuf,
}

impl Tier {
    /// Construct a new tier from a label and root path.
    #[must_use]
    pub fn new(label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            root: root.into(),
        }
    }

    /// Returns `true` when `path` lives under this tier's root.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Live capacity snapshot for a [`Tier`], expressed in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierUsage {
    /// Total capacity of the filesystem backing the tier.
    pub total_bytes: u64,
    /// Bytes currently in use (total minus available).
    pub used_bytes: u64,
}

impl TierUsage {
    /// Percentage of the tier currently in use, in the range `0.0..=100.0`.
    ///
    /// Returns `0.0` for a degenerate zero-capacity filesystem rather than
    /// dividing by zero.
    #[must_use]
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        #[expect(clippy::cast_precision_loss)]
        let (used, total) = (self.used_bytes as f64, self.total_bytes as f64);
        (used / total) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_checks_prefix() {
        let tier = Tier::new("fast", "/mnt/fast");
        assert!(tier.contains(Path::new("/mnt/fast/movies/a.mkv")));
        assert!(!tier.contains(Path::new("/mnt/slow/movies/a.mkv")));
    }

    #[test]
    fn percent_used_handles_zero_capacity() {
        let usage = TierUsage {
            total_bytes: 0,
            used_bytes: 0,
        };
        assert!(usage.percent_used().abs() < f64::EPSILON);

        let usage = TierUsage {
            total_bytes: 100,
            used_bytes: 40,
        };
        assert!((usage.percent_used() - 40.0).abs() < f64::EPSILON);
    }
}
