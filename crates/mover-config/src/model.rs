//! Raw (pre-validation) configuration shapes deserialized directly from
//! YAML.

use serde::Deserialize;

/// Top-level configuration document: one or more tier mappings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Every mapping the driver should process, in document order.
    pub mappings: Vec<RawMapping>,
}

/// One source/destination tier pair and the policy governing moves
/// between them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMapping {
    /// Human-readable label used in logs.
    pub name: String,
    /// Fast-tier root directory.
    pub source: String,
    /// Slow-tier root directory.
    pub destination: String,
    /// Demote when the source tier's usage meets or exceeds this percent.
    pub demote_threshold_percent: f64,
    /// Stop promoting once the source tier's usage would meet or exceed
    /// this percent. `0` (or omitted) disables promotion entirely, as in
    /// the original `cache_threshold` falsy-check.
    #[serde(default)]
    pub promote_threshold_percent: f64,
    /// Minimum file age (e.g. `"2h"`) before it becomes eligible for
    /// demotion.
    #[serde(default = "default_min_age")]
    pub min_age: String,
    /// Maximum file age (e.g. `"30d"`) before it stops being eligible.
    #[serde(default = "default_max_age")]
    pub max_age: String,
    /// Glob patterns (relative to `source`) excluded from scanning and
    /// cleanup.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Seeding clients (qBittorrent instances) that may cover files under
    /// this mapping.
    #[serde(default)]
    pub clients: Vec<QbitConfig>,
    /// Plex servers that may cover files under this mapping.
    #[serde(default)]
    pub plex: Vec<PlexConfig>,
    /// Jellyfin servers that may cover files under this mapping.
    #[serde(default)]
    pub jellyfin: Vec<JellyfinConfig>,
}

fn default_min_age() -> String {
    "0s".to_string()
}

fn default_max_age() -> String {
    "3650d".to_string()
}

/// Translates paths an external system reports from some canonical root
/// onto this mapping's tiers; see [`mover_clients::RealRewriter`].
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteConfig {
    /// Canonical root the external system reports paths under.
    pub from: String,
    /// Root those paths should be re-rooted onto for this mapping's
    /// source tier.
    pub to: String,
}

/// Connection details for a qBittorrent Web API instance.
#[derive(Debug, Clone, Deserialize)]
pub struct QbitConfig {
    /// Base URL of the Web UI (e.g. `http://localhost:8080`).
    pub host: String,
    /// Web UI username.
    pub user: String,
    /// Web UI password.
    pub password: String,
    /// Path rewrite applied to `content_path` values this client
    /// reports, when its canonical root differs from either tier.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,
}

/// Connection details for a Plex Media Server.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexConfig {
    /// Base URL of the server.
    pub url: String,
    /// X-Plex-Token used for authentication.
    pub token: String,
    /// Library names to restrict scanning to; empty means all libraries.
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Usernames to restrict scanning to; empty means the server owner
    /// plus every shared user.
    #[serde(default)]
    pub users: Vec<String>,
    /// Path rewrite applied to file paths this server reports, when its
    /// canonical root differs from either tier.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,
}

/// Connection details for a Jellyfin server.
#[derive(Debug, Clone, Deserialize)]
pub struct JellyfinConfig {
    /// Base URL of the server.
    pub url: String,
    /// API key used for authentication.
    pub api_key: String,
    /// Library names to restrict scanning to; empty means all libraries.
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Usernames to restrict scanning to; empty means every user.
    #[serde(default)]
    pub users: Vec<String>,
    /// Path rewrite applied to file paths this server reports, when its
    /// canonical root differs from either tier.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,
}
