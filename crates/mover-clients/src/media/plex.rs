//! Plex Media Server client.
//!
//! Talks to the plain Plex REST surface (requesting JSON via the
//! `Accept` header) rather than porting `python-plexapi`, since nothing
//! in this workspace's dependency stack wraps the Plex protocol. Field
//! names mirror the original integration's exact shapes
//! (`ratingKey`, `lastViewedAt`, `parentIndex`/`index` for season/episode
//! numbers) so behavior stays traceable to a known reference.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mover_model::{MediaSignal, RunContext};
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::rewriter::PathRewriter;

use super::{ContinueWatchingEntry, MediaPlayer};

const CONTINUE_WATCHING_CUTOFF_DAYS: i64 = 7;
const MAX_PER_SERIES: usize = 25;

#[derive(Debug, Deserialize)]
struct Container<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Default, Deserialize)]
struct SectionsBody {
    #[serde(rename = "Directory", default)]
    directory: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct ItemsBody {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
struct Item {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "viewCount", default)]
    view_count: i64,
    #[serde(rename = "lastViewedAt")]
    last_viewed_at: Option<i64>,
    #[serde(rename = "parentIndex")]
    season_number: Option<i64>,
    index: Option<i64>,
    #[serde(rename = "grandparentRatingKey")]
    grandparent_rating_key: Option<String>,
    #[serde(rename = "librarySectionTitle")]
    library_section_title: Option<String>,
    #[serde(rename = "Media", default)]
    media: Vec<Media>,
}

#[derive(Debug, Clone, Deserialize)]
struct Media {
    #[serde(rename = "Part", default)]
    part: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
struct Part {
    file: Option<String>,
}

impl Item {
    fn file_paths(&self) -> Vec<String> {
        self.media
            .iter()
            .flat_map(|m| m.part.iter())
            .filter_map(|p| p.file.clone())
            .collect()
    }
}

struct CachedState {
    /// Count of users unwatched for each source-rooted path.
    unwatched_counts: HashMap<PathBuf, u32>,
    /// Paths currently part of the continue-watching set, for
    /// `sort_signal`'s `continue_watching` bit.
    continue_watching_paths: HashSet<PathBuf>,
    /// Ordered, capped continue-watching queue for promotion.
    queue: Vec<ContinueWatchingEntry>,
}

/// Plex client implementing [`MediaPlayer`].
pub struct Plex {
    base_url: String,
    token: String,
    libraries: HashSet<String>,
    http: Client,
    rewriter: Box<dyn PathRewriter>,
    state: Mutex<Option<CachedState>>,
}

impl Plex {
    /// Construct a client for a Plex server at `base_url`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        libraries: Vec<String>,
        rewriter: Box<dyn PathRewriter>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            libraries: libraries.into_iter().collect(),
            http: Client::new(),
            rewriter,
            state: Mutex::new(None),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ClientResult<T> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .query(&[("X-Plex-Token", self.token.as_str())]);
        request = request.query(query);

        let response = request.send().await.map_err(|source| ClientError::Request {
            service: "plex",
            source,
        })?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                service: "plex",
                status: response.status().as_u16(),
                operation: "get",
            });
        }

        let bytes = response.bytes().await.map_err(|source| ClientError::Request {
            service: "plex",
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            service: "plex",
            operation: "get",
            source,
        })
    }

    async fn sections(&self) -> ClientResult<Vec<Section>> {
        let body: Container<SectionsBody> = self.get_json("/library/sections", &[]).await?;
        Ok(body
            .media_container
            .directory
            .into_iter()
            .filter(|s| matches!(s.kind.as_str(), "movie" | "show"))
            .filter(|s| self.libraries.is_empty() || self.libraries.contains(&s.title))
            .collect())
    }

    async fn unwatched_in_section(&self, section: &Section) -> ClientResult<Vec<Item>> {
        let body: Container<ItemsBody> = self
            .get_json(
                &format!("/library/sections/{}/all", section.key),
                &[("unwatched", "1")],
            )
            .await?;
        Ok(body.media_container.metadata)
    }

    async fn episodes_of_show(&self, show_rating_key: &str) -> ClientResult<Vec<Item>> {
        let body: Container<ItemsBody> = self
            .get_json(&format!("/library/metadata/{show_rating_key}/allLeaves"), &[])
            .await?;
        Ok(body.media_container.metadata)
    }

    async fn continue_watching_raw(&self) -> ClientResult<Vec<Item>> {
        let body: Container<ItemsBody> = self.get_json("/hubs/continueWatching", &[]).await?;
        Ok(body.media_container.metadata)
    }

    async fn active_sessions(&self) -> ClientResult<Vec<Item>> {
        let body: Container<ItemsBody> = self.get_json("/status/sessions", &[]).await?;
        Ok(body.media_container.metadata)
    }

    fn rewrite_sourced(&self, raw: &str) -> PathBuf {
        self.rewriter.on_source(Path::new(raw))
    }
}

#[async_trait]
impl MediaPlayer for Plex {
    #[instrument(skip(self, ctx))]
    async fn refresh(&self, ctx: &RunContext) -> ClientResult<()> {
        let sections = self.sections().await?;

        let mut unwatched_counts: HashMap<PathBuf, u32> = HashMap::new();
        for section in &sections {
            let items = self.unwatched_in_section(section).await?;
            for item in items {
                for raw_path in item.file_paths() {
                    let path = self.rewrite_sourced(&raw_path);
                    if path.exists() {
                        *unwatched_counts.entry(path).or_insert(0) += 1;
                    }
                }
            }
        }

        let now = ctx.now();
        let cutoff = now - chrono::Duration::days(CONTINUE_WATCHING_CUTOFF_DAYS);
        let raw_cw = self.continue_watching_raw().await?;

        let mut buckets: Vec<(i64, Vec<Item>)> = Vec::new();
        for item in raw_cw {
            if !self.libraries.is_empty() {
                if let Some(title) = &item.library_section_title {
                    if !self.libraries.contains(title) {
                        continue;
                    }
                }
            }
            let Some(last_viewed) = item.last_viewed_at else {
                continue;
            };
            let Some(last_viewed_at) = DateTime::<Utc>::from_timestamp(last_viewed, 0) else {
                continue;
            };
            if last_viewed_at < cutoff {
                continue;
            }
            let recency_rank = -last_viewed;

            if item.kind == "movie" {
                buckets.push((recency_rank, vec![item]));
            } else if item.kind == "episode" {
                if let Some(show_key) = item.grandparent_rating_key.clone() {
                    let watched = item.view_count > 0;
                    let season = item.season_number.unwrap_or(0);
                    let index = item.index.unwrap_or(0) + i64::from(watched);
                    match self.episodes_of_show(&show_key).await {
                        Ok(mut episodes) => {
                            episodes.sort_by_key(|e| {
                                (e.season_number.unwrap_or(0), e.index.unwrap_or(0))
                            });
                            let forward: Vec<Item> = episodes
                                .into_iter()
                                .filter(|e| {
                                    (e.season_number.unwrap_or(0), e.index.unwrap_or(0))
                                        >= (season, index)
                                })
                                .collect();
                            buckets.push((recency_rank, forward));
                        }
                        Err(err) => warn!(%err, "failed to fetch forward episodes"),
                    }
                }
            }
        }

        let mut processed: HashSet<String> = HashSet::new();
        let mut continue_watching_paths = HashSet::new();
        let mut queue = Vec::new();

        for (recency_rank, bucket) in buckets {
            let mut remaining = MAX_PER_SERIES;
            for item in bucket {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
                for (bucket_index, raw_path) in item.file_paths().into_iter().enumerate() {
                    if !processed.insert(raw_path.clone()) {
                        continue;
                    }
                    let source_path = self.rewrite_sourced(&raw_path);
                    if source_path.exists() {
                        continue_watching_paths.insert(source_path);
                        continue;
                    }
                    let destination_path = self.rewriter.on_destination(Path::new(&raw_path));
                    if destination_path.exists() {
                        queue.push(ContinueWatchingEntry {
                            recency_rank,
                            bucket_index,
                            destination_path,
                        });
                    }
                }
            }
        }

        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(CachedState {
            unwatched_counts,
            continue_watching_paths,
            queue,
        });
        Ok(())
    }

    #[instrument(skip(self, ctx))]
    async fn is_active(&self, path: &Path, ctx: &RunContext) -> ClientResult<bool> {
        let target_inode = ctx.stat(path).ok();
        let sessions = self.active_sessions().await?;

        let mut set = tokio::task::JoinSet::new();
        for session in sessions {
            let rewriter_paths: Vec<PathBuf> = session
                .file_paths()
                .into_iter()
                .map(|raw| self.rewrite_sourced(&raw))
                .collect();
            set.spawn(async move {
                for candidate in rewriter_paths {
                    if let Some((inode, device, _)) = target_inode {
                        if let Ok(metadata) = tokio::fs::symlink_metadata(&candidate).await {
                            #[cfg(unix)]
                            {
                                use std::os::unix::fs::MetadataExt;
                                if metadata.ino() == inode && metadata.dev() == device {
                                    return true;
                                }
                            }
                            #[cfg(not(unix))]
                            {
                                let _ = (&metadata, inode, device);
                            }
                        }
                    }
                }
                false
            });
        }

        let mut active = false;
        while let Some(result) = set.join_next().await {
            if result.unwrap_or(false) {
                active = true;
                set.abort_all();
                break;
            }
        }
        Ok(active)
    }

    fn sort_signal(&self, path: &Path) -> MediaSignal {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(state) = guard.as_ref() else {
            return MediaSignal::absent();
        };
        MediaSignal {
            continue_watching: state.continue_watching_paths.contains(path),
            unwatched_user_count: state.unwatched_counts.get(path).copied().unwrap_or(0),
        }
    }

    async fn continue_watching(&self, _ctx: &RunContext) -> ClientResult<Vec<ContinueWatchingEntry>> {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard
            .as_ref()
            .map(|state| state.queue.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::NoopRewriter;

    #[test]
    fn item_file_paths_flattens_media_parts() {
        let item = Item {
            kind: "movie".to_string(),
            view_count: 0,
            last_viewed_at: None,
            season_number: None,
            index: None,
            grandparent_rating_key: None,
            library_section_title: None,
            media: vec![Media {
                part: vec![Part {
                    file: Some("/fast/a.mkv".to_string()),
                }],
            }],
        };
        assert_eq!(item.file_paths(), vec!["/fast/a.mkv".to_string()]);
    }

    #[test]
    fn plex_constructs_with_noop_rewriter() {
        let plex = Plex::new(
            "http://localhost:32400",
            "token",
            vec!["Movies".to_string()],
            Box::new(NoopRewriter::new("/fast", "/slow")),
        );
        assert_eq!(plex.sort_signal(Path::new("/fast/a.mkv")), MediaSignal::absent());
    }
}
