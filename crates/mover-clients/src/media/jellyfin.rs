//! Jellyfin client.
//!
//! Talks to the plain Jellyfin REST API directly via `reqwest`,
//! authenticating with an `X-Emby-Token` API key header, mirroring the
//! original integration's endpoints (`/Users`, `/Users/{id}/Views`,
//! `/Users/{id}/Items`, `/Sessions`, `/Shows/NextUp`,
//! `/Shows/{id}/Episodes`) and field shapes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
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
struct User {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct View {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ViewsBody {
    #[serde(rename = "Items", default)]
    items: Vec<View>,
}

#[derive(Debug, Clone, Deserialize)]
struct JellyfinItem {
    #[serde(rename = "Path")]
    path: Option<String>,
    #[serde(rename = "SeriesId")]
    series_id: Option<String>,
    #[serde(rename = "IndexNumber")]
    index_number: Option<i64>,
    #[serde(rename = "ParentIndexNumber")]
    parent_index_number: Option<i64>,
    #[serde(rename = "UserData")]
    user_data: Option<UserData>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserData {
    #[serde(rename = "Played", default)]
    played: bool,
    #[serde(rename = "LastPlayedDate")]
    last_played_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsBody {
    #[serde(rename = "Items", default)]
    items: Vec<JellyfinItem>,
}

#[derive(Debug, Deserialize)]
struct Session {
    #[serde(rename = "NowPlayingItem")]
    now_playing_item: Option<JellyfinItem>,
}

struct CachedState {
    unwatched_counts: HashMap<PathBuf, u32>,
    continue_watching_paths: HashSet<PathBuf>,
    queue: Vec<ContinueWatchingEntry>,
}

/// Jellyfin client implementing [`MediaPlayer`].
pub struct Jellyfin {
    base_url: String,
    api_key: String,
    libraries: HashSet<String>,
    users: HashSet<String>,
    http: Client,
    rewriter: Box<dyn PathRewriter>,
    state: Mutex<Option<CachedState>>,
}

impl Jellyfin {
    /// Construct a client for a Jellyfin server at `base_url`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        libraries: Vec<String>,
        users: Vec<String>,
        rewriter: Box<dyn PathRewriter>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            libraries: libraries.into_iter().collect(),
            users: users.into_iter().collect(),
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
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("X-Emby-Token", self.api_key.as_str())
            .query(query)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                service: "jellyfin",
                source,
            })?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                service: "jellyfin",
                status: response.status().as_u16(),
                operation: "get",
            });
        }

        let bytes = response.bytes().await.map_err(|source| ClientError::Request {
            service: "jellyfin",
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            service: "jellyfin",
            operation: "get",
            source,
        })
    }

    async fn users(&self) -> ClientResult<Vec<User>> {
        let all: Vec<User> = self.get_json("/Users", &[]).await?;
        Ok(all
            .into_iter()
            .filter(|u| self.users.is_empty() || self.users.contains(&u.name))
            .collect())
    }

    async fn library_ids(&self, user_id: &str) -> ClientResult<Vec<String>> {
        let body: ViewsBody = self
            .get_json(&format!("/Users/{user_id}/Views"), &[])
            .await?;
        Ok(body
            .items
            .into_iter()
            .filter(|v| self.libraries.is_empty() || self.libraries.contains(&v.name))
            .map(|v| v.id)
            .collect())
    }

    async fn unwatched_items(&self, user_id: &str, parent_id: &str) -> ClientResult<Vec<JellyfinItem>> {
        let body: ItemsBody = self
            .get_json(
                &format!("/Users/{user_id}/Items"),
                &[
                    ("ParentId", parent_id),
                    ("Filters", "IsUnplayed"),
                    ("Recursive", "true"),
                    ("IncludeItemTypes", "Movie,Episode"),
                ],
            )
            .await?;
        Ok(body.items)
    }

    async fn next_up(&self, user_id: &str) -> ClientResult<Vec<JellyfinItem>> {
        let body: ItemsBody = self
            .get_json("/Shows/NextUp", &[("UserId", user_id)])
            .await?;
        Ok(body.items)
    }

    async fn episodes_of_show(&self, user_id: &str, series_id: &str) -> ClientResult<Vec<JellyfinItem>> {
        let body: ItemsBody = self
            .get_json(
                &format!("/Shows/{series_id}/Episodes"),
                &[("UserId", user_id)],
            )
            .await?;
        Ok(body.items)
    }

    async fn sessions(&self) -> ClientResult<Vec<Session>> {
        self.get_json("/Sessions", &[]).await
    }

    fn rewrite_sourced(&self, raw: &str) -> PathBuf {
        self.rewriter.on_source(Path::new(raw))
    }
}

#[async_trait]
impl MediaPlayer for Jellyfin {
    #[instrument(skip(self, ctx))]
    async fn refresh(&self, ctx: &RunContext) -> ClientResult<()> {
        let users = self.users().await?;

        let mut unwatched_counts: HashMap<PathBuf, u32> = HashMap::new();
        let mut processed: HashSet<String> = HashSet::new();
        let mut continue_watching_paths = HashSet::new();
        let mut queue = Vec::new();
        let now = ctx.now();
        let cutoff = now - chrono::Duration::days(CONTINUE_WATCHING_CUTOFF_DAYS);

        for user in &users {
            let libraries = self.library_ids(&user.id).await?;
            for library_id in &libraries {
                let items = self.unwatched_items(&user.id, library_id).await?;
                for item in items {
                    if let Some(raw) = &item.path {
                        let path = self.rewrite_sourced(raw);
                        if path.exists() {
                            *unwatched_counts.entry(path).or_insert(0) += 1;
                        }
                    }
                }
            }

            let next_up = self.next_up(&user.id).await?;
            for (recency_rank, item) in next_up.into_iter().enumerate() {
                let recent_enough = item
                    .user_data
                    .as_ref()
                    .and_then(|d| d.last_played_date.as_ref())
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc) >= cutoff)
                    .unwrap_or(true);
                if !recent_enough {
                    continue;
                }
                let Some(series_id) = &item.series_id else {
                    continue;
                };
                let season = item.parent_index_number.unwrap_or(0);
                let watched = item.user_data.as_ref().is_some_and(|d| d.played);
                let index = item.index_number.unwrap_or(0) + i64::from(watched);

                let mut episodes = match self.episodes_of_show(&user.id, series_id).await {
                    Ok(episodes) => episodes,
                    Err(err) => {
                        warn!(%err, "failed to fetch forward episodes");
                        continue;
                    }
                };
                episodes.sort_by_key(|e| {
                    (e.parent_index_number.unwrap_or(0), e.index_number.unwrap_or(0))
                });

                #[allow(clippy::cast_possible_wrap)]
                let rank = recency_rank as i64;
                let mut remaining = MAX_PER_SERIES;
                for episode in episodes {
                    if (episode.parent_index_number.unwrap_or(0), episode.index_number.unwrap_or(0))
                        < (season, index)
                    {
                        continue;
                    }
                    if episode.user_data.as_ref().is_some_and(|d| d.played) {
                        continue;
                    }
                    if remaining == 0 {
                        break;
                    }
                    remaining -= 1;

                    let Some(raw) = &episode.path else { continue };
                    if !processed.insert(raw.clone()) {
                        continue;
                    }
                    let source_path = self.rewrite_sourced(raw);
                    if source_path.exists() {
                        continue_watching_paths.insert(source_path);
                        continue;
                    }
                    let destination_path = self.rewriter.on_destination(Path::new(raw));
                    if destination_path.exists() {
                        queue.push(ContinueWatchingEntry {
                            recency_rank: rank,
                            bucket_index: MAX_PER_SERIES - remaining,
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
        let sessions = self.sessions().await?;

        let mut set = tokio::task::JoinSet::new();
        for session in sessions {
            let Some(raw) = session.now_playing_item.and_then(|item| item.path) else {
                continue;
            };
            let candidate = self.rewrite_sourced(&raw);
            set.spawn(async move {
                let Some((inode, device, _)) = target_inode else {
                    return false;
                };
                let Ok(metadata) = tokio::fs::symlink_metadata(&candidate).await else {
                    return false;
                };
                #[cfg(unix)]
                {
                    use std::os::unix::fs::MetadataExt;
                    metadata.ino() == inode && metadata.dev() == device
                }
                #[cfg(not(unix))]
                {
                    let _ = (&metadata, inode, device);
                    false
                }
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
    fn jellyfin_constructs_with_noop_rewriter() {
        let jellyfin = Jellyfin::new(
            "http://localhost:8096",
            "api-key",
            vec!["Movies".to_string()],
            Vec::new(),
            Box::new(NoopRewriter::new("/fast", "/slow")),
        );
        assert_eq!(
            jellyfin.sort_signal(Path::new("/fast/a.mkv")),
            MediaSignal::absent()
        );
    }
}
