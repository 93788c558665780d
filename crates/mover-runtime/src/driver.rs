//! Wires validated configuration into live clients and drives a
//! demote-then-promote pass over every configured mapping.

use std::path::Path;
use std::sync::Arc;

use mover_clients::{Jellyfin, MediaPlayer, NoopRewriter, PathRewriter, Plex, Qbit, RealRewriter, SeedingClient};
use mover_config::{Config, JellyfinConfig, PlexConfig, QbitConfig, RewriteConfig, ValidatedMapping};
use mover_executor::{execute, ExecutionReport};
use mover_model::RunContext;
use mover_planner::{plan_demotion, plan_promotion, Mapping};
use tracing::{info, instrument};

use crate::error::RuntimeResult;

/// Demotion and promotion results for one mapping's run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingOutcome {
    /// Result of the demotion pass (fast tier to slow tier).
    pub demote: ExecutionReport,
    /// Result of the promotion pass (slow tier back to fast tier).
    pub promote: ExecutionReport,
}

/// Drives a full run across every configured mapping.
pub struct Driver {
    mappings: Vec<Mapping>,
}

impl Driver {
    /// Build a driver from validated configuration, constructing a live
    /// client for every attached seed/media-player entry.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mappings = config.mappings.iter().map(build_mapping).collect();
        Self { mappings }
    }

    /// Run a demote-then-promote pass over every mapping, in document
    /// order. Caches in `ctx` are invalidated between every phase, since
    /// a completed move changes what a stat or birth-time lookup for the
    /// old and new paths would return.
    ///
    /// # Errors
    /// Returns the first error encountered planning or executing a
    /// mapping; mappings processed before the failing one have already
    /// had their moves applied.
    #[instrument(skip_all, fields(mappings = self.mappings.len()))]
    pub async fn run(&self, ctx: &RunContext) -> RuntimeResult<Vec<(String, MappingOutcome)>> {
        let mut outcomes = Vec::with_capacity(self.mappings.len());

        for mapping in &self.mappings {
            let demote_plan = plan_demotion(mapping, ctx).await?;
            let demote = execute(mapping, &demote_plan, ctx).await?;
            ctx.invalidate_caches();

            let promote_plan = plan_promotion(mapping, ctx).await?;
            let promote = execute(mapping, &promote_plan, ctx).await?;
            ctx.invalidate_caches();

            info!(
                mapping = %mapping.name,
                demoted = demote.groups_moved,
                promoted = promote.groups_moved,
                "mapping run complete"
            );
            outcomes.push((mapping.name.clone(), MappingOutcome { demote, promote }));
        }

        Ok(outcomes)
    }
}

fn build_mapping(validated: &ValidatedMapping) -> Mapping {
    let source_root = validated.source.root.clone();
    let destination_root = validated.destination.root.clone();

    let seeders = validated
        .clients
        .iter()
        .map(|cfg: &QbitConfig| {
            let rewriter = make_rewriter(cfg.rewrite.as_ref(), &source_root, &destination_root);
            Arc::new(Qbit::new(cfg.host.clone(), cfg.user.clone(), cfg.password.clone(), rewriter))
                as Arc<dyn SeedingClient>
        })
        .collect();

    let mut media_players: Vec<Arc<dyn MediaPlayer>> = Vec::new();
    for cfg in &validated.plex {
        let cfg: &PlexConfig = cfg;
        let rewriter = make_rewriter(cfg.rewrite.as_ref(), &source_root, &destination_root);
        media_players.push(Arc::new(Plex::new(
            cfg.url.clone(),
            cfg.token.clone(),
            cfg.libraries.clone(),
            rewriter,
        )));
    }
    for cfg in &validated.jellyfin {
        let cfg: &JellyfinConfig = cfg;
        let rewriter = make_rewriter(cfg.rewrite.as_ref(), &source_root, &destination_root);
        media_players.push(Arc::new(Jellyfin::new(
            cfg.url.clone(),
            cfg.api_key.clone(),
            cfg.libraries.clone(),
            cfg.users.clone(),
            rewriter,
        )));
    }

    Mapping {
        name: validated.name.clone(),
        source: validated.source.clone(),
        destination: validated.destination.clone(),
        demote_threshold_percent: validated.demote_threshold_percent,
        promote_threshold_percent: validated.promote_threshold_percent,
        min_age: validated.min_age,
        max_age: validated.max_age,
        ignore: validated.ignore.clone(),
        seeders,
        media_players,
    }
}

fn make_rewriter(rewrite: Option<&RewriteConfig>, source_root: &Path, destination_root: &Path) -> Box<dyn PathRewriter> {
    rewrite.map_or_else(
        || Box::new(NoopRewriter::new(source_root, destination_root)) as Box<dyn PathRewriter>,
        |rewrite| Box::new(RealRewriter::new(rewrite.from.clone(), rewrite.to.clone(), destination_root)) as Box<dyn PathRewriter>,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mover_config::Config;

    #[tokio::test]
    async fn run_over_empty_config_produces_no_outcomes() {
        let config = Config { mappings: Vec::new() };
        let driver = Driver::from_config(&config);
        let ctx = RunContext::new(Utc::now(), true);
        let outcomes = driver.run(&ctx).await.expect("run");
        assert!(outcomes.is_empty());
    }
}
