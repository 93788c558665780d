//! Validation of raw configuration into checked, typed values.

use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use mover_model::Tier;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{JellyfinConfig, PlexConfig, QbitConfig, RawMapping};

/// A fully validated tier mapping, ready to be handed to the planner.
#[derive(Debug, Clone)]
pub struct ValidatedMapping {
    /// Human-readable label used in logs.
    pub name: String,
    /// Fast tier files are demoted from and promoted into.
    pub source: Tier,
    /// Slow tier files are demoted into and promoted from.
    pub destination: Tier,
    /// Demote once source usage meets or exceeds this percent.
    pub demote_threshold_percent: f64,
    /// Promote while it would keep source usage under this percent.
    /// `None` when promotion is disabled (threshold was `0`).
    pub promote_threshold_percent: Option<f64>,
    /// Minimum file age before demotion eligibility.
    pub min_age: Duration,
    /// Maximum file age before demotion eligibility ends.
    pub max_age: Duration,
    /// Compiled ignore pattern set, matched against paths relative to
    /// `source`.
    pub ignore: GlobSet,
    /// Configured seeding clients.
    pub clients: Vec<QbitConfig>,
    /// Configured Plex servers.
    pub plex: Vec<PlexConfig>,
    /// Configured Jellyfin servers.
    pub jellyfin: Vec<JellyfinConfig>,
}

/// Validate a single raw mapping, identified by `index` for error
/// messages.
///
/// # Errors
/// Returns [`ConfigError::InvalidField`] when thresholds or the age
/// window are out of range, [`ConfigError::InvalidDuration`] when
/// `min_age`/`max_age` fail to parse, or [`ConfigError::InvalidGlob`]
/// when an ignore pattern does not compile.
pub fn validate_mapping(index: usize, raw: &RawMapping) -> ConfigResult<ValidatedMapping> {
    let section = format!("mappings[{index}] ({})", raw.name);

    if !(0.0..=100.0).contains(&raw.demote_threshold_percent) {
        return Err(ConfigError::InvalidField {
            section: section.clone(),
            field: "demote_threshold_percent",
            value: Some(raw.demote_threshold_percent.to_string()),
            reason: "must be between 0 and 100",
        });
    }
    if !(0.0..=100.0).contains(&raw.promote_threshold_percent) {
        return Err(ConfigError::InvalidField {
            section: section.clone(),
            field: "promote_threshold_percent",
            value: Some(raw.promote_threshold_percent.to_string()),
            reason: "must be between 0 and 100",
        });
    }

    let min_age = parse_duration(&section, "min_age", &raw.min_age)?;
    let max_age = parse_duration(&section, "max_age", &raw.max_age)?;
    if min_age > max_age {
        return Err(ConfigError::InvalidField {
            section: section.clone(),
            field: "min_age",
            value: Some(raw.min_age.clone()),
            reason: "min_age must not exceed max_age",
        });
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in &raw.ignore {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
            section: section.clone(),
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    let ignore = builder.build().map_err(|source| ConfigError::InvalidGlob {
        section: section.clone(),
        pattern: raw.ignore.join(","),
        source,
    })?;

    let promote_threshold_percent = if raw.promote_threshold_percent > 0.0 {
        Some(raw.promote_threshold_percent)
    } else {
        None
    };

    Ok(ValidatedMapping {
        name: raw.name.clone(),
        source: Tier::new("source", &raw.source),
        destination: Tier::new("destination", &raw.destination),
        demote_threshold_percent: raw.demote_threshold_percent,
        promote_threshold_percent,
        min_age,
        max_age,
        ignore,
        clients: raw.clients.clone(),
        plex: raw.plex.clone(),
        jellyfin: raw.jellyfin.clone(),
    })
}

fn parse_duration(section: &str, field: &'static str, raw: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(raw).map_err(|source| ConfigError::InvalidDuration {
        section: section.to_string(),
        field,
        value: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawMapping;

    fn raw(demote: f64, promote: f64, min_age: &str, max_age: &str) -> RawMapping {
        RawMapping {
            name: "test".to_string(),
            source: "/fast".to_string(),
            destination: "/slow".to_string(),
            demote_threshold_percent: demote,
            promote_threshold_percent: promote,
            min_age: min_age.to_string(),
            max_age: max_age.to_string(),
            ignore: vec!["*.part".to_string()],
            clients: Vec::new(),
            plex: Vec::new(),
            jellyfin: Vec::new(),
        }
    }

    #[test]
    fn accepts_a_well_formed_mapping() {
        let validated = validate_mapping(0, &raw(85.0, 60.0, "2h", "30d")).expect("valid");
        assert_eq!(validated.demote_threshold_percent, 85.0);
        assert_eq!(validated.promote_threshold_percent, Some(60.0));
        assert!(validated.ignore.is_match("movie.part"));
    }

    #[test]
    fn zero_promote_threshold_disables_promotion() {
        let validated = validate_mapping(0, &raw(85.0, 0.0, "2h", "30d")).expect("valid");
        assert_eq!(validated.promote_threshold_percent, None);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = validate_mapping(0, &raw(150.0, 0.0, "2h", "30d")).expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidField { field: "demote_threshold_percent", .. }));
    }

    #[test]
    fn rejects_min_age_greater_than_max_age() {
        let err = validate_mapping(0, &raw(85.0, 0.0, "30d", "2h")).expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidField { field: "min_age", .. }));
    }

    #[test]
    fn rejects_unparseable_duration() {
        let err = validate_mapping(0, &raw(85.0, 0.0, "not-a-duration", "30d")).expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }
}
