//! Top-level configuration loading: read, expand, parse, validate.

use std::path::Path;

use tracing::{info, instrument};

use crate::env;
use crate::error::{ConfigError, ConfigResult};
use crate::model::RawConfig;
use crate::validate::{ValidatedMapping, validate_mapping};

/// A fully loaded and validated configuration document.
#[derive(Debug, Clone)]
pub struct Config {
    /// Every validated mapping, in document order.
    pub mappings: Vec<ValidatedMapping>,
}

/// Load, expand, parse, and validate the configuration file at `path`.
///
/// # Errors
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::MissingEnvVar`] if an `${VAR}` reference cannot be
/// resolved, [`ConfigError::Yaml`] if the expanded document is not valid
/// YAML matching the expected shape, or any of the validation errors
/// surfaced by [`validate_mapping`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> ConfigResult<Config> {
    let raw_text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let expanded = env::expand(&raw_text)?;

    let raw: RawConfig =
        serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    let mappings = raw
        .mappings
        .iter()
        .enumerate()
        .map(|(index, mapping)| validate_mapping(index, mapping))
        .collect::<ConfigResult<Vec<_>>>()?;

    info!(mapping_count = mappings.len(), "configuration loaded");

    Ok(Config { mappings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r"
mappings:
  - name: movies
    source: /fast/movies
    destination: /slow/movies
    demote_threshold_percent: 90
    promote_threshold_percent: 60
    min_age: 2h
    max_age: 30d
    ignore:
      - '*.part'
"
        )
        .expect("write");

        let config = load(file.path()).expect("load");
        assert_eq!(config.mappings.len(), 1);
        assert_eq!(config.mappings[0].name, "movies");
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = load(Path::new("/nonexistent/mover.yaml")).expect_err("should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
