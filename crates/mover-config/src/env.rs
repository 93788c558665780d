//! `${VAR}` / `${VAR:-default}` expansion for raw configuration text.
//!
//! The original Python implementation loaded configuration through
//! `pyaml_env`, which performs the same style of substitution before
//! handing the document to the YAML parser. We replicate that behavior
//! here rather than pull in a YAML-specific env crate, since none of the
//! example repos in this workspace depend on one and `regex` is already
//! part of the shared dependency stack.

use std::env;

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ConfigError, ConfigResult};

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("static regex")
    })
}

/// Expand every `${VAR}` or `${VAR:-default}` reference in `input` using
/// the current process environment.
///
/// # Errors
/// Returns [`ConfigError::MissingEnvVar`] when a reference has no
/// default and the named variable is unset.
pub fn expand(input: &str) -> ConfigResult<String> {
    let mut error = None;
    let expanded = pattern().replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let default = caps.get(3).map(|m| m.as_str());
        match env::var(name) {
            Ok(value) => value,
            Err(_) => match default {
                Some(default) => default.to_string(),
                None => {
                    error.get_or_insert_with(|| ConfigError::MissingEnvVar {
                        name: name.to_string(),
                    });
                    String::new()
                }
            },
        }
    });

    if let Some(err) = error {
        return Err(err);
    }
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_simple_variable() {
        // SAFETY: test runs single-threaded w.r.t. this variable name.
        unsafe {
            env::set_var("MOVER_CONFIG_TEST_VAR", "hello");
        }
        let result = expand("value: ${MOVER_CONFIG_TEST_VAR}").expect("expand");
        assert_eq!(result, "value: hello");
        unsafe {
            env::remove_var("MOVER_CONFIG_TEST_VAR");
        }
    }

    #[test]
    fn falls_back_to_default() {
        let result = expand("value: ${MOVER_CONFIG_MISSING_VAR:-fallback}").expect("expand");
        assert_eq!(result, "value: fallback");
    }

    #[test]
    fn missing_variable_without_default_errors() {
        let err = expand("value: ${MOVER_CONFIG_DEFINITELY_MISSING}").expect_err("should error");
        assert!(matches!(err, ConfigError::MissingEnvVar { name } if name == "MOVER_CONFIG_DEFINITELY_MISSING"));
    }
}
