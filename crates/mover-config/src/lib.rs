#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! YAML-backed configuration for tier mappings: loading, `${VAR}`
//! expansion, and validation.

pub mod env;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{Config, load};
pub use model::{JellyfinConfig, PlexConfig, QbitConfig, RawConfig, RawMapping, RewriteConfig};
pub use validate::ValidatedMapping;
