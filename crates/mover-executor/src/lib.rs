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
#![allow(clippy::multiple_crate_versions)]

//! Executes a [`mover_model::MovePlan`] against a mapping's tiers: copies
//! and hardlinks files into their new location, then removes the
//! originals and any directories left empty behind them.

pub mod error;
pub mod executor;

pub use error::{ExecutorError, ExecutorResult};
pub use executor::{execute, ExecutionReport};
