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

//! Ties configuration, clients, planning, and execution together: builds
//! live clients from validated configuration, holds the single-instance
//! pidfile lock, and drives a demote-then-promote pass over every
//! mapping.

pub mod driver;
pub mod error;
pub mod lock;

pub use driver::{Driver, MappingOutcome};
pub use error::{RuntimeError, RuntimeResult};
pub use lock::PidLock;
