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

//! Domain types shared across the workspace: storage tiers, hardlinked
//! file groups, the demotion sort key, and the explicit per-run context.

pub mod context;
pub mod entry;
pub mod error;
pub mod plan;
pub mod signals;
pub mod tier;

pub use context::RunContext;
pub use entry::{FileEntry, InodeGroup};
pub use error::{ModelError, ModelResult};
pub use plan::{BirthTimeRank, MovePlan, PlannedMove, SortKey};
pub use signals::{MediaSignal, SeedingSignal};
pub use tier::{Tier, TierUsage};
