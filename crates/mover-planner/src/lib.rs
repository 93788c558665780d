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

//! Turns a [`Mapping`]'s configured tiers, thresholds, and attached
//! clients into concrete [`mover_model::MovePlan`]s: which hardlinked
//! file groups to demote from fast to slow storage, and which to
//! promote back.

pub mod error;
pub mod mapping;
pub mod planner;
pub mod walk;

pub use error::{PlannerError, PlannerResult};
pub use mapping::Mapping;
pub use planner::{plan_demotion, plan_promotion};
pub use walk::walk_and_group;
