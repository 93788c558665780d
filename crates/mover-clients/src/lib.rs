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

//! Integrations with external seed clients (qBittorrent) and media
//! players (Plex, Jellyfin), plus the path-rewriting abstraction that
//! lets them talk about content in terms of whichever tier it currently
//! lives on.

pub mod error;
pub mod media;
pub mod rewriter;
pub mod seeding;

pub use error::{ClientError, ClientResult};
pub use media::jellyfin::Jellyfin;
pub use media::plex::Plex;
pub use media::{ContinueWatchingEntry, MediaPlayer};
pub use rewriter::{NoopRewriter, PathRewriter, RealRewriter};
pub use seeding::SeedingClient;
pub use seeding::qbit::Qbit;
