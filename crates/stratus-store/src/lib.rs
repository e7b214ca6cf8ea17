//! Storage backends for Stratus.
//!
//! A [`Store`] answers check/insert/retrieve/delete against an opaque item
//! path, and every mutating call leaves exactly one record in the shared
//! per-tag audit [`History`]. Two tiers:
//!
//! - [`CacheStore`]: a local or shared filesystem area
//!   (`root/kind/headdir/<item>`), with atomic rename-into-place inserts
//!   and archive-extraction conveniences on retrieve.
//! - [`ArchiveStore`]: a remote system reached through a transport
//!   [`Tube`] (plain file copy, symlink, or a minimal FTP client).
//!   Inserts may be delayed: the source is staged locally and a job
//!   description is handed to an external spool queue.
//!
//! [`PromiseStore`] layers promise-token semantics over any real store,
//! and [`StoreRegistry`] resolves a [`Uri`](stratus_types::Uri) to a
//! shared backend instance through ordered `(predicate, factory)` rules.
//!
//! [`History`]: stratus_types::History

pub mod archive;
pub mod cache;
pub mod error;
pub mod ftp;
mod fsutil;
pub mod options;
pub mod promise;
pub mod registry;
pub mod spool;
pub mod traits;
pub mod tube;

pub use archive::ArchiveStore;
pub use cache::{CacheLocus, CacheStore};
pub use error::{StoreError, StoreResult};
pub use ftp::{FtpLogin, FtpTube};
pub use options::{DelOptions, GetOptions, Intent, PutOptions};
pub use promise::PromiseStore;
pub use registry::StoreRegistry;
pub use spool::{DelayedJob, Spool};
pub use traits::{Fetch, StatInfo, Store, Stow};
pub use tube::{FileTube, Tube};
