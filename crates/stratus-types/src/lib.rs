//! Foundation types for the Stratus resource acquisition toolbox.
//!
//! This crate provides the value objects shared by every other Stratus
//! crate: resource descriptions, canonical URIs, the per-tag audit history
//! and the promise descriptor used for not-yet-available data.
//!
//! # Key Types
//!
//! - [`Resource`] -- immutable description of a data item's semantics
//! - [`Uri`] -- canonical `(scheme, netloc, path, query)` location tuple
//! - [`History`] -- append-only audit log, shared per backend tag
//! - [`PromiseNote`] -- on-disk token describing a promised resource
//! - [`NamingStrategy`] -- per-provider naming dispatch for resources

pub mod error;
pub mod format;
pub mod history;
pub mod naming;
pub mod promise;
pub mod resource;
pub mod uri;

pub use error::TypeError;
pub use format::DataFormat;
pub use history::{History, HistoryAction, HistoryRecord};
pub use naming::{DefaultNaming, NamingStrategy, PathInfo, ProviderKind};
pub use promise::{PromiseNote, PROMISE_SUFFIX};
pub use resource::Resource;
pub use uri::Uri;
