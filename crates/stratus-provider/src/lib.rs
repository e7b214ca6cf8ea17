//! Location providers: the mapping from an abstract [`Resource`]
//! description to its canonical [`Uri`].
//!
//! A provider never moves bytes. It answers a single question, where a
//! resource lives, as a pure function of the resource and the provider's
//! own configuration. Three flavours:
//!
//! - [`MagicProvider`]: always the same URI (constants, test fixtures)
//! - [`RemoteProvider`]: a direct host/path with a transport tube
//! - [`StructuredProvider`]: experiment-scoped canonical paths with a
//!   pluggable name builder
//!
//! [`Resource`]: stratus_types::Resource
//! [`Uri`]: stratus_types::Uri

pub mod error;
pub mod magic;
pub mod remote;
pub mod structured;
pub mod traits;

pub use error::{ProviderError, ProviderResult};
pub use magic::MagicProvider;
pub use remote::{RemoteProvider, TubeKind};
pub use structured::{StructuredNameBuilder, StructuredProvider};
pub use traits::Provider;
