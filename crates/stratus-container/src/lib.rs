//! Local byte containers for Stratus resources.
//!
//! A container owns the local side of a transfer: the file (or memory
//! buffer) that a `get` fills and a `put` reads from. Three variants:
//!
//! - [`SingleFile`] -- a plain path on disk
//! - [`InCore`] -- memory-backed, spooling to a named temp file above a
//!   size threshold
//! - [`Ephemeral`] -- always temp-file-backed, deleted on drop unless kept
//!
//! # Design Rules
//!
//! 1. `filled` turns true only after a successful write or fetch.
//! 2. Reads above the configured cap fail with
//!    [`ContainerError::DataTooLarge`]; scientific data is never silently
//!    truncated.
//! 3. I/O handles are closed on every exit path (RAII owns them).

pub mod ephemeral;
pub mod error;
pub mod file;
pub mod incore;
pub mod traits;

pub use ephemeral::Ephemeral;
pub use error::{ContainerError, ContainerResult};
pub use file::SingleFile;
pub use incore::InCore;
pub use traits::{Container, IoHandle, IoMode, DEFAULT_READ_CAP};
