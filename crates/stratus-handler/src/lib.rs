//! Handler orchestration: one object tying a resource description, its
//! location provider and a local container together.
//!
//! The handler resolves a backend store from the provider's URI, runs
//! get/put/check/delete against it, keeps its own audit history, walks a
//! one-way lifecycle state machine and knows how to poll for promised
//! data that is not available yet.

pub mod error;
pub mod handler;
pub mod hooks;

pub use error::{HandlerError, HandlerResult};
pub use handler::{Handler, Stage};
pub use hooks::{HookEvent, NamedHook};
