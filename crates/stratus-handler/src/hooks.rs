use std::sync::Arc;

use crate::handler::Handler;

/// Where in an operation a hook fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// Immediately before the store insert of a `put`.
    BeforePut,
    /// Immediately after a successful, non-delayed `get`.
    AfterGet,
}

/// A named callback bound to one event.
///
/// Hooks run in registration order and receive the handler read-only;
/// they exist to trigger side effects (downstream notification, mostly)
/// without coupling the handler to those consumers.
#[derive(Clone)]
pub struct NamedHook {
    pub name: String,
    pub event: HookEvent,
    pub callback: Arc<dyn Fn(&Handler) + Send + Sync>,
}

impl NamedHook {
    pub fn new(
        name: impl Into<String>,
        event: HookEvent,
        callback: impl Fn(&Handler) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            event,
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for NamedHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedHook")
            .field("name", &self.name)
            .field("event", &self.event)
            .finish()
    }
}
