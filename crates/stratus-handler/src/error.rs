/// Errors raised by handler orchestration.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// An operation was started while another one was running on the
    /// same handler. Handlers have a single logical owner.
    #[error("handler is busy, operations must be sequential")]
    Reentrant,

    /// `wait` exhausted its timeout with the promise still pending and
    /// the caller asked for a hard failure.
    #[error("promise still pending after {waited_secs}s for {item}")]
    PromiseTimeout { item: String, waited_secs: u64 },

    /// The registry had no backend for the provider's URI.
    #[error("no store resolves {0}")]
    NoStore(String),

    /// Backend failure that is not a soft transfer miss.
    #[error(transparent)]
    Store(#[from] stratus_store::StoreError),

    /// Local container failure.
    #[error(transparent)]
    Container(#[from] stratus_container::ContainerError),

    /// Foundation type failure (promise note, URI).
    #[error(transparent)]
    Type(#[from] stratus_types::TypeError),
}

/// Result alias for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
