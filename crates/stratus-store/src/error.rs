/// Errors raised by storage backends.
///
/// Only precondition violations and protocol/configuration faults surface
/// as errors. Transient backend failures during a transfer are reported as
/// the unsuccessful variant of the operation's return value instead, so
/// batch callers can keep going.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A mutating call reached a readonly store.
    #[error("store {backend} is readonly, refusing {action}")]
    ReadOnly {
        backend: String,
        action: &'static str,
    },

    /// No usable cache root could be resolved.
    #[error("no usable cache root: {0}")]
    NoCacheRoot(String),

    /// The FTP peer answered something the client cannot work with.
    #[error("ftp protocol error: {0}")]
    Protocol(String),

    /// Foundation type failure (malformed URI, bad promise note).
    #[error(transparent)]
    Type(#[from] stratus_types::TypeError),

    /// Filesystem or network failure outside a transfer.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Job description or promise serialization failure.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
