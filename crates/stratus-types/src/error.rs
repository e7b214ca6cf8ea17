/// Errors from foundation type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A URI string could not be parsed.
    #[error("malformed uri: {0}")]
    MalformedUri(String),

    /// A data format tag was not recognized.
    #[error("unknown data format: {0}")]
    UnknownFormat(String),

    /// A promise descriptor could not be read or decoded.
    #[error("invalid promise note: {0}")]
    InvalidPromise(String),

    /// I/O error while reading or writing a serialized record.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for foundation type operations.
pub type Result<T> = std::result::Result<T, TypeError>;
