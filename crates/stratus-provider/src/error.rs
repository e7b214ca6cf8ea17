/// Errors from provider construction.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The fixed URI given to a magic provider did not parse.
    #[error("invalid magic uri: {0}")]
    InvalidMagicUri(#[from] stratus_types::TypeError),

    /// A required configuration field was empty.
    #[error("missing provider field: {0}")]
    MissingField(&'static str),
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
