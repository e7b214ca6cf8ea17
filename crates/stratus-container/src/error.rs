/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// A read was requested beyond the configured size cap.
    ///
    /// Raised rather than truncating: a partial scientific dataset is
    /// worse than no dataset.
    #[error("data too large: {size} bytes exceeds the {cap} byte cap")]
    DataTooLarge { size: u64, cap: u64 },

    /// The container has no backing target yet for the requested action.
    #[error("container is void: {0}")]
    Void(String),

    /// I/O error from the underlying file or buffer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
