use thiserror::Error;

/// Convenience alias used across the transport surface.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported by a link-layer backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Backing storage for an outbound transfer could not be allocated.
    #[error("transfer storage allocation failed ({requested} bytes)")]
    AllocationFailed {
        /// Size the core asked for.
        requested: usize,
    },

    /// The backend refused to queue the transfer or control frame.
    #[error("backend rejected the submission: {reason}")]
    SubmitRejected {
        /// Backend-specific explanation.
        reason: &'static str,
    },

    /// The physical link is not available.
    #[error("link is down")]
    LinkDown,
}
