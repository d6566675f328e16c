use svc_codec::EncodeError;
use thiserror::Error;
use transport::{ChannelId, TransportError};

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors reported by the bus core. None are fatal; every kind is
/// recoverable at the call site and nothing here retries automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Storage or entity allocation failed.
    #[error("transfer allocation failed")]
    AllocationFailure(#[source] TransportError),

    /// The channel already has a registered handler.
    #[error("channel {0} already has a registered handler")]
    AlreadyRegistered(ChannelId),

    /// The channel id lies outside the bounded channel space.
    #[error("channel {0} is outside the supported channel space")]
    InvalidChannel(ChannelId),

    /// Inbound data arrived for a channel nobody registered. The data is
    /// dropped, not queued.
    #[error("no handler registered for channel {0}")]
    UnhandledChannel(ChannelId),

    /// The backend rejected a submission synchronously.
    #[error("transport rejected the submission")]
    TransportFailure(#[source] TransportError),

    /// The control message cannot be represented on the wire.
    #[error("control message could not be encoded")]
    ControlEncoding(#[source] EncodeError),

    /// The completion worker thread could not be started.
    #[error("completion worker could not be started: {reason}")]
    WorkerSpawn {
        /// Spawn failure as reported by the OS.
        reason: String,
    },

    /// The transfer is already in flight; it cannot be aborted anymore.
    #[error("cancellation is unsupported once a transfer has been submitted")]
    CancellationUnsupported,

    /// The operation only applies to outbound transfers.
    #[error("operation requires an outbound transfer")]
    NotOutbound,

    /// The transfer was already submitted, cancelled, or finished.
    #[error("transfer is no longer submittable")]
    AlreadyInFlight,

    /// More bytes were offered than the transfer's storage can hold.
    #[error("payload of {requested} bytes exceeds transfer capacity {capacity}")]
    CapacityExceeded {
        /// Bytes the caller tried to place.
        requested: usize,
        /// Declared storage capacity.
        capacity: usize,
    },
}
