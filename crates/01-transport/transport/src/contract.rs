use crate::{TransferStorage, TransportResult};

/// Logical channel number addressing one endpoint on a module.
pub type ChannelId = u16;

/// Identifier of an attached peripheral module.
pub type ModuleId = u8;

/// Opaque identity of one in-flight transfer, assigned by the core.
///
/// Backends carry the tag from [`Transport::submit_transfer`] to
/// [`TransportEvents::transfer_finished`] unchanged; they never interpret it.
pub type TransferTag = u64;

/// Borrowed view of an outbound transfer handed to a backend for transmission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    /// Tag to echo back through [`TransportEvents::transfer_finished`].
    pub tag: TransferTag,
    /// Destination channel.
    pub channel: ChannelId,
    /// Destination module.
    pub module: ModuleId,
    /// Bytes to put on the wire.
    pub data: &'a [u8],
}

/// Result a backend reports for one finished outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer went out; `actual_length` bytes were transmitted.
    Success {
        /// Bytes actually moved, at most the declared length.
        actual_length: usize,
    },
    /// The transfer failed with a backend-specific status code.
    Error {
        /// Raw status code as reported by the link layer.
        code: i32,
    },
}

/// Contract a link-layer backend implements for the bus core.
///
/// The core calls down through this trait; completions and inbound traffic
/// come back up through [`TransportEvents`]. Backends must tolerate
/// `submit_transfer` being called concurrently from several threads.
pub trait Transport: Send + Sync {
    /// Allocates backing storage for an outbound transfer of `size` bytes.
    fn alloc_storage(&self, size: usize) -> TransportResult<TransferStorage>;

    /// Releases storage previously handed out by [`Transport::alloc_storage`].
    ///
    /// Called exactly once per allocation, when the owning transfer is
    /// destroyed.
    fn free_storage(&self, storage: TransferStorage);

    /// Queues an outbound transfer for transmission.
    ///
    /// A synchronous error means the backend never accepted the transfer and
    /// will not report a completion for it.
    fn submit_transfer(&self, request: SubmitRequest<'_>) -> TransportResult<()>;

    /// Sends an encoded control-plane frame to the supervisory controller.
    fn submit_control(&self, frame: &[u8]) -> TransportResult<()>;
}

/// Entry points the core exposes to a backend.
///
/// All three may be invoked from restricted execution contexts (completion
/// interrupts, receive paths); implementations must not block.
pub trait TransportEvents: Send + Sync {
    /// An outbound transfer previously accepted by
    /// [`Transport::submit_transfer`] has finished.
    fn transfer_finished(&self, tag: TransferTag, outcome: TransferOutcome);

    /// Raw bytes arrived on a data channel.
    fn channel_in(&self, channel: ChannelId, data: &[u8]);

    /// An encoded control-plane frame arrived from the controller.
    fn control_in(&self, frame: &[u8]);
}
