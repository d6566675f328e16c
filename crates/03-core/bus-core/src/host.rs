//! Glue object binding transport, registry, dispatcher, and control session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use svc_codec::{BatteryReading, ControlMessage, ControlSender, ModuleEvents, SupervisorSession};
use transport::{
    ChannelId, ModuleId, SubmitRequest, Transport, TransportEvents, TransferOutcome, TransferTag,
};

use crate::dispatch::CompletionQueue;
use crate::error::{CoreError, CoreResult};
use crate::registry::ChannelRegistry;
use crate::transfer::{Direction, Transfer, TransferComplete, TransferContext};

/// Routes control replies from the supervisor session into the backend.
struct TransportControlSender {
    transport: Arc<dyn Transport>,
}

impl ControlSender for TransportControlSender {
    fn send_control(&self, frame: Vec<u8>) {
        if let Err(err) = self.transport.submit_control(&frame) {
            log::error!("control frame submission failed: {err}");
        }
    }
}

/// Module-lifecycle sink used when the embedder does not install one.
struct DiscardedModuleEvents;

impl ModuleEvents for DiscardedModuleEvents {
    fn module_added(&self, module_id: u8, _descriptor: &[u8]) {
        log::debug!("module {module_id} added (no lifecycle listener installed)");
    }

    fn module_removed(&self, module_id: u8) {
        log::debug!("module {module_id} removed (no lifecycle listener installed)");
    }
}

/// One host-side bus instance over a transport backend.
///
/// The host is the backend's event sink: bind it (as
/// `Arc<dyn TransportEvents>`) to the transport after construction.
pub struct Host {
    transport: Arc<dyn Transport>,
    registry: ChannelRegistry,
    queue: CompletionQueue,
    supervisor: SupervisorSession,
    inflight: Mutex<HashMap<TransferTag, Transfer>>,
    next_tag: AtomicU64,
}

impl Host {
    /// Creates a host without a module-lifecycle listener.
    pub fn new(transport: Arc<dyn Transport>) -> CoreResult<Arc<Self>> {
        Self::with_module_events(transport, Arc::new(DiscardedModuleEvents))
    }

    /// Creates a host that reports hotplug events to `modules`. Fails when
    /// the completion worker thread cannot be started.
    pub fn with_module_events(
        transport: Arc<dyn Transport>,
        modules: Arc<dyn ModuleEvents>,
    ) -> CoreResult<Arc<Self>> {
        let sender = Arc::new(TransportControlSender {
            transport: transport.clone(),
        });
        let queue = CompletionQueue::new().map_err(|err| CoreError::WorkerSpawn {
            reason: err.to_string(),
        })?;
        Ok(Arc::new(Self {
            transport,
            registry: ChannelRegistry::new(),
            queue,
            supervisor: SupervisorSession::new(sender, modules),
            inflight: Mutex::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
        }))
    }

    /// Handle for the module with the given id.
    pub fn module(self: &Arc<Self>, id: ModuleId) -> Module {
        Module {
            id,
            host: Arc::clone(self),
        }
    }

    /// Channel registration table.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Allocates an outbound transfer with `size` bytes of backing storage.
    ///
    /// On transport failure the partially constructed entity is discarded;
    /// the caller never sees a half-initialized transfer.
    pub fn alloc_transfer(
        &self,
        module: ModuleId,
        channel: ChannelId,
        size: usize,
        completion: TransferComplete,
        context: Option<TransferContext>,
    ) -> CoreResult<Transfer> {
        let storage = self
            .transport
            .alloc_storage(size)
            .map_err(CoreError::AllocationFailure)?;
        Ok(Transfer::new_outbound(
            self.next_tag.fetch_add(1, Ordering::Relaxed),
            module,
            channel,
            storage,
            self.transport.clone(),
            completion,
            context,
        ))
    }

    /// Hands an outbound transfer to the backend for transmission.
    ///
    /// A synchronous backend error is propagated unchanged and leaves the
    /// transfer submittable again; no completion will arrive for it.
    pub fn submit(&self, transfer: &Transfer) -> CoreResult<()> {
        if transfer.direction() != Direction::Outbound {
            return Err(CoreError::NotOutbound);
        }
        transfer.try_mark_submitted()?;

        // The in-flight table holds the reference the backend logically owns
        // until it reports the transfer finished. Insert before submitting:
        // a backend may complete synchronously from inside submit.
        let tag = transfer.tag();
        self.inflight.lock().insert(tag, transfer.clone());

        let data = transfer.data_snapshot();
        let request = SubmitRequest {
            tag,
            channel: transfer.channel(),
            module: transfer.module(),
            data: &data,
        };
        if let Err(err) = self.transport.submit_transfer(request) {
            self.inflight.lock().remove(&tag);
            transfer.revert_submission();
            return Err(CoreError::TransportFailure(err));
        }
        Ok(())
    }

    /// Best-effort abort.
    ///
    /// Before submission the transfer transitions to
    /// [`TransferStatus::Cancelled`] and its completion still runs once
    /// through the dispatcher; the backend never sees the entity. Once
    /// submitted, cancellation is unsupported and this reports exactly that.
    ///
    /// [`TransferStatus::Cancelled`]: crate::TransferStatus::Cancelled
    pub fn cancel(&self, transfer: &Transfer) -> CoreResult<()> {
        if transfer.try_mark_cancelled() {
            self.queue.enqueue(transfer.clone());
            Ok(())
        } else {
            Err(CoreError::CancellationUnsupported)
        }
    }

    /// Resolves the handler for `channel` and queues an inbound entity over a
    /// copy of `data`.
    ///
    /// The copy decouples the entity from the transport's receive buffer,
    /// which the backend may reuse as soon as this returns.
    pub fn dispatch_inbound(&self, channel: ChannelId, data: &[u8]) -> CoreResult<()> {
        let entry = self.registry.resolve(channel)?;
        let transfer = Transfer::new_inbound(
            self.next_tag.fetch_add(1, Ordering::Relaxed),
            entry.module,
            channel,
            data.to_vec(),
            entry.handler,
            entry.context,
        );
        self.queue.enqueue(transfer);
        Ok(())
    }

    /// Encodes and sends a control message to the supervisory controller.
    pub fn send_control(&self, message: &ControlMessage) -> CoreResult<()> {
        let frame = message.encode().map_err(CoreError::ControlEncoding)?;
        self.transport
            .submit_control(&frame)
            .map_err(CoreError::TransportFailure)
    }

    /// Latest battery reading the controller reported for `module_id`.
    pub fn battery_status(&self, module_id: ModuleId) -> Option<BatteryReading> {
        self.supervisor.battery_status(module_id)
    }

    /// Stops the completion worker after draining queued work.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

impl TransportEvents for Host {
    fn transfer_finished(&self, tag: TransferTag, outcome: TransferOutcome) {
        let Some(transfer) = self.inflight.lock().remove(&tag) else {
            log::warn!("completion for unknown transfer tag {tag}");
            return;
        };
        transfer.set_finished(outcome);
        self.queue.enqueue(transfer);
    }

    fn channel_in(&self, channel: ChannelId, data: &[u8]) {
        if let Err(err) = self.dispatch_inbound(channel, data) {
            log::error!("dropping {} inbound bytes: {err}", data.len());
        }
    }

    fn control_in(&self, frame: &[u8]) {
        self.supervisor.ingest(frame);
    }
}

/// Handle for one attached module, the owner recorded on transfers and
/// registrations.
#[derive(Clone)]
pub struct Module {
    id: ModuleId,
    host: Arc<Host>,
}

impl Module {
    /// Bus-assigned module id.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Host this module hangs off.
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    /// Allocates an outbound transfer owned by this module.
    pub fn alloc_transfer(
        &self,
        channel: ChannelId,
        size: usize,
        completion: TransferComplete,
        context: Option<TransferContext>,
    ) -> CoreResult<Transfer> {
        self.host
            .alloc_transfer(self.id, channel, size, completion, context)
    }

    /// Registers `handler` for inbound data on `channel`.
    pub fn register_channel(
        &self,
        channel: ChannelId,
        handler: TransferComplete,
        context: Option<TransferContext>,
    ) -> CoreResult<()> {
        self.host
            .registry()
            .register(channel, handler, self.id, context)
    }

    /// Removes this module's registration for `channel`.
    pub fn deregister_channel(&self, channel: ChannelId) {
        self.host.registry().deregister(channel);
    }
}
