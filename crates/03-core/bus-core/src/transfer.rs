//! The buffer entity: one in-flight data transfer between host and module.
//!
//! A [`Transfer`] is a cheap clonable handle over shared state; cloning is
//! the acquire operation, dropping a handle is the release, and the last
//! release frees the storage through the path its direction dictates:
//! outbound storage goes back to the transport that allocated it, inbound
//! bytes are owned by the core and dropped in place. Encoding the owner in
//! the storage variant makes freeing through the wrong path unrepresentable.

use std::any::Any;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use transport::{ChannelId, ModuleId, Transport, TransferOutcome, TransferStorage, TransferTag};

use crate::error::{CoreError, CoreResult};

/// Completion callback invoked from worker context once a transfer finishes.
pub type TransferComplete = Arc<dyn Fn(&Transfer) + Send + Sync>;

/// Opaque caller context attached to a transfer or registration.
pub type TransferContext = Arc<dyn Any + Send + Sync>;

/// Direction of a transfer relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to module; storage belongs to the transport.
    Outbound,
    /// Module to host; storage belongs to the core.
    Inbound,
}

/// Observable completion state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Not finished yet.
    Pending,
    /// Finished successfully; `actual_length` is valid.
    Completed,
    /// Aborted before submission.
    Cancelled,
    /// The link layer reported a failure code.
    Error(i32),
}

// Submission phases, advanced with compare-exchange so exactly one of
// submit/cancel wins the transition out of `CREATED`.
const PHASE_CREATED: u8 = 0;
const PHASE_SUBMITTED: u8 = 1;
const PHASE_CANCELLED: u8 = 2;
const PHASE_FINISHED: u8 = 3;

enum TransferData {
    Outbound {
        storage: TransferStorage,
        transport: Arc<dyn Transport>,
    },
    Inbound(Vec<u8>),
    Released,
}

struct TransferState {
    data: TransferData,
    status: TransferStatus,
    actual_length: usize,
}

pub(crate) struct TransferInner {
    tag: TransferTag,
    module: ModuleId,
    channel: ChannelId,
    direction: Direction,
    completion: TransferComplete,
    context: Option<TransferContext>,
    completed: AtomicBool,
    phase: AtomicU8,
    state: Mutex<TransferState>,
}

impl Drop for TransferInner {
    fn drop(&mut self) {
        let data = mem::replace(&mut self.state.get_mut().data, TransferData::Released);
        match data {
            TransferData::Outbound { storage, transport } => transport.free_storage(storage),
            TransferData::Inbound(bytes) => drop(bytes),
            TransferData::Released => {}
        }
    }
}

/// Shared handle to one transfer. Clone to acquire, drop to release.
#[derive(Clone)]
pub struct Transfer {
    inner: Arc<TransferInner>,
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("tag", &self.inner.tag)
            .field("module", &self.inner.module)
            .field("channel", &self.inner.channel)
            .field("direction", &self.inner.direction)
            .finish_non_exhaustive()
    }
}

impl Transfer {
    pub(crate) fn new_outbound(
        tag: TransferTag,
        module: ModuleId,
        channel: ChannelId,
        storage: TransferStorage,
        transport: Arc<dyn Transport>,
        completion: TransferComplete,
        context: Option<TransferContext>,
    ) -> Self {
        Self {
            inner: Arc::new(TransferInner {
                tag,
                module,
                channel,
                direction: Direction::Outbound,
                completion,
                context,
                completed: AtomicBool::new(false),
                phase: AtomicU8::new(PHASE_CREATED),
                state: Mutex::new(TransferState {
                    data: TransferData::Outbound { storage, transport },
                    status: TransferStatus::Pending,
                    actual_length: 0,
                }),
            }),
        }
    }

    /// Inbound entities own a fresh copy of the delivered bytes and are born
    /// finished: the data is already here, only the handler still has to run.
    pub(crate) fn new_inbound(
        tag: TransferTag,
        module: ModuleId,
        channel: ChannelId,
        data: Vec<u8>,
        handler: TransferComplete,
        context: Option<TransferContext>,
    ) -> Self {
        let actual_length = data.len();
        Self {
            inner: Arc::new(TransferInner {
                tag,
                module,
                channel,
                direction: Direction::Inbound,
                completion: handler,
                context,
                completed: AtomicBool::new(false),
                phase: AtomicU8::new(PHASE_FINISHED),
                state: Mutex::new(TransferState {
                    data: TransferData::Inbound(data),
                    status: TransferStatus::Completed,
                    actual_length,
                }),
            }),
        }
    }

    /// Core-assigned identity, echoed by the transport on completion.
    pub fn tag(&self) -> TransferTag {
        self.inner.tag
    }

    /// Module this transfer belongs to.
    pub fn module(&self) -> ModuleId {
        self.inner.module
    }

    /// Channel the transfer travels on.
    pub fn channel(&self) -> ChannelId {
        self.inner.channel
    }

    /// Direction relative to the host.
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Opaque context supplied at allocation or registration time.
    pub fn context(&self) -> Option<&TransferContext> {
        self.inner.context.as_ref()
    }

    /// Current completion status.
    pub fn status(&self) -> TransferStatus {
        self.inner.state.lock().status
    }

    /// Bytes actually moved, valid once the status is `Completed`.
    pub fn actual_length(&self) -> usize {
        self.inner.state.lock().actual_length
    }

    /// Declared storage capacity in bytes.
    pub fn capacity(&self) -> usize {
        let state = self.inner.state.lock();
        match &state.data {
            TransferData::Outbound { storage, .. } => storage.len(),
            TransferData::Inbound(bytes) => bytes.len(),
            TransferData::Released => 0,
        }
    }

    /// Copies `src` into the front of an outbound transfer's storage.
    pub fn fill(&self, src: &[u8]) -> CoreResult<()> {
        let mut state = self.inner.state.lock();
        match &mut state.data {
            TransferData::Outbound { storage, .. } => {
                if src.len() > storage.len() {
                    return Err(CoreError::CapacityExceeded {
                        requested: src.len(),
                        capacity: storage.len(),
                    });
                }
                storage.as_mut_slice()[..src.len()].copy_from_slice(src);
                Ok(())
            }
            TransferData::Inbound(_) | TransferData::Released => Err(CoreError::NotOutbound),
        }
    }

    /// Runs `f` over the transfer's bytes.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let state = self.inner.state.lock();
        match &state.data {
            TransferData::Outbound { storage, .. } => f(storage.as_slice()),
            TransferData::Inbound(bytes) => f(bytes),
            TransferData::Released => f(&[]),
        }
    }

    /// Copies the current payload bytes out.
    ///
    /// Used on the submit path so no state lock is held while the transport
    /// runs; a backend is allowed to complete the transfer from inside its
    /// own submit call.
    pub(crate) fn data_snapshot(&self) -> Vec<u8> {
        self.with_data(|bytes| bytes.to_vec())
    }

    pub(crate) fn try_mark_submitted(&self) -> CoreResult<()> {
        self.inner
            .phase
            .compare_exchange(
                PHASE_CREATED,
                PHASE_SUBMITTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| CoreError::AlreadyInFlight)
    }

    /// Rolls a failed submission back so the caller may retry or free.
    pub(crate) fn revert_submission(&self) {
        self.inner.phase.store(PHASE_CREATED, Ordering::Release);
    }

    /// Attempts the created -> cancelled transition; loses to submission.
    pub(crate) fn try_mark_cancelled(&self) -> bool {
        let won = self
            .inner
            .phase
            .compare_exchange(
                PHASE_CREATED,
                PHASE_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.inner.state.lock().status = TransferStatus::Cancelled;
        }
        won
    }

    /// Records the transport's verdict for an outbound transfer.
    pub(crate) fn set_finished(&self, outcome: TransferOutcome) {
        let mut state = self.inner.state.lock();
        match outcome {
            TransferOutcome::Success { actual_length } => {
                state.status = TransferStatus::Completed;
                state.actual_length = actual_length;
            }
            TransferOutcome::Error { code } => {
                state.status = TransferStatus::Error(code);
                state.actual_length = 0;
            }
        }
        drop(state);
        self.inner.phase.store(PHASE_FINISHED, Ordering::Release);
    }

    /// Invokes the completion callback, at most once over the entity's life.
    pub(crate) fn run_completion(&self) {
        if !self.inner.completed.swap(true, Ordering::AcqRel) {
            (self.inner.completion)(self);
        }
    }
}
