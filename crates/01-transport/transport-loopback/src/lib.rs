//! In-memory transport backend used by tests and demos.
//!
//! The loopback backend never touches real hardware: allocation hands out
//! heap buffers, submission either swallows the bytes or echoes a completion
//! straight back through the bound [`TransportEvents`] sink, and helpers let
//! a test inject inbound channel data and control frames as if they arrived
//! from the wire. Every operation is counted so lifecycle tests can assert
//! which free path ran and how often.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use transport::{
    ChannelId, SubmitRequest, Transport, TransportError, TransportEvents, TransportResult,
    TransferOutcome, TransferStorage,
};

/// Snapshot of the loopback operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackCounters {
    /// Storage allocations that succeeded.
    pub allocs: u32,
    /// Storage regions returned through `free_storage`.
    pub frees: u32,
    /// Outbound transfers accepted for "transmission".
    pub transfer_submits: u32,
    /// Control frames accepted for "transmission".
    pub control_submits: u32,
}

/// Loopback [`Transport`] with counters, failure injection, and echo mode.
pub struct LoopbackTransport {
    events: RwLock<Option<Weak<dyn TransportEvents>>>,
    allocs: AtomicU32,
    frees: AtomicU32,
    transfer_submits: AtomicU32,
    control_submits: AtomicU32,
    fail_next_alloc: AtomicBool,
    fail_submits: AtomicBool,
    echo: AtomicBool,
    next_cookie: AtomicU64,
    control_frames: Mutex<Vec<Vec<u8>>>,
}

impl LoopbackTransport {
    /// Creates an unbound loopback backend.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: RwLock::new(None),
            allocs: AtomicU32::new(0),
            frees: AtomicU32::new(0),
            transfer_submits: AtomicU32::new(0),
            control_submits: AtomicU32::new(0),
            fail_next_alloc: AtomicBool::new(false),
            fail_submits: AtomicBool::new(false),
            echo: AtomicBool::new(false),
            next_cookie: AtomicU64::new(1),
            control_frames: Mutex::new(Vec::new()),
        })
    }

    /// Binds the event sink completions and inbound traffic are delivered to.
    ///
    /// The sink is held weakly: the embedder owns it, and a sink usually
    /// owns this transport right back. Once the sink is dropped, deliveries
    /// are logged and discarded.
    pub fn bind(&self, events: Arc<dyn TransportEvents>) {
        *self.events.write() = Some(Arc::downgrade(&events));
    }

    fn events(&self) -> Option<Arc<dyn TransportEvents>> {
        self.events.read().as_ref().and_then(Weak::upgrade)
    }

    /// Makes the next `alloc_storage` call fail with `AllocationFailed`.
    pub fn fail_next_alloc(&self) {
        self.fail_next_alloc.store(true, Ordering::SeqCst);
    }

    /// Rejects every subsequent submission when enabled.
    pub fn set_fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    /// Completes each accepted transfer synchronously from inside `submit_transfer`.
    ///
    /// This deliberately exercises the core's promise that its finished entry
    /// point tolerates being called from the submission context.
    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    /// Current counter values.
    pub fn counters(&self) -> LoopbackCounters {
        LoopbackCounters {
            allocs: self.allocs.load(Ordering::SeqCst),
            frees: self.frees.load(Ordering::SeqCst),
            transfer_submits: self.transfer_submits.load(Ordering::SeqCst),
            control_submits: self.control_submits.load(Ordering::SeqCst),
        }
    }

    /// Control frames captured by `submit_control`, oldest first.
    pub fn sent_control_frames(&self) -> Vec<Vec<u8>> {
        self.control_frames.lock().clone()
    }

    /// Injects inbound channel data, as if it arrived from the wire.
    pub fn deliver_channel(&self, channel: ChannelId, data: &[u8]) {
        if let Some(events) = self.events() {
            events.channel_in(channel, data);
        } else {
            log::warn!("loopback: dropping inbound data for channel {channel}, no sink bound");
        }
    }

    /// Injects an inbound control frame from the controller.
    pub fn deliver_control(&self, frame: &[u8]) {
        if let Some(events) = self.events() {
            events.control_in(frame);
        } else {
            log::warn!("loopback: dropping inbound control frame, no sink bound");
        }
    }

    /// Reports a completion for a previously accepted transfer.
    pub fn finish_transfer(&self, tag: transport::TransferTag, outcome: TransferOutcome) {
        if let Some(events) = self.events() {
            events.transfer_finished(tag, outcome);
        }
    }
}

impl Transport for LoopbackTransport {
    fn alloc_storage(&self, size: usize) -> TransportResult<TransferStorage> {
        if self.fail_next_alloc.swap(false, Ordering::SeqCst) {
            return Err(TransportError::AllocationFailed { requested: size });
        }
        let cookie = self.next_cookie.fetch_add(1, Ordering::Relaxed);
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Ok(TransferStorage::new(
            vec![0u8; size].into_boxed_slice(),
            cookie,
        ))
    }

    fn free_storage(&self, storage: TransferStorage) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        drop(storage);
    }

    fn submit_transfer(&self, request: SubmitRequest<'_>) -> TransportResult<()> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(TransportError::SubmitRejected {
                reason: "loopback scripted submit failure",
            });
        }
        self.transfer_submits.fetch_add(1, Ordering::SeqCst);
        if self.echo.load(Ordering::SeqCst) {
            let actual_length = request.data.len();
            self.finish_transfer(request.tag, TransferOutcome::Success { actual_length });
        }
        Ok(())
    }

    fn submit_control(&self, frame: &[u8]) -> TransportResult<()> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(TransportError::SubmitRejected {
                reason: "loopback scripted submit failure",
            });
        }
        self.control_submits.fetch_add(1, Ordering::SeqCst);
        self.control_frames.lock().push(frame.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        channel_data: Mutex<Vec<(ChannelId, Vec<u8>)>>,
    }

    impl TransportEvents for RecordingSink {
        fn transfer_finished(&self, _tag: transport::TransferTag, _outcome: TransferOutcome) {}

        fn channel_in(&self, channel: ChannelId, data: &[u8]) {
            self.channel_data.lock().push((channel, data.to_vec()));
        }

        fn control_in(&self, _frame: &[u8]) {}
    }

    #[test]
    fn bound_sink_is_held_weakly() {
        let transport = LoopbackTransport::new();
        let sink = Arc::new(RecordingSink::default());
        transport.bind(sink.clone());

        transport.deliver_channel(3, &[1, 2]);
        assert_eq!(sink.channel_data.lock().as_slice(), &[(3, vec![1, 2])]);

        let weak = Arc::downgrade(&sink);
        drop(sink);
        assert!(weak.upgrade().is_none(), "transport held a strong reference");

        // Deliveries after the sink is gone are discarded, not a panic.
        transport.deliver_channel(3, &[3, 4]);
    }

    #[test]
    fn alloc_failure_is_one_shot() {
        let transport = LoopbackTransport::new();
        transport.fail_next_alloc();
        assert!(matches!(
            transport.alloc_storage(16),
            Err(TransportError::AllocationFailed { requested: 16 })
        ));
        let storage = transport.alloc_storage(16).expect("second alloc succeeds");
        assert_eq!(storage.len(), 16);
        assert_eq!(transport.counters().allocs, 1);
    }

    #[test]
    fn counters_track_each_operation() {
        let transport = LoopbackTransport::new();
        let storage = transport.alloc_storage(8).expect("alloc");
        transport.free_storage(storage);
        transport
            .submit_control(&[0x00, 0x00, 0x00, 0x00])
            .expect("control");
        assert_eq!(
            transport.counters(),
            LoopbackCounters {
                allocs: 1,
                frees: 1,
                transfer_submits: 0,
                control_submits: 1,
            }
        );
    }

    #[test]
    fn scripted_submit_failure_rejects_both_paths() {
        let transport = LoopbackTransport::new();
        transport.set_fail_submits(true);
        let request = SubmitRequest {
            tag: 1,
            channel: 0,
            module: 0,
            data: &[1, 2, 3],
        };
        assert!(transport.submit_transfer(request).is_err());
        assert!(transport.submit_control(&[0]).is_err());
        transport.set_fail_submits(false);
        assert!(transport.submit_transfer(request).is_ok());
    }
}
