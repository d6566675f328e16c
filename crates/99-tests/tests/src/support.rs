//! Shared fixtures: a bound host over a loopback backend and completion
//! reporters feeding a channel the test can block on.

use std::sync::Arc;
use std::time::Duration;

use bus_core::{Host, Transfer, TransferComplete, TransferStatus};
use crossbeam_channel::Receiver;
use transport_loopback::LoopbackTransport;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback transport with a host bound as its event sink.
pub fn rig() -> (Arc<LoopbackTransport>, Arc<Host>) {
    let transport = LoopbackTransport::new();
    let host = Host::new(transport.clone()).expect("start host");
    transport.bind(host.clone());
    (transport, host)
}

/// Completion callback that reports the transfer's final status.
pub fn status_reporter() -> (TransferComplete, Receiver<TransferStatus>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let completion: TransferComplete = Arc::new(move |t: &Transfer| {
        tx.send(t.status()).expect("report status");
    });
    (completion, rx)
}

/// Completion callback that reports the finished transfer's tag.
pub fn tag_reporter() -> (TransferComplete, Receiver<u64>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let completion: TransferComplete = Arc::new(move |t: &Transfer| {
        tx.send(t.tag()).expect("report tag");
    });
    (completion, rx)
}
