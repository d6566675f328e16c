//! Outbound and inbound data-plane flows exercised end to end: allocation,
//! fill, submission, completion dispatch, and storage teardown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bus_core::{CoreError, Transfer, TransferComplete, TransferStatus};
use parking_lot::Mutex;
use transport::TransferOutcome;

use crate::support::{rig, status_reporter, tag_reporter, RECV_TIMEOUT};

#[test]
fn outbound_transfer_completes_and_storage_returns() -> anyhow::Result<()> {
    let (transport, host) = rig();
    transport.set_echo(true);

    let (completion, done) = status_reporter();
    let transfer = host.alloc_transfer(1, 3, 8, completion, None)?;
    transfer.fill(&[0xA0, 0xA1, 0xA2])?;
    host.submit(&transfer)?;

    let status = done.recv_timeout(RECV_TIMEOUT).context("completion")?;
    assert_eq!(status, TransferStatus::Completed);
    assert_eq!(transfer.actual_length(), 8);

    host.shutdown();
    drop(transfer);
    let counters = transport.counters();
    assert_eq!(counters.allocs, 1);
    assert_eq!(counters.frees, 1);
    assert_eq!(counters.transfer_submits, 1);
    Ok(())
}

#[test]
fn inbound_bytes_reach_the_registered_handler_once() -> anyhow::Result<()> {
    let (transport, host) = rig();

    let (tx, rx) = crossbeam_channel::unbounded();
    let handler: TransferComplete = Arc::new(move |t: &Transfer| {
        t.with_data(|bytes| tx.send((t.module(), bytes.to_vec())).expect("report"));
    });
    host.registry().register(7, handler, 2, None)?;

    transport.deliver_channel(7, &[1, 2, 3]);
    let (module, bytes) = rx.recv_timeout(RECV_TIMEOUT).context("handler")?;
    assert_eq!(module, 2);
    assert_eq!(bytes, vec![1, 2, 3]);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    Ok(())
}

#[test]
fn unregistered_channel_drops_the_delivery() {
    let (transport, host) = rig();

    // The transport-facing entry point swallows the error (it has nobody to
    // report to); the embedder-facing one surfaces it.
    transport.deliver_channel(42, &[9, 9, 9]);
    assert_eq!(
        host.dispatch_inbound(42, &[9, 9, 9]),
        Err(CoreError::UnhandledChannel(42))
    );
}

#[test]
fn cancelled_transfer_never_reaches_the_wire() -> anyhow::Result<()> {
    let (transport, host) = rig();

    let (completion, done) = status_reporter();
    let transfer = host.alloc_transfer(1, 3, 16, completion, None)?;
    host.cancel(&transfer)?;

    let status = done.recv_timeout(RECV_TIMEOUT).context("completion")?;
    assert_eq!(status, TransferStatus::Cancelled);
    assert_eq!(transport.counters().transfer_submits, 0);

    host.shutdown();
    drop(transfer);
    assert_eq!(transport.counters().frees, 1);
    Ok(())
}

#[test]
fn transport_error_code_surfaces_in_the_status() -> anyhow::Result<()> {
    let (transport, host) = rig();

    let (completion, done) = status_reporter();
    let transfer = host.alloc_transfer(1, 3, 4, completion, None)?;
    host.submit(&transfer)?;
    transport.finish_transfer(transfer.tag(), TransferOutcome::Error { code: -71 });

    let status = done.recv_timeout(RECV_TIMEOUT).context("completion")?;
    assert_eq!(status, TransferStatus::Error(-71));
    assert_eq!(transfer.actual_length(), 0);
    Ok(())
}

#[test]
fn completions_for_one_channel_run_in_submission_order() -> anyhow::Result<()> {
    let (transport, host) = rig();

    let (completion, done) = tag_reporter();
    let mut tags = Vec::new();
    for _ in 0..4 {
        let transfer = host.alloc_transfer(1, 3, 4, completion.clone(), None)?;
        host.submit(&transfer)?;
        tags.push(transfer.tag());
    }
    for &tag in &tags {
        transport.finish_transfer(tag, TransferOutcome::Success { actual_length: 4 });
    }

    let mut seen = Vec::new();
    for _ in 0..tags.len() {
        seen.push(done.recv_timeout(RECV_TIMEOUT).context("completion")?);
    }
    assert_eq!(seen, tags);
    Ok(())
}

#[test]
fn concurrent_submitters_get_exactly_one_completion_each() -> anyhow::Result<()> {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;

    let (transport, host) = rig();
    transport.set_echo(true);

    let (completion, done) = tag_reporter();
    let held = Arc::new(Mutex::new(Vec::new()));

    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let host = host.clone();
        let completion = completion.clone();
        let held = held.clone();
        workers.push(std::thread::spawn(move || {
            for _ in 0..PER_THREAD {
                let transfer = host
                    .alloc_transfer(1, 5, 4, completion.clone(), None)
                    .expect("alloc");
                transfer.fill(&[0xFF; 4]).expect("fill");
                host.submit(&transfer).expect("submit");
                held.lock().push(transfer);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("submitter thread");
    }

    let mut seen = Vec::new();
    for _ in 0..THREADS * PER_THREAD {
        seen.push(done.recv_timeout(RECV_TIMEOUT).context("completion")?);
    }
    assert!(done.recv_timeout(Duration::from_millis(50)).is_err());
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), THREADS * PER_THREAD, "tags completed once each");

    host.shutdown();
    held.lock().clear();
    let counters = transport.counters();
    assert_eq!(counters.allocs, (THREADS * PER_THREAD) as u32);
    assert_eq!(counters.frees, counters.allocs);
    Ok(())
}

#[test]
fn module_handles_scope_registrations_and_ownership() -> anyhow::Result<()> {
    let (transport, host) = rig();
    transport.set_echo(true);

    let module = host.module(6);
    let (completion, done) = status_reporter();
    module.register_channel(12, completion.clone(), None)?;
    assert_eq!(
        module
            .register_channel(12, completion.clone(), None)
            .expect_err("slot is taken"),
        CoreError::AlreadyRegistered(12)
    );

    let transfer = module.alloc_transfer(12, 4, completion, None)?;
    assert_eq!(transfer.module(), 6);
    host.submit(&transfer)?;
    assert_eq!(
        done.recv_timeout(RECV_TIMEOUT).context("completion")?,
        TransferStatus::Completed
    );

    module.deregister_channel(12);
    assert!(!host.registry().is_registered(12));
    Ok(())
}
