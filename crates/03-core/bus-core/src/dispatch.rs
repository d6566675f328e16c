//! Deferred-completion worker.
//!
//! Producers (transport completion signals, inbound deliveries) may run in
//! restricted contexts that must not block, so `enqueue` is a plain
//! unbounded channel send. A single worker thread drains the queue in FIFO
//! order and runs each entity's completion exactly once; transfers enqueued
//! in order for the same channel therefore complete in that order. Callbacks
//! are free to block, allocate, and take locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::transfer::Transfer;

enum Job {
    Run(Transfer),
    Shutdown,
}

/// Pending-completion queue plus its worker thread.
pub struct CompletionQueue {
    tx: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
}

impl CompletionQueue {
    /// Starts the worker. Fails only when the OS refuses the thread.
    pub fn new() -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let worker = std::thread::Builder::new()
            .name("bus-completion".into())
            .spawn(move || worker_loop(rx))?;
        Ok(Self {
            tx,
            worker: Mutex::new(Some(worker)),
            open: AtomicBool::new(true),
        })
    }

    /// Queues `transfer` for completion. Never blocks.
    ///
    /// The queue holds one reference to the entity until its callback ran.
    /// After shutdown the entity is dropped instead; its references unwind
    /// through the normal free paths.
    pub fn enqueue(&self, transfer: Transfer) {
        if !self.open.load(Ordering::Acquire) {
            log::warn!(
                "completion queue is shut down; dropping transfer {}",
                transfer.tag()
            );
            return;
        }
        if self.tx.send(Job::Run(transfer)).is_err() {
            log::error!("completion worker is gone; transfer dropped");
        }
    }

    /// Drains already queued work, then stops and joins the worker.
    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Job::Shutdown);
            if let Some(worker) = self.worker.lock().take() {
                if worker.join().is_err() {
                    log::error!("completion worker panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for CompletionQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Run(transfer) => transfer.run_completion(),
            Job::Shutdown => break,
        }
    }
}
