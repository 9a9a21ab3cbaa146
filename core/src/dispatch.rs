//! Background worker pool for streaming requests.
//!
//! # Design
//! Jobs go through an unbounded `crossbeam-channel` queue. Workers are
//! spawned lazily, one per submission that finds no idle worker, up to
//! `max_workers`; beyond that jobs wait in the queue.
//!
//! `idle` is the number of waiting workers minus the number of queued jobs.
//! A submission claims one unit of it; when nothing was left to claim, no
//! waiting worker is free for the job and a new one is spawned. Workers exit once the
//! dispatcher is dropped and the queue has drained. A panicking job is caught
//! so the worker survives.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct PoolState {
    workers: AtomicUsize,
    idle: AtomicIsize,
}

#[derive(Debug)]
pub(crate) struct Dispatcher {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    state: Arc<PoolState>,
    max_workers: usize,
}

impl Dispatcher {
    pub(crate) fn new(max_workers: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            state: Arc::new(PoolState::default()),
            max_workers: max_workers.max(1),
        }
    }

    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) {
        // The dispatcher holds a receiver, so the channel cannot be disconnected.
        if self.sender.send(Box::new(job)).is_err() {
            warn!("dispatcher queue disconnected, job dropped");
            return;
        }
        if self.state.idle.fetch_sub(1, Ordering::AcqRel) <= 0 {
            self.try_spawn_worker();
        }
    }

    /// Number of worker threads currently alive.
    pub(crate) fn workers(&self) -> usize {
        self.state.workers.load(Ordering::Acquire)
    }

    fn try_spawn_worker(&self) {
        let mut current = self.state.workers.load(Ordering::Acquire);
        let id = loop {
            if current >= self.max_workers {
                return;
            }
            match self.state.workers.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break current,
                Err(actual) => current = actual,
            }
        };

        let receiver = self.receiver.clone();
        let state = self.state.clone();
        let spawned = thread::Builder::new()
            .name(format!("httpclient-dispatch-{id}"))
            .spawn(move || worker_loop(receiver, state));
        if let Err(err) = spawned {
            self.state.workers.fetch_sub(1, Ordering::AcqRel);
            warn!(%err, "failed to spawn dispatcher worker");
        }
    }
}

fn worker_loop(receiver: Receiver<Job>, state: Arc<PoolState>) {
    debug!("dispatcher worker started");
    loop {
        // Rejoin the waiting set; `submit` does the matching decrement.
        state.idle.fetch_add(1, Ordering::AcqRel);
        match receiver.recv() {
            Ok(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("dispatcher job panicked");
                }
            }
            Err(_) => break,
        }
    }
    state.workers.fetch_sub(1, Ordering::AcqRel);
    debug!("dispatcher worker stopped");
}
