//! Report worker pool
//!
//! One thread per online CPU, each with its own bounded queue of reports.
//! The dispatch thread hands reports out round-robin and never blocks: if
//! the chosen worker's queue is full, the report is dropped and counted.
//!
//! Reports from one session are spread over all workers, so with more
//! than one worker they may be *processed* out of order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, warn};
use xpad360_protocol::ReportBuffer;

use crate::session::SessionKey;

/// Default per-worker queue capacity
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Errors from worker pool initialization
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("No processors found")]
    NoProcessorsFound,

    #[error("Failed to allocate worker: {0}")]
    AllocationFailed(#[source] std::io::Error),
}

/// Work performed on every report, on a worker thread
pub trait ReportHandler: Send + Sync + 'static {
    fn handle(&self, report: &ReportBuffer, session: SessionKey);
}

/// Fire-and-forget hand-off of a report to background processing
pub trait ReportDispatch {
    fn dispatch(&self, report: &ReportBuffer, session: SessionKey);
}

/// Counters of one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Reports queued to this worker
    pub assigned: u64,
    /// Reports the handler finished
    pub processed: u64,
    /// Reports rejected because the queue was full
    pub dropped: u64,
}

struct Job {
    report: ReportBuffer,
    session: SessionKey,
}

struct SlotState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
    assigned: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl Slot {
    fn new(depth: usize) -> Self {
        Self {
            state: Mutex::new(SlotState {
                jobs: VecDeque::with_capacity(depth),
                shutdown: false,
            }),
            ready: Condvar::new(),
            assigned: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn stats(&self) -> WorkerStats {
        WorkerStats {
            assigned: self.assigned.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

fn run_worker<H: ReportHandler>(index: usize, slot: Arc<Slot>, handler: Arc<H>) {
    debug!("Worker {} started", index);
    loop {
        let job = {
            let mut state = slot.state.lock();
            while state.jobs.is_empty() && !state.shutdown {
                slot.ready.wait(&mut state);
            }
            if state.shutdown {
                break;
            }
            match state.jobs.pop_front() {
                Some(job) => job,
                None => continue,
            }
        };

        handler.handle(&job.report, job.session);
        slot.processed.fetch_add(1, Ordering::Relaxed);
    }
    debug!("Worker {} exiting", index);
}

/// Fixed set of report workers sharing one handler
pub struct WorkerPool<H: ReportHandler> {
    slots: Vec<Arc<Slot>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    cursor: AtomicUsize,
    depth: usize,
    handler: Arc<H>,
}

impl<H: ReportHandler> WorkerPool<H> {
    /// Start `workers` threads, each with a queue of `depth` reports
    pub fn new(workers: usize, depth: usize, handler: H) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoProcessorsFound);
        }
        let depth = depth.max(1);
        let handler = Arc::new(handler);

        let mut pool = Self {
            slots: Vec::with_capacity(workers),
            threads: Mutex::new(Vec::with_capacity(workers)),
            cursor: AtomicUsize::new(0),
            depth,
            handler,
        };

        for index in 0..workers {
            let slot = Arc::new(Slot::new(depth));
            let thread_slot = Arc::clone(&slot);
            let thread_handler = Arc::clone(&pool.handler);
            let spawned = std::thread::Builder::new()
                .name(format!("xpad-worker-{}", index))
                .spawn(move || run_worker(index, thread_slot, thread_handler));

            match spawned {
                Ok(thread) => {
                    pool.slots.push(slot);
                    pool.threads.lock().push(thread);
                }
                Err(e) => {
                    // Already-started workers are joined by Drop
                    return Err(PoolError::AllocationFailed(e));
                }
            }
        }

        debug!("Started {} workers (queue depth {})", workers, depth);
        Ok(pool)
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Per-worker queue capacity
    pub fn queue_depth(&self) -> usize {
        self.depth
    }

    /// Queue a copy of `report` on the next worker in round-robin order
    ///
    /// Returns `false` if the worker's queue was full and the report was
    /// dropped, or the pool is shut down.
    pub fn submit(&self, report: &ReportBuffer, session: SessionKey) -> bool {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let slot = &self.slots[index];

        let mut state = slot.state.lock();
        if state.shutdown {
            return false;
        }
        if state.jobs.len() >= self.depth {
            drop(state);
            let dropped = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Worker {} saturated, dropping report from {} ({} dropped)",
                index, session, dropped
            );
            return false;
        }
        state.jobs.push_back(Job {
            report: *report,
            session,
        });
        slot.assigned.fetch_add(1, Ordering::Relaxed);
        drop(state);
        slot.ready.notify_one();
        true
    }

    /// Counters of every worker, by worker index
    pub fn stats(&self) -> Vec<WorkerStats> {
        self.slots.iter().map(|slot| slot.stats()).collect()
    }

    /// Stop all workers and wait for them to exit
    ///
    /// Reports still queued are discarded; a report being handled is
    /// finished first. Idempotent.
    pub fn shutdown(&self) {
        for slot in &self.slots {
            let mut state = slot.state.lock();
            state.shutdown = true;
            let discarded = state.jobs.len();
            state.jobs.clear();
            drop(state);
            if discarded > 0 {
                debug!("Discarding {} queued reports", discarded);
            }
            slot.ready.notify_all();
        }

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for thread in threads {
            if thread.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
    }
}

impl<H: ReportHandler> ReportDispatch for WorkerPool<H> {
    fn dispatch(&self, report: &ReportBuffer, session: SessionKey) {
        self.submit(report, session);
    }
}

impl<H: ReportHandler> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
