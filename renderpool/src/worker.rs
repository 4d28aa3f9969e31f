//! Worker lifecycle state machine and run loop.
//!
//! Each worker is one OS thread running a polling loop:
//!
//! ```text
//! Sleeping → Idle ⇄ Working → ShuttingDown (terminal)
//! ```
//!
//! A freshly spawned worker's slot starts in `Sleeping`; the thread flips
//! itself to `Idle` as its first action. `Idle → Working` happens on a
//! successful claim (the active count for the item's subsystem is
//! incremented under the demand lock before execution and decremented
//! after). An idle worker that finds nothing sleeps briefly and loops. It
//! leaves the loop when the pool is stopping, or when it has been idle past
//! the idle timeout *and* the live worker count exceeds the pool floor —
//! the latter via a compare-and-swap on the live counter, so two retiring
//! workers can never both drop the pool below its floor.
//!
//! All lifecycle fields are single-writer: only the owning thread stores
//! them, the pool merely reads them for introspection.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, trace};

use crate::pool::PoolShared;

/// Lifecycle state of one worker, readable by the pool for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Slot claimed, thread not yet running its loop.
    Sleeping = 0,
    /// Polling for work.
    Idle = 1,
    /// Executing a work item.
    Working = 2,
    /// Leaving the loop; terminal.
    ShuttingDown = 3,
}

impl WorkerPhase {
    fn from_usize(raw: usize) -> WorkerPhase {
        match raw {
            0 => WorkerPhase::Sleeping,
            1 => WorkerPhase::Idle,
            2 => WorkerPhase::Working,
            _ => WorkerPhase::ShuttingDown,
        }
    }
}

/// Per-thread record owned (for writes) by exactly one worker thread.
pub struct WorkerState {
    id: usize,
    phase: AtomicUsize,
    /// Milliseconds since the pool epoch; written on spawn and after every
    /// completed item.
    last_active_ms: AtomicU64,
    completed: AtomicU64,
}

impl WorkerState {
    pub(crate) fn new(id: usize, now_ms: u64) -> Self {
        Self {
            id,
            phase: AtomicUsize::new(WorkerPhase::Sleeping as usize),
            last_active_ms: AtomicU64::new(now_ms),
            completed: AtomicU64::new(0),
        }
    }

    /// Slot index of this worker.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_usize(self.phase.load(Ordering::Relaxed))
    }

    /// Items this worker has completed (including failed ones).
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Milliseconds since the pool epoch at which this worker last finished
    /// an item (or was spawned).
    pub fn last_active_ms(&self) -> u64 {
        self.last_active_ms.load(Ordering::Relaxed)
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as usize, Ordering::Relaxed);
    }

    fn touch(&self, now_ms: u64) {
        self.last_active_ms.store(now_ms, Ordering::Relaxed);
    }
}

/// Body of one worker thread. Returns only when the worker leaves the pool,
/// either because the pool is stopping or because it retired itself.
pub(crate) fn run(shared: Arc<PoolShared>, state: Arc<WorkerState>) {
    state.set_phase(WorkerPhase::Idle);
    state.touch(shared.now_ms());
    debug!(worker = state.id(), "worker online");

    loop {
        if shared.is_stopping() {
            break;
        }

        match shared.claim() {
            Some(item) => {
                state.set_phase(WorkerPhase::Working);
                execute(&shared, &state, item);
                state.completed.fetch_add(1, Ordering::Relaxed);
                state.touch(shared.now_ms());
                state.set_phase(WorkerPhase::Idle);
            }
            None => {
                thread::sleep(shared.config.idle_sleep);
                if shared.is_stopping() {
                    break;
                }
                let idle_ms = shared.now_ms().saturating_sub(state.last_active_ms());
                if idle_ms >= shared.config.idle_timeout.as_millis() as u64
                    && shared.try_retire()
                {
                    retire(&shared, &state);
                    return;
                }
            }
        }
    }

    // Pool-driven shutdown: the pool joins us and resets the live count.
    state.set_phase(WorkerPhase::ShuttingDown);
    debug!(worker = state.id(), completed = state.completed(), "worker stopping");
    shared.run_exit_hook();
}

/// Runs one claimed item, isolating panics and keeping the active count and
/// statistics straight regardless of the outcome.
fn execute(shared: &Arc<PoolShared>, state: &Arc<WorkerState>, item: renderpool_api::WorkItem) {
    let tag = item.tag();
    let id = item.id();
    trace!(worker = state.id(), work_id = id, subsystem = %tag, payload = ?item.payload(), "executing");

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || item.run()));
    let elapsed = started.elapsed();

    shared.demand.release_active(tag);

    match outcome {
        Ok(()) => {
            shared.stats.record_processed(elapsed);
            trace!(worker = state.id(), work_id = id, ?elapsed, "completed");
        }
        Err(payload) => {
            shared.stats.record_failed();
            let reason = panic_message(payload.as_ref());
            error!(
                worker = state.id(),
                work_id = id,
                subsystem = %tag,
                reason,
                "work item panicked; not retried"
            );
        }
    }
}

/// Self-retirement: the live counter was already decremented by
/// [`PoolShared::try_retire`]; hand the slot id to the reap queue and run
/// the hooks on the way out.
fn retire(shared: &Arc<PoolShared>, state: &Arc<WorkerState>) {
    state.set_phase(WorkerPhase::ShuttingDown);
    let remaining = shared.live_workers();
    info!(
        worker = state.id(),
        completed = state.completed(),
        remaining,
        "idle worker retiring"
    );
    shared.retired.push(state.id());
    shared.notify_worker_count(remaining + 1, remaining);
    shared.run_exit_hook();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
