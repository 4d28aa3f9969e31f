//! The thread pool orchestrator.
//!
//! [`ThreadPool`] owns the queue, the subsystem registry, the demand
//! tables, the worker slots, and the aggregate statistics. It exposes the
//! scheduling API (`register_subsystem`, `start`, `submit`,
//! `request_workers`) and runs the scaling and shutdown policy.
//!
//! # Scaling policy
//!
//! The desired worker count is always
//! `clamp(max(Σ demand, Σ min_workers), 0, max_workers)`: every
//! subsystem's floor is honored even at zero demand, while demand spikes
//! can grow the pool up to its ceiling. Scale-**up** bumps the
//! authoritative live counter *before* spawning threads, so two
//! overlapping scale calls cannot both see the old low count and
//! over-spawn. Scale-**down** only stores the new target; idle workers
//! retire themselves once they pass the idle timeout (the pool never
//! interrupts a running job).
//!
//! # Lock order
//!
//! Three independent exclusion regions: queue, demand table, worker slots.
//! The only nesting is demand → queue on the worker claim path. The demand
//! lock is always released before a thread is spawned, so no blocking OS
//! call ever runs under it; callers of `request_workers` must tolerate the
//! momentary staleness this allows (never more than one worker spawn).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_queue::SegQueue;
use tracing::{debug, error, info, trace, warn};

use renderpool_api::{
    PoolError, PoolStatistics, SubsystemConfig, SubsystemTag, WorkFn, WorkItem, WorkPayload,
};

use crate::config::PoolConfig;
use crate::queue::WorkQueue;
use crate::registry::{DemandTable, SubsystemRegistry};
use crate::stats::PoolStats;
use crate::worker::{self, WorkerPhase, WorkerState};

/// Coarse lifecycle of the pool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Constructed; subsystems may register.
    Created = 0,
    /// Workers running; work may be submitted.
    Running = 1,
    /// `shutdown` in progress; workers draining out.
    Stopping = 2,
    /// All workers joined.
    Stopped = 3,
}

impl PoolStatus {
    fn from_usize(raw: usize) -> PoolStatus {
        match raw {
            0 => PoolStatus::Created,
            1 => PoolStatus::Running,
            2 => PoolStatus::Stopping,
            _ => PoolStatus::Stopped,
        }
    }
}

type WorkerCountHook = Arc<dyn Fn(usize, usize) + Send + Sync>;
type ThreadExitHook = Arc<dyn Fn() + Send + Sync>;

/// Observability hooks, invoked synchronously from pool/worker context.
#[derive(Default)]
struct Hooks {
    worker_count_changed: Mutex<Option<WorkerCountHook>>,
    thread_exit: Mutex<Option<ThreadExitHook>>,
}

/// State shared between the pool handle and every worker thread.
pub(crate) struct PoolShared {
    pub(crate) config: PoolConfig,
    pub(crate) queue: WorkQueue,
    pub(crate) registry: SubsystemRegistry,
    pub(crate) demand: DemandTable,
    pub(crate) stats: PoolStats,
    /// Slot ids of self-retired workers whose join handles await reaping.
    pub(crate) retired: SegQueue<usize>,
    status: AtomicUsize,
    /// Authoritative live worker count. Adjusted by CAS from both the
    /// scale-up path (before spawning) and worker self-retirement (before
    /// thread exit), so there is a single linearization point.
    live: AtomicUsize,
    /// Most recently applied scale target; informational for scale-down.
    target: AtomicUsize,
    epoch: Instant,
    hooks: Hooks,
}

impl PoolShared {
    /// Milliseconds elapsed since the pool was constructed.
    pub(crate) fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.status.load(Ordering::SeqCst) >= PoolStatus::Stopping as usize
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Claims the next item the caller is allowed to execute: under the
    /// demand lock, pops the first item whose subsystem is below its cap
    /// and increments that subsystem's active count before releasing.
    pub(crate) fn claim(&self) -> Option<WorkItem> {
        self.demand.with_locked(|state| {
            let item = self.queue.pop_if(|it| state.below_cap(it.tag()))?;
            state.active[item.tag().index()] += 1;
            Some(item)
        })
    }

    /// Attempts to decrement the live counter without dropping below the
    /// floor. Returns whether the caller may retire.
    pub(crate) fn try_retire(&self) -> bool {
        let floor = self.registry.floor();
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > floor).then(|| n - 1)
            })
            .is_ok()
    }

    pub(crate) fn notify_worker_count(&self, old: usize, new: usize) {
        let hook = self.hooks.worker_count_changed.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(old, new);
        }
    }

    pub(crate) fn run_exit_hook(&self) {
        let hook = self.hooks.thread_exit.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// One tracked worker: its introspectable state plus the join handle.
struct WorkerSlot {
    state: Arc<WorkerState>,
    handle: Option<JoinHandle<()>>,
}

/// Dynamic, subsystem-aware worker thread pool.
///
/// See the [crate docs](crate) for the scheduling contract and an example.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    /// Worker slots; `None` entries are reusable. Guarded by its own lock,
    /// touched only by spawn, reap, shutdown, and introspection.
    slots: Mutex<Vec<Option<WorkerSlot>>>,
}

impl ThreadPool {
    /// Creates a stopped pool. Register subsystems, then call
    /// [`start`](Self::start).
    pub fn new(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                queue: WorkQueue::new(),
                registry: SubsystemRegistry::new(),
                demand: DemandTable::new(),
                stats: PoolStats::default(),
                retired: SegQueue::new(),
                status: AtomicUsize::new(PoolStatus::Created as usize),
                live: AtomicUsize::new(0),
                target: AtomicUsize::new(0),
                epoch: Instant::now(),
                hooks: Hooks::default(),
            }),
            slots: Mutex::new(Vec::new()),
        }
    }

    // ----- registration ---------------------------------------------------

    /// Registers one subsystem. Must happen before [`start`](Self::start);
    /// a running pool rejects registration with
    /// [`PoolError::AlreadyRunning`].
    pub fn register_subsystem(&self, config: SubsystemConfig) -> Result<(), PoolError> {
        match self.status() {
            PoolStatus::Created | PoolStatus::Stopped => {}
            _ => return Err(PoolError::AlreadyRunning),
        }
        let tag = config.tag;
        self.shared
            .registry
            .register(config, self.shared.config.max_workers)?;
        // Cap may have been clamped during registration; cache the final
        // value in the demand table for the worker claim path.
        if let Some(cap) = self.shared.registry.cap(tag) {
            self.shared.demand.init_tag(tag, cap);
        }
        info!(subsystem = %tag, "subsystem registered");
        Ok(())
    }

    // ----- lifecycle ------------------------------------------------------

    /// Spawns `initial_workers` (clamped to the ceiling), then runs a scale
    /// check so the subsystem floor is honored even for `start(0)`.
    pub fn start(&self, initial_workers: u32) -> Result<(), PoolError> {
        let to_running = |from: PoolStatus| {
            self.shared
                .status
                .compare_exchange(
                    from as usize,
                    PoolStatus::Running as usize,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
        };
        if !to_running(PoolStatus::Created) && !to_running(PoolStatus::Stopped) {
            warn!("start called on a pool that is already running");
            return Err(PoolError::AlreadyStarted);
        }

        let initial = (initial_workers as usize).min(self.shared.config.max_workers);
        info!(
            initial,
            max_workers = self.shared.config.max_workers,
            "pool starting"
        );
        self.scale_to(initial)?;
        self.evaluate_scaling()?;
        Ok(())
    }

    /// Stops the pool: no new claims, every tracked worker joined, live
    /// count reset to 0. Blocking and idempotent. In-flight jobs finish
    /// naturally; workers check the stopping flag only between items.
    pub fn shutdown(&self) {
        let cas = |from: PoolStatus, to: PoolStatus| {
            self.shared
                .status
                .compare_exchange(
                    from as usize,
                    to as usize,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
        };
        // Never started: nothing to join.
        if cas(PoolStatus::Created, PoolStatus::Stopped) {
            return;
        }
        if !cas(PoolStatus::Running, PoolStatus::Stopping) {
            debug!("shutdown on a pool that is not running; nothing to do");
            return;
        }

        info!("pool shutting down");
        let before = self.shared.live_workers();
        {
            let mut slots = self.slots.lock().unwrap();
            for slot in slots.iter_mut().flatten() {
                if let Some(handle) = slot.handle.take() {
                    if handle.join().is_err() {
                        // Worker bodies catch job panics; this is a bug.
                        error!("worker thread panicked outside job execution");
                    }
                }
            }
            slots.clear();
        }
        while self.shared.retired.pop().is_some() {}
        self.shared.live.store(0, Ordering::SeqCst);
        self.shared.target.store(0, Ordering::SeqCst);
        self.shared
            .status
            .store(PoolStatus::Stopped as usize, Ordering::SeqCst);
        if before > 0 {
            self.shared.notify_worker_count(before, 0);
        }
        info!(queued = self.shared.queue.len(), "pool stopped");
    }

    /// Current pool lifecycle state.
    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_usize(self.shared.status.load(Ordering::SeqCst))
    }

    // ----- submission -----------------------------------------------------

    /// Enqueues one work item.
    ///
    /// Fails with [`PoolError::NotRunning`] before `start` or after
    /// `shutdown`, and with [`PoolError::UnregisteredSubsystem`] for a tag
    /// no subsystem registered (an unregistered tag has no cap, so its
    /// items could never be claimed). Never blocks on worker availability:
    /// work for a saturated subsystem simply stays queued.
    pub fn submit(&self, item: WorkItem) -> Result<(), PoolError> {
        if self.status() != PoolStatus::Running {
            return Err(PoolError::NotRunning);
        }
        if !self.shared.registry.is_registered(item.tag()) {
            return Err(PoolError::UnregisteredSubsystem(item.tag()));
        }
        trace!(
            work_id = item.id(),
            subsystem = %item.tag(),
            priority = ?item.priority(),
            "work submitted"
        );
        self.shared.queue.push(item);
        self.shared.stats.note_queue_size(self.shared.queue.len());
        Ok(())
    }

    /// Convenience: builds and submits a [`WorkItem`] using the payload's
    /// subsystem registered default priority. Returns the item's id.
    pub fn submit_job(&self, payload: WorkPayload, job: WorkFn) -> Result<u64, PoolError> {
        let priority = self
            .shared
            .registry
            .default_priority(payload.tag())
            .ok_or(PoolError::UnregisteredSubsystem(payload.tag()))?;
        let item = WorkItem::new(priority, payload, job);
        let id = item.id();
        self.submit(item)?;
        Ok(id)
    }

    // ----- scaling --------------------------------------------------------

    /// Producer-side demand hint, not a reservation. Records `requested` as
    /// the tag's demand, triggers a global scale check, and returns the
    /// count grantable at the time of the call (possibly 0 for a saturated
    /// subsystem) — advisory for callers sizing their own chunking.
    pub fn request_workers(&self, tag: SubsystemTag, requested: u32) -> u32 {
        let Some(granted) = self.shared.demand.record_demand(tag, requested) else {
            warn!(subsystem = %tag, "request_workers for unregistered subsystem ignored");
            return 0;
        };
        if let Err(err) = self.evaluate_scaling() {
            // The pool keeps operating at its prior worker count.
            error!(%err, "scale-up failed; continuing at prior worker count");
        }
        trace!(subsystem = %tag, requested, granted, "worker demand recorded");
        granted
    }

    /// Recomputes the scale target from the demand table and applies it.
    /// Called by `start` and `request_workers`; engines may also call it
    /// once per frame. Returns the applied target.
    pub fn evaluate_scaling(&self) -> Result<u32, PoolError> {
        // Demand lock is released before any spawn happens below.
        let total_demand = self.shared.demand.total_demand() as usize;
        let floor = self.shared.registry.floor();
        let target = total_demand
            .max(floor)
            .min(self.shared.config.max_workers);
        self.scale_to(target)
    }

    /// Scales toward `target` workers, clamped to `[0, max_workers]`.
    ///
    /// Scale-up spawns immediately; scale-down only records the target and
    /// lets idle workers retire themselves. Returns the clamped target.
    pub fn scale_workers(&self, target: u32) -> Result<u32, PoolError> {
        self.scale_to(target as usize)
    }

    fn scale_to(&self, target: usize) -> Result<u32, PoolError> {
        let target = target.min(self.shared.config.max_workers);
        self.shared.target.store(target, Ordering::SeqCst);
        if self.status() != PoolStatus::Running {
            return Ok(target as u32);
        }
        loop {
            let current = self.shared.live.load(Ordering::SeqCst);
            if target <= current {
                // Lazy scale-down: workers self-retire past the idle
                // timeout; nothing to do here.
                return Ok(target as u32);
            }
            // Reserve the delta before spawning so a concurrent scale call
            // sees the already-raised count and cannot over-spawn.
            if self
                .shared
                .live
                .compare_exchange(current, target, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                continue;
            }

            let mut slots = self.slots.lock().unwrap();
            // Shutdown may have raced us between the CAS and the lock; it
            // waits on this lock before joining, so bail out cleanly.
            if self.status() != PoolStatus::Running {
                // Shutdown may have already reset the count to 0.
                let _ = self.shared.live.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |n| Some(n.saturating_sub(target - current)),
                );
                return Ok(target as u32);
            }
            self.reap_locked(&mut slots);
            let mut spawned = 0;
            for _ in current..target {
                if let Err(err) = self.spawn_worker(&mut slots) {
                    let missing = target - current - spawned;
                    self.shared.live.fetch_sub(missing, Ordering::SeqCst);
                    let reached = target - missing;
                    self.shared.stats.note_worker_count(reached);
                    drop(slots);
                    error!(%err, reached, target, "worker spawn refused by OS");
                    if reached != current {
                        self.shared.notify_worker_count(current, reached);
                    }
                    return Err(err);
                }
                spawned += 1;
            }
            self.shared.stats.note_worker_count(target);
            drop(slots);
            debug!(from = current, to = target, "scaled up");
            self.shared.notify_worker_count(current, target);
            return Ok(target as u32);
        }
    }

    fn spawn_worker(&self, slots: &mut Vec<Option<WorkerSlot>>) -> Result<(), PoolError> {
        let id = match slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                slots.push(None);
                slots.len() - 1
            }
        };
        let state = Arc::new(WorkerState::new(id, self.shared.now_ms()));
        let shared = self.shared.clone();
        let thread_state = state.clone();
        let handle = thread::Builder::new()
            .name(format!("renderpool-worker-{id}"))
            .spawn(move || worker::run(shared, thread_state))
            .map_err(|e| PoolError::SpawnFailed(e.to_string()))?;
        slots[id] = Some(WorkerSlot {
            state,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Joins self-retired workers and frees their slots. Called with the
    /// slot lock held, from the spawn path.
    fn reap_locked(&self, slots: &mut [Option<WorkerSlot>]) {
        while let Some(id) = self.shared.retired.pop() {
            if let Some(mut slot) = slots.get_mut(id).and_then(Option::take) {
                if let Some(handle) = slot.handle.take() {
                    let _ = handle.join();
                }
            }
        }
    }

    // ----- introspection --------------------------------------------------

    /// Non-blocking snapshot of the aggregate counters; queue size is read
    /// from the live queue at call time.
    pub fn statistics(&self) -> PoolStatistics {
        self.shared
            .stats
            .snapshot(self.shared.live_workers(), self.shared.queue.len())
    }

    /// Worker threads currently alive.
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers()
    }

    /// Most recently applied scale target.
    pub fn target_workers(&self) -> usize {
        self.shared.target.load(Ordering::SeqCst)
    }

    /// Lifecycle state of every tracked worker, for diagnostics overlays.
    pub fn worker_phases(&self) -> Vec<WorkerPhase> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|slot| slot.state.phase())
            .collect()
    }

    /// Workers currently executing items for `tag`.
    pub fn active_workers(&self, tag: SubsystemTag) -> u32 {
        self.shared.demand.active(tag)
    }

    // ----- hooks ----------------------------------------------------------

    /// Invoked with `(old, new)` whenever the live worker count changes.
    /// Runs synchronously on pool or worker threads; must not block.
    pub fn set_worker_count_changed(&self, hook: impl Fn(usize, usize) + Send + Sync + 'static) {
        *self.shared.hooks.worker_count_changed.lock().unwrap() = Some(Arc::new(hook));
    }

    /// Invoked by every worker thread just before it exits. Runs
    /// synchronously on the worker thread; must not block.
    pub fn set_thread_exit_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.shared.hooks.thread_exit.lock().unwrap() = Some(Arc::new(hook));
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
