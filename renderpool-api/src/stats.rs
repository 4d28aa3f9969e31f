//! Pool statistics snapshot.

use std::time::Duration;

/// Point-in-time snapshot of the pool's aggregate counters.
///
/// All counters except `current_queue_size` and `current_workers` are
/// monotonic; the two current values are re-read from the live pool when
/// the snapshot is taken and may be stale by the time the caller looks at
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Work items executed to completion.
    pub processed: u64,
    /// Work items whose job panicked. Never retried.
    pub failed: u64,
    /// Worker threads currently alive.
    pub current_workers: usize,
    /// Highest worker count ever observed.
    pub peak_workers: usize,
    /// Items sitting in the queue at snapshot time.
    pub current_queue_size: usize,
    /// Deepest the queue has ever been, observed at submission time.
    pub peak_queue_size: usize,
    /// Average job execution time over everything processed so far.
    pub avg_exec_time: Duration,
}
