//! Internal statistics counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use renderpool_api::PoolStatistics;

/// Monotonic counters updated by workers and the scaling path.
///
/// Append-only; nothing here is ever rolled back, including across
/// shutdown. Snapshots are cheap relaxed loads.
#[derive(Default)]
pub(crate) struct PoolStats {
    processed: AtomicU64,
    failed: AtomicU64,
    peak_workers: AtomicUsize,
    peak_queue_size: AtomicUsize,
    total_exec_micros: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_processed(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.total_exec_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_worker_count(&self, count: usize) {
        self.peak_workers.fetch_max(count, Ordering::Relaxed);
    }

    pub(crate) fn note_queue_size(&self, size: usize) {
        self.peak_queue_size.fetch_max(size, Ordering::Relaxed);
    }

    /// Snapshot; `current_workers` and `current_queue_size` are supplied by
    /// the pool from its live state.
    pub(crate) fn snapshot(
        &self,
        current_workers: usize,
        current_queue_size: usize,
    ) -> PoolStatistics {
        let processed = self.processed.load(Ordering::Relaxed);
        let total_micros = self.total_exec_micros.load(Ordering::Relaxed);
        let avg_exec_time = if processed == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(total_micros / processed)
        };
        PoolStatistics {
            processed,
            failed: self.failed.load(Ordering::Relaxed),
            current_workers,
            peak_workers: self.peak_workers.load(Ordering::Relaxed),
            current_queue_size,
            peak_queue_size: self.peak_queue_size.load(Ordering::Relaxed),
            avg_exec_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_zero_before_any_work() {
        let stats = PoolStats::default();
        assert_eq!(stats.snapshot(0, 0).avg_exec_time, Duration::ZERO);
    }

    #[test]
    fn average_tracks_totals() {
        let stats = PoolStats::default();
        stats.record_processed(Duration::from_micros(100));
        stats.record_processed(Duration::from_micros(300));
        stats.record_failed();

        let snap = stats.snapshot(2, 5);
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.avg_exec_time, Duration::from_micros(200));
        assert_eq!(snap.current_workers, 2);
        assert_eq!(snap.current_queue_size, 5);
    }

    #[test]
    fn peaks_never_decrease() {
        let stats = PoolStats::default();
        stats.note_worker_count(4);
        stats.note_worker_count(2);
        stats.note_queue_size(9);
        stats.note_queue_size(3);
        let snap = stats.snapshot(2, 3);
        assert_eq!(snap.peak_workers, 4);
        assert_eq!(snap.peak_queue_size, 9);
    }
}
