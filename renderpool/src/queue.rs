//! Four-lane priority work queue.
//!
//! One FIFO lane per [`Priority`] tier plus a live count, all guarded by a
//! single mutex. Pushes and pops are serialized against each other but not
//! against scaling decisions, which run under the demand lock instead.
//!
//! `pop` and `pop_if` both scan critical → high → normal → low, so a
//! lower-priority item is never returned while a higher-priority item is
//! eligible. `pop_if` additionally skips items its predicate rejects —
//! the pool uses it to avoid handing a worker an item for a subsystem that
//! is already at its worker cap. That makes `pop_if` O(n) in queue depth,
//! which is acceptable: depth is bounded by outstanding frame-scoped work.

use std::collections::VecDeque;
use std::sync::Mutex;

use renderpool_api::{Priority, WorkItem};

struct Lanes {
    lanes: [VecDeque<WorkItem>; Priority::COUNT],
    // Kept in lockstep with the lane lengths; cheap len() without summing.
    len: usize,
}

/// Thread-safe priority queue of [`WorkItem`]s.
pub struct WorkQueue {
    inner: Mutex<Lanes>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Lanes {
                lanes: Default::default(),
                len: 0,
            }),
        }
    }

    /// Inserts an item at the back of its priority lane. Never blocks
    /// beyond the internal mutex; O(1) amortized.
    pub fn push(&self, item: WorkItem) {
        let lane = item.priority().index();
        let mut inner = self.inner.lock().unwrap();
        inner.lanes[lane].push_back(item);
        inner.len += 1;
    }

    /// Removes and returns the oldest item of the most urgent non-empty
    /// lane, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<WorkItem> {
        let mut inner = self.inner.lock().unwrap();
        for priority in Priority::SCAN_ORDER {
            if let Some(item) = inner.lanes[priority.index()].pop_front() {
                inner.len -= 1;
                return Some(item);
            }
        }
        None
    }

    /// Like [`pop`](Self::pop), but returns the first item (same scan
    /// order, FIFO within a lane) the predicate accepts.
    ///
    /// Items the predicate rejects stay queued in place.
    pub fn pop_if(&self, mut pred: impl FnMut(&WorkItem) -> bool) -> Option<WorkItem> {
        let mut inner = self.inner.lock().unwrap();
        for priority in Priority::SCAN_ORDER {
            let lane = &mut inner.lanes[priority.index()];
            if let Some(pos) = lane.iter().position(&mut pred) {
                if let Some(item) = lane.remove(pos) {
                    inner.len -= 1;
                    return Some(item);
                }
            }
        }
        None
    }

    /// Number of queued items. Snapshot; may be stale immediately.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    /// Whether the queue is empty. Snapshot; may be stale immediately.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderpool_api::{SubsystemTag, WorkPayload};

    fn item(priority: Priority, batch: u32) -> WorkItem {
        WorkItem::new(
            priority,
            WorkPayload::RenderCache { batch },
            Box::new(|| {}),
        )
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let queue = WorkQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn priority_precedence_is_strict() {
        let queue = WorkQueue::new();
        queue.push(item(Priority::Low, 0));
        queue.push(item(Priority::Normal, 1));
        queue.push(item(Priority::Critical, 2));
        queue.push(item(Priority::High, 3));

        let order: Vec<Priority> = std::iter::from_fn(|| queue.pop())
            .map(|i| i.priority())
            .collect();
        assert_eq!(
            order,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Normal,
                Priority::Low
            ]
        );
    }

    #[test]
    fn fifo_within_a_tier() {
        let queue = WorkQueue::new();
        let first = item(Priority::Normal, 10);
        let second = item(Priority::Normal, 11);
        let (a, b) = (first.id(), second.id());
        queue.push(first);
        queue.push(second);

        assert_eq!(queue.pop().unwrap().id(), a);
        assert_eq!(queue.pop().unwrap().id(), b);
    }

    #[test]
    fn pop_if_skips_rejected_items_in_place() {
        let queue = WorkQueue::new();
        queue.push(WorkItem::new(
            Priority::Critical,
            WorkPayload::AccelBuild { mesh_id: 1 },
            Box::new(|| {}),
        ));
        queue.push(item(Priority::Normal, 0));

        // The critical accel-build item is rejected, so the lower-priority
        // render-cache item is returned instead.
        let got = queue
            .pop_if(|i| i.tag() != SubsystemTag::AccelBuild)
            .unwrap();
        assert_eq!(got.tag(), SubsystemTag::RenderCache);
        assert_eq!(queue.len(), 1);

        // The rejected item is still at the head of its lane.
        assert_eq!(queue.pop().unwrap().tag(), SubsystemTag::AccelBuild);
    }

    #[test]
    fn pop_if_honors_priority_before_fifo() {
        let queue = WorkQueue::new();
        queue.push(item(Priority::Low, 0));
        queue.push(item(Priority::High, 1));
        let got = queue.pop_if(|_| true).unwrap();
        assert_eq!(got.priority(), Priority::High);
    }

    #[test]
    fn conservation_under_concurrent_push_pop() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let queue = Arc::new(WorkQueue::new());
        let popped = Arc::new(AtomicUsize::new(0));
        const PER_THREAD: usize = 200;
        const THREADS: usize = 4;

        let producers: Vec<_> = (0..THREADS)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let p = match i % 4 {
                            0 => Priority::Low,
                            1 => Priority::Normal,
                            2 => Priority::High,
                            _ => Priority::Critical,
                        };
                        queue.push(item(p, (t * PER_THREAD + i) as u32));
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                let popped = popped.clone();
                std::thread::spawn(move || {
                    while popped.load(Ordering::SeqCst) < THREADS * PER_THREAD {
                        if queue.pop().is_some() {
                            popped.fetch_add(1, Ordering::SeqCst);
                        } else {
                            std::thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        for h in producers {
            h.join().unwrap();
        }
        for h in consumers {
            h.join().unwrap();
        }

        // pushed - popped == queue length (zero here: consumers drained it)
        assert_eq!(popped.load(Ordering::SeqCst), THREADS * PER_THREAD);
        assert_eq!(queue.len(), 0);
    }
}
