//! Scheduling priority tiers.
//!
//! The pool keeps one FIFO lane per tier and always drains higher tiers
//! first. Producers usually rely on their subsystem's registered default
//! priority and only spell out a tier for frame-critical work.

/// Scheduling tier of a [`WorkItem`](crate::work::WorkItem).
///
/// Ordering is by urgency: `Low < Normal < High < Critical`. At every
/// dequeue the pool returns the oldest item of the most urgent non-empty
/// tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Opportunistic work (cache warming, speculative streaming).
    Low = 0,
    /// Default tier for steady-state background work.
    Normal = 1,
    /// Work the current frame is likely to wait on.
    High = 2,
    /// Work the current frame *is* waiting on.
    Critical = 3,
}

impl Priority {
    /// Number of tiers; sizes the pool's lane array.
    pub const COUNT: usize = 4;

    /// All tiers ordered most-urgent first, the pool's dequeue scan order.
    pub const SCAN_ORDER: [Priority; Priority::COUNT] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Stable lane index for this tier.
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_order_by_urgency() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn scan_order_is_most_urgent_first() {
        let mut prev = None;
        for p in Priority::SCAN_ORDER {
            if let Some(prev) = prev {
                assert!(p < prev);
            }
            prev = Some(p);
        }
    }
}
