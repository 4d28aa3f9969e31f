//! Per-subsystem configuration.

use crate::priority::Priority;
use crate::work::SubsystemTag;

/// Worker bounds and default priority for one subsystem.
///
/// Registered once, before the pool starts, and read-only afterwards.
/// Invariant: `min_workers <= max_workers <= pool max_workers`. The pool
/// validates the first inequality at registration and clamps `max_workers`
/// to its own ceiling with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemConfig {
    /// Which tag this configuration applies to.
    pub tag: SubsystemTag,
    /// Display name used in log lines; defaults to the tag's name.
    pub name: String,
    /// Workers the pool keeps alive for this subsystem even at zero demand.
    pub min_workers: u32,
    /// Workers that may simultaneously execute this subsystem's items.
    pub max_workers: u32,
    /// Tier assigned to items submitted without an explicit priority.
    pub default_priority: Priority,
}

impl SubsystemConfig {
    /// Configuration with no guaranteed floor, a cap of `max_workers`, and
    /// `Normal` default priority.
    pub fn new(tag: SubsystemTag, max_workers: u32) -> Self {
        Self {
            tag,
            name: tag.name().to_string(),
            min_workers: 0,
            max_workers,
            default_priority: Priority::Normal,
        }
    }

    /// Sets the guaranteed worker floor.
    pub fn with_min_workers(mut self, min_workers: u32) -> Self {
        self.min_workers = min_workers;
        self
    }

    /// Sets the default priority for this subsystem's items.
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }
}
