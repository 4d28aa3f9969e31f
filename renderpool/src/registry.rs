//! Subsystem registry and demand bookkeeping.
//!
//! Two pieces of state live here, each behind its own lock so demand
//! updates from producers and active-count updates from workers never
//! contend with queue throughput:
//!
//! - [`SubsystemRegistry`]: tag → [`SubsystemConfig`], written only before
//!   the pool starts, read-only afterwards.
//! - [`DemandTable`]: per-tag requested worker count (written by
//!   producers) and currently-executing worker count (written by workers),
//!   consumed by the scaling policy.
//!
//! Both are fixed-size arrays indexed by [`SubsystemTag::index`]; the tag
//! set is closed, so there is no hashing and no per-entry allocation.

use std::sync::Mutex;

use tracing::warn;

use renderpool_api::{PoolError, Priority, SubsystemConfig, SubsystemTag};

/// Static-after-start table of subsystem configurations.
pub struct SubsystemRegistry {
    configs: Mutex<[Option<SubsystemConfig>; SubsystemTag::COUNT]>,
}

impl Default for SubsystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubsystemRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            configs: Mutex::new(Default::default()),
        }
    }

    /// Stores a configuration, validating `min_workers <= max_workers` and
    /// clamping `max_workers` to the pool ceiling.
    ///
    /// Re-registering a tag before start overwrites the previous
    /// configuration with a warning. The pool rejects registration after
    /// start before this is ever reached.
    pub fn register(
        &self,
        mut config: SubsystemConfig,
        pool_max_workers: usize,
    ) -> Result<(), PoolError> {
        if config.min_workers > config.max_workers {
            return Err(PoolError::InvalidConfig(format!(
                "{}: min_workers {} exceeds max_workers {}",
                config.name, config.min_workers, config.max_workers
            )));
        }
        if config.max_workers as usize > pool_max_workers {
            warn!(
                subsystem = %config.tag,
                requested = config.max_workers,
                ceiling = pool_max_workers,
                "subsystem max_workers clamped to pool ceiling"
            );
            config.max_workers = pool_max_workers as u32;
        }

        let mut configs = self.configs.lock().unwrap();
        let slot = &mut configs[config.tag.index()];
        if slot.is_some() {
            warn!(subsystem = %config.tag, "re-registering subsystem; previous configuration replaced");
        }
        *slot = Some(config);
        Ok(())
    }

    /// Whether the tag has a registered configuration.
    pub fn is_registered(&self, tag: SubsystemTag) -> bool {
        self.configs.lock().unwrap()[tag.index()].is_some()
    }

    /// Copy of the tag's configuration, if registered.
    pub fn config(&self, tag: SubsystemTag) -> Option<SubsystemConfig> {
        self.configs.lock().unwrap()[tag.index()].clone()
    }

    /// The tag's registered default priority, if any.
    pub fn default_priority(&self, tag: SubsystemTag) -> Option<Priority> {
        self.configs.lock().unwrap()[tag.index()]
            .as_ref()
            .map(|c| c.default_priority)
    }

    /// Per-tag concurrent-execution cap, `None` for unregistered tags.
    pub fn cap(&self, tag: SubsystemTag) -> Option<u32> {
        self.configs.lock().unwrap()[tag.index()]
            .as_ref()
            .map(|c| c.max_workers)
    }

    /// Sum of `min_workers` over all registered subsystems — the pool's
    /// worker floor.
    pub fn floor(&self) -> usize {
        self.configs
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|c| c.min_workers as usize)
            .sum()
    }
}

/// Per-tag demand and active-execution counts.
///
/// The embedded copy of each tag's cap lets the worker claim path run
/// entirely under this one lock (see [`crate::pool`]); it is written at
/// registration time, before any worker exists.
#[derive(Default)]
pub struct DemandState {
    /// Most recently requested worker count per tag (advisory).
    pub demand: [u32; SubsystemTag::COUNT],
    /// Workers currently executing an item per tag.
    pub active: [u32; SubsystemTag::COUNT],
    /// Cached `max_workers` per tag; `None` means unregistered.
    pub cap: [Option<u32>; SubsystemTag::COUNT],
}

impl DemandState {
    /// Sum of all per-tag demand.
    pub fn total_demand(&self) -> u32 {
        self.demand.iter().sum()
    }

    /// Whether the tag may take on one more executing worker right now.
    pub fn below_cap(&self, tag: SubsystemTag) -> bool {
        match self.cap[tag.index()] {
            Some(cap) => self.active[tag.index()] < cap,
            None => false,
        }
    }
}

/// [`DemandState`] behind its dedicated lock.
pub struct DemandTable {
    state: Mutex<DemandState>,
}

impl Default for DemandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DemandTable {
    /// Creates a table with zero demand and zero active counts.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DemandState::default()),
        }
    }

    /// Initializes the tag's row: demand 0, active 0, cached cap.
    pub fn init_tag(&self, tag: SubsystemTag, cap: u32) {
        let mut state = self.state.lock().unwrap();
        state.demand[tag.index()] = 0;
        state.active[tag.index()] = 0;
        state.cap[tag.index()] = Some(cap);
    }

    /// Records `requested` as the tag's new demand and returns the count
    /// grantable right now: `min(requested, cap - active)`, saturating.
    /// Returns `None` for unregistered tags.
    pub fn record_demand(&self, tag: SubsystemTag, requested: u32) -> Option<u32> {
        let mut state = self.state.lock().unwrap();
        let cap = state.cap[tag.index()]?;
        let granted = requested.min(cap.saturating_sub(state.active[tag.index()]));
        state.demand[tag.index()] = requested;
        Some(granted)
    }

    /// Snapshot of the total demand across all tags.
    pub fn total_demand(&self) -> u32 {
        self.state.lock().unwrap().total_demand()
    }

    /// Runs `f` with the table locked. Used by the worker claim path so the
    /// cap check and the active-count increment happen atomically.
    pub fn with_locked<T>(&self, f: impl FnOnce(&mut DemandState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Decrements the tag's active count after a job finishes.
    pub fn release_active(&self, tag: SubsystemTag) {
        let mut state = self.state.lock().unwrap();
        let slot = &mut state.active[tag.index()];
        debug_assert!(*slot > 0, "active count underflow for {tag}");
        *slot = slot.saturating_sub(1);
    }

    /// Snapshot of the tag's active count.
    pub fn active(&self, tag: SubsystemTag) -> u32 {
        self.state.lock().unwrap().active[tag.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_inverted_bounds() {
        let registry = SubsystemRegistry::new();
        let cfg = SubsystemConfig::new(SubsystemTag::HotReload, 1).with_min_workers(2);
        assert!(matches!(
            registry.register(cfg, 8),
            Err(PoolError::InvalidConfig(_))
        ));
        assert!(!registry.is_registered(SubsystemTag::HotReload));
    }

    #[test]
    fn register_clamps_to_pool_ceiling() {
        let registry = SubsystemRegistry::new();
        registry
            .register(SubsystemConfig::new(SubsystemTag::AssetStream, 64), 8)
            .unwrap();
        assert_eq!(registry.cap(SubsystemTag::AssetStream), Some(8));
    }

    #[test]
    fn floor_sums_registered_minimums() {
        let registry = SubsystemRegistry::new();
        registry
            .register(
                SubsystemConfig::new(SubsystemTag::EntityExtract, 4).with_min_workers(1),
                8,
            )
            .unwrap();
        registry
            .register(
                SubsystemConfig::new(SubsystemTag::RenderCache, 2).with_min_workers(2),
                8,
            )
            .unwrap();
        assert_eq!(registry.floor(), 3);
    }

    #[test]
    fn demand_grant_saturates_at_cap() {
        let table = DemandTable::new();
        table.init_tag(SubsystemTag::AccelBuild, 4);

        assert_eq!(table.record_demand(SubsystemTag::AccelBuild, 6), Some(4));

        // Three workers already executing: only one more grantable.
        table.with_locked(|s| s.active[SubsystemTag::AccelBuild.index()] = 3);
        assert_eq!(table.record_demand(SubsystemTag::AccelBuild, 6), Some(1));
        assert_eq!(table.total_demand(), 6);
    }

    #[test]
    fn unregistered_tag_grants_nothing_and_is_never_below_cap() {
        let table = DemandTable::new();
        assert_eq!(table.record_demand(SubsystemTag::HotReload, 3), None);
        table.with_locked(|s| assert!(!s.below_cap(SubsystemTag::HotReload)));
    }
}
