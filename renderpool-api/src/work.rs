//! Work tags, payloads, and the work item itself.
//!
//! A [`WorkItem`] is the unit of currency between engine subsystems and the
//! pool: an id, a priority, a tagged payload describing the work, and a
//! boxed closure that performs it. The closure owns whatever context it
//! needs and must be `Send`, so the pool can hand it to any worker thread
//! without knowing anything about the payload beyond its tag.
//!
//! The tag is derived from the payload variant rather than stored next to
//! it, so a work item can never carry an `AssetStream` payload under a
//! `HotReload` tag.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::priority::Priority;

/// Process-wide counter backing [`WorkItem`] ids.
static NEXT_WORK_ID: AtomicU64 = AtomicU64::new(1);

/// The closed set of engine subsystems that schedule work on the pool.
///
/// Each subsystem registers exactly one tag before the pool starts and
/// submits all of its work under it. The set is closed on purpose: the
/// demand and active-count tables are plain arrays indexed by
/// [`SubsystemTag::index`], with no hashing or per-entry locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemTag {
    /// Extracting renderable entities from the scene into frame-local data.
    EntityExtract,
    /// (Re)building render caches (sorted draw lists, material batches).
    RenderCache,
    /// Acceleration-structure builds and refits.
    AccelBuild,
    /// Streaming assets from disk into GPU-upload staging.
    AssetStream,
    /// Shader / asset hot-reload.
    HotReload,
    /// Secondary command-buffer recording.
    CommandRecord,
}

impl SubsystemTag {
    /// Number of tags; sizes the registry and demand tables.
    pub const COUNT: usize = 6;

    /// Every tag, in ordinal order.
    pub const ALL: [SubsystemTag; SubsystemTag::COUNT] = [
        SubsystemTag::EntityExtract,
        SubsystemTag::RenderCache,
        SubsystemTag::AccelBuild,
        SubsystemTag::AssetStream,
        SubsystemTag::HotReload,
        SubsystemTag::CommandRecord,
    ];

    /// Stable ordinal used to index the registry and demand tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short human-readable name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            SubsystemTag::EntityExtract => "entity-extract",
            SubsystemTag::RenderCache => "render-cache",
            SubsystemTag::AccelBuild => "accel-build",
            SubsystemTag::AssetStream => "asset-stream",
            SubsystemTag::HotReload => "hot-reload",
            SubsystemTag::CommandRecord => "command-record",
        }
    }
}

impl fmt::Display for SubsystemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-subsystem work descriptor, one variant per [`SubsystemTag`].
///
/// The pool never interprets the descriptor; it only logs it and uses the
/// derived tag for cap accounting. The fields exist so producers and log
/// readers can tell two items of the same subsystem apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkPayload {
    /// One extraction slice of a view.
    EntityExtract { view: u32, slice: u32 },
    /// One render-cache batch rebuild.
    RenderCache { batch: u32 },
    /// Build or refit of one acceleration structure.
    AccelBuild { mesh_id: u64 },
    /// Streaming one asset from disk.
    AssetStream { path: PathBuf },
    /// Re-compiling one hot-reloaded source file.
    HotReload { path: PathBuf },
    /// Recording one secondary command buffer.
    CommandRecord { pass: u32 },
}

impl WorkPayload {
    /// The subsystem this payload belongs to.
    pub fn tag(&self) -> SubsystemTag {
        match self {
            WorkPayload::EntityExtract { .. } => SubsystemTag::EntityExtract,
            WorkPayload::RenderCache { .. } => SubsystemTag::RenderCache,
            WorkPayload::AccelBuild { .. } => SubsystemTag::AccelBuild,
            WorkPayload::AssetStream { .. } => SubsystemTag::AssetStream,
            WorkPayload::HotReload { .. } => SubsystemTag::HotReload,
            WorkPayload::CommandRecord { .. } => SubsystemTag::CommandRecord,
        }
    }
}

/// Type of the boxed job a [`WorkItem`] carries.
///
/// The closure owns its context (captured by value) and runs exactly once
/// on some worker thread. It reports nothing back to the pool; producers
/// that need results send them through their own channel from inside the
/// closure.
pub type WorkFn = Box<dyn FnOnce() + Send + 'static>;

/// One immutable unit of background work.
///
/// Created by a producer, pushed into the pool's queue, executed by exactly
/// one worker, then dropped. Ownership moves along that chain; nothing is
/// shared or mutated after construction.
pub struct WorkItem {
    id: u64,
    priority: Priority,
    payload: WorkPayload,
    job: WorkFn,
}

impl WorkItem {
    /// Builds a work item with a fresh process-unique id.
    pub fn new(priority: Priority, payload: WorkPayload, job: WorkFn) -> Self {
        Self {
            id: NEXT_WORK_ID.fetch_add(1, Ordering::Relaxed),
            priority,
            payload,
            job,
        }
    }

    /// Producer-unique id, assigned at construction.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Scheduling tier of this item.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Subsystem this item belongs to, derived from the payload.
    pub fn tag(&self) -> SubsystemTag {
        self.payload.tag()
    }

    /// The work descriptor (pool-opaque).
    pub fn payload(&self) -> &WorkPayload {
        &self.payload
    }

    /// Consumes the item and runs its job on the calling thread.
    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .field("priority", &self.priority)
            .field("payload", &self.payload)
            .finish()
    }
}
