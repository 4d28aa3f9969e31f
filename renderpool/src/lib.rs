//! # Renderpool
//!
//! A dynamic, subsystem-aware worker thread pool that schedules all
//! background CPU work for a real-time rendering engine: entity extraction,
//! render-cache building, acceleration-structure builds, asset streaming,
//! hot-reload, and secondary command recording.
//!
//! Every engine subsystem registers a [`SubsystemConfig`] before the pool
//! starts, then submits [`WorkItem`]s tagged with its [`SubsystemTag`].
//! The pool guarantees:
//!
//! - strict priority precedence across the four tiers, FIFO within a tier
//! - per-subsystem worker caps (`pop_if` never hands a worker an item for a
//!   subsystem already at its cap)
//! - a global worker floor of `Σ min_workers` that survives idle periods,
//!   and a ceiling of the pool's `max_workers` that survives demand spikes
//! - lazy scale-down: idle workers retire themselves, running jobs are
//!   never interrupted
//!
//! ## Example
//!
//! ```no_run
//! use renderpool::{PoolConfig, ThreadPool};
//! use renderpool_api::{Priority, SubsystemConfig, SubsystemTag, WorkItem, WorkPayload};
//!
//! let pool = ThreadPool::new(PoolConfig::default());
//! pool.register_subsystem(SubsystemConfig::new(SubsystemTag::AssetStream, 4).with_min_workers(1))
//!     .unwrap();
//! pool.start(2).unwrap();
//!
//! pool.submit(WorkItem::new(
//!     Priority::High,
//!     WorkPayload::AssetStream { path: "textures/albedo.ktx2".into() },
//!     Box::new(|| { /* decode + stage */ }),
//! ))
//! .unwrap();
//!
//! pool.shutdown();
//! ```
//!
//! ## Module Organization
//!
//! - [`queue`]: the four-lane priority queue
//! - [`registry`]: subsystem registry and demand/active tables
//! - [`worker`]: worker lifecycle state machine and run loop
//! - [`pool`]: the orchestrator (scaling policy, shutdown, statistics)
//! - [`config`]: pool-level configuration
//! - [`logging`]: `tracing` subscriber setup helpers

pub mod config;
pub mod logging;
pub mod pool;
pub mod queue;
pub mod registry;
mod stats;
pub mod worker;

pub use config::PoolConfig;
pub use pool::{PoolStatus, ThreadPool};
pub use queue::WorkQueue;
pub use worker::WorkerPhase;

// Re-export the vocabulary crate so consumers only need one dependency.
pub use renderpool_api as api;
pub use renderpool_api::{
    PoolError, PoolStatistics, Priority, SubsystemConfig, SubsystemTag, WorkItem, WorkPayload,
};
