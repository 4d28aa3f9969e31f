//! # Renderpool API
//!
//! Vocabulary types shared between the renderpool worker pool and the engine
//! subsystems that feed it (entity extraction, render-cache building,
//! acceleration-structure builds, asset streaming, hot-reload, command
//! recording).
//!
//! The pool itself lives in the `renderpool` crate; this crate only carries
//! the types a producer needs in order to describe work:
//!
//! - [`SubsystemTag`] / [`WorkPayload`]: which subsystem a unit of work
//!   belongs to, plus its opaque descriptor
//! - [`Priority`]: the four scheduling tiers
//! - [`WorkItem`]: one immutable, self-describing unit of work
//! - [`SubsystemConfig`]: per-subsystem worker bounds and default priority
//! - [`PoolStatistics`]: snapshot of the pool's aggregate counters
//! - [`PoolError`]: the error taxonomy of the public API
//!
//! ## Module Organization
//!
//! - [`priority`]: scheduling tiers
//! - [`work`]: tags, payloads, and work items
//! - [`subsystem`]: subsystem configuration
//! - [`stats`]: statistics snapshot
//! - [`error`]: error types

pub mod error;
pub mod priority;
pub mod stats;
pub mod subsystem;
pub mod work;

pub use error::PoolError;
pub use priority::Priority;
pub use stats::PoolStatistics;
pub use subsystem::SubsystemConfig;
pub use work::{SubsystemTag, WorkFn, WorkItem, WorkPayload};
