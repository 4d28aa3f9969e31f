//! Error taxonomy of the pool's public API.
//!
//! Usage errors (`NotRunning`, `AlreadyRunning`, `AlreadyStarted`,
//! `UnregisteredSubsystem`) are returned synchronously to the caller and
//! never retried by the pool. Job-level failures are not errors at this
//! layer: a panicking job is caught by the executing worker, logged, and
//! counted in the failed statistic.

use thiserror::Error;

use crate::work::SubsystemTag;

/// Errors returned by the pool's public operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// `register_subsystem` was called after `start`.
    #[error("cannot register a subsystem while the pool is running")]
    AlreadyRunning,

    /// `start` was called on a pool that is already running.
    #[error("pool is already started")]
    AlreadyStarted,

    /// `submit` was called before `start` or after `shutdown`.
    #[error("pool is not running")]
    NotRunning,

    /// `submit` was called with a tag no subsystem registered.
    ///
    /// Rejected at submission time: an unregistered tag has no worker cap,
    /// so its items could never be claimed and would sit queued forever.
    #[error("subsystem {0} is not registered")]
    UnregisteredSubsystem(SubsystemTag),

    /// A subsystem configuration violated `min_workers <= max_workers`.
    #[error("invalid subsystem configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to spawn a worker thread during scale-up.
    ///
    /// Non-fatal: the pool keeps operating at its prior worker count.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    /// Internal error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
