//! Pool-level configuration.

use std::time::Duration;

/// Configuration for the [`ThreadPool`](crate::pool::ThreadPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard ceiling on worker threads, across all subsystems.
    pub max_workers: usize,

    /// Duration a worker sleeps when the queue yields nothing.
    pub idle_sleep: Duration,

    /// Idle duration after which a worker above the floor retires itself.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            idle_sleep: Duration::from_millis(10),
            idle_timeout: Duration::from_millis(500),
        }
    }
}

impl PoolConfig {
    /// Sets the worker ceiling.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the idle poll interval.
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Sets the self-retirement idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_tracks_cpu_count() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.max_workers, num_cpus::get());
        assert!(cfg.idle_sleep < cfg.idle_timeout);
    }
}
