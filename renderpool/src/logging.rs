//! Logging setup for the pool and its host engine.
//!
//! Built on the `tracing` ecosystem. The pool itself only emits events;
//! hosts that already install their own subscriber can ignore this module
//! entirely. For standalone tools, demos, and tests, [`init_default`] (or
//! [`init`] with a custom [`LogConfig`]) installs a formatted console
//! subscriber. Safe to call multiple times; only the first call takes
//! effect.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the console subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level to display.
    pub level: Level,
    /// Include file and line of the callsite.
    pub show_file_line: bool,
    /// Include thread names (workers are named `renderpool-worker-N`).
    pub show_thread_info: bool,
    /// Extra target filters, `"target=level,target2=level2"` form, applied
    /// on top of `RUST_LOG`.
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_file_line: false,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

/// Installs a global console subscriber with the given configuration.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
        if let Some(filters) = &config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let fmt_layer = fmt::layer()
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(false);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer);
        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("failed to set global tracing subscriber: {err}");
        }
    });
}

/// Installs the default subscriber: INFO level, thread names, no callsites.
pub fn init_default() {
    init(LogConfig::default());
}

/// Debug-level configuration with callsites, for chasing scheduling issues.
pub fn init_verbose() {
    init(LogConfig {
        level: Level::DEBUG,
        show_file_line: true,
        ..Default::default()
    });
}
