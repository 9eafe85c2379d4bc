//! Subscriber setup for the command-line binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `SUGAR_LOG=debug`.
pub const LOG_ENV: &str = "SUGAR_LOG";
pub const DEFAULT_LEVEL: &str = "info";

/// Filter from the CLI flag, then `SUGAR_LOG`, then `info`.
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Some(level) = level {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install the global fmt subscriber. Later calls are ignored.
pub fn init_logging(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
