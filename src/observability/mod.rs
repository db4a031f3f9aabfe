//! Logging setup.
//!
//! Library code only emits `tracing` events; binaries and tests that want
//! output call [`init_tracing`] once at startup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `parascore=debug`
pub const LOG_ENV: &str = "PARASCORE_LOG";

pub const DEFAULT_FILTER: &str = "info";

/// Filter from `PARASCORE_LOG`, falling back to `info`
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a `fmt` subscriber on stderr. Returns false when a global
/// subscriber was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(env_filter())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
    }
}
