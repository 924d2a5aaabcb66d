//! Logging setup for binaries embedding the capture core

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber. `RUST_LOG` overrides `default_level`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok();

    if installed {
        info!(level = default_level, "logging initialized");
    }
    installed
}
