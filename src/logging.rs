//! Logging setup for component processes.
//!
//! Logs go to stderr; stdout may carry the channel. `RUST_LOG` overrides
//! the default level.

use tracing_subscriber::EnvFilter;

/// Default filter outside debug mode.
pub const DEFAULT_FILTER: &str = "info";

/// Default filter in debug mode.
pub const DEBUG_FILTER: &str = "debug";

/// Filter directives for a component.
pub fn filter_directives(debug: bool) -> String {
    let default = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_owned())
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(debug: bool) -> bool {
    let filter = EnvFilter::builder().parse_lossy(filter_directives(debug));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
