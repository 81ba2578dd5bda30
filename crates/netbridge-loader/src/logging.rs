//! Debug output for hosts that ask for it through `clrInit`.

use tracing_subscriber::EnvFilter;

/// Filter variable, same syntax as `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "NETBRIDGE_LOG";

const DEFAULT_DEBUG_FILTER: &str = "netbridge_loader=debug,netbridge_shared=debug";

/// Install a stderr subscriber unless the host process already has one.
///
/// Returns whether this call installed it.
pub fn enable_debug_output() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DEBUG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
