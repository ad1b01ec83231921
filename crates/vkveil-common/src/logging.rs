use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging with environment filter.
/// Set VKVEIL_LOG=debug (or trace, info, warn, error) for verbosity control.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("VKVEIL_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // The host process may have installed a subscriber already; loading
    // twice must not panic.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
