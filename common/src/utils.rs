// common/src/utils.rs
use tracing_subscriber::EnvFilter;

/// Setup tracing for consistent logging across the proxy and the portal client.
///
/// Level comes from `RUST_LOG` (default `info`). Calling this again is a no-op.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
