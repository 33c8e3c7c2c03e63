// Subscriber setup for applications embedding the client; the library itself only emits events.
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (default `info`).
/// Returns false when a global subscriber was already set.
pub fn init() -> bool {
    init_with_default("info")
}

pub fn init_with_default(directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
