use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide `tracing` subscriber: an `EnvFilter` (defaulting to
/// `info`) plus a plain `fmt` layer, matching the `deployer`/`gateway` binaries' startup
/// sequence. Call once, at the top of `main`.
pub fn init(default_directive: &str) {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();
}
