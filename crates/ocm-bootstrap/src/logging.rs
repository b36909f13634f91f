//! Logging pipeline.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,ocm=debug";

/// Install the `fmt` subscriber, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
