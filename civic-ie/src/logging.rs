//! Tracing setup for the civic-ie binary
//!
//! The global subscriber needs the configured log level, but resolving the
//! configuration already logs (a missing config file is a warning). Config
//! resolution therefore runs under a provisional subscriber.

use civic_common::config::{BootstrapConfig, ConfigOverrides};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, `level` otherwise
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber
pub fn init_tracing(level: &str) {
    tracing_subscriber::fmt().with_env_filter(env_filter(level)).init();
}

/// Resolve bootstrap configuration, logging to `writer` at the CLI level
/// (or `info`) while doing so
pub fn resolve_config<W>(
    overrides: &ConfigOverrides,
    writer: W,
) -> civic_common::Result<BootstrapConfig>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let level = overrides.log_level.as_deref().unwrap_or("info");
    let provisional = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(writer)
        .finish();

    tracing::subscriber::with_default(provisional, || BootstrapConfig::resolve(overrides))
}
