//! Process-wide `tracing` subscriber.

use tracing_subscriber::EnvFilter;

use crate::{LogFormat, LogSettings};

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
///
/// Records emitted through the `log` crate (actix's access logger) are bridged in.
/// Calling this twice keeps the first subscriber.
pub fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match log.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    };
    if installed {
        tracing::debug!(format = ?log.format, "tracing initialised");
    }
}
