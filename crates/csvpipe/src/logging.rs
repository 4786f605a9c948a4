//! Subscriber setup: env-filtered `tracing` output with `log` records bridged in.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Filter from `RUST_LOG` when set, otherwise the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber and the `log` bridge.
///
/// Returns false when a subscriber was already installed; the existing one
/// stays in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = build_filter(config);
    let layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let installed = match config.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(layer))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(
            Registry::default().with(filter).with(layer.json()),
        ),
    }
    .is_ok();

    // Repository code logs through the `log` facade.
    let _ = tracing_log::LogTracer::init();

    installed
}
