//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Attach the capture layer so traced requests can be recorded
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured log level
//! - The fmt output and the capture layer are filtered independently, so a
//!   quiet console still yields detailed traces

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;
use crate::observability::capture::SpanCapture;

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init(
    config: &ObservabilityConfig,
    capture: &SpanCapture,
    capture_level: LevelFilter,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "treqs={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .with(capture.layer().with_filter(capture_level))
        .try_init()
}
