//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and levels parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TreqsConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::TreqsConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("tracer.key must not be empty")]
    EmptyKey,
    #[error("invalid {field} address `{value}`")]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid tracer.capture_level `{0}`")]
    InvalidCaptureLevel(String),
    #[error("demo.compact_interval_secs must be greater than zero")]
    ZeroCompactInterval,
    #[error("demo.max_rounds must be greater than zero")]
    ZeroMaxRounds,
}

pub fn validate_config(config: &TreqsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // An empty key would authorize any request that omits the key header.
    if config.tracer.key.is_empty() {
        errors.push(ValidationError::EmptyKey);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if capture_level(config).is_none() {
        errors.push(ValidationError::InvalidCaptureLevel(
            config.tracer.capture_level.clone(),
        ));
    }

    if config.demo.compact_interval_secs == 0 {
        errors.push(ValidationError::ZeroCompactInterval);
    }

    if config.demo.max_rounds == 0 {
        errors.push(ValidationError::ZeroMaxRounds);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parsed `tracer.capture_level`.
pub fn capture_level(config: &TreqsConfig) -> Option<LevelFilter> {
    LevelFilter::from_str(&config.tracer.capture_level).ok()
}
