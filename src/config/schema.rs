//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the tracing server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TreqsConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Tracer settings (shared secret, capture detail).
    pub tracer: TracerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Demo application settings.
    pub demo: DemoConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Tracer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Shared secret expected in the `x-treqs-key` header.
    pub key: String,

    /// Most verbose level recorded into captures
    /// (off, error, warn, info, debug, trace).
    pub capture_level: String,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            key: "treqs".to_string(),
            capture_level: "trace".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Demo application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Interval between history compactions in seconds.
    pub compact_interval_secs: u64,

    /// Number of estimates kept after compaction.
    pub history_limit: usize,

    /// Upper bound on `rounds` accepted by the π route.
    pub max_rounds: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            compact_interval_secs: 30,
            history_limit: 16,
            max_rounds: 1_000_000,
        }
    }
}
