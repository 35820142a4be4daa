//! Per-request runtime tracing for HTTP services.
//!
//! Wrap an application with a [`TraceCoordinator`] and any single request
//! carrying the right `x-treqs-*` headers is recorded in isolation: while it
//! runs, every other request waits. The capture is stored under a random
//! session id and can be downloaded later.
//!
//! ```text
//! $ curl -H 'x-treqs-key: secret' -H 'x-treqs-action: trace' -i http://localhost:8080/
//! x-treqs-id: 5f0c…
//! $ curl -H 'x-treqs-key: secret' -H 'x-treqs-action: read' -H 'x-treqs-id: 5f0c…' \
//!       http://localhost:8080/ > trace.jsonl
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod tracer;

pub use client::TraceClient;
pub use config::TreqsConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::SpanCapture;
pub use tracer::TraceCoordinator;
