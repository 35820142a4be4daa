//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing spans and events
//!         → logging.rs (fmt output, filtered by level)
//!         → capture.rs (recorded into a trace while armed)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → trace sessions served by the tracer
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod capture;
pub mod logging;
pub mod metrics;

pub use capture::{CaptureLayer, SpanCapture};
