//! Per-request runtime tracing.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → classifier.rs (strip x-treqs-* headers, authorize, pick action)
//!     → coordinator.rs (take shared or exclusive lock, run action)
//!         pass-through → wrapped handler (body.rs holds the guard until the body ends)
//!         trace        → capture.rs start → wrapped handler → stop → session.rs
//!         read         → session.rs lookup
//!         reset        → session.rs clear
//! ```
//!
//! # Design Decisions
//! - One readers-writer lock for the whole process; no per-session locks
//! - Unauthorized control headers degrade silently to pass-through
//! - Sessions live until reset; nothing survives a restart

use axum::http::HeaderName;

mod body;
pub mod capture;
pub mod classifier;
pub mod coordinator;
pub mod middleware;
pub mod session;

pub use capture::{CaptureError, CaptureHandle, TraceBuffer, TraceCapture};
pub use classifier::{scrub_headers, Action, Control};
pub use coordinator::{TraceCoordinator, TraceError};
pub use middleware::{treqs_middleware, wrap};
pub use session::{os_random, IdSource, SessionId, SessionRegistry};

/// Shared secret header.
pub static X_TREQS_KEY: HeaderName = HeaderName::from_static("x-treqs-key");
/// Action header: `trace`, `read` or `reset`.
pub static X_TREQS_ACTION: HeaderName = HeaderName::from_static("x-treqs-action");
/// Session id header, on `read` requests and successful `trace` responses.
pub static X_TREQS_ID: HeaderName = HeaderName::from_static("x-treqs-id");
