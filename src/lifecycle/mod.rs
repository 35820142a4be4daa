//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → server drains in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - In-flight traces always finish before the process exits

pub mod shutdown;

pub use shutdown::{signalled, Shutdown};
