//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request logging)
//!     → tracer middleware (classify, lock, trace/read/reset/pass-through)
//!     → demo.rs (application routes) or any wrapped Router
//! ```

pub mod demo;
pub mod server;

pub use demo::{Compactor, DemoState};
pub use server::HttpServer;
