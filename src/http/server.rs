//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the application router with the tracer middleware
//! - Add request logging (tower-http)
//! - Serve on a listener until shutdown, draining in-flight requests
//!
//! There is deliberately no request timeout layer: a timeout would cancel the
//! client side of a trace while the exclusive lock is held.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::lifecycle::signalled;
use crate::tracer::{self, TraceCoordinator};

/// HTTP server for a traced application.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Wrap `app` so every request passes through `coordinator`.
    pub fn new(coordinator: Arc<TraceCoordinator>, app: Router) -> Self {
        Self {
            router: Self::build_router(coordinator, app),
        }
    }

    /// Build the router with all middleware layers.
    fn build_router(coordinator: Arc<TraceCoordinator>, app: Router) -> Router {
        tracer::wrap(app, coordinator).layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
