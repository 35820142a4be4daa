//! Trace coordinator: lock discipline and action dispatch.
//!
//! # Locking
//! ```text
//! shared    (many at once):  pass-through, read, exclude
//! exclusive (one at a time): trace, reset
//! ```
//! A trace holds the exclusive lock for the whole downstream call, so while
//! it records nothing else in the process is serving requests. The registry
//! lives inside the lock, so it cannot be touched without holding a tier.
//!
//! A pass-through keeps its shared guard inside the response body until the
//! body is finished or dropped. A traced response body is collected before
//! the capture stops.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, header::InvalidHeaderValue, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;

use super::body::GuardedBody;
use super::capture::{CaptureError, TraceBuffer, TraceCapture};
use super::classifier::{scrub_headers, Action};
use super::session::{os_random, IdSource, SessionId, SessionIdError, SessionRegistry};
use super::X_TREQS_ID;
use crate::observability::metrics;

/// Reasons a trace action fails.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error(transparent)]
    SessionId(#[from] SessionIdError),
    #[error("invalid session id header: {0}")]
    SessionHeader(#[from] InvalidHeaderValue),
    #[error("Could not enable tracing: {0}")]
    Capture(#[from] CaptureError),
    /// The traced response body failed while it was being collected.
    #[error("traced response body failed: {0}")]
    Body(#[source] axum::Error),
}

impl IntoResponse for TraceError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Serializes traced requests against all other traffic and stores their
/// captures.
pub struct TraceCoordinator {
    key: String,
    capture: Arc<dyn TraceCapture>,
    id_source: IdSource,
    sessions: Arc<RwLock<SessionRegistry>>,
}

impl TraceCoordinator {
    /// Create a coordinator authorizing requests that carry `key`.
    pub fn new(key: impl Into<String>, capture: Arc<dyn TraceCapture>) -> Self {
        Self {
            key: key.into(),
            capture,
            id_source: os_random,
            sessions: Arc::new(RwLock::new(SessionRegistry::new())),
        }
    }

    /// Replace the random source for session ids (the OS CSPRNG by default).
    pub fn with_id_source(mut self, source: IdSource) -> Self {
        self.id_source = source;
        self
    }

    /// Classify `request` and run the matching action.
    ///
    /// `downstream` is invoked at most once, with the control headers already
    /// removed from the request.
    pub async fn handle<F, Fut>(self: &Arc<Self>, mut request: Request<Body>, downstream: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut + Send + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let control = scrub_headers(request.headers_mut());
        let action = control.authorize(&self.key);
        metrics::record_action(action.as_str());

        match action {
            Action::PassThrough => self.pass_through(request, downstream).await,
            Action::Trace => self.trace(request, downstream).await,
            Action::Read => self.read(&control.id).await,
            Action::Reset => self.reset().await,
        }
    }

    /// Run `work` under the shared lock.
    ///
    /// Background jobs that live outside the HTTP request lifecycle use this
    /// so that they pause while a trace records, exactly like request
    /// handling does.
    pub async fn exclude<Fut: Future>(&self, work: Fut) -> Fut::Output {
        let _shared = self.sessions.read().await;
        work.await
    }

    /// Blocking variant of [`exclude`](Self::exclude) for plain threads.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn exclude_blocking<R>(&self, work: impl FnOnce() -> R) -> R {
        let _shared = self.sessions.blocking_read();
        work()
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn pass_through<F, Fut>(&self, request: Request<Body>, downstream: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let shared = Arc::clone(&self.sessions).read_owned().await;
        let response = downstream(request).await;
        response.map(|body| Body::new(GuardedBody::new(body, shared)))
    }

    async fn read(&self, id: &str) -> Response {
        let sessions = self.sessions.read().await;
        match sessions.get(id) {
            Some(trace) => {
                tracing::debug!(session = %id, bytes = trace.len(), "Serving trace");
                (
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    trace,
                )
                    .into_response()
            }
            None => {
                tracing::debug!(session = %id, "Trace session not found");
                (StatusCode::NOT_FOUND, "trace session not found\n").into_response()
            }
        }
    }

    async fn reset(&self) -> Response {
        let mut sessions = self.sessions.write().await;
        let discarded = sessions.len();
        sessions.clear();
        metrics::record_sessions(0);

        tracing::info!(discarded, "Trace sessions reset");
        StatusCode::OK.into_response()
    }

    /// Capture a trace of the downstream call.
    ///
    /// The work runs on its own task so the capture completes and the lock is
    /// released even if the client goes away mid-request.
    async fn trace<F, Fut>(self: &Arc<Self>, request: Request<Body>, downstream: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut + Send + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut sessions = this.sessions.write().await;

            let id = SessionId::generate_from(this.id_source)?;
            let id_header = id.to_header_value()?;
            let buffer = TraceBuffer::new();
            let handle = this.capture.start(buffer.clone())?;
            let started = Instant::now();

            // A panic or error below drops `handle`, which stops the capture.
            let (parts, body) = downstream(request).await.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(TraceError::Body)?;
            handle.stop();
            let mut response = Response::from_parts(parts, Body::from(body));

            let trace = buffer.into_bytes();
            metrics::record_trace(started.elapsed(), trace.len());
            tracing::info!(
                session = %id,
                bytes = trace.len(),
                status = %response.status(),
                elapsed = ?started.elapsed(),
                "Trace captured"
            );

            response.headers_mut().insert(X_TREQS_ID.clone(), id_header);
            sessions.insert(id, trace);
            metrics::record_sessions(sessions.len());

            Ok::<_, TraceError>(response)
        });

        match task.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Trace failed");
                metrics::record_trace_failure();
                e.into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "Traced handler did not complete");
                metrics::record_trace_failure();
                (StatusCode::INTERNAL_SERVER_ERROR, "traced request failed\n").into_response()
            }
        }
    }
}

impl std::fmt::Debug for TraceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceCoordinator").finish_non_exhaustive()
    }
}

/// Header value for the session id of a completed trace, if present.
pub fn session_id(response: &Response) -> Option<&HeaderValue> {
    response.headers().get(&X_TREQS_ID)
}
