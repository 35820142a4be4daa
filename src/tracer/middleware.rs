//! Axum binding for the trace coordinator.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};

use super::coordinator::TraceCoordinator;

/// Middleware entry point: classify the request and hand it to the
/// coordinator with the rest of the stack as the downstream handler.
pub async fn treqs_middleware(
    State(coordinator): State<Arc<TraceCoordinator>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    coordinator
        .handle(request, move |request| next.run(request))
        .await
}

/// Wrap every route of `app` with the tracer.
pub fn wrap<S>(app: Router<S>, coordinator: Arc<TraceCoordinator>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    app.layer(middleware::from_fn_with_state(coordinator, treqs_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::capture::{CaptureError, CaptureHandle, TraceBuffer, TraceCapture};
    use axum::{http::StatusCode, routing::get};
    use tower::ServiceExt;

    struct MarkerCapture;

    impl TraceCapture for MarkerCapture {
        fn start(&self, sink: TraceBuffer) -> Result<CaptureHandle, CaptureError> {
            sink.append(b"marker");
            Ok(CaptureHandle::new(|| {}))
        }
    }

    #[tokio::test]
    async fn wrapped_router_traces_and_reads() {
        let coordinator = Arc::new(TraceCoordinator::new("k", Arc::new(MarkerCapture)));
        let app = wrap(Router::new().route("/", get(|| async { "hello" })), coordinator);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("X-Treqs-Key", "k")
                    .header("X-Treqs-Action", "trace")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()["x-treqs-id"].to_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("X-Treqs-Key", "k")
                    .header("X-Treqs-Action", "read")
                    .header("X-Treqs-Id", id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"marker");
    }
}
