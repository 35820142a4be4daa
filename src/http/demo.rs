//! Demonstration application served behind the tracer.
//!
//! `GET /` estimates π with the Nilakantha series, fanning the terms out
//! over several tasks so a trace has some concurrency to show. A background
//! [`Compactor`] trims the estimate history through
//! [`TraceCoordinator::exclude`], so it never runs inside a capture.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time;
use tracing::Instrument;

use crate::config::DemoConfig;
use crate::tracer::TraceCoordinator;

const DEFAULT_ROUNDS: u64 = 50_000;
const DEFAULT_MAX_ROUNDS: u64 = 1_000_000;
const CHUNKS: u64 = 8;

/// Shared state of the demo application.
#[derive(Debug, Clone)]
pub struct DemoState {
    history: Arc<Mutex<VecDeque<f64>>>,
    max_rounds: u64,
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            history: Arc::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl DemoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the `rounds` a single request may ask for.
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    fn push(&self, estimate: f64) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(estimate);
    }

    /// Recent estimates, oldest first.
    pub fn history(&self) -> Vec<f64> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().copied().collect()
    }

    /// Keep only the newest `limit` estimates. Returns how many were removed.
    pub fn compact(&self, limit: usize) -> usize {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let excess = history.len().saturating_sub(limit);
        history.drain(..excess);
        excess
    }
}

/// Routes of the demo application.
pub fn router(state: DemoState) -> Router {
    Router::new()
        .route("/", get(estimate_pi))
        .route("/history", get(history))
        .route("/status", get(|| async { "ok" }))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PiParams {
    rounds: Option<u64>,
}

async fn estimate_pi(
    State(state): State<DemoState>,
    Query(params): Query<PiParams>,
) -> Result<String, StatusCode> {
    let rounds = params
        .rounds
        .unwrap_or(DEFAULT_ROUNDS)
        .clamp(1, state.max_rounds);
    let pi = compute_pi(rounds)
        .instrument(tracing::debug_span!("estimate_pi", rounds))
        .await?;

    state.push(pi);
    Ok(format!("π to the 10th digit is ~{:.10}\n", pi))
}

async fn compute_pi(rounds: u64) -> Result<f64, StatusCode> {
    let mut tasks = Vec::new();
    for (start, end) in chunk_bounds(rounds) {
        let task = async move {
            let sum = nilakantha_terms(start, end);
            tracing::trace!(start, end, sum, "Chunk done");
            sum
        };
        tasks.push(tokio::spawn(task.in_current_span()));
    }

    let mut pi = 3.0;
    for task in tasks {
        pi += task.await.map_err(|e| {
            tracing::error!(error = %e, "Estimate task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }

    tracing::debug!(pi, "Estimated π");
    Ok(pi)
}

/// Split terms `1..=rounds` into at most `CHUNKS` inclusive ranges.
fn chunk_bounds(rounds: u64) -> Vec<(u64, u64)> {
    let chunk = rounds.div_ceil(CHUNKS).max(1);
    let mut bounds = Vec::new();
    let mut start = 1;
    while start <= rounds {
        let end = start.saturating_add(chunk - 1).min(rounds);
        bounds.push((start, end));
        match end.checked_add(1) {
            Some(next) => start = next,
            None => break,
        }
    }
    bounds
}

/// Sum of the series terms `start..=end`.
fn nilakantha_terms(start: u64, end: u64) -> f64 {
    (start..=end)
        .map(|k| {
            let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
            let k = k as f64;
            sign * 4.0 / (2.0 * k * (2.0 * k + 1.0) * (2.0 * k + 2.0))
        })
        .sum()
}

async fn history(State(state): State<DemoState>) -> Json<Vec<f64>> {
    Json(state.history())
}

/// Periodic history compaction that stays out of traces.
pub struct Compactor {
    coordinator: Arc<TraceCoordinator>,
    state: DemoState,
    interval: Duration,
    limit: usize,
}

impl Compactor {
    pub fn new(coordinator: Arc<TraceCoordinator>, state: DemoState, config: &DemoConfig) -> Self {
        Self {
            coordinator,
            state,
            interval: Duration::from_secs(config.compact_interval_secs),
            limit: config.history_limit,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, limit = self.limit, "Compactor starting");

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.compact().await;
                    if removed > 0 {
                        tracing::debug!(removed, "History compacted");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Compactor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Compact once under the coordinator's shared lock.
    pub async fn compact(&self) -> usize {
        self.coordinator
            .exclude(async { self.state.compact(self.limit) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{CaptureError, CaptureHandle, TraceBuffer, TraceCapture};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct NoopCapture;

    impl TraceCapture for NoopCapture {
        fn start(&self, _sink: TraceBuffer) -> Result<CaptureHandle, CaptureError> {
            Ok(CaptureHandle::new(|| {}))
        }
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn estimates_pi_to_ten_digits() {
        let state = DemoState::new();
        let (status, body) = get_text(router(state.clone()), "/?rounds=50000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "π to the 10th digit is ~3.1415926536\n");
        assert_eq!(state.history().len(), 1);
    }

    #[tokio::test]
    async fn odd_round_counts_cover_every_term() {
        let whole = nilakantha_terms(1, 13);
        let split = nilakantha_terms(1, 2) + nilakantha_terms(3, 13);
        assert!((whole - split).abs() < 1e-15);

        let (status, body) = get_text(router(DemoState::new()), "/?rounds=13").await;
        assert_eq!(status, StatusCode::OK);
        let estimate: f64 = body
            .trim_end()
            .rsplit('~')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!((estimate - (3.0 + whole)).abs() < 1e-9);
    }

    #[test]
    fn chunk_bounds_cover_every_term_without_overflow() {
        assert_eq!(chunk_bounds(13), vec![(1, 2), (3, 4), (5, 6), (7, 8), (9, 10), (11, 12), (13, 13)]);
        assert_eq!(chunk_bounds(1), vec![(1, 1)]);

        let huge = chunk_bounds(u64::MAX);
        assert_eq!(huge.len() as u64, CHUNKS);
        assert_eq!(huge.first().map(|b| b.0), Some(1));
        assert_eq!(huge.last().map(|b| b.1), Some(u64::MAX));
        assert!(huge.windows(2).all(|w| w[1].0 == w[0].1 + 1));
    }

    #[tokio::test]
    async fn oversized_rounds_are_clamped() {
        let state = DemoState::new().with_max_rounds(1_000);
        let (status, body) =
            get_text(router(state.clone()), "/?rounds=18446744073709551615").await;

        assert_eq!(status, StatusCode::OK);
        let estimate: f64 = body
            .trim_end()
            .rsplit('~')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        let expected = 3.0 + nilakantha_terms(1, 1_000);
        assert!((estimate - expected).abs() < 1e-9);
        assert_eq!(state.history().len(), 1);
    }

    #[tokio::test]
    async fn compactor_keeps_newest_estimates() {
        let state = DemoState::new();
        for i in 0..20 {
            state.push(i as f64);
        }
        let coordinator = Arc::new(TraceCoordinator::new("k", Arc::new(NoopCapture)));
        let config = DemoConfig {
            compact_interval_secs: 1,
            history_limit: 16,
            ..DemoConfig::default()
        };
        let compactor = Compactor::new(coordinator, state.clone(), &config);

        assert_eq!(compactor.compact().await, 4);
        assert_eq!(state.history().first(), Some(&4.0));
        assert_eq!(compactor.compact().await, 0);

        let (_, body) = get_text(router(state), "/history").await;
        let history: Vec<f64> = serde_json::from_str(&body).unwrap();
        assert_eq!(history.len(), 16);
    }
}
