//! Lock exclusivity observed over real connections.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Router};
use reqwest::StatusCode;
use tokio::sync::{Barrier, Notify};

mod common;

#[derive(Clone)]
struct Gates {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    barrier: Arc<Barrier>,
}

fn app(gates: Gates) -> Router {
    Router::new()
        .route("/", get(|| async { "fast" }))
        .route(
            "/block",
            get(|State(gates): State<Gates>| async move {
                gates.entered.notify_one();
                gates.release.notified().await;
                "released"
            }),
        )
        .route(
            "/pair",
            get(|State(gates): State<Gates>| async move {
                gates.barrier.wait().await;
                "paired"
            }),
        )
        .with_state(gates)
}

fn gates() -> Gates {
    Gates {
        entered: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
        barrier: Arc::new(Barrier::new(2)),
    }
}

#[tokio::test]
async fn pass_through_blocks_during_trace() {
    let gates = gates();
    let (addr, shutdown) =
        common::start_server(Arc::new(common::ScriptedCapture), app(gates.clone())).await;
    let client = common::http_client();

    let trace = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .get(format!("http://{}/block", addr))
                .header("x-treqs-key", common::KEY)
                .header("x-treqs-action", "trace")
                .send()
                .await
                .unwrap()
        }
    });
    gates.entered.notified().await;

    let mut pass = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .get(format!("http://{}/", addr))
                .send()
                .await
                .unwrap()
        }
    });
    assert!(
        tokio::time::timeout(Duration::from_millis(200), &mut pass)
            .await
            .is_err(),
        "pass-through finished while a trace held the lock"
    );

    gates.release.notify_one();
    let traced = trace.await.unwrap();
    assert_eq!(traced.status(), StatusCode::OK);
    assert!(traced.headers().contains_key("x-treqs-id"));

    let passed = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(passed.text().await.unwrap(), "fast");

    shutdown.trigger();
}

#[tokio::test]
async fn slow_pass_through_requests_overlap() {
    let (addr, shutdown) =
        common::start_server(Arc::new(common::ScriptedCapture), app(gates())).await;
    let client = common::http_client();
    let url = format!("http://{}/pair", addr);

    let (a, b) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(client.get(&url).send(), client.get(&url).send()) },
    )
    .await
    .expect("pass-through requests blocked each other");

    assert_eq!(a.unwrap().text().await.unwrap(), "paired");
    assert_eq!(b.unwrap().text().await.unwrap(), "paired");

    shutdown.trigger();
}
