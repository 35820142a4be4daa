//! Full trace / read / reset round against the process-wide span capture.

use std::sync::Arc;

use axum::{routing::get, Router};
use reqwest::StatusCode;
use tracing_subscriber::layer::SubscriberExt;

use treqs::SpanCapture;

mod common;

async fn hello() -> &'static str {
    tracing::info!(greeting = "hello", "Handling traced request");
    "hello"
}

#[tokio::test]
async fn trace_read_reset_scenario() {
    let capture = SpanCapture::new();
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(capture.layer()))
        .expect("no other global subscriber in this test binary");

    let app = Router::new().route("/", get(hello));
    let (addr, shutdown) = common::start_server(Arc::new(capture.clone()), app).await;
    let url = format!("http://{}/", addr);
    let client = common::http_client();

    // Trace.
    let res = client
        .get(&url)
        .header("X-Treqs-Key", common::KEY)
        .header("X-Treqs-Action", "trace")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let id = res.headers()["x-treqs-id"].to_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(res.text().await.unwrap(), "hello");
    assert!(!capture.is_active());

    // Read it back.
    let res = client
        .get(&url)
        .header("X-Treqs-Key", common::KEY)
        .header("X-Treqs-Action", "read")
        .header("X-Treqs-Id", &id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/octet-stream");
    let trace = res.text().await.unwrap();
    assert!(!trace.is_empty());

    let records: Vec<serde_json::Value> = trace
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.first().unwrap()["kind"], "capture_start");
    assert_eq!(records.last().unwrap()["kind"], "capture_stop");
    assert!(records
        .iter()
        .any(|r| r["kind"] == "event" && r["fields"]["greeting"] == "hello"));

    // Unknown session.
    let res = client
        .get(&url)
        .header("X-Treqs-Key", common::KEY)
        .header("X-Treqs-Action", "read")
        .header("X-Treqs-Id", "bogus")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Reset drops everything.
    let res = client
        .get(&url)
        .header("X-Treqs-Key", common::KEY)
        .header("X-Treqs-Action", "reset")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(&url)
        .header("X-Treqs-Key", common::KEY)
        .header("X-Treqs-Action", "read")
        .header("X-Treqs-Id", &id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    shutdown.trigger();
}
