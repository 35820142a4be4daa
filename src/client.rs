//! HTTP client for a traced server.
//!
//! Issues the control requests the tracer understands: trace a request,
//! read back its capture, reset stored sessions.

use axum::body::Bytes;
use reqwest::{Client, Method, RequestBuilder, StatusCode};

use crate::tracer::{X_TREQS_ACTION, X_TREQS_ID, X_TREQS_KEY};

/// Errors from [`TraceClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("trace request failed, x-treqs-id header missing in response")]
    MissingId,
    #[error("server returned {0}")]
    Status(StatusCode),
}

/// Response of a traced request.
#[derive(Debug, Clone)]
pub struct TracedResponse {
    /// Session holding the capture.
    pub id: String,
    /// Status the wrapped handler produced.
    pub status: StatusCode,
    /// Body the wrapped handler produced.
    pub body: Bytes,
}

pub struct TraceClient {
    client: Client,
    url: String,
    key: String,
    method: Method,
}

impl TraceClient {
    /// Client for the resource at `url`, authorized with `key`.
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            key: key.into(),
            method: Method::GET,
        }
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// HTTP method used for every request (default `GET`).
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Send the request with tracing enabled.
    pub async fn trace(&self) -> Result<TracedResponse, ClientError> {
        let res = self.request("trace").send().await?;

        let id = res
            .headers()
            .get(X_TREQS_ID.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let status = res.status();
        let body = res.bytes().await?;

        match id {
            Some(id) => Ok(TracedResponse { id, status, body }),
            None => {
                tracing::debug!(%status, "Trace response carried no session id");
                Err(ClientError::MissingId)
            }
        }
    }

    /// Fetch the capture stored under `id`.
    pub async fn read(&self, id: &str) -> Result<Bytes, ClientError> {
        let res = self
            .request("read")
            .header(X_TREQS_ID.as_str(), id)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::Status(res.status()));
        }
        Ok(res.bytes().await?)
    }

    /// Discard every capture stored on the server.
    pub async fn reset(&self) -> Result<(), ClientError> {
        let res = self.request("reset").send().await?;
        if !res.status().is_success() {
            return Err(ClientError::Status(res.status()));
        }
        Ok(())
    }

    /// Trace the request, then read back its capture.
    pub async fn capture(&self) -> Result<(TracedResponse, Bytes), ClientError> {
        let traced = self.trace().await?;
        let trace = self.read(&traced.id).await?;
        Ok((traced, trace))
    }

    fn request(&self, action: &str) -> RequestBuilder {
        self.client
            .request(self.method.clone(), &self.url)
            .header(X_TREQS_KEY.as_str(), &self.key)
            .header(X_TREQS_ACTION.as_str(), action)
    }
}
