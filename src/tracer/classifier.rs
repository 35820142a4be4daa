//! Request classification.
//!
//! Extracts the control headers from a request, strips them so the wrapped
//! handler never sees them, and decides which action applies.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::{X_TREQS_ACTION, X_TREQS_ID, X_TREQS_KEY};

/// What the coordinator should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward to the wrapped handler under the shared lock.
    PassThrough,
    /// Capture a trace of this request under the exclusive lock.
    Trace,
    /// Serve a stored trace.
    Read,
    /// Discard every stored trace.
    Reset,
}

impl Action {
    /// Parse an action header value. Matching is case-insensitive and exact;
    /// anything unrecognized is a pass-through.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("trace") {
            Action::Trace
        } else if value.eq_ignore_ascii_case("read") {
            Action::Read
        } else if value.eq_ignore_ascii_case("reset") {
            Action::Reset
        } else {
            Action::PassThrough
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PassThrough => "pass_through",
            Action::Trace => "trace",
            Action::Read => "read",
            Action::Reset => "reset",
        }
    }
}

/// Control header values taken off a request.
///
/// The key stays raw bytes; any byte sequence is a legal header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Control {
    pub key: Vec<u8>,
    pub action: String,
    pub id: String,
}

impl Control {
    /// Resolve the action, forcing pass-through unless `key` matches exactly.
    pub fn authorize(&self, key: &str) -> Action {
        if self.key != key.as_bytes() {
            return Action::PassThrough;
        }
        Action::parse(&self.action)
    }
}

/// Remove the control headers from `headers` and return their values.
///
/// Header names are case-insensitive; for repeated headers the first value
/// wins and the rest are discarded along with it.
pub fn scrub_headers(headers: &mut HeaderMap) -> Control {
    let key = first_value(headers, &X_TREQS_KEY)
        .map(|v| v.as_bytes().to_vec())
        .unwrap_or_default();
    let action = first_text(headers, &X_TREQS_ACTION);
    let id = first_text(headers, &X_TREQS_ID);

    for name in [&X_TREQS_KEY, &X_TREQS_ACTION, &X_TREQS_ID] {
        headers.remove(name);
    }

    Control { key, action, id }
}

fn first_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a HeaderValue> {
    headers.get_all(name).iter().next()
}

fn first_text(headers: &HeaderMap, name: &HeaderName) -> String {
    first_value(headers, name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
