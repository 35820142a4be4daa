//! Process-wide capture facility built on `tracing`.
//!
//! # Responsibilities
//! - Observe every span and event in the process via a subscriber layer
//! - While armed, serialize them as newline-delimited JSON into the sink
//! - Refuse to arm twice: there is one recorder for the whole process
//!
//! # Record format
//! ```text
//! {"ts_us":0,"kind":"capture_start","thread":"tokio-runtime-worker"}
//! {"ts_us":12,"kind":"span_new","thread":"…","span":3,"name":"compute","target":"treqs::http::demo","level":"DEBUG","fields":{"rounds":50000}}
//! {"ts_us":40,"kind":"event","thread":"…","span":3,"name":"event src/http/demo.rs:57","target":"…","level":"TRACE","fields":{"message":"chunk done"}}
//! {"ts_us":98,"kind":"capture_stop","thread":"…"}
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{span, Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::tracer::capture::{CaptureError, CaptureHandle, TraceBuffer, TraceCapture};

/// Handle to the process-wide recorder.
///
/// Install [`SpanCapture::layer`] into the global subscriber once, then hand
/// the `SpanCapture` to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct SpanCapture {
    state: Arc<CaptureState>,
}

#[derive(Debug, Default)]
struct CaptureState {
    installed: AtomicBool,
    armed: AtomicBool,
    sink: Mutex<Option<ArmedSink>>,
}

#[derive(Debug)]
struct ArmedSink {
    buffer: TraceBuffer,
    started: Instant,
}

impl SpanCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscriber layer feeding this recorder. Captures can start once
    /// it has been added to a subscriber.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            state: Arc::clone(&self.state),
        }
    }

    /// Whether a capture is currently recording.
    pub fn is_active(&self) -> bool {
        self.state.armed.load(Ordering::Acquire)
    }
}

impl TraceCapture for SpanCapture {
    fn start(&self, sink: TraceBuffer) -> Result<CaptureHandle, CaptureError> {
        if !self.state.installed.load(Ordering::Acquire) {
            return Err(CaptureError::NotInstalled);
        }

        {
            let mut slot = self.state.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(CaptureError::AlreadyActive);
            }
            *slot = Some(ArmedSink {
                buffer: sink,
                started: Instant::now(),
            });
            self.state.armed.store(true, Ordering::Release);
        }
        self.state.record(TraceRecord::new("capture_start"));

        let state = Arc::clone(&self.state);
        Ok(CaptureHandle::new(move || state.disarm()))
    }
}

impl CaptureState {
    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    fn record(&self, mut record: TraceRecord) {
        let slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sink) = slot.as_ref() else {
            return;
        };

        record.ts_us = sink.started.elapsed().as_micros() as u64;
        if serde_json::to_writer(&sink.buffer, &record).is_ok() {
            sink.buffer.append(b"\n");
        }
    }

    fn disarm(&self) {
        self.record(TraceRecord::new("capture_stop"));
        let mut slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        self.armed.store(false, Ordering::Release);
        slot.take();
    }
}

/// One line of a capture.
#[derive(Debug, Serialize)]
struct TraceRecord {
    ts_us: u64,
    kind: &'static str,
    thread: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    span: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

impl TraceRecord {
    fn new(kind: &'static str) -> Self {
        let thread = std::thread::current();
        let thread = match thread.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", thread.id()),
        };

        Self {
            ts_us: 0,
            kind,
            thread,
            span: None,
            parent: None,
            name: None,
            target: None,
            level: None,
            fields: Map::new(),
        }
    }

    fn with_metadata(mut self, metadata: &'static tracing::Metadata<'static>) -> Self {
        self.name = Some(metadata.name());
        self.target = Some(metadata.target());
        self.level = Some(metadata.level().to_string());
        self
    }

    fn with_span(mut self, id: &span::Id) -> Self {
        self.span = Some(id.into_u64());
        self
    }
}

/// Collects span and event fields as JSON values.
#[derive(Default)]
struct JsonVisitor(Map<String, Value>);

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}

/// Subscriber layer that forwards activity to an armed [`SpanCapture`].
pub struct CaptureLayer {
    state: Arc<CaptureState>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
    S: for<'lookup> LookupSpan<'lookup>,
{
    fn on_layer(&mut self, _subscriber: &mut S) {
        self.state.installed.store(true, Ordering::Release);
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if !self.state.is_armed() {
            return;
        }

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);

        let mut record = TraceRecord::new("span_new")
            .with_metadata(attrs.metadata())
            .with_span(id);
        record.parent = ctx
            .span(id)
            .and_then(|span| span.parent())
            .map(|parent| parent.id().into_u64());
        record.fields = visitor.0;
        self.state.record(record);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        if !self.state.is_armed() {
            return;
        }

        let mut visitor = JsonVisitor::default();
        values.record(&mut visitor);

        let mut record = TraceRecord::new("span_record").with_span(id);
        if let Some(span) = ctx.span(id) {
            record = record.with_metadata(span.metadata());
        }
        record.fields = visitor.0;
        self.state.record(record);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if !self.state.is_armed() {
            return;
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut record = TraceRecord::new("event").with_metadata(event.metadata());
        record.span = ctx.event_span(event).map(|span| span.id().into_u64());
        record.fields = visitor.0;
        self.state.record(record);
    }

    fn on_enter(&self, id: &span::Id, _ctx: Context<'_, S>) {
        if self.state.is_armed() {
            self.state.record(TraceRecord::new("span_enter").with_span(id));
        }
    }

    fn on_exit(&self, id: &span::Id, _ctx: Context<'_, S>) {
        if self.state.is_armed() {
            self.state.record(TraceRecord::new("span_exit").with_span(id));
        }
    }

    fn on_close(&self, id: span::Id, _ctx: Context<'_, S>) {
        if self.state.is_armed() {
            self.state.record(TraceRecord::new("span_close").with_span(&id));
        }
    }
}
