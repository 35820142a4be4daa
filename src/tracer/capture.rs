//! Trace capture facility abstraction.
//!
//! # Responsibilities
//! - Define the start/stop contract for a capture facility
//! - Provide the in-memory sink a capture writes into
//! - Guarantee a started capture is always stopped
//!
//! # Design Decisions
//! - The facility is assumed process-global and singular; callers must
//!   serialize `start` calls (the coordinator's exclusive lock does this)
//! - `CaptureHandle` stops the capture when dropped if `stop` was never called

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;

/// Error returned when a capture cannot be started.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Another capture is already recording.
    #[error("tracing is already enabled")]
    AlreadyActive,
    /// The facility was never wired into the process (e.g. the capture layer
    /// is not part of the installed subscriber).
    #[error("capture facility is not installed")]
    NotInstalled,
}

/// A facility that records execution activity into a [`TraceBuffer`].
pub trait TraceCapture: Send + Sync + 'static {
    /// Begin recording into `sink`. Recording continues until the returned
    /// handle is stopped or dropped.
    fn start(&self, sink: TraceBuffer) -> Result<CaptureHandle, CaptureError>;
}

/// Handle to an active capture.
#[must_use = "dropping the handle stops the capture immediately"]
pub struct CaptureHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl CaptureHandle {
    /// Wrap the closure that disarms the facility.
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// Stop recording. After this returns nothing more is written to the sink.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            tracing::warn!("Capture handle dropped while active, stopping capture");
            stop();
        }
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("active", &self.stop.is_some())
            .finish()
    }
}

/// Shared, append-only byte sink for a single capture.
///
/// Clones share the same underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct TraceBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn append(&self, bytes: &[u8]) {
        // A panic while appending leaves at worst a truncated record.
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the buffer contents.
    pub fn into_bytes(self) -> Bytes {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Bytes::from(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(shared) => {
                let inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
                Bytes::copy_from_slice(&inner)
            }
        }
    }
}

impl std::io::Write for &TraceBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
