//! Response body that keeps the shared lock until it has been produced.
//!
//! A handler returning a [`Response`](axum::response::Response) is not done
//! yet: a streamed body keeps running while hyper polls it. Pass-through
//! responses carry the shared guard in their body so a trace cannot start
//! until the last frame is out or the body is dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::OwnedRwLockReadGuard;

use super::session::SessionRegistry;

pub(crate) struct GuardedBody {
    inner: Body,
    guard: Option<OwnedRwLockReadGuard<SessionRegistry>>,
}

impl GuardedBody {
    pub(crate) fn new(inner: Body, guard: OwnedRwLockReadGuard<SessionRegistry>) -> Self {
        let guard = (!inner.is_end_stream()).then_some(guard);
        Self { inner, guard }
    }
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        let finished = match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => true,
            Poll::Ready(Some(Ok(_))) => this.inner.is_end_stream(),
            Poll::Pending => false,
        };
        if finished {
            this.guard = None;
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
