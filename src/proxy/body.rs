//! Upstream response body relayed to the client
//!
//! Once headers are sent the status can no longer change, so a body that
//! breaks partway (upstream error, or a client that goes away before the
//! last frame) is only reported as an Error diagnostic.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::proxy::headers::messages;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Tracks whether the body reached its end; reports on drop when it did not
struct CompletionGuard {
    diagnostics: Diagnostics,
    finished: AtomicBool,
    reported: bool,
}

impl CompletionGuard {
    fn mark_finished(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn report(&mut self, cause: impl fmt::Display) {
        if self.reported {
            return;
        }
        self.reported = true;
        self.diagnostics.submit_detached(Diagnostic::Error(Some(format!(
            "{}: {cause}",
            messages::STREAMING
        ))));
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::Relaxed) {
            self.report("client went away before the body was fully sent");
        }
    }
}

pin_project! {
    /// Body wrapper that reports a truncated relay
    pub struct ObservedBody<B> {
        #[pin]
        inner: B,
        guard: CompletionGuard,
    }
}

impl<B> ObservedBody<B>
where
    B: Body,
{
    pub fn new(inner: B, diagnostics: Diagnostics) -> Self {
        let finished = inner.is_end_stream();
        Self {
            inner,
            guard: CompletionGuard {
                diagnostics,
                finished: AtomicBool::new(finished),
                reported: false,
            },
        }
    }
}

impl<B> Body for ObservedBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(Some(Err(e))) => {
                let err: BoxError = e.into();
                this.guard.report(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.guard.mark_finished();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        let end = self.inner.is_end_stream();
        if end {
            self.guard.mark_finished();
        }
        end
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
