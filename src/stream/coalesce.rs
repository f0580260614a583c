//! Rate limiting for draft updates
//!
//! A drag gesture can publish a new draft view on every pointer move. Renderers
//! rarely want more than one frame per display refresh, so [`Coalesce`] passes the
//! first update of a burst straight through, then emits at most the latest update
//! once per period until the burst goes quiet.

use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// Extension trait adding [`Coalesce`] to any stream.
pub trait CoalesceExt: Stream {
    /// Coalesce bursts of items to at most one per `period`.
    ///
    /// The first item after a quiet period is emitted immediately. Items arriving
    /// while a period is open replace each other; the latest is emitted when the
    /// period ends. Nothing is lost at the end of the stream: a pending item is
    /// flushed before the stream terminates.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime with the time driver enabled.
    fn coalesce(self, period: Duration) -> Coalesce<Self>
    where
        Self: Sized,
    {
        Coalesce::new(self, period)
    }
}

impl<T: Stream> CoalesceExt for T {}

pin_project! {
    /// Stream returned by [`CoalesceExt::coalesce`].
    pub struct Coalesce<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        window: Sleep,
        period: Duration,
        pending: Option<S::Item>,
        window_open: bool,
        source_done: bool,
    }
}

impl<S: Stream> Coalesce<S> {
    /// Wrap `stream`, emitting at most once per `period`.
    pub fn new(stream: S, period: Duration) -> Self {
        Self {
            stream,
            window: sleep(period),
            period,
            pending: None,
            window_open: false,
            source_done: false,
        }
    }
}

impl<S: Stream> Stream for Coalesce<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.source_done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) if !*this.window_open => {
                    this.window.as_mut().reset(Instant::now() + *this.period);
                    *this.window_open = true;
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.source_done = true,
                Poll::Pending => break,
            }
        }

        if *this.source_done {
            return Poll::Ready(this.pending.take());
        }

        if !*this.window_open {
            return Poll::Pending;
        }

        match this.window.as_mut().poll(cx) {
            Poll::Ready(()) => match this.pending.take() {
                Some(item) => {
                    this.window.as_mut().reset(Instant::now() + *this.period);
                    Poll::Ready(Some(item))
                }
                None => {
                    *this.window_open = false;
                    Poll::Pending
                }
            },
            Poll::Pending => Poll::Pending,
        }
    }
}
