//! Progress streams for one-shot backend operations.
//!
//! [`progress_stream`] wraps an async backend call into a [`ProgressStream`]
//! that reports `Loading`, then exactly one terminal event. The stream is
//! lazy: the backend call starts on the first poll after `Loading` has been
//! delivered, and closing or dropping the stream drops the in-flight call.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::stream;
use futures::{FutureExt, Stream, StreamExt};
use shopping_admin_core::ProgressEvent;

/// Message reported when a stream is closed before its terminal event.
pub const CANCELLED_MESSAGE: &str = "operation cancelled";

type BoxedEvents<T> = Pin<Box<dyn Stream<Item = ProgressEvent<T>> + Send>>;

/// A cancellable stream of [`ProgressEvent`]s for a single operation.
///
/// Owned by the caller that opened it. After a terminal event, or after
/// [`close`](Self::close), the stream yields `None` forever.
#[must_use = "progress streams do nothing unless polled"]
pub struct ProgressStream<T> {
    events: Option<BoxedEvents<T>>,
}

impl<T> ProgressStream<T> {
    /// Detach from the operation.
    ///
    /// Drops the in-flight backend call; no further events are produced.
    pub fn close(&mut self) {
        self.events = None;
    }

    /// Returns true once the stream has closed or delivered its terminal event.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.events.is_none()
    }

    /// Drive the stream to completion and return the terminal result.
    ///
    /// # Errors
    ///
    /// Returns the error message of the terminal event, or
    /// [`CANCELLED_MESSAGE`] if the stream ended without one.
    pub async fn outcome(mut self) -> Result<T, String> {
        while let Some(event) = self.next().await {
            if let Some(result) = event.into_result() {
                return result;
            }
        }
        Err(CANCELLED_MESSAGE.to_string())
    }
}

impl<T> std::fmt::Debug for ProgressStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Stream for ProgressStream<T> {
    type Item = ProgressEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(events) = this.events.as_mut() else {
            return Poll::Ready(None);
        };

        match events.as_mut().poll_next(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.events = None;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.events = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.events.is_some() {
            (0, Some(2))
        } else {
            (0, Some(0))
        }
    }
}

/// Wrap a one-shot backend operation into a [`ProgressStream`].
///
/// `operation` is invoked lazily. Errors and panics raised while starting or
/// running it become an `Error` event carrying the error's display text.
pub fn progress_stream<T, E, F, Fut>(operation: F) -> ProgressStream<T>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let events = stream! {
        yield ProgressEvent::Loading;

        let result = AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await;

        let terminal = match result {
            Ok(Ok(value)) => ProgressEvent::success(value),
            Ok(Err(err)) => ProgressEvent::error(err.to_string()),
            Err(panic) => ProgressEvent::error(panic_message(panic.as_ref())),
        };
        yield terminal;
    };

    ProgressStream {
        events: Some(Box::pin(events)),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operation panicked".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    /// Sets a flag when dropped, to observe cancellation of the backend call.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_success_sequence() {
        let events: Vec<_> = progress_stream(|| async { Ok::<_, String>(7_u32) })
            .collect()
            .await;

        assert_eq!(
            events,
            vec![ProgressEvent::Loading, ProgressEvent::success(7)]
        );
    }

    #[tokio::test]
    async fn test_error_message_is_verbatim() {
        let events: Vec<_> =
            progress_stream(|| async { Err::<(), _>("PERMISSION_DENIED: missing rights") })
                .collect()
                .await;

        assert_eq!(
            events,
            vec![
                ProgressEvent::Loading,
                ProgressEvent::error("PERMISSION_DENIED: missing rights")
            ]
        );
    }

    #[tokio::test]
    async fn test_operation_not_started_before_first_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut stream = progress_stream(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await, Some(ProgressEvent::Loading));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await, Some(ProgressEvent::success(())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_event() {
        let events: Vec<ProgressEvent<()>> = progress_stream(|| async {
            if true {
                panic!("backend exploded");
            }
            Ok::<_, String>(())
        })
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ProgressEvent::error("backend exploded"));
    }

    #[tokio::test]
    async fn test_nothing_after_terminal_event() {
        let mut stream = progress_stream(|| async { Ok::<_, String>("done") });

        assert_eq!(stream.next().await, Some(ProgressEvent::Loading));
        assert_eq!(stream.next().await, Some(ProgressEvent::success("done")));
        assert!(stream.is_closed());
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_close_before_completion_cancels_backend_call() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let (tx, rx) = oneshot::channel::<u32>();

        let mut stream = progress_stream(move || async move {
            let _flag = flag;
            rx.await.map_err(|e| e.to_string())
        });

        assert_eq!(stream.next().await, Some(ProgressEvent::Loading));

        // Start the backend call, then detach while it is still waiting.
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(pending.is_err());

        stream.close();
        assert!(dropped.load(Ordering::SeqCst));

        // The backend answering late is not observable.
        let _ = tx.send(1);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_outcome() {
        let value = progress_stream(|| async { Ok::<_, String>(42) })
            .outcome()
            .await;
        assert_eq!(value, Ok(42));

        let mut closed = progress_stream(|| async { Ok::<_, String>(42) });
        closed.close();
        assert_eq!(closed.outcome().await, Err(CANCELLED_MESSAGE.to_string()));
    }
}
