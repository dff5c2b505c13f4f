// ── Reactive streams ──
//
// Subscription types for consuming directory changes and domain
// events as async streams.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::model::{Device, DomainEvent};

/// A subscription to the device directory.
///
/// Holds the listing seen last; `changed()` waits for the next join,
/// interview or leave, `into_stream()` turns it into a `Stream`.
pub struct DeviceStream {
    current: Arc<Vec<Arc<Device>>>,
    receiver: watch::Receiver<Arc<Vec<Arc<Device>>>>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<Device>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Arc<Vec<Arc<Device>>> {
        &self.current
    }

    /// Latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<Vec<Arc<Device>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the coordinator is dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Arc<Device>>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> DeviceWatchStream {
        DeviceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a fresh directory snapshot per mutation.
pub struct DeviceWatchStream {
    inner: WatchStream<Arc<Vec<Arc<Device>>>>,
}

impl Stream for DeviceWatchStream {
    type Item = Arc<Vec<Arc<Device>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// `Stream` of domain events that skips over lag gaps.
///
/// A subscriber that falls more than the channel capacity behind loses
/// the oldest events; the gap is logged and the stream carries on.
pub struct EventStream {
    inner: BroadcastStream<Arc<DomainEvent>>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<DomainEvent>>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for EventStream {
    type Item = Arc<DomainEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(skipped, "event subscriber lagged; oldest events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
