// ── Reactive node streams ──
//
// Subscription types for consuming node-set changes from the store.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::NodeRecord;

/// A subscription to the node set.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a
/// `Stream`.
pub struct NodeStream {
    current: Arc<Vec<Arc<NodeRecord>>>,
    receiver: watch::Receiver<Arc<Vec<Arc<NodeRecord>>>>,
}

impl NodeStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<NodeRecord>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation time (or the last `changed` call).
    pub fn current(&self) -> &Arc<Vec<Arc<NodeRecord>>> {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<Vec<Arc<NodeRecord>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Arc<NodeRecord>>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> NodeWatchStream {
        NodeWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields a new snapshot each time the node set is mutated.
pub struct NodeWatchStream {
    inner: WatchStream<Arc<Vec<Arc<NodeRecord>>>>,
}

impl Stream for NodeWatchStream {
    type Item = Arc<Vec<Arc<NodeRecord>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream<T> is Unpin for Unpin T, which Arc always is.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
