//! Live query plumbing shared by the store backends.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;

const SNAPSHOT_BUFFER: usize = 16;

/// Handle to a live query.
///
/// Each item is a complete result set. Dropping the handle tears down the
/// listener task.
pub struct Subscription<T> {
    receiver: mpsc::Receiver<Result<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone + PartialEq + Send + 'static> Subscription<T> {
    /// Spawn a listener task feeding the returned subscription.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn<F, Fut>(listener: F) -> Self
    where
        F: FnOnce(SnapshotEmitter<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let emitter = SnapshotEmitter { sender, last: None };
        let task = tokio::spawn(listener(emitter));
        Self { receiver, task }
    }
}

impl<T> Subscription<T> {
    /// Wait for the next snapshot. `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.receiver.recv().await
    }

    /// Stop listening. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<T: Send + 'static> Subscription<T> {
    /// Convert every snapshot with `transform`. Errors pass through and end
    /// the mapped subscription; dropping it tears down this one too.
    pub fn map<U, F>(self, transform: F) -> Subscription<U>
    where
        U: Clone + PartialEq + Send + 'static,
        F: Fn(T) -> U + Send + 'static,
    {
        let mut source = self;
        Subscription::spawn(move |mut emitter| async move {
            while let Some(result) = source.next().await {
                let mapped = result.map(&transform);
                if !emitter.emit(mapped).await {
                    break;
                }
            }
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Sender side used by listener tasks; suppresses unchanged snapshots.
pub(crate) struct SnapshotEmitter<T> {
    sender: mpsc::Sender<Result<T>>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> SnapshotEmitter<T> {
    /// Push a fetch result. Returns `false` once the listener should stop:
    /// the subscriber is gone or the result was an error.
    pub(crate) async fn emit(&mut self, result: Result<T>) -> bool {
        match result {
            Ok(snapshot) => {
                if self.last.as_ref() == Some(&snapshot) {
                    return true;
                }
                if self.sender.send(Ok(snapshot.clone())).await.is_err() {
                    return false;
                }
                self.last = Some(snapshot);
                true
            }
            Err(error) => {
                tracing::warn!("Live query failed: {}", error);
                let _ = self.sender.send(Err(error)).await;
                false
            }
        }
    }
}
