//! Context implementation for request-scoped data and cancellation
//!
//! A [`Context`] travels with every provider call. Long-running operations
//! (most notably the state poller in [`crate::retry`]) observe it at their
//! suspension points so a cancelled or expired request stops promptly.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{self, Instant};

/// Context carries request-scoped values like cancellation signals, timeouts, and metadata
/// Pass this as first parameter to async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                values: RwLock::new(HashMap::new()),
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Derives a child context that is cancelled when `timeout` elapses or
    /// when this context is cancelled, whichever happens first.
    ///
    /// Values stored on the parent are visible to the child. The child's
    /// deadline never extends past the parent's.
    pub async fn with_timeout(&self, timeout: Duration) -> Self {
        let mut deadline = Instant::now() + timeout;
        if let Some(parent_deadline) = self.inner.deadline {
            deadline = deadline.min(parent_deadline);
        }

        let (done_tx, done_rx) = watch::channel(self.is_cancelled());
        let values = self.inner.values.read().await.clone();

        let parent = self.clone();
        let child_tx = done_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline) => {}
                _ = parent.cancelled() => {}
                _ = child_tx.closed() => return,
            }
            let _ = child_tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                values: RwLock::new(values),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub async fn with_value<T: Send + Sync + 'static>(self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.write().await;
        values.insert(key.to_string(), Arc::new(value));
        drop(values);
        self
    }

    pub async fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        let values = self.inner.values.read().await;
        values.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Resolves once this context has been cancelled
    pub async fn cancelled(&self) {
        let mut done = self.inner.done.clone();
        // The sender lives in `inner`, so the channel cannot close while
        // `self` is borrowed.
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
