//! Bounded dispatcher for fetch workers.
//!
//! A fixed number of slots gates how many workers run at once. The producer
//! waits in [`BoundedDispatcher::acquire`] when every slot is taken, and a
//! worker gives its slot back by dropping the [`DispatchSlot`] it was spawned
//! with, which happens on every exit path of the task.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher capacity must be at least 1")]
    ZeroCapacity,

    #[error("dispatcher is closed")]
    Closed,
}

/// One unit of concurrency capacity, released on drop.
#[derive(Debug)]
pub struct DispatchSlot {
    _permit: OwnedSemaphorePermit,
}

/// Counting admission gate plus a tracker for every spawned worker.
#[derive(Clone)]
pub struct BoundedDispatcher {
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    capacity: usize,
}

impl BoundedDispatcher {
    pub fn new(capacity: usize) -> Result<Self, DispatchError> {
        if capacity == 0 {
            return Err(DispatchError::ZeroCapacity);
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held by workers (or by the producer, between
    /// `acquire` and `spawn`).
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<DispatchSlot, DispatchError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;
        Ok(DispatchSlot { _permit: permit })
    }

    /// Runs `worker` on the runtime; the slot is released when the task ends.
    pub fn spawn<F>(&self, slot: DispatchSlot, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(async move {
            let _slot = slot;
            worker.await;
        });
    }

    /// Waits for every worker spawned so far to finish.
    ///
    /// The dispatcher stays usable afterwards.
    pub async fn drain(&self) {
        debug!(
            "Draining dispatcher: {} workers outstanding",
            self.tracker.len()
        );
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
