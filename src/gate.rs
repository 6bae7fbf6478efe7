//! Bounded gate capping concurrent storage calls made by batch operations.
//!
//! Waiters are served in arrival order (tokio's semaphore is fair). There is no timeout:
//! an `acquire` waits until a permit is released.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
#[error("storage gate is closed")]
pub struct GateClosed;

#[derive(Clone, Debug)]
pub struct StorageGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Held while a storage call runs; dropping it wakes the oldest waiter.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl StorageGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { permits: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self.permits.clone().acquire_owned().await.map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Runs `fut` while holding a permit.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GateClosed>
    where
        F: std::future::Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}
