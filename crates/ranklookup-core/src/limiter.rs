//! Global refresh limiter.
//!
//! A single permit pool shared by every cache entry of every ruleset. Each
//! running full rebuild holds one permit, so the number of concurrent scans
//! against the store never exceeds the pool capacity.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Process-wide bound on concurrently executing repopulations.
#[derive(Debug)]
pub struct RefreshLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl RefreshLimiter {
    /// Creates a limiter allowing `capacity` concurrent rebuilds.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Returns true if at least one permit is free right now.
    ///
    /// Callers use this as a non-queueing fast check before attempting a
    /// rebuild; it does not reserve anything.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.semaphore.available_permits() > 0
    }

    /// Waits for a permit. The permit is returned to the pool on drop.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("refresh limiter semaphore closed".to_string()))
    }

    /// Free permits.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held by running rebuilds.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Total pool size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
