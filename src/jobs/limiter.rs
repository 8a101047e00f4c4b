//! Per-process cap on concurrent jobs.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::OverloadPolicy;
use crate::error::ScrapeError;

/// Hands out job slots. A slot is held for the lifetime of the returned
/// permit.
#[derive(Debug, Clone)]
pub struct JobLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
    policy: OverloadPolicy,
}

impl JobLimiter {
    pub fn new(capacity: usize, policy: OverloadPolicy) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            policy,
        }
    }

    /// Take a slot, queueing or failing with `Overloaded` per policy.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ScrapeError> {
        match self.policy {
            OverloadPolicy::Queue => self
                .slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ScrapeError::Overloaded),
            OverloadPolicy::Reject => self
                .slots
                .clone()
                .try_acquire_owned()
                .map_err(|_| ScrapeError::Overloaded),
        }
    }

    /// Jobs currently holding a slot.
    pub fn active(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverloadPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reject_policy() {
        let limiter = JobLimiter::new(1, OverloadPolicy::Reject);
        let held = limiter.acquire().await.unwrap();
        assert_eq!(limiter.active(), 1);
        assert!(matches!(limiter.acquire().await, Err(ScrapeError::Overloaded)));
        drop(held);
        assert_eq!(limiter.active(), 0);
        assert!(limiter.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_queue_policy_waits() {
        let limiter = JobLimiter::new(1, OverloadPolicy::Queue);
        let held = limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap().is_ok());
    }
}
