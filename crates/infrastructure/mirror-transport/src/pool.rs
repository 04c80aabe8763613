use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounded-concurrency gate for in-flight transfers (spec §5): ADD uses a
/// pool of 10, UPDATE a pool of 5. Patches within a repo are still
/// serialized by the caller; this just caps simultaneous network I/O.
#[derive(Clone)]
pub struct TransferPool {
    semaphore: Arc<Semaphore>,
}

impl TransferPool {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn add_pool() -> Self {
        Self::new(10)
    }

    pub fn update_pool() -> Self {
        Self::new(5)
    }

    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("TransferPool semaphore is never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_match_named_constructors() {
        let add = TransferPool::add_pool();
        assert_eq!(add.semaphore.available_permits(), 10);
        let update = TransferPool::update_pool();
        assert_eq!(update.semaphore.available_permits(), 5);
    }
}
