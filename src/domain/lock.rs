use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    cond::CancellableCondition,
    entity::{JobId, JobRef},
    error::{Result, StoreError},
    repository::{JobPriorityQueue, JobRegistry},
    signal::WaitSignal,
    storage::StorageService,
};

/// Serializes access to a `StorageService` and lets consumers block until a
/// job becomes ready. This is the only place mutual exclusion is enforced.
#[derive(Debug)]
pub struct LockService<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    storage: Mutex<StorageService<R, Q>>,
    cond: CancellableCondition,
}

impl<R, Q> LockService<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    pub fn new(storage: StorageService<R, Q>) -> Self {
        Self {
            storage: Mutex::new(storage),
            cond: CancellableCondition::new(),
        }
    }

    pub async fn add(&self, job: JobRef) -> Result<()> {
        let mut storage = self.storage.lock().await;
        storage.add(job)?;
        self.cond.broadcast();
        Ok(())
    }

    /// Pops the next ready job, waiting for one to be added if none is ready.
    /// Fails with `Cancelled` or `TimedOut` once `signal` fires.
    pub async fn poll(&self, signal: &WaitSignal) -> Result<JobRef> {
        let mut storage = self.storage.lock().await;

        loop {
            match storage.pop_next_ready() {
                Ok(job) => return Ok(job),
                Err(StoreError::NoJobReady) => {}
                Err(err) => return Err(err),
            }

            storage = self.cond.wait(&self.storage, storage, signal).await?;
        }
    }

    pub async fn delete(&self, id: JobId) -> Result<JobRef> {
        self.storage.lock().await.delete(id)
    }

    pub async fn update(&self, job: JobRef) -> Result<()> {
        let mut storage = self.storage.lock().await;
        storage.update(job)?;
        // The ready head may have changed.
        self.cond.broadcast();
        Ok(())
    }

    /// Returns a reserved job that was never delivered to its queue and
    /// wakes waiting pollers.
    pub async fn release(&self, id: JobId) -> Result<()> {
        let mut storage = self.storage.lock().await;
        storage.requeue(id)?;
        self.cond.broadcast();
        Ok(())
    }

    pub async fn get(&self, id: JobId) -> Result<JobRef> {
        self.storage.lock().await.get(id)
    }

    pub async fn max_id(&self) -> Result<JobId> {
        self.storage.lock().await.max_id()
    }

    pub async fn peek_next_delayed(&self) -> Result<JobRef> {
        self.storage.lock().await.peek_next_delayed()
    }

    /// Moves due delayed jobs to the ready queue and wakes waiting pollers.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut storage = self.storage.lock().await;
        let moved = storage.promote_due(now)?;
        if moved > 0 {
            self.cond.broadcast();
        }
        Ok(moved)
    }
}
