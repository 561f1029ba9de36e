use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{
    entity::{Job, JobId, JobRef},
    error::{Result, StoreError},
    ids::IdAllocator,
    lock::LockService,
    repository::{JobPriorityQueue, JobRegistry},
    service::{JobService, PutRequest},
    signal::WaitSignal,
};

/// Wires the protocol operations onto the lock service and owns the
/// server-wide state they need: id allocation and the draining flag.
#[derive(Debug)]
pub struct Broker<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    storage: Arc<LockService<R, Q>>,
    ids: IdAllocator,
    draining: AtomicBool,
}

impl<R, Q> Broker<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    pub fn new(storage: Arc<LockService<R, Q>>, ids: IdAllocator) -> Self {
        Self {
            storage,
            ids,
            draining: AtomicBool::new(false),
        }
    }

    /// Refuses new jobs from now on. Existing jobs stay reservable.
    pub fn drain(&self) {
        if !self.draining.swap(true, Ordering::SeqCst) {
            info!("Draining, new jobs will be refused");
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<R, Q> JobService for Broker<R, Q>
where
    R: JobRegistry + 'static,
    Q: JobPriorityQueue + 'static,
{
    async fn put(&self, req: PutRequest) -> Result<JobId> {
        if self.is_draining() {
            return Err(StoreError::Draining);
        }

        let id = self.ids.next_id();
        let mut job = Job::new(id, req.priority, req.time_to_run, req.body);

        if !req.delay.is_zero() {
            let delay = chrono::Duration::from_std(req.delay)
                .map_err(|err| StoreError::Internal(format!("delay out of range: {err}")))?;
            job = job.runnable_at(Utc::now() + delay);
        }

        debug!(id, priority = job.priority, delayed = job.runnable_at.is_some(), "Put");

        match self.storage.add(job.into_ref()).await {
            Ok(()) => Ok(id),
            Err(StoreError::AlreadyExists(id)) => Err(StoreError::Internal(format!(
                "job id {id} allocated twice"
            ))),
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        self.storage.delete(id).await?;
        debug!(id, "Deleted");
        Ok(())
    }

    async fn peek(&self, id: JobId) -> Result<JobRef> {
        self.storage.get(id).await
    }

    async fn reserve(&self, signal: WaitSignal) -> Result<JobRef> {
        let job = self.storage.poll(&signal).await?;
        debug!(id = job.id, "Reserved");
        Ok(job)
    }

    async fn release(&self, id: JobId) -> Result<()> {
        self.storage.release(id).await?;
        debug!(id, "Released");
        Ok(())
    }
}
