use super::entity::{JobId, JobRef};
use super::error::Result;

// Storage contracts. Implementations perform no locking of their own, callers
// serialize access through `LockService`.

/// Authoritative id-indexed store of job records.
pub trait JobRegistry: Send {
    /// Fails with `AlreadyExists` if the id is already stored.
    fn insert(&mut self, job: JobRef) -> Result<()>;

    /// Replaces the stored record. Fails with `NotFound` if the id is absent.
    fn update(&mut self, job: JobRef) -> Result<()>;

    fn get(&self, id: JobId) -> Result<JobRef>;

    fn delete(&mut self, id: JobId) -> Result<JobRef>;

    /// Greatest stored id. Only used at startup to resume id allocation.
    /// Fails with `EmptyRegistry` if nothing is stored.
    fn max_id(&self) -> Result<JobId>;
}

/// A queue of jobs ordered by `order::compare`.
pub trait JobPriorityQueue: Send {
    /// Fails with `AlreadyExists` if a job with the same id is queued.
    fn push(&mut self, job: JobRef) -> Result<()>;

    /// Fails with `EmptyQueue` if nothing is queued.
    fn pop(&mut self) -> Result<JobRef>;

    /// Fails with `EmptyQueue` if nothing is queued.
    fn peek(&self) -> Result<JobRef>;

    fn remove(&mut self, id: JobId) -> Result<JobRef>;

    /// Re-seats a job whose fields changed and restores queue order.
    fn update(&mut self, job: JobRef) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A queue of named job queues ordered by each queue's head job.
pub trait TubePriorityQueue<Q: JobPriorityQueue> {
    /// Fails with `TubeAlreadyExists` if the name is taken.
    fn push(&mut self, name: &str, queue: Q) -> Result<()>;

    /// The tube to serve next. Fails with `EmptyQueue` if there are no tubes.
    fn peek(&self) -> Result<(&str, &Q)>;

    /// Mutable access to a tube's queue. Call `fix` after changing its head.
    fn get_mut(&mut self, name: &str) -> Result<&mut Q>;

    fn fix(&mut self, name: &str) -> Result<()>;

    fn remove(&mut self, name: &str) -> Result<Q>;

    fn len(&self) -> usize;
}
