use crate::domain::{
    entity::{JobId, JobRef},
    error::{Result, StoreError},
    order,
    repository::JobPriorityQueue,
};

use super::heap::{HeapEntry, IndexedHeap};

/// Queue position of one job. Position bookkeeping lives in the heap's index,
/// the job record itself carries none.
#[derive(Debug)]
struct Seat {
    id: JobId,
    job: JobRef,
}

impl HeapEntry for Seat {
    type Key = JobId;

    fn key(&self) -> &JobId {
        &self.id
    }

    fn precedes(&self, other: &Self) -> bool {
        order::less(&self.job, &other.job)
    }
}

impl From<JobRef> for Seat {
    fn from(job: JobRef) -> Self {
        Self { id: job.id, job }
    }
}

/// In-memory `JobPriorityQueue` backed by an indexed binary heap.
#[derive(Debug, Default)]
pub struct JobHeap {
    heap: IndexedHeap<Seat>,
}

impl JobHeap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobPriorityQueue for JobHeap {
    fn push(&mut self, job: JobRef) -> Result<()> {
        self.heap
            .push(Seat::from(job))
            .map_err(|seat| StoreError::AlreadyExists(seat.id))
    }

    fn pop(&mut self) -> Result<JobRef> {
        self.heap
            .pop()
            .map(|seat| seat.job)
            .ok_or(StoreError::EmptyQueue)
    }

    fn peek(&self) -> Result<JobRef> {
        self.heap
            .peek()
            .map(|seat| seat.job.clone())
            .ok_or(StoreError::EmptyQueue)
    }

    fn remove(&mut self, id: JobId) -> Result<JobRef> {
        self.heap
            .remove(&id)
            .map(|seat| seat.job)
            .ok_or(StoreError::NotFound(id))
    }

    fn update(&mut self, job: JobRef) -> Result<()> {
        self.heap
            .replace(Seat::from(job))
            .map(|_| ())
            .map_err(|seat| StoreError::NotFound(seat.id))
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
