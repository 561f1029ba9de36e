use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::domain::{
    entity::{JobId, JobRef},
    error::{Result, StoreError},
    repository::JobRegistry,
};

/// In-memory `JobRegistry` backed by a B-tree keyed by job id.
#[derive(Debug, Default)]
pub struct BTreeJobRegistry {
    jobs: BTreeMap<JobId, JobRef>,
}

impl BTreeJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

impl JobRegistry for BTreeJobRegistry {
    fn insert(&mut self, job: JobRef) -> Result<()> {
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(job.id)),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    fn update(&mut self, job: JobRef) -> Result<()> {
        match self.jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job;
                Ok(())
            }
            None => Err(StoreError::NotFound(job.id)),
        }
    }

    fn get(&self, id: JobId) -> Result<JobRef> {
        self.jobs.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn delete(&mut self, id: JobId) -> Result<JobRef> {
        self.jobs.remove(&id).ok_or(StoreError::NotFound(id))
    }

    fn max_id(&self) -> Result<JobId> {
        self.jobs
            .last_key_value()
            .map(|(id, _)| *id)
            .ok_or(StoreError::EmptyRegistry)
    }
}
