use chrono::{DateTime, Utc};

use super::{
    entity::{JobId, JobRef},
    error::{Result, StoreError},
    repository::{JobPriorityQueue, JobRegistry},
};

/// Composes the registry with a ready queue and a delay queue.
///
/// Every job in the registry is seated in at most one of the two queues. A
/// job that has been popped from the ready queue (reserved) stays in the
/// registry until deleted. None of the operations block and none of them
/// lock: callers must hold `LockService`'s lock.
#[derive(Debug)]
pub struct StorageService<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    jobs: R,
    ready: Q,
    delayed: Q,
}

impl<R, Q> StorageService<R, Q>
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    pub fn new(jobs: R, ready: Q, delayed: Q) -> Self {
        Self {
            jobs,
            ready,
            delayed,
        }
    }

    /// Inserts a new job. Jobs that are already due go to the ready queue,
    /// the rest to the delay queue.
    pub fn add(&mut self, job: JobRef) -> Result<()> {
        self.add_at(job, Utc::now())
    }

    pub(crate) fn add_at(&mut self, job: JobRef, now: DateTime<Utc>) -> Result<()> {
        self.jobs.insert(job.clone())?;

        // A queue collision here means the queues and the registry diverged.
        self.seat(job, now)
            .map_err(|err| StoreError::Internal(format!("queue out of sync: {err}")))
    }

    /// Puts a reserved job back in line, routed like `add`. Fails with
    /// `NotFound` if it was deleted meanwhile and with `AlreadyExists` if it
    /// is still queued.
    pub fn requeue(&mut self, id: JobId) -> Result<()> {
        self.requeue_at(id, Utc::now())
    }

    pub(crate) fn requeue_at(&mut self, id: JobId, now: DateTime<Utc>) -> Result<()> {
        let job = self.jobs.get(id)?;
        self.seat(job, now)
    }

    fn seat(&mut self, job: JobRef, now: DateTime<Utc>) -> Result<()> {
        if job.is_due(now) {
            self.ready.push(job)
        } else {
            self.delayed.push(job)
        }
    }

    /// Replaces a job's record and re-seats it in whichever queue holds it.
    pub fn update(&mut self, job: JobRef) -> Result<()> {
        self.jobs.update(job.clone())?;

        ignore_missing(self.ready.update(job.clone()))?;
        ignore_missing(self.delayed.update(job))?;

        Ok(())
    }

    pub fn delete(&mut self, id: JobId) -> Result<JobRef> {
        let job = self.jobs.delete(id)?;

        ignore_missing(self.ready.remove(id).map(|_| ()))?;
        ignore_missing(self.delayed.remove(id).map(|_| ()))?;

        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Result<JobRef> {
        self.jobs.get(id)
    }

    pub fn max_id(&self) -> Result<JobId> {
        self.jobs.max_id()
    }

    pub fn pop_next_ready(&mut self) -> Result<JobRef> {
        self.ready.pop().map_err(|err| match err {
            StoreError::EmptyQueue => StoreError::NoJobReady,
            other => other,
        })
    }

    pub fn peek_next_delayed(&self) -> Result<JobRef> {
        self.delayed.peek().map_err(|err| match err {
            StoreError::EmptyQueue => StoreError::NoJobDelayed,
            other => other,
        })
    }

    /// Moves every delayed job that is due at `now` to the ready queue.
    /// Returns how many jobs were moved.
    pub fn promote_due(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let mut moved = 0;

        loop {
            let next = match self.peek_next_delayed() {
                Ok(job) => job,
                Err(StoreError::NoJobDelayed) => break,
                Err(err) => return Err(err),
            };
            if !next.is_due(now) {
                break;
            }

            let job = self.delayed.remove(next.id)?;
            self.ready
                .push(job)
                .map_err(|err| StoreError::Internal(format!("queue out of sync: {err}")))?;
            moved += 1;
        }

        Ok(moved)
    }

    #[cfg(test)]
    fn ready_len(&self) -> usize {
        self.ready.len()
    }

    #[cfg(test)]
    fn delayed_len(&self) -> usize {
        self.delayed.len()
    }
}

fn ignore_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(StoreError::NotFound(_)) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Job;
    use crate::domain::order;
    use crate::infrastructure::{btree::BTreeJobRegistry, job_heap::JobHeap};
    use bytes::Bytes;
    use chrono::Duration as ChronoDuration;
    use rand::seq::SliceRandom;
    use std::sync::Arc;
    use std::time::Duration;

    type Storage = StorageService<BTreeJobRegistry, JobHeap>;

    fn storage() -> Storage {
        StorageService::new(BTreeJobRegistry::new(), JobHeap::new(), JobHeap::new())
    }

    fn job(id: u64, priority: u64) -> Job {
        Job::new(id, priority, Duration::from_secs(60), Bytes::new())
    }

    fn drain_ready(storage: &mut Storage) -> Vec<u64> {
        std::iter::from_fn(|| storage.pop_next_ready().ok())
            .map(|j| j.id)
            .collect()
    }

    #[test]
    fn test_empty_storage() {
        let mut storage = storage();
        assert_eq!(storage.pop_next_ready(), Err(StoreError::NoJobReady));
        assert_eq!(storage.peek_next_delayed(), Err(StoreError::NoJobDelayed));
        assert_eq!(storage.delete(1), Err(StoreError::NotFound(1)));
        assert_eq!(storage.update(job(1, 0).into_ref()), Err(StoreError::NotFound(1)));
        assert_eq!(storage.max_id(), Err(StoreError::EmptyRegistry));
    }

    #[test]
    fn test_add_routes_by_runnable_at() {
        let mut storage = storage();
        let now = Utc::now();

        storage.add(job(1, 0).into_ref()).unwrap();
        storage
            .add(job(2, 0).runnable_at(now - ChronoDuration::seconds(1)).into_ref())
            .unwrap();
        storage
            .add(job(3, 0).runnable_at(now + ChronoDuration::hours(1)).into_ref())
            .unwrap();

        assert_eq!(storage.ready_len(), 2);
        assert_eq!(storage.delayed_len(), 1);
        assert_eq!(storage.peek_next_delayed().unwrap().id, 3);
    }

    #[test]
    fn test_add_twice_fails() {
        let mut storage = storage();
        storage.add(job(1, 0).into_ref()).unwrap();
        assert_eq!(
            storage.add(job(1, 0).into_ref()),
            Err(StoreError::AlreadyExists(1))
        );
        assert_eq!(storage.ready_len(), 1);
    }

    #[test]
    fn test_registry_and_queue_share_the_record() {
        let mut storage = storage();
        let record = job(1, 0).into_ref();
        storage.add(record.clone()).unwrap();

        assert!(Arc::ptr_eq(&storage.get(1).unwrap(), &record));
        assert!(Arc::ptr_eq(&storage.pop_next_ready().unwrap(), &record));
    }

    #[test]
    fn test_pop_order_is_independent_of_insert_order() {
        let now = Utc::now();
        let jobs = vec![
            job(1, 5).runnable_at(now - ChronoDuration::seconds(30)),
            job(2, 0).runnable_at(now - ChronoDuration::seconds(10)),
            job(3, 0),
            job(4, 0),
            job(5, 1),
            job(6, 9).runnable_at(now - ChronoDuration::seconds(20)),
            job(7, 1),
        ];

        let mut expected = jobs.clone();
        expected.sort_by(order::compare);
        let expected: Vec<u64> = expected.iter().map(|j| j.id).collect();
        assert_eq!(expected, vec![1, 6, 2, 3, 4, 5, 7]);

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let mut shuffled = jobs.clone();
            shuffled.shuffle(&mut rng);

            let mut storage = storage();
            for job in shuffled {
                storage.add_at(job.into_ref(), now).unwrap();
            }
            assert_eq!(drain_ready(&mut storage), expected);
        }
    }

    #[test]
    fn test_delete_removes_from_whichever_queue() {
        let mut storage = storage();
        storage.add(job(1, 0).into_ref()).unwrap();
        storage
            .add(job(2, 0).runnable_at(Utc::now() + ChronoDuration::hours(1)).into_ref())
            .unwrap();

        assert_eq!(storage.delete(1).unwrap().id, 1);
        assert_eq!(storage.delete(2).unwrap().id, 2);
        assert_eq!(storage.get(1), Err(StoreError::NotFound(1)));
        assert_eq!(storage.ready_len(), 0);
        assert_eq!(storage.delayed_len(), 0);
    }

    #[test]
    fn test_delete_reserved_job() {
        let mut storage = storage();
        storage.add(job(1, 0).into_ref()).unwrap();
        storage.pop_next_ready().unwrap();

        assert_eq!(storage.delete(1).unwrap().id, 1);
        assert_eq!(storage.delete(1), Err(StoreError::NotFound(1)));
    }

    #[test]
    fn test_requeue_reserved_job() {
        let mut storage = storage();
        let now = Utc::now();
        storage.add_at(job(1, 0).into_ref(), now).unwrap();
        storage
            .add_at(job(2, 0).runnable_at(now + ChronoDuration::hours(1)).into_ref(), now)
            .unwrap();

        assert_eq!(storage.pop_next_ready().unwrap().id, 1);
        assert_eq!(storage.requeue_at(1, now), Ok(()));
        assert_eq!(storage.requeue_at(1, now), Err(StoreError::AlreadyExists(1)));
        assert_eq!(storage.requeue_at(2, now), Err(StoreError::AlreadyExists(2)));
        assert_eq!(storage.requeue_at(3, now), Err(StoreError::NotFound(3)));

        assert_eq!(drain_ready(&mut storage), vec![1]);
        storage.delete(1).unwrap();
        assert_eq!(storage.requeue_at(1, now), Err(StoreError::NotFound(1)));
    }

    #[test]
    fn test_update_reorders_ready_queue() {
        let mut storage = storage();
        storage.add(job(1, 1).into_ref()).unwrap();
        storage.add(job(2, 2).into_ref()).unwrap();

        storage.update(job(2, 0).into_ref()).unwrap();
        assert_eq!(storage.get(2).unwrap().priority, 0);
        assert_eq!(drain_ready(&mut storage), vec![2, 1]);
    }

    #[test]
    fn test_update_then_promote_makes_delayed_job_ready() {
        let mut storage = storage();
        let now = Utc::now();

        storage.add_at(job(1, 1).into_ref(), now).unwrap();
        storage
            .add_at(job(2, 1).runnable_at(now + ChronoDuration::hours(1)).into_ref(), now)
            .unwrap();

        assert_eq!(storage.pop_next_ready().unwrap().id, 1);
        assert_eq!(storage.pop_next_ready(), Err(StoreError::NoJobReady));

        storage
            .update(job(2, 1).runnable_at(now).into_ref())
            .unwrap();
        assert_eq!(storage.promote_due(now), Ok(1));

        assert_eq!(storage.pop_next_ready().unwrap().id, 2);
        assert_eq!(storage.peek_next_delayed(), Err(StoreError::NoJobDelayed));
    }

    #[test]
    fn test_promote_due_stops_at_future_jobs() {
        let mut storage = storage();
        let now = Utc::now();

        for (id, offset) in [(1, -20), (2, -10), (3, 10), (4, 20)] {
            storage
                .add_at(
                    job(id, 0)
                        .runnable_at(now + ChronoDuration::seconds(offset))
                        .into_ref(),
                    now - ChronoDuration::minutes(1),
                )
                .unwrap();
        }
        assert_eq!(storage.delayed_len(), 4);

        assert_eq!(storage.promote_due(now), Ok(2));
        assert_eq!(storage.peek_next_delayed().unwrap().id, 3);
        assert_eq!(drain_ready(&mut storage), vec![1, 2]);

        assert_eq!(storage.promote_due(now), Ok(0));
    }
}
