use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Unique job identifier. Allocated in strictly increasing order.
pub type JobId = u64;

/// Smaller values are served first.
pub type Priority = u64;

/// Name of a tube.
pub type TubeName = String;

/// Shared handle to a job record. The registry owns the canonical handle and
/// the queues seat clones of the same `Arc`, never independent copies.
pub type JobRef = Arc<Job>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    // ID
    pub id: JobId,

    // Scheduling
    pub runnable_at: Option<DateTime<Utc>>,
    pub time_to_run: Duration,
    pub priority: Priority,

    // Payload
    pub body: Bytes,
}

impl Job {
    pub fn new(id: JobId, priority: Priority, time_to_run: Duration, body: Bytes) -> Self {
        Self {
            id,
            runnable_at: None,
            time_to_run,
            priority,
            body,
        }
    }

    pub fn runnable_at(mut self, at: DateTime<Utc>) -> Self {
        self.runnable_at = Some(at);
        self
    }

    /// A job without `runnable_at` is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.runnable_at {
            Some(at) => at <= now,
            None => true,
        }
    }

    pub fn into_ref(self) -> JobRef {
        Arc::new(self)
    }
}
