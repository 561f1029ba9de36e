use std::time::Duration;

use bytes::Bytes;

use super::{
    entity::{JobId, JobRef, Priority},
    error::Result,
    signal::WaitSignal,
};

#[derive(Debug, Clone)]
pub struct PutRequest {
    pub priority: Priority,
    pub delay: Duration,
    pub time_to_run: Duration,
    pub body: Bytes,
}

/// Operations the protocol layer performs on behalf of a client.
#[async_trait::async_trait]
pub trait JobService: Send + Sync + 'static {
    async fn put(&self, req: PutRequest) -> Result<JobId>;

    async fn delete(&self, id: JobId) -> Result<()>;

    async fn peek(&self, id: JobId) -> Result<JobRef>;

    /// Blocks until a job is ready or `signal` fires.
    async fn reserve(&self, signal: WaitSignal) -> Result<JobRef>;

    /// Puts back a reserved job whose response never reached the client.
    async fn release(&self, id: JobId) -> Result<()>;
}
