use thiserror::Error;

use super::entity::{JobId, TubeName};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Tube already exists: {0}")]
    TubeAlreadyExists(TubeName),

    #[error("Tube not found: {0}")]
    TubeNotFound(TubeName),

    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Registry is empty")]
    EmptyRegistry,

    #[error("No job ready")]
    NoJobReady,

    #[error("No delayed job")]
    NoJobDelayed,

    #[error("Server is draining, no new jobs can be added")]
    Draining,

    #[error("Wait was cancelled")]
    Cancelled,

    #[error("Wait timed out")]
    TimedOut,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
