// Storage and concurrency core:
// - Job ordering, and the registry / priority queue contracts backends implement.
// - StorageService composes a registry with a ready and a delay queue.
// - LockService serializes StorageService and long-polls for ready jobs.

pub mod cond;
pub mod delay;
pub mod entity;
pub mod error;
pub mod ids;
pub mod lock;
pub mod order;
pub mod repository;
pub mod service;
pub mod signal;
pub mod storage;
