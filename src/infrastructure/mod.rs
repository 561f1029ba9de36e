// In-memory storage backend.

pub mod btree;
mod heap;
pub mod job_heap;
pub mod tube_heap;
