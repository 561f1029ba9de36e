use crate::domain::{
    entity::TubeName,
    error::{Result, StoreError},
    order,
    repository::{JobPriorityQueue, TubePriorityQueue},
};

use super::heap::{HeapEntry, IndexedHeap};

#[derive(Debug)]
struct Tube<Q> {
    name: TubeName,
    queue: Q,
}

impl<Q: JobPriorityQueue> HeapEntry for Tube<Q> {
    type Key = TubeName;

    fn key(&self) -> &TubeName {
        &self.name
    }

    fn precedes(&self, other: &Self) -> bool {
        let left = self.queue.peek().ok();
        let right = other.queue.peek().ok();
        order::head_less(left.as_deref(), right.as_deref())
    }
}

/// In-memory `TubePriorityQueue`. Owns its tubes' job queues.
#[derive(Debug)]
pub struct TubeHeap<Q: JobPriorityQueue> {
    heap: IndexedHeap<Tube<Q>>,
}

impl<Q: JobPriorityQueue> Default for TubeHeap<Q> {
    fn default() -> Self {
        Self {
            heap: IndexedHeap::default(),
        }
    }
}

impl<Q: JobPriorityQueue> TubeHeap<Q> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Q: JobPriorityQueue> TubePriorityQueue<Q> for TubeHeap<Q> {
    fn push(&mut self, name: &str, queue: Q) -> Result<()> {
        self.heap
            .push(Tube {
                name: name.to_owned(),
                queue,
            })
            .map_err(|tube| StoreError::TubeAlreadyExists(tube.name))
    }

    fn peek(&self) -> Result<(&str, &Q)> {
        self.heap
            .peek()
            .map(|tube| (tube.name.as_str(), &tube.queue))
            .ok_or(StoreError::EmptyQueue)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Q> {
        self.heap
            .get_mut(&name.to_owned())
            .map(|tube| &mut tube.queue)
            .ok_or_else(|| StoreError::TubeNotFound(name.to_owned()))
    }

    fn fix(&mut self, name: &str) -> Result<()> {
        if self.heap.fix(&name.to_owned()) {
            Ok(())
        } else {
            Err(StoreError::TubeNotFound(name.to_owned()))
        }
    }

    fn remove(&mut self, name: &str) -> Result<Q> {
        self.heap
            .remove(&name.to_owned())
            .map(|tube| tube.queue)
            .ok_or_else(|| StoreError::TubeNotFound(name.to_owned()))
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
