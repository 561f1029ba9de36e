use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Element of an [`IndexedHeap`].
pub(crate) trait HeapEntry {
    type Key: Eq + Hash + Clone + fmt::Debug;

    fn key(&self) -> &Self::Key;

    /// Whether `self` must sit closer to the root than `other`.
    fn precedes(&self, other: &Self) -> bool;
}

/// Binary min-heap with a key to position index, giving O(log n) removal and
/// re-seating of arbitrary entries. Every swap keeps the index in sync.
#[derive(Debug)]
pub(crate) struct IndexedHeap<T: HeapEntry> {
    items: Vec<T>,
    index: HashMap<T::Key, usize>,
}

impl<T: HeapEntry> Default for IndexedHeap<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: HeapEntry> IndexedHeap<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        let position = *self.index.get(key)?;
        self.items.get_mut(position)
    }

    /// Returns the item back if an entry with the same key is already present.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.contains(item.key()) {
            return Err(item);
        }

        let position = self.items.len();
        self.index.insert(item.key().clone(), position);
        self.items.push(item);
        self.sift_up(position);

        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        self.remove_at(0)
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let position = *self.index.get(key)?;
        self.remove_at(position)
    }

    /// Swaps in `item` for the entry with the same key and restores heap
    /// order in place. Returns the item back if the key is not present.
    pub fn replace(&mut self, item: T) -> Result<T, T> {
        let position = match self.index.get(item.key()) {
            Some(position) => *position,
            None => return Err(item),
        };

        let old = std::mem::replace(&mut self.items[position], item);
        self.fix_at(position);

        Ok(old)
    }

    /// Restores heap order after the entry for `key` changed.
    pub fn fix(&mut self, key: &T::Key) -> bool {
        match self.index.get(key) {
            Some(position) => {
                let position = *position;
                self.fix_at(position);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, position: usize) -> Option<T> {
        let last = self.items.len().checked_sub(1)?;
        if position != last {
            self.swap(position, last);
        }

        let item = self.items.pop()?;
        self.index.remove(item.key());

        if position < self.items.len() {
            self.fix_at(position);
        }

        Some(item)
    }

    fn fix_at(&mut self, position: usize) {
        if !self.sift_up(position) {
            self.sift_down(position);
        }
    }

    /// Returns whether the entry moved.
    fn sift_up(&mut self, mut position: usize) -> bool {
        let start = position;
        while position > 0 {
            let parent = (position - 1) / 2;
            if !self.items[position].precedes(&self.items[parent]) {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
        position != start
    }

    fn sift_down(&mut self, mut position: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * position + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let mut child = left;
            if right < len && self.items[right].precedes(&self.items[left]) {
                child = right;
            }

            if !self.items[child].precedes(&self.items[position]) {
                break;
            }
            self.swap(position, child);
            position = child;
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.items.swap(i, j);
        for position in [i, j] {
            if let Some(slot) = self.index.get_mut(self.items[position].key()) {
                *slot = position;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Entry {
        key: u32,
        rank: i64,
    }

    impl HeapEntry for Entry {
        type Key = u32;

        fn key(&self) -> &u32 {
            &self.key
        }

        fn precedes(&self, other: &Self) -> bool {
            (self.rank, self.key) < (other.rank, other.key)
        }
    }

    fn heap_of(ranks: &[(u32, i64)]) -> IndexedHeap<Entry> {
        let mut heap = IndexedHeap::default();
        for (key, rank) in ranks {
            heap.push(Entry {
                key: *key,
                rank: *rank,
            })
            .unwrap();
        }
        heap
    }

    fn drain_keys(heap: &mut IndexedHeap<Entry>) -> Vec<u32> {
        std::iter::from_fn(|| heap.pop()).map(|e| e.key).collect()
    }

    fn assert_index_consistent(heap: &IndexedHeap<Entry>) {
        assert_eq!(heap.index.len(), heap.items.len());
        for (position, item) in heap.items.iter().enumerate() {
            assert_eq!(heap.index[&item.key], position);
        }
    }

    #[test]
    fn test_pop_in_rank_order() {
        let mut heap = heap_of(&[(1, 50), (2, 10), (3, 40), (4, 20), (5, 30)]);
        assert_index_consistent(&heap);
        assert_eq!(drain_keys(&mut heap), vec![2, 4, 5, 3, 1]);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut heap = heap_of(&[(1, 1)]);
        let rejected = heap.push(Entry { key: 1, rank: 0 }).unwrap_err();
        assert_eq!(rejected.rank, 0);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_remove_from_middle() {
        let mut heap = heap_of(&[(1, 5), (2, 1), (3, 4), (4, 2), (5, 3), (6, 6)]);
        assert_eq!(heap.remove(&5).map(|e| e.key), Some(5));
        assert!(heap.remove(&5).is_none());
        assert_index_consistent(&heap);
        assert_eq!(drain_keys(&mut heap), vec![2, 4, 3, 1, 6]);
    }

    #[test]
    fn test_replace_moves_entry_both_ways() {
        let mut heap = heap_of(&[(1, 10), (2, 20), (3, 30), (4, 40)]);

        heap.replace(Entry { key: 4, rank: 0 }).unwrap();
        assert_eq!(heap.peek().map(|e| e.key), Some(4));
        assert_index_consistent(&heap);

        heap.replace(Entry { key: 4, rank: 100 }).unwrap();
        assert_index_consistent(&heap);
        assert_eq!(drain_keys(&mut heap), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fix_after_mutation() {
        let mut heap = heap_of(&[(1, 10), (2, 20), (3, 30)]);
        heap.get_mut(&3).unwrap().rank = 5;
        assert!(heap.fix(&3));
        assert!(!heap.fix(&99));
        assert_eq!(drain_keys(&mut heap), vec![3, 1, 2]);
    }

    #[test]
    fn test_replace_missing_key() {
        let mut heap = heap_of(&[(1, 10)]);
        assert!(heap.replace(Entry { key: 2, rank: 0 }).is_err());
    }
}
