use super::{Entry, EventHandle, EventQueue, HandleIndex, Sequencer};
use crate::{
    config::{QueueOptions, RequeueAbsent},
    time::TimeLike,
};
use fxhash::FxHashMap;

///
/// An indexed binary min-heap.
///
/// Every entry's heap position is tracked by its sequence number, so
/// cancelling or rescheduling an arbitrary entry costs O(log n) like
/// insertion and extraction. This is the reference implementation the
/// other queues are validated against.
///
#[derive(Debug, Clone)]
pub struct HeapQueue<E, T> {
    heap: Vec<Entry<E, T>>,
    positions: FxHashMap<u64, usize>,
    handles: HandleIndex<E>,

    sequencer: Sequencer,
    requeue_absent: RequeueAbsent,
}

impl<E: EventHandle, T: TimeLike> HeapQueue<E, T> {
    /// The registry name of this implementation.
    pub const NAME: &'static str = "heap";

    /// Creates an empty heap with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with(&QueueOptions::default())
    }

    /// Creates an empty heap.
    #[must_use]
    pub fn new_with(options: &QueueOptions) -> Self {
        Self {
            heap: Vec::with_capacity(64),
            positions: FxHashMap::default(),
            handles: HandleIndex::new(),

            sequencer: Sequencer::new(options),
            requeue_absent: options.requeue_absent,
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.positions.insert(self.heap[i].key.seq, i);
        self.positions.insert(self.heap[j].key.seq, j);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].key < self.heap[parent].key {
                self.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut min = idx;

            if left < len && self.heap[left].key < self.heap[min].key {
                min = left;
            }
            if right < len && self.heap[right].key < self.heap[min].key {
                min = right;
            }
            if min == idx {
                break;
            }

            self.swap(idx, min);
            idx = min;
        }
    }

    fn remove_at(&mut self, idx: usize) -> Entry<E, T> {
        let last = self.heap.len() - 1;
        if idx != last {
            self.swap(idx, last);
        }

        let entry = self
            .heap
            .pop()
            .expect("heap cannot be empty while removing an entry");
        self.positions.remove(&entry.key.seq);
        self.handles.remove(&entry.event, entry.key.seq);

        if idx < self.heap.len() {
            self.sift_down(idx);
            self.sift_up(idx);
        }
        entry
    }

    ///
    /// Verifies the heap property and the consistency of both indices.
    ///
    /// # Panics
    ///
    /// Panics if the structure is corrupted.
    ///
    pub fn check_invariants(&self) {
        for (idx, entry) in self.heap.iter().enumerate() {
            if idx > 0 {
                let parent = &self.heap[(idx - 1) / 2];
                assert!(parent.key <= entry.key, "heap order violated at {idx}");
            }
            assert_eq!(
                self.positions.get(&entry.key.seq),
                Some(&idx),
                "heap position index out of sync"
            );
            assert!(
                self.handles.contains(&entry.event, entry.key.seq),
                "heap handle index out of sync"
            );
        }
        assert_eq!(self.positions.len(), self.heap.len());
        assert_eq!(self.handles.count(), self.heap.len());
    }
}

impl<E: EventHandle, T: TimeLike> Default for HeapQueue<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventHandle, T: TimeLike> EventQueue<E, T> for HeapQueue<E, T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn descriptor(&self) -> String {
        "HeapQueue::BinaryHeap()".to_string()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn requeue_absent(&self) -> RequeueAbsent {
        self.requeue_absent
    }

    fn enqueue(&mut self, event: E, time: T) {
        let key = self.sequencer.key(time);
        let idx = self.heap.len();

        self.handles.insert(event.clone(), key.seq);
        self.positions.insert(key.seq, idx);
        self.heap.push(Entry::new(event, key));
        self.sift_up(idx);
    }

    fn dequeue(&mut self) -> Option<(E, T)> {
        if self.heap.is_empty() {
            None
        } else {
            Some(self.remove_at(0).into_pair())
        }
    }

    fn peek_min(&self) -> Option<T> {
        self.heap.first().map(Entry::time)
    }

    fn remove(&mut self, event: &E) -> bool {
        let Some(seq) = self.handles.latest(event) else {
            return false;
        };
        let idx = *self
            .positions
            .get(&seq)
            .expect("heap position index lost a live entry");
        self.remove_at(idx);
        true
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
        self.handles.clear();
    }

    fn entries(&self) -> Vec<(E, T)> {
        let mut entries = self.heap.clone();
        entries.sort_by_key(Entry::key);
        entries.into_iter().map(Entry::into_pair).collect()
    }
}
