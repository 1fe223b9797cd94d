use super::{EventHandle, EventQueue, HandleIndex, Key, Sequencer};
use crate::{
    config::{QueueOptions, RequeueAbsent},
    time::TimeLike,
};
use fxhash::FxHashMap;
use std::collections::BTreeMap;

///
/// An ordered-tree queue backed by a [`BTreeMap`].
///
/// All operations are O(log n) regardless of the time distribution,
/// which makes it a stable fallback for heavily clustered workloads.
///
#[derive(Debug, Clone)]
pub struct BTreeQueue<E, T> {
    tree: BTreeMap<Key<T>, E>,
    keys: FxHashMap<u64, Key<T>>,
    handles: HandleIndex<E>,

    sequencer: Sequencer,
    requeue_absent: RequeueAbsent,
}

impl<E: EventHandle, T: TimeLike> BTreeQueue<E, T> {
    /// The registry name of this implementation.
    pub const NAME: &'static str = "btree";

    /// Creates an empty queue with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with(&QueueOptions::default())
    }

    /// Creates an empty queue.
    #[must_use]
    pub fn new_with(options: &QueueOptions) -> Self {
        Self {
            tree: BTreeMap::new(),
            keys: FxHashMap::default(),
            handles: HandleIndex::new(),

            sequencer: Sequencer::new(options),
            requeue_absent: options.requeue_absent,
        }
    }

    ///
    /// Verifies the consistency of both indices.
    ///
    /// # Panics
    ///
    /// Panics if the structure is corrupted.
    ///
    pub fn check_invariants(&self) {
        for (key, event) in &self.tree {
            assert_eq!(self.keys.get(&key.seq), Some(key), "btree key index out of sync");
            assert!(
                self.handles.contains(event, key.seq),
                "btree handle index out of sync"
            );
        }
        assert_eq!(self.keys.len(), self.tree.len());
        assert_eq!(self.handles.count(), self.tree.len());
    }
}

impl<E: EventHandle, T: TimeLike> Default for BTreeQueue<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventHandle, T: TimeLike> EventQueue<E, T> for BTreeQueue<E, T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn descriptor(&self) -> String {
        "BTreeQueue::BTreeMap()".to_string()
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn requeue_absent(&self) -> RequeueAbsent {
        self.requeue_absent
    }

    fn enqueue(&mut self, event: E, time: T) {
        let key = self.sequencer.key(time);
        self.handles.insert(event.clone(), key.seq);
        self.keys.insert(key.seq, key);
        self.tree.insert(key, event);
    }

    fn dequeue(&mut self) -> Option<(E, T)> {
        let (key, event) = self.tree.pop_first()?;
        self.keys.remove(&key.seq);
        self.handles.remove(&event, key.seq);
        Some((event, key.time))
    }

    fn peek_min(&self) -> Option<T> {
        self.tree.first_key_value().map(|(key, _)| key.time)
    }

    fn remove(&mut self, event: &E) -> bool {
        let Some(seq) = self.handles.latest(event) else {
            return false;
        };
        let key = self
            .keys
            .remove(&seq)
            .expect("btree key index lost a live entry");
        self.tree
            .remove(&key)
            .expect("btree lost a live entry");
        self.handles.remove(event, seq);
        true
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.keys.clear();
        self.handles.clear();
    }

    fn entries(&self) -> Vec<(E, T)> {
        self.tree
            .iter()
            .map(|(key, event)| (event.clone(), key.time))
            .collect()
    }
}
