use crate::config::{QueueOptions, TieBreak};
use fxhash::FxHashMap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hash::Hash;

///
/// The ordering key of an entry.
///
/// Entries are ordered by time first, then by the tie tag and
/// finally by the insertion sequence number, which is unique per queue.
/// With FIFO tie-breaking the tie tag equals the sequence number.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key<T> {
    pub(crate) time: T,
    pub(crate) tie: u64,
    pub(crate) seq: u64,
}

///
/// A scheduled event inside a pending-event set.
///
#[derive(Debug, Clone)]
pub struct Entry<E, T> {
    pub(crate) event: E,
    pub(crate) key: Key<T>,
}

impl<E, T: Copy> Entry<E, T> {
    pub(crate) fn new(event: E, key: Key<T>) -> Self {
        Self { event, key }
    }

    /// The scheduled time.
    pub(crate) fn time(&self) -> T {
        self.key.time
    }

    /// The ordering key.
    pub(crate) fn key(&self) -> Key<T> {
        self.key
    }

    pub(crate) fn into_pair(self) -> (E, T) {
        (self.event, self.key.time)
    }
}

///
/// Hands out sequence numbers and tie tags.
///
#[derive(Debug, Clone)]
pub(crate) struct Sequencer {
    next: u64,
    rng: Option<StdRng>,
}

impl Sequencer {
    pub(crate) fn new(options: &QueueOptions) -> Self {
        let rng = match options.tie_break {
            TieBreak::Fifo => None,
            TieBreak::Random => Some(match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            }),
        };
        Self { next: 0, rng }
    }

    pub(crate) fn key<T>(&mut self, time: T) -> Key<T> {
        let seq = self.next;
        self.next += 1;
        let tie = match self.rng.as_mut() {
            Some(rng) => rng.random::<u64>(),
            None => seq,
        };
        Key { time, tie, seq }
    }
}

///
/// Maps event handles to the sequence numbers of their live entries.
///
/// A handle may be scheduled multiple times. Its sequence numbers are
/// kept in insertion order, so the most recently enqueued entry of a
/// handle is the last element.
///
#[derive(Debug, Clone)]
pub(crate) struct HandleIndex<E> {
    map: FxHashMap<E, Vec<u64>>,
}

impl<E: Eq + Hash> HandleIndex<E> {
    pub(crate) fn new() -> Self {
        Self {
            map: FxHashMap::default(),
        }
    }

    pub(crate) fn insert(&mut self, event: E, seq: u64) {
        self.map.entry(event).or_default().push(seq);
    }

    pub(crate) fn latest(&self, event: &E) -> Option<u64> {
        self.map.get(event).and_then(|seqs| seqs.last().copied())
    }

    ///
    /// Forgets one live entry of `event`.
    ///
    /// # Panics
    ///
    /// Panics if the entry was never recorded, since this means the
    /// owning queue lost track of its contents.
    ///
    pub(crate) fn remove(&mut self, event: &E, seq: u64) {
        let seqs = self
            .map
            .get_mut(event)
            .expect("handle index lost an event handle");
        let pos = seqs
            .iter()
            .rposition(|s| *s == seq)
            .expect("handle index lost a sequence number");
        seqs.remove(pos);
        if seqs.is_empty() {
            self.map.remove(event);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }

    /// The total number of recorded entries.
    pub(crate) fn count(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub(crate) fn contains(&self, event: &E, seq: u64) -> bool {
        self.map
            .get(event)
            .is_some_and(|seqs| seqs.contains(&seq))
    }
}
