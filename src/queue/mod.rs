//!
//! The pending-event set contract and its implementations.
//!

use crate::{config::RequeueAbsent, time::TimeLike};
use std::hash::Hash;

mod entry;
pub use entry::*;

mod heap;
pub use heap::*;

mod calendar;
pub use calendar::*;

mod btree;
pub use btree::*;


///
/// An event handle stored in a queue.
///
/// Handles are compared by identity, so they must be cheap to clone
/// and hash. Typical handles are ids or reference-counted pointers.
///
pub trait EventHandle: Clone + Eq + Hash {}

impl<E: Clone + Eq + Hash> EventHandle for E {}

///
/// A pending-event set of a discrete event simulation.
///
/// Entries are ordered by timestamp. Entries with equal timestamps are
/// ordered by the tie-break rule the queue was constructed with.
/// All built-in implementations allow a handle to be scheduled more
/// than once. In that case [`remove`](EventQueue::remove) and
/// [`requeue`](EventQueue::requeue) act on the most recently enqueued
/// entry of that handle, so `enqueue(e, t)` directly followed by
/// `remove(&e)` never changes the state of the queue.
///
pub trait EventQueue<E: EventHandle, T: TimeLike> {
    /// The registry name of the implementation.
    fn name(&self) -> &'static str;

    /// A human readable description including the current parameters.
    fn descriptor(&self) -> String;

    /// The number of queued entries.
    fn len(&self) -> usize;

    /// Whether no entries are queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The behaviour of [`requeue`](EventQueue::requeue) on absent events.
    fn requeue_absent(&self) -> RequeueAbsent;

    /// Schedules `event` at `time`.
    fn enqueue(&mut self, event: E, time: T);

    /// Removes and returns one entry with the minimal timestamp.
    fn dequeue(&mut self) -> Option<(E, T)>;

    ///
    /// Removes and returns all entries sharing the minimal timestamp,
    /// in tie-break order. Returns an empty vector if the queue is empty.
    ///
    fn dequeue_all(&mut self) -> Vec<(E, T)> {
        let mut events = Vec::new();
        let Some(min) = self.peek_min() else {
            return events;
        };
        while self.peek_min() == Some(min) {
            match self.dequeue() {
                Some(pair) => events.push(pair),
                None => break,
            }
        }
        events
    }

    /// The minimal timestamp, if any.
    fn peek_min(&self) -> Option<T>;

    ///
    /// Cancels the most recently enqueued entry of `event`.
    /// Returns `false` if `event` is not queued.
    ///
    fn remove(&mut self, event: &E) -> bool;

    ///
    /// Moves the most recently enqueued entry of `event` to `time`.
    ///
    /// The rescheduled entry receives a fresh sequence number, so the result
    /// equals removing the entry and enqueueing it again. Returns whether an
    /// entry existed. If none existed the queue either ignores the call or
    /// inserts a new entry, depending on [`RequeueAbsent`].
    ///
    fn requeue(&mut self, event: &E, time: T) -> bool {
        let existed = self.remove(event);
        if existed || self.requeue_absent() == RequeueAbsent::Insert {
            self.enqueue(event.clone(), time);
        }
        existed
    }

    /// Removes all entries.
    fn clear(&mut self);

    /// A snapshot of all entries in dequeue order.
    fn entries(&self) -> Vec<(E, T)>;
}

impl<E: EventHandle, T: TimeLike> std::fmt::Debug for dyn EventQueue<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventQueue::{} {{ len: {} }}", self.descriptor(), self.len())
    }
}
