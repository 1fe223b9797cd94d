use super::{Entry, EventHandle, EventQueue, HandleIndex, Key, Sequencer};
use crate::{
    config::{CalendarOptions, QueueOptions, RequeueAbsent},
    time::TimeLike,
};
use fxhash::FxHashMap;
use log::{debug, trace, warn};
use std::collections::VecDeque;

///
/// A self-adjusting calendar queue.
///
/// The time axis is cut into buckets of `width` time units. A timestamp
/// belongs to the virtual bucket `floor(time / width)`, stored in the
/// physical bucket `virtual mod n`. Each bucket keeps its entries sorted,
/// so the earliest entry of a bucket is at its front.
///
/// Dequeueing scans virtual buckets upward from the bucket of the last
/// dequeued entry. If a whole year (n buckets) yields nothing, the
/// minimum is found by a direct search over all bucket fronts.
///
/// The bucket count doubles or halves when the mean occupancy leaves
/// the band `[1/2, 2]`. On each resize the width is re-estimated from
/// the spacing of the earliest entries. The mean scan length is judged
/// every 32 dequeues, independent of the bucket count. If it is too long,
/// the width is re-estimated as soon as the surplus scanning has cost as
/// much as a rebuild, so a bad width is left after O(len) wasted steps.
///
#[derive(Debug, Clone)]
pub struct CalendarQueue<E, T> {
    buckets: Vec<VecDeque<Entry<E, T>>>,
    width: f64,
    len: usize,

    // Virtual bucket of the last dequeued entry. Every live entry
    // lives in this virtual bucket or a later one.
    cursor: i64,

    locations: FxHashMap<u64, Key<T>>,
    handles: HandleIndex<E>,

    options: CalendarOptions,
    dequeues: usize,
    scanned: usize,
    rebuilds: usize,

    sequencer: Sequencer,
    requeue_absent: RequeueAbsent,
}

/// The number of dequeues over which the mean scan length is judged.
const SCAN_WINDOW: usize = 32;

/// The result of a minimum search.
struct Located {
    bucket: usize,
    vbucket: i64,
    steps: usize,
}

impl<E: EventHandle, T: TimeLike> CalendarQueue<E, T> {
    /// The registry name of this implementation.
    pub const NAME: &'static str = "calendar";

    /// Creates an empty calendar queue with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with(&QueueOptions::default())
    }

    /// Creates an empty calendar queue.
    #[must_use]
    pub fn new_with(options: &QueueOptions) -> Self {
        let mut calendar = options.calendar.clone();
        calendar.min_buckets = calendar.min_buckets.max(1);
        if !(calendar.initial_width.is_finite() && calendar.initial_width > 0.0) {
            warn!(
                "invalid initial bucket width {}, using 1.0",
                calendar.initial_width
            );
            calendar.initial_width = 1.0;
        }
        let n = calendar.initial_buckets.max(calendar.min_buckets);

        Self {
            buckets: std::iter::repeat_with(VecDeque::new).take(n).collect(),
            width: calendar.initial_width,
            len: 0,

            cursor: 0,

            locations: FxHashMap::default(),
            handles: HandleIndex::new(),

            options: calendar,
            dequeues: 0,
            scanned: 0,
            rebuilds: 0,

            sequencer: Sequencer::new(options),
            requeue_absent: options.requeue_absent,
        }
    }

    /// The current bucket width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The current number of buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// The number of rebuilds performed so far.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    #[allow(clippy::cast_possible_truncation)]
    fn vbucket(&self, time: T) -> i64 {
        let v = (time.as_f64() / self.width).floor();
        if v.is_nan() {
            0
        } else {
            // saturates for huge and infinite timestamps
            v as i64
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bucket_index(&self, vbucket: i64) -> usize {
        vbucket.rem_euclid(self.buckets.len() as i64) as usize
    }

    fn insert_entry(&mut self, entry: Entry<E, T>) {
        let idx = self.bucket_index(self.vbucket(entry.key.time));
        let bucket = &mut self.buckets[idx];
        let pos = bucket.partition_point(|e| e.key < entry.key);
        bucket.insert(pos, entry);
    }

    fn unlink(&mut self, entry: &Entry<E, T>) {
        self.locations.remove(&entry.key.seq);
        self.handles.remove(&entry.event, entry.key.seq);
        self.len -= 1;
    }

    fn locate_min(&self) -> Option<Located> {
        if self.len == 0 {
            return None;
        }

        let n = self.buckets.len();
        for step in 0..n {
            #[allow(clippy::cast_possible_wrap)]
            let vbucket = self.cursor.saturating_add(step as i64);
            let bucket = self.bucket_index(vbucket);
            if let Some(front) = self.buckets[bucket].front() {
                let front_vbucket = self.vbucket(front.key.time);
                if front_vbucket <= vbucket {
                    return Some(Located {
                        bucket,
                        vbucket: front_vbucket,
                        steps: step + 1,
                    });
                }
            }
        }

        // Direct search
        let (bucket, key) = self
            .buckets
            .iter()
            .enumerate()
            .filter_map(|(idx, b)| b.front().map(|e| (idx, e.key)))
            .min_by_key(|(_, key)| *key)
            .expect("calendar length is non-zero but all buckets are empty");

        Some(Located {
            bucket,
            vbucket: self.vbucket(key.time),
            steps: 2 * n,
        })
    }

    fn pop_located(&mut self, located: &Located) -> Entry<E, T> {
        let entry = self.buckets[located.bucket]
            .pop_front()
            .expect("located calendar bucket is empty");
        self.unlink(&entry);
        entry
    }

    fn record_scan(&mut self, located: &Located) {
        self.cursor = located.vbucket;
        self.dequeues += 1;
        self.scanned += located.steps;
    }

    fn maybe_resize(&mut self) {
        let n = self.buckets.len();
        if self.len > 2 * n {
            self.rebuild(2 * n);
        } else if n > self.options.min_buckets && self.len < n / 2 {
            self.rebuild((n / 2).max(self.options.min_buckets));
        } else if self.dequeues >= SCAN_WINDOW {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.scanned as f64 / self.dequeues as f64;
            if ratio <= self.options.max_scan_ratio {
                self.dequeues = 0;
                self.scanned = 0;
            } else if self.scanned >= self.len {
                // the wasted scans already cost as much as the rebuild
                trace!("mean scan length {ratio:.2} exceeds limit, recalibrating");
                self.rebuild(n);
            }
        }
    }

    ///
    /// Redistributes all entries onto `n` buckets with a freshly
    /// estimated width. Expected O(len).
    ///
    fn rebuild(&mut self, n: usize) {
        let mut entries: Vec<Entry<E, T>> = self.buckets.drain(..).flatten().collect();

        // the cursor below relies on entries[0] being the minimum
        let k = self.options.sample_size.max(2).min(entries.len());
        if k > 0 && k < entries.len() {
            entries.select_nth_unstable_by_key(k - 1, Entry::key);
        }
        entries[..k].sort_unstable_by_key(Entry::key);

        let old_width = self.width;
        if let Some(width) = estimate_width(&entries[..k]) {
            self.width = width;
        }

        self.buckets = std::iter::repeat_with(VecDeque::new).take(n).collect();
        self.cursor = entries.first().map_or(0, |e| self.vbucket(e.key.time));
        for entry in entries {
            self.insert_entry(entry);
        }

        self.dequeues = 0;
        self.scanned = 0;
        self.rebuilds += 1;

        debug!(
            "rebuilt calendar: {} entries on {} buckets, width {} -> {}",
            self.len, n, old_width, self.width
        );
    }

    ///
    /// Verifies bucket order, bucket placement and index consistency.
    ///
    /// # Panics
    ///
    /// Panics if the structure is corrupted.
    ///
    pub fn check_invariants(&self) {
        let mut count = 0;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            for (pos, entry) in bucket.iter().enumerate() {
                if pos > 0 {
                    assert!(
                        bucket[pos - 1].key < entry.key,
                        "calendar bucket {idx} is not sorted"
                    );
                }
                let vbucket = self.vbucket(entry.key.time);
                assert_eq!(
                    self.bucket_index(vbucket),
                    idx,
                    "calendar entry placed in the wrong bucket"
                );
                assert!(
                    vbucket >= self.cursor,
                    "calendar entry lies behind the scan cursor"
                );
                assert_eq!(
                    self.locations.get(&entry.key.seq),
                    Some(&entry.key),
                    "calendar location index out of sync"
                );
                assert!(
                    self.handles.contains(&entry.event, entry.key.seq),
                    "calendar handle index out of sync"
                );
                count += 1;
            }
        }
        assert_eq!(count, self.len, "calendar length out of sync");
        assert_eq!(self.locations.len(), self.len);
        assert_eq!(self.handles.count(), self.len);
    }
}

///
/// Estimates a bucket width from the earliest entries, sorted by key.
///
/// The mean gap between consecutive timestamps is computed, gaps larger
/// than twice the mean are dropped and the mean of the remaining gaps
/// is taken three times.
///
fn estimate_width<E, T: TimeLike>(sample: &[Entry<E, T>]) -> Option<f64> {
    let gaps: Vec<f64> = sample
        .windows(2)
        .map(|w| w[1].key.time.as_f64() - w[0].key.time.as_f64())
        .filter(|gap| gap.is_finite())
        .collect();
    if gaps.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if !(mean > 0.0) {
        return None;
    }

    let kept: Vec<f64> = gaps.into_iter().filter(|gap| *gap <= 2.0 * mean).collect();
    #[allow(clippy::cast_precision_loss)]
    let separation = kept.iter().sum::<f64>() / kept.len() as f64;
    let separation = if separation > 0.0 { separation } else { mean };

    let width = 3.0 * separation;
    (width.is_finite() && width > 0.0).then_some(width)
}

impl<E: EventHandle, T: TimeLike> Default for CalendarQueue<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventHandle, T: TimeLike> EventQueue<E, T> for CalendarQueue<E, T> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn descriptor(&self) -> String {
        format!("CalendarQueue({}, {})", self.buckets.len(), self.width)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn requeue_absent(&self) -> RequeueAbsent {
        self.requeue_absent
    }

    fn enqueue(&mut self, event: E, time: T) {
        let key = self.sequencer.key(time);
        let vbucket = self.vbucket(time);
        if self.len == 0 || vbucket < self.cursor {
            self.cursor = vbucket;
        }

        self.handles.insert(event.clone(), key.seq);
        self.locations.insert(key.seq, key);
        self.insert_entry(Entry::new(event, key));
        self.len += 1;

        self.maybe_resize();
    }

    fn dequeue(&mut self) -> Option<(E, T)> {
        let located = self.locate_min()?;
        self.record_scan(&located);
        let entry = self.pop_located(&located);
        self.maybe_resize();
        Some(entry.into_pair())
    }

    fn dequeue_all(&mut self) -> Vec<(E, T)> {
        let Some(located) = self.locate_min() else {
            return Vec::new();
        };
        self.record_scan(&located);

        // Equal timestamps share a virtual bucket, thus they
        // form a prefix of the located bucket.
        let first = self.pop_located(&located);
        let time = first.key.time;
        let mut events = vec![first.into_pair()];
        while self.buckets[located.bucket]
            .front()
            .is_some_and(|e| e.key.time == time)
        {
            events.push(self.pop_located(&located).into_pair());
        }

        self.maybe_resize();
        events
    }

    fn peek_min(&self) -> Option<T> {
        let located = self.locate_min()?;
        self.buckets[located.bucket].front().map(Entry::time)
    }

    fn remove(&mut self, event: &E) -> bool {
        let Some(seq) = self.handles.latest(event) else {
            return false;
        };
        let key = *self
            .locations
            .get(&seq)
            .expect("calendar location index lost a live entry");

        let idx = self.bucket_index(self.vbucket(key.time));
        let pos = self.buckets[idx]
            .binary_search_by(|e| e.key.cmp(&key))
            .expect("calendar bucket lost a live entry");
        let entry = self.buckets[idx]
            .remove(pos)
            .expect("binary search returned an invalid position");
        self.unlink(&entry);

        self.maybe_resize();
        true
    }

    fn clear(&mut self) {
        self.buckets.iter_mut().for_each(VecDeque::clear);
        self.locations.clear();
        self.handles.clear();
        self.len = 0;
        self.cursor = 0;
        self.dequeues = 0;
        self.scanned = 0;
    }

    fn entries(&self) -> Vec<(E, T)> {
        let mut entries: Vec<&Entry<E, T>> = self.buckets.iter().flatten().collect();
        entries.sort_by_key(|e| e.key);
        entries
            .into_iter()
            .map(|e| (e.event.clone(), e.key.time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimTime;

    fn options(buckets: usize, width: f64) -> QueueOptions {
        QueueOptions::default().calendar(CalendarOptions {
            initial_buckets: buckets,
            initial_width: width,
            ..CalendarOptions::default()
        })
    }

    #[test]
    fn calendar_simple_event_order_nonoverlapping() {
        let mut cqueue = CalendarQueue::new_with(&options(100, 1.0));
        for e in 0..=100u64 {
            cqueue.enqueue(e, e);
        }
        assert_eq!(cqueue.len(), 101);

        let mut c = 0;
        while let Some((event, time)) = cqueue.dequeue() {
            assert_eq!(event, c);
            assert_eq!(time, c);
            c += 1;
        }
        assert_eq!(c, 101);
        assert!(cqueue.is_empty());
        cqueue.check_invariants();
    }

    #[test]
    fn calendar_simple_event_order_wrap_around() {
        // Same as above, but events span several years.
        let mut cqueue = CalendarQueue::new_with(&options(4, 0.5));
        for e in (0..=100u64).rev() {
            cqueue.enqueue(e, SimTime::new(e as f64));
        }
        cqueue.check_invariants();

        let mut c = 0;
        while let Some((event, time)) = cqueue.dequeue() {
            assert_eq!(event, c);
            assert_eq!(time, SimTime::new(c as f64));
            c += 1;
        }
        assert_eq!(c, 101);
    }

    #[test]
    fn calendar_direct_search_across_sparse_years() {
        let mut cqueue = CalendarQueue::new_with(&options(4, 1.0));
        cqueue.enqueue("far", SimTime::new(1_000_000.0));
        cqueue.enqueue("near", SimTime::new(0.5));
        assert_eq!(cqueue.dequeue(), Some(("near", SimTime::new(0.5))));
        assert_eq!(cqueue.peek_min(), Some(SimTime::new(1_000_000.0)));
        assert_eq!(cqueue.dequeue(), Some(("far", SimTime::new(1_000_000.0))));
        assert_eq!(cqueue.dequeue(), None);
    }

    #[test]
    fn calendar_enqueue_before_cursor() {
        let mut cqueue = CalendarQueue::new_with(&options(8, 1.0));
        cqueue.enqueue(1, 50u64);
        cqueue.enqueue(2, 60u64);
        assert_eq!(cqueue.dequeue(), Some((1, 50)));

        // scheduling into the past of the scan position
        cqueue.enqueue(3, 10u64);
        cqueue.check_invariants();
        assert_eq!(cqueue.dequeue(), Some((3, 10)));
        assert_eq!(cqueue.dequeue(), Some((2, 60)));
    }

    #[test]
    fn calendar_grows_and_shrinks() {
        let mut cqueue = CalendarQueue::new_with(&options(4, 1.0));
        for e in 0..1000u64 {
            cqueue.enqueue(e, SimTime::new(e as f64 * 0.01));
        }
        cqueue.check_invariants();
        assert!(cqueue.num_buckets() >= 256);
        assert!(cqueue.rebuilds() > 0);
        // spacing of 0.01 yields a width of about 0.03
        assert!((cqueue.width() - 0.03).abs() < 1e-6, "{}", cqueue.width());

        for e in 0..990u64 {
            assert_eq!(cqueue.dequeue().map(|(e, _)| e), Some(e));
        }
        cqueue.check_invariants();
        assert!(cqueue.num_buckets() <= 32);
        assert_eq!(cqueue.len(), 10);
    }

    #[test]
    fn calendar_rebuild_preserves_entries() {
        let mut cqueue = CalendarQueue::new_with(&options(4, 100.0));
        let mut expected = Vec::new();
        for e in 0..500u64 {
            let time = (e * 7919) % 613;
            cqueue.enqueue(e, time);
            expected.push((e, time));
            if e % 3 == 0 {
                assert!(cqueue.remove(&(e / 2)));
                expected.retain(|(x, _)| *x != e / 2);
            }
        }
        cqueue.check_invariants();

        expected.sort_by_key(|(e, t)| (*t, *e));
        assert_eq!(cqueue.entries(), expected);
    }

    #[test]
    fn calendar_recalibrates_on_bad_width() {
        // A width much too small for the spacing of the events
        // forces long scans and a recalibration.
        let mut cqueue = CalendarQueue::new_with(&QueueOptions::default().calendar(
            CalendarOptions {
                initial_buckets: 64,
                initial_width: 0.001,
                min_buckets: 64,
                ..CalendarOptions::default()
            },
        ));

        for e in 0..64u64 {
            cqueue.enqueue(e, SimTime::new(e as f64 * 10.0));
        }
        let rebuilds = cqueue.rebuilds();

        let mut time = SimTime::new(640.0);
        for e in 64..200u64 {
            let (_, t) = cqueue.dequeue().unwrap();
            assert!(t <= time);
            cqueue.enqueue(e, time);
            time += 10.0;
        }

        cqueue.check_invariants();
        assert!(cqueue.rebuilds() > rebuilds);
        assert!(cqueue.width() > 1.0, "{}", cqueue.width());
    }

    #[test]
    fn calendar_recovers_from_dense_prefix_quickly() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        // A short dense run followed by a wide spread: growth rebuilds
        // sample only the dense run and pick a far too small width.
        let mut rng = StdRng::seed_from_u64(0xD3_75E);
        let mut cqueue: CalendarQueue<u64, SimTime> = CalendarQueue::new();
        for e in 0..30u64 {
            cqueue.enqueue(e, SimTime::new(e as f64 * 1e-9));
        }
        for e in 30..20_000u64 {
            cqueue.enqueue(e, SimTime::new(rng.random::<f64>() * 1e9));
        }
        assert!(cqueue.num_buckets() >= 8192);
        assert!(cqueue.width() < 1e-6, "{}", cqueue.width());
        let before = cqueue.rebuilds();

        let hold = |cqueue: &mut CalendarQueue<u64, SimTime>, rng: &mut StdRng| {
            let (e, t) = cqueue.dequeue().unwrap();
            cqueue.enqueue(e, t + rng.random::<f64>() * 1e9);
        };

        let mut recovered_after = None;
        for i in 0..64 {
            hold(&mut cqueue, &mut rng);
            if cqueue.rebuilds() > before {
                recovered_after = Some(i + 1);
                break;
            }
        }
        let recovered_after = recovered_after.expect("no recalibration within 64 dequeues");
        assert!(recovered_after <= 2 * SCAN_WINDOW);
        assert!(cqueue.width() > 1.0, "{}", cqueue.width());
        cqueue.check_invariants();

        // once recalibrated, scans stay short and no further rebuilds are needed
        let recovered = cqueue.rebuilds();
        for _ in 0..2_000 {
            hold(&mut cqueue, &mut rng);
        }
        assert!(cqueue.rebuilds() <= recovered + 3);
        cqueue.check_invariants();
    }

    #[test]
    fn calendar_dequeue_all_groups_simultaneous() {
        let mut cqueue = CalendarQueue::new_with(&options(4, 1.0));
        for e in 0..10u64 {
            cqueue.enqueue(e, SimTime::new((e / 4) as f64));
        }
        assert_eq!(
            cqueue.dequeue_all(),
            vec![
                (0, SimTime::ZERO),
                (1, SimTime::ZERO),
                (2, SimTime::ZERO),
                (3, SimTime::ZERO)
            ]
        );
        assert_eq!(cqueue.dequeue_all().len(), 4);
        assert_eq!(cqueue.dequeue_all().len(), 2);
        assert!(cqueue.dequeue_all().is_empty());
    }

    #[test]
    fn calendar_infinite_times() {
        let mut cqueue = CalendarQueue::new_with(&options(4, 1.0));
        cqueue.enqueue(1, SimTime::MAX);
        cqueue.enqueue(2, SimTime::MIN);
        cqueue.enqueue(3, SimTime::new(2.0));
        cqueue.check_invariants();
        assert_eq!(cqueue.dequeue(), Some((2, SimTime::MIN)));
        assert_eq!(cqueue.dequeue(), Some((3, SimTime::new(2.0))));
        assert_eq!(cqueue.dequeue(), Some((1, SimTime::MAX)));
    }

    #[test]
    fn estimate_width_ignores_outliers() {
        let mut seq = Sequencer::new(&QueueOptions::default());
        let sample: Vec<Entry<u32, SimTime>> = [0.0, 1.0, 2.0, 3.0, 100.0]
            .into_iter()
            .map(|t| Entry::new(0, seq.key(SimTime::new(t))))
            .collect();
        // gaps 1,1,1,97: mean 25, the outlier is dropped
        assert_eq!(estimate_width(&sample), Some(3.0));

        let flat: Vec<Entry<u32, SimTime>> = (0..4)
            .map(|_| Entry::new(0, seq.key(SimTime::ZERO)))
            .collect();
        assert_eq!(estimate_width(&flat), None);
    }
}
