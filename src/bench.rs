//!
//! Synthetic workloads and the efficiency benchmark.
//!

use crate::{
    config::RequeueAbsent,
    queue::{EventHandle, EventQueue, HeapQueue},
    time::{SimTime, TimeLike},
    Error, Result,
};
use lazy_static::lazy_static;
use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;

/// The version of the standard workload. Bumped whenever its generation changes,
/// since efficiency indices of different versions are not comparable.
pub const WORKLOAD_VERSION: u32 = 2;

const STANDARD_SEED: u64 = 0x0E5E_1DE5;
const STANDARD_POPULATION: usize = 1_000;
const STANDARD_OPS: usize = 20_000;

lazy_static! {
    static ref STANDARD: Workload = Workload::generate_standard();
}

///
/// A single step of a synthetic trace.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Schedule an event.
    Enqueue {
        /// The event id.
        event: u64,
        /// The absolute time.
        time: f64,
    },
    /// Fetch the next event.
    Dequeue,
    /// Fetch all next simultaneous events.
    DequeueAll,
    /// Cancel an event.
    Remove {
        /// The event id.
        event: u64,
    },
    /// Reschedule an event.
    Requeue {
        /// The event id.
        event: u64,
        /// The new absolute time.
        time: f64,
    },
}

///
/// The distribution of scheduling delays in a phase.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Delays uniformly drawn from `[0, 2)`.
    Uniform,
    /// Exponential delays with a mean of 0.1 and rare far-future outliers.
    Clustered,
    /// Whole-number delays from `0..4`, producing many simultaneous events.
    Bursty,
}

impl Distribution {
    fn sample(self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Uniform => 2.0 * rng.random::<f64>(),
            Self::Clustered => {
                if rng.random_bool(0.01) {
                    100.0 + 100.0 * rng.random::<f64>()
                } else {
                    -0.1 * (1.0 - rng.random::<f64>()).ln()
                }
            }
            Self::Bursty => f64::from(rng.random_range(0..4u32)),
        }
    }
}

///
/// A trace replayed on a fresh queue.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    /// The delay distribution this phase was generated from.
    pub distribution: Distribution,
    /// The operations.
    pub ops: Vec<Op>,
}

///
/// A fixed, versioned operation trace used to compute efficiency indices.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    /// The generation version.
    pub version: u32,
    /// The phases, each replayed on a cleared queue.
    pub phases: Vec<Phase>,
}

impl Workload {
    ///
    /// The standard workload: one phase for every [`Distribution`],
    /// generated once from a fixed seed.
    ///
    #[must_use]
    pub fn standard() -> &'static Workload {
        &STANDARD
    }

    fn generate_standard() -> Self {
        let phases = [
            Distribution::Uniform,
            Distribution::Clustered,
            Distribution::Bursty,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, distribution)| {
            Phase::generate(
                distribution,
                STANDARD_SEED + i as u64,
                STANDARD_POPULATION,
                STANDARD_OPS,
            )
        })
        .collect();

        Self {
            version: WORKLOAD_VERSION,
            phases,
        }
    }

    /// A workload with a custom set of phases.
    #[must_use]
    pub fn new(phases: Vec<Phase>) -> Self {
        Self {
            version: WORKLOAD_VERSION,
            phases,
        }
    }

    /// The total number of operations.
    pub fn len(&self) -> usize {
        self.phases.iter().map(|p| p.ops.len()).sum()
    }

    /// Whether the workload contains no operations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Phase {
    ///
    /// Generates a hold-model trace: `population` events are scheduled
    /// up front, followed by `ops` driving operations dominated by
    /// dequeues, interleaved with cancellations, reschedulings and
    /// simultaneous-event batches. Every dequeued or cancelled event is
    /// replaced by a new [`Op::Enqueue`] right after the driving operation,
    /// so the trace holds `population + ops` operations plus those refills.
    ///
    /// Generated times never lie before the time of the last dequeued event.
    ///
    #[must_use]
    pub fn generate(distribution: Distribution, seed: u64, population: usize, ops: usize) -> Self {
        let mut generator = Generator {
            rng: StdRng::seed_from_u64(seed),
            distribution,
            reference: HeapQueue::new(),
            trace: Vec::with_capacity(population + ops),
            now: 0.0,
            next_event: 0,
        };

        for _ in 0..population {
            generator.schedule();
        }

        for _ in 0..ops {
            match generator.rng.random_range(0..100) {
                0..=59 => {
                    generator.trace.push(Op::Dequeue);
                    if let Some((_, time)) = generator.reference.dequeue() {
                        generator.now = time.as_secs_f64();
                    }
                    generator.schedule();
                }
                60..=69 => {
                    generator.trace.push(Op::DequeueAll);
                    let batch = generator.reference.dequeue_all();
                    if let Some((_, time)) = batch.first() {
                        generator.now = time.as_secs_f64();
                    }
                    for _ in 0..batch.len() {
                        generator.schedule();
                    }
                }
                70..=84 => {
                    let event = generator.rng.random_range(0..generator.next_event.max(1));
                    generator.trace.push(Op::Remove { event });
                    if generator.reference.remove(&event) {
                        generator.schedule();
                    }
                }
                _ => {
                    let event = generator.rng.random_range(0..generator.next_event.max(1));
                    let time = generator.now + distribution.sample(&mut generator.rng);
                    generator.trace.push(Op::Requeue { event, time });
                    generator.reference.requeue(&event, SimTime::new(time));
                }
            }
        }

        let trace = generator.trace;
        Self {
            distribution,
            ops: trace,
        }
    }
}

struct Generator {
    rng: StdRng,
    distribution: Distribution,
    reference: HeapQueue<u64, SimTime>,
    trace: Vec<Op>,
    now: f64,
    next_event: u64,
}

impl Generator {
    fn schedule(&mut self) {
        let time = self.now + self.distribution.sample(&mut self.rng);
        self.reference.enqueue(self.next_event, SimTime::new(time));
        self.trace.push(Op::Enqueue {
            event: self.next_event,
            time,
        });
        self.next_event += 1;
    }
}

///
/// Replays `workload` on `queue` and returns its efficiency index:
/// the number of operations per microsecond. Higher is better.
///
/// The queue is cleared before every phase. The replay checks that the
/// queue never reports an empty state while entries are pending and
/// that its length matches the bookkeeping derived from its own answers.
///
/// # Errors
///
/// Returns [`Error::Benchmark`] if the workload is empty or the
/// queue misbehaves during the replay.
///
pub fn benchmark<E, T>(queue: &mut dyn EventQueue<E, T>, workload: &Workload) -> Result<f64>
where
    E: EventHandle + From<u64>,
    T: TimeLike,
{
    let name = queue.name();
    if workload.is_empty() {
        warn!("cannot benchmark '{name}' with an empty workload");
        return Err(Error::benchmark(name, "empty workload"));
    }

    let start = Instant::now();
    for phase in &workload.phases {
        queue.clear();
        replay(&mut *queue, phase).map_err(|reason| {
            warn!("benchmark of '{name}' failed: {reason}");
            Error::benchmark(name, reason)
        })?;
    }
    let elapsed = start.elapsed();

    #[allow(clippy::cast_precision_loss)]
    let index = workload.len() as f64 / (elapsed.as_secs_f64() * 1e6).max(1e-3);
    debug!(
        "benchmarked '{}' ({}): {} ops in {:?}, index {:.3}",
        name,
        queue.descriptor(),
        workload.len(),
        elapsed,
        index
    );
    queue.clear();
    Ok(index)
}

fn replay<E, T>(queue: &mut dyn EventQueue<E, T>, phase: &Phase) -> std::result::Result<(), String>
where
    E: EventHandle + From<u64>,
    T: TimeLike,
{
    let mut len = 0usize;
    for (step, op) in phase.ops.iter().enumerate() {
        match *op {
            Op::Enqueue { event, time } => {
                queue.enqueue(E::from(event), T::from_f64(time));
                len += 1;
            }
            Op::Dequeue => match queue.dequeue() {
                Some(_) => {
                    len = len
                        .checked_sub(1)
                        .ok_or_else(|| format!("step {step}: dequeue from an empty queue"))?;
                }
                None if len > 0 => {
                    return Err(format!("step {step}: empty dequeue with {len} pending"))
                }
                None => {}
            },
            Op::DequeueAll => {
                let batch = queue.dequeue_all();
                if batch.is_empty() && len > 0 {
                    return Err(format!("step {step}: empty batch with {len} pending"));
                }
                len = len
                    .checked_sub(batch.len())
                    .ok_or_else(|| format!("step {step}: batch larger than queue"))?;
            }
            Op::Remove { event } => {
                if queue.remove(&E::from(event)) {
                    len = len
                        .checked_sub(1)
                        .ok_or_else(|| format!("step {step}: removal from an empty queue"))?;
                }
            }
            Op::Requeue { event, time } => {
                let existed = queue.requeue(&E::from(event), T::from_f64(time));
                if !existed && queue.requeue_absent() == RequeueAbsent::Insert {
                    len += 1;
                }
            }
        }

        if queue.len() != len {
            return Err(format!(
                "step {step}: queue reports {} entries, expected {len}",
                queue.len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{BTreeQueue, CalendarQueue};

    #[test]
    fn standard_workload_is_fixed() {
        let a = Workload::standard();
        let b = Workload::generate_standard();
        assert_eq!(a, &b);
        assert_eq!(a.version, WORKLOAD_VERSION);
        assert_eq!(a.phases.len(), 3);
        for phase in &a.phases {
            assert!(phase.ops[..STANDARD_POPULATION]
                .iter()
                .all(|op| matches!(op, Op::Enqueue { .. })));
            let driving = phase.ops[STANDARD_POPULATION..]
                .iter()
                .filter(|op| !matches!(op, Op::Enqueue { .. }))
                .count();
            assert_eq!(driving, STANDARD_OPS);
        }
    }

    #[test]
    fn phase_length_follows_ops() {
        let phase = Phase::generate(Distribution::Bursty, 11, 20, 300);
        let enqueues = phase
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Enqueue { .. }))
            .count();
        assert_eq!(phase.ops.len() - enqueues, 300);
        assert!(enqueues >= 20);

        // a longer run only appends operations
        let longer = Phase::generate(Distribution::Bursty, 11, 20, 400);
        assert_eq!(longer.ops[..phase.ops.len()], phase.ops[..]);
    }

    #[test]
    fn generated_times_respect_causality() {
        let phase = Phase::generate(Distribution::Bursty, 3, 50, 2_000);
        let mut queue: HeapQueue<u64, SimTime> = HeapQueue::new();
        let mut now = SimTime::MIN;
        for op in &phase.ops {
            match *op {
                Op::Enqueue { event, time } => {
                    assert!(SimTime::new(time) >= now);
                    queue.enqueue(event, SimTime::new(time));
                }
                Op::Requeue { event, time } => {
                    assert!(SimTime::new(time) >= now);
                    queue.requeue(&event, SimTime::new(time));
                }
                Op::Remove { event } => {
                    queue.remove(&event);
                }
                Op::Dequeue => {
                    if let Some((_, time)) = queue.dequeue() {
                        assert!(time >= now);
                        now = time;
                    }
                }
                Op::DequeueAll => {
                    if let Some((_, time)) = queue.dequeue_all().first() {
                        assert!(*time >= now);
                        now = *time;
                    }
                }
            }
        }
    }

    #[test]
    fn benchmark_all_builtin_queues() {
        let workload = Workload::new(vec![
            Phase::generate(Distribution::Uniform, 1, 100, 1_000),
            Phase::generate(Distribution::Bursty, 2, 100, 1_000),
        ]);

        let mut heap: HeapQueue<u64, SimTime> = HeapQueue::new();
        let mut calendar: CalendarQueue<u64, SimTime> = CalendarQueue::new();
        let mut btree: BTreeQueue<u64, u64> = BTreeQueue::new();

        for index in [
            benchmark(&mut heap, &workload).unwrap(),
            benchmark(&mut calendar, &workload).unwrap(),
            benchmark(&mut btree, &workload).unwrap(),
        ] {
            assert!(index.is_finite() && index > 0.0);
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn benchmark_rejects_empty_workload() {
        let mut heap: HeapQueue<u64, SimTime> = HeapQueue::new();
        let err = benchmark(&mut heap, &Workload::new(Vec::new())).unwrap_err();
        assert_eq!(err, Error::benchmark("heap", "empty workload"));
    }

    /// Drops every second event it is given.
    struct Lossy(HeapQueue<u64, SimTime>, bool);

    impl EventQueue<u64, SimTime> for Lossy {
        fn name(&self) -> &'static str {
            "lossy"
        }
        fn descriptor(&self) -> String {
            "Lossy".into()
        }
        fn len(&self) -> usize {
            self.0.len()
        }
        fn requeue_absent(&self) -> crate::config::RequeueAbsent {
            self.0.requeue_absent()
        }
        fn enqueue(&mut self, event: u64, time: SimTime) {
            self.1 = !self.1;
            if self.1 {
                self.0.enqueue(event, time);
            }
        }
        fn dequeue(&mut self) -> Option<(u64, SimTime)> {
            self.0.dequeue()
        }
        fn peek_min(&self) -> Option<SimTime> {
            self.0.peek_min()
        }
        fn remove(&mut self, event: &u64) -> bool {
            self.0.remove(event)
        }
        fn clear(&mut self) {
            self.0.clear();
        }
        fn entries(&self) -> Vec<(u64, SimTime)> {
            self.0.entries()
        }
    }

    /// Hands out entries it never received.
    struct Phantom;

    impl EventQueue<u64, SimTime> for Phantom {
        fn name(&self) -> &'static str {
            "phantom"
        }
        fn descriptor(&self) -> String {
            "Phantom".into()
        }
        fn len(&self) -> usize {
            0
        }
        fn requeue_absent(&self) -> crate::config::RequeueAbsent {
            crate::config::RequeueAbsent::Ignore
        }
        fn enqueue(&mut self, _: u64, _: SimTime) {}
        fn dequeue(&mut self) -> Option<(u64, SimTime)> {
            Some((0, SimTime::ZERO))
        }
        fn peek_min(&self) -> Option<SimTime> {
            None
        }
        fn remove(&mut self, _: &u64) -> bool {
            true
        }
        fn clear(&mut self) {}
        fn entries(&self) -> Vec<(u64, SimTime)> {
            Vec::new()
        }
    }

    #[test]
    fn benchmark_reports_entries_from_nowhere() {
        for op in [Op::Dequeue, Op::Remove { event: 0 }] {
            let workload = Workload::new(vec![Phase {
                distribution: Distribution::Uniform,
                ops: vec![op],
            }]);
            let err = benchmark(&mut Phantom, &workload).unwrap_err();
            assert!(matches!(err, Error::Benchmark { ref name, .. } if name == "phantom"));
        }
    }

    #[test]
    fn benchmark_detects_lost_entries() {
        let workload = Workload::new(vec![Phase::generate(Distribution::Uniform, 1, 10, 100)]);
        let mut lossy = Lossy(HeapQueue::new(), false);
        let err = benchmark(&mut lossy, &workload).unwrap_err();
        assert!(matches!(err, Error::Benchmark { ref name, .. } if name == "lossy"));
    }
}
