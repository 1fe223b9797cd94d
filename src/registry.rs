//!
//! Registration and selection of event queue implementations.
//!

use crate::{
    bench::{benchmark, Workload},
    config::{QueueOptions, Selection},
    queue::{BTreeQueue, CalendarQueue, EventHandle, EventQueue, HeapQueue},
    time::TimeLike,
    Error, Result,
};
use log::{debug, info};
use std::cmp::Ordering;

/// A constructor of a boxed queue implementation.
pub type Constructor<E, T> = fn(&QueueOptions) -> Box<dyn EventQueue<E, T>>;

/// A predicate a candidate must satisfy to be considered by automatic selection.
pub type Criterion<E, T> = fn(&Candidate<E, T>) -> bool;

///
/// A registered queue implementation.
///
pub struct Candidate<E, T> {
    name: &'static str,
    construct: Constructor<E, T>,
    estimate: f64,
    measured: Option<f64>,
}

impl<E: EventHandle, T: TimeLike> Candidate<E, T> {
    /// The registry name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The static efficiency estimate given at registration.
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// The measured efficiency index, if the registry was calibrated.
    pub fn measured(&self) -> Option<f64> {
        self.measured
    }

    /// The efficiency used for ranking. Measured indices override estimates.
    pub fn efficiency(&self) -> f64 {
        self.measured.unwrap_or(self.estimate)
    }

    /// Creates a new queue instance.
    pub fn construct(&self, options: &QueueOptions) -> Box<dyn EventQueue<E, T>> {
        (self.construct)(options)
    }
}

impl<E, T> std::fmt::Debug for Candidate<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name)
            .field("estimate", &self.estimate)
            .field("measured", &self.measured)
            .finish()
    }
}

///
/// A set of queue implementations, ranked by efficiency.
///
/// Candidates are ranked by descending efficiency. Candidates with equal
/// efficiency keep their registration order. Automatic selection picks the
/// first ranked candidate that satisfies all criteria. A pinned name
/// bypasses the ranking and the criteria.
///
pub struct Registry<E, T> {
    candidates: Vec<Candidate<E, T>>,
    criteria: Vec<Criterion<E, T>>,
}

impl<E: EventHandle, T: TimeLike> Registry<E, T> {
    ///
    /// An empty registry.
    ///
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            criteria: Vec::new(),
        }
    }

    ///
    /// A registry holding the built-in implementations:
    /// `calendar`, `heap` and `btree`, in that order of preference.
    ///
    #[must_use]
    pub fn standard() -> Self
    where
        E: 'static,
        T: 'static,
    {
        let mut registry = Self::new();
        registry
            .register(CalendarQueue::<E, T>::NAME, 3.0, |o| {
                Box::new(CalendarQueue::<E, T>::new_with(o))
            })
            .register(HeapQueue::<E, T>::NAME, 2.0, |o| {
                Box::new(HeapQueue::<E, T>::new_with(o))
            })
            .register(BTreeQueue::<E, T>::NAME, 1.0, |o| {
                Box::new(BTreeQueue::<E, T>::new_with(o))
            });
        registry
    }

    ///
    /// Registers an implementation. Names are case-insensitive.
    /// Registering a known name replaces the constructor and estimate
    /// but keeps the original registration order.
    ///
    pub fn register(
        &mut self,
        name: &'static str,
        estimate: f64,
        construct: Constructor<E, T>,
    ) -> &mut Self {
        match self
            .candidates
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            Some(candidate) => {
                debug!("replacing event queue implementation '{name}'");
                candidate.construct = construct;
                candidate.estimate = estimate;
                candidate.measured = None;
            }
            None => self.candidates.push(Candidate {
                name,
                construct,
                estimate,
                measured: None,
            }),
        }
        self
    }

    ///
    /// Adds a criterion for automatic selection. Criteria are applied in
    /// the order they were added.
    ///
    pub fn criterion(&mut self, criterion: Criterion<E, T>) -> &mut Self {
        self.criteria.push(criterion);
        self
    }

    /// The names of all registered implementations, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|c| c.name).collect()
    }

    /// Looks up a candidate by name.
    pub fn get(&self, name: &str) -> Option<&Candidate<E, T>> {
        self.candidates
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    ///
    /// All candidates satisfying the criteria, best first.
    ///
    pub fn ranked(&self) -> Vec<&Candidate<E, T>> {
        let mut ranked: Vec<&Candidate<E, T>> = self
            .candidates
            .iter()
            .filter(|c| self.criteria.iter().all(|criterion| criterion(*c)))
            .collect();

        // stable, so equal efficiencies keep registration order
        ranked.sort_by(|a, b| {
            b.efficiency()
                .partial_cmp(&a.efficiency())
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    ///
    /// Creates a queue as configured by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownImplementation`] if a pinned name is not
    /// registered and [`Error::NoCandidate`] if automatic selection finds
    /// no candidate satisfying the criteria.
    ///
    pub fn create(&self, options: &QueueOptions) -> Result<Box<dyn EventQueue<E, T>>> {
        let candidate = match &options.selection {
            Selection::Named(name) => {
                self.get(name)
                    .ok_or_else(|| Error::UnknownImplementation {
                        name: name.clone(),
                        known: self.names().into_iter().map(String::from).collect(),
                    })?
            }
            Selection::Auto => *self.ranked().first().ok_or(Error::NoCandidate)?,
        };

        info!(
            "selected event queue '{}' (efficiency {:.3}, tie break {})",
            candidate.name,
            candidate.efficiency(),
            options.tie_break
        );
        Ok(candidate.construct(options))
    }

    ///
    /// Measures every candidate on `workload` and replaces the static
    /// estimates with the measured efficiency indices.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::Benchmark`] encountered. Candidates
    /// measured before the failure keep their new indices.
    ///
    pub fn calibrate(&mut self, workload: &Workload) -> Result<()>
    where
        E: From<u64>,
    {
        let options = QueueOptions::default();
        for candidate in &mut self.candidates {
            let mut queue = candidate.construct(&options);
            let index = benchmark(&mut *queue, workload)?;
            info!(
                "calibrated event queue '{}': index {:.3} (estimate {:.3})",
                candidate.name, index, candidate.estimate
            );
            candidate.measured = Some(index);
        }
        Ok(())
    }
}

impl<E: EventHandle, T: TimeLike> Default for Registry<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, T> std::fmt::Debug for Registry<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("candidates", &self.candidates)
            .field("criteria", &self.criteria.len())
            .finish()
    }
}

///
/// Creates a queue from the standard registry.
///
/// # Errors
///
/// See [`Registry::create`].
///
pub fn create<E, T>(options: &QueueOptions) -> Result<Box<dyn EventQueue<E, T>>>
where
    E: EventHandle + 'static,
    T: TimeLike + 'static,
{
    Registry::standard().create(options)
}

/// Criteria for automatic selection.
pub mod criteria {
    use super::Candidate;
    use crate::{queue::EventHandle, time::TimeLike};

    /// Accepts only candidates with a measured efficiency index.
    pub fn measured<E: EventHandle, T: TimeLike>(candidate: &Candidate<E, T>) -> bool {
        candidate.measured().is_some()
    }

    /// Rejects candidates whose efficiency is not a positive number.
    pub fn positive<E: EventHandle, T: TimeLike>(candidate: &Candidate<E, T>) -> bool {
        candidate.efficiency() > 0.0
    }
}
