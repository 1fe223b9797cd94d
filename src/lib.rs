//!
//! Pending-event sets for discrete event simulations.
//!
//! A pending-event set (or future event set) holds all scheduled but not yet
//! executed events of a simulation, ordered by their timestamp. The simulation
//! loop repeatedly takes the earliest event, executes it and schedules the
//! events it produces. This crate provides interchangeable implementations of
//! the [`EventQueue`] contract:
//!
//! - [`CalendarQueue`]: a bucketed calendar queue with O(1) expected cost
//!   per operation that re-tunes its bucket count and width to the workload.
//! - [`HeapQueue`]: an indexed binary heap, the O(log n) baseline.
//! - [`BTreeQueue`]: an ordered tree, O(log n) for every distribution.
//!
//! Events with equal timestamps are returned in insertion order by default,
//! or in a seeded random order if [`TieBreak::Random`] is configured.
//!
//! # Selecting an implementation
//!
//! Implementations are chosen through a [`Registry`] which ranks them by
//! efficiency. An implementation can be pinned by name, either in code or
//! through the `EVQ_IMPL` environment variable.
//!
//! ```
//! use evq::{EventQueue, QueueOptions, Registry, SimTime};
//!
//! let registry = Registry::<u32, SimTime>::standard();
//! let mut queue = registry.create(&QueueOptions::default())?;
//!
//! queue.enqueue(1, SimTime::new(5.0));
//! queue.enqueue(2, SimTime::new(3.0));
//! queue.enqueue(3, SimTime::new(3.0));
//!
//! assert_eq!(
//!     queue.dequeue_all(),
//!     vec![(2, SimTime::new(3.0)), (3, SimTime::new(3.0))]
//! );
//! assert!(queue.requeue(&1, SimTime::new(4.0)));
//! assert_eq!(queue.dequeue(), Some((1, SimTime::new(4.0))));
//! # Ok::<(), evq::Error>(())
//! ```
//!
//! The ranking can be replaced by measured efficiency indices with
//! [`Registry::calibrate`], which replays the fixed [`Workload::standard`]
//! trace on every registered implementation.
//!

pub mod bench;
pub mod config;
pub mod error;
pub mod logger;
pub mod queue;
pub mod registry;
pub mod time;

pub use bench::{benchmark, Workload, WORKLOAD_VERSION};
pub use config::{CalendarOptions, QueueOptions, RequeueAbsent, Selection, TieBreak};
pub use error::{Error, Result};
pub use logger::StandardLogger;
pub use queue::{BTreeQueue, CalendarQueue, EventHandle, EventQueue, HeapQueue};
pub use registry::{create, Registry};
pub use time::{SimTime, TimeLike};
