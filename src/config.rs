//!
//! Options for constructing an event queue.
//!

use crate::{Error, Result};
use std::{env, fmt::Display, str::FromStr};

/// Environment variable naming the implementation, or `auto`.
pub const ENV_IMPL: &str = "EVQ_IMPL";
/// Environment variable selecting the tie-break policy.
pub const ENV_TIE_BREAK: &str = "EVQ_TIE_BREAK";
/// Environment variable seeding the random tie-break.
pub const ENV_SEED: &str = "EVQ_SEED";
/// Environment variable selecting the behaviour of `requeue` on absent events.
pub const ENV_REQUEUE_ABSENT: &str = "EVQ_REQUEUE_ABSENT";

///
/// The rule ordering entries with identical timestamps.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First in, first out by insertion order.
    #[default]
    Fifo,
    /// A random but seedable order.
    Random,
}

impl FromStr for TieBreak {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "random" => Ok(Self::Random),
            _ => Err(Error::invalid_option("tie_break", s)),
        }
    }
}

impl Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
            Self::Random => write!(f, "RANDOM"),
        }
    }
}

///
/// The behaviour of `requeue` for an event that is not queued.
///
/// In both cases `requeue` reports `false`.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequeueAbsent {
    /// Do nothing. An event that already fired stays fired.
    #[default]
    Ignore,
    /// Schedule the event as if it was enqueued.
    Insert,
}

impl FromStr for RequeueAbsent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "insert" => Ok(Self::Insert),
            _ => Err(Error::invalid_option("requeue_absent", s)),
        }
    }
}

///
/// Which implementation a registry should instantiate.
///
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// The highest ranked registered implementation.
    #[default]
    Auto,
    /// A specific implementation, by registry name.
    Named(String),
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            Err(Error::invalid_option("implementation", s))
        } else if s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            Ok(Self::Named(s.to_ascii_lowercase()))
        }
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

///
/// Tuning parameters of the calendar queue.
///
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarOptions {
    /// The number of buckets before the first resize.
    pub initial_buckets: usize,
    /// The bucket width before the first resize.
    pub initial_width: f64,
    /// The bucket count never shrinks below this value.
    pub min_buckets: usize,
    /// The number of earliest entries sampled to estimate the bucket width.
    pub sample_size: usize,
    /// The mean number of buckets scanned per dequeue above which
    /// the bucket width is recomputed.
    pub max_scan_ratio: f64,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            initial_buckets: 16,
            initial_width: 1.0,
            min_buckets: 4,
            sample_size: 25,
            max_scan_ratio: 4.0,
        }
    }
}

///
/// Options for specifing the construction of an event queue
/// independent of the concrete implementation.
///
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    ///
    /// The implementation to instantiate. Defaults to [`Selection::Auto`].
    ///
    pub selection: Selection,

    ///
    /// The tie-break rule for simultaneous events. Defaults to FIFO.
    ///
    pub tie_break: TieBreak,

    ///
    /// The behaviour of `requeue` for events that are not queued.
    ///
    pub requeue_absent: RequeueAbsent,

    ///
    /// The seed for the random tie-break. If not set, a random tie-break
    /// is seeded from the OS and does NOT provide reproducability.
    ///
    pub seed: Option<u64>,

    ///
    /// Calendar queue parameters.
    ///
    pub calendar: CalendarOptions,
}

impl QueueOptions {
    ///
    /// Creates seeded options for reproducable runs.
    ///
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    ///
    /// Reads options from the environment, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a variable is set to a value
    /// that cannot be parsed.
    ///
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    ///
    /// Overrides options with values from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a variable is set to a value
    /// that cannot be parsed.
    ///
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| env::var(key).ok())
    }

    pub(crate) fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = var(ENV_IMPL) {
            self.selection = value
                .parse()
                .map_err(|_| Error::invalid_option(ENV_IMPL, &value))?;
        }
        if let Some(value) = var(ENV_TIE_BREAK) {
            self.tie_break = value
                .parse()
                .map_err(|_| Error::invalid_option(ENV_TIE_BREAK, &value))?;
        }
        if let Some(value) = var(ENV_SEED) {
            self.seed = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid_option(ENV_SEED, &value))?,
            );
        }
        if let Some(value) = var(ENV_REQUEUE_ABSENT) {
            self.requeue_absent = value
                .parse()
                .map_err(|_| Error::invalid_option(ENV_REQUEUE_ABSENT, &value))?;
        }
        Ok(self)
    }

    ///
    /// Pins a specific implementation by name.
    ///
    #[must_use]
    pub fn implementation(mut self, name: impl Into<String>) -> Self {
        self.selection = Selection::Named(name.into());
        self
    }

    ///
    /// Lets the registry pick the highest ranked implementation.
    ///
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.selection = Selection::Auto;
        self
    }

    ///
    /// Changes the tie-break rule.
    ///
    #[must_use]
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    ///
    /// Changes the behaviour of `requeue` on absent events.
    ///
    #[must_use]
    pub fn requeue_absent(mut self, requeue_absent: RequeueAbsent) -> Self {
        self.requeue_absent = requeue_absent;
        self
    }

    ///
    /// Sets the calendar queue parameters.
    ///
    #[must_use]
    pub fn calendar(mut self, calendar: CalendarOptions) -> Self {
        self.calendar = calendar;
        self
    }
}

#[allow(clippy::derivable_impls)]
impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            selection: Selection::Auto,
            tie_break: TieBreak::Fifo,
            requeue_absent: RequeueAbsent::Ignore,
            seed: None,
            calendar: CalendarOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_policies() {
        assert_eq!("FIFO".parse::<TieBreak>(), Ok(TieBreak::Fifo));
        assert_eq!(" random ".parse::<TieBreak>(), Ok(TieBreak::Random));
        assert!("lifo".parse::<TieBreak>().is_err());

        assert_eq!("insert".parse::<RequeueAbsent>(), Ok(RequeueAbsent::Insert));
        assert!("drop".parse::<RequeueAbsent>().is_err());

        assert_eq!("auto".parse::<Selection>(), Ok(Selection::Auto));
        assert_eq!(
            "Calendar".parse::<Selection>(),
            Ok(Selection::Named("calendar".into()))
        );
        assert!("".parse::<Selection>().is_err());
    }

    #[test]
    fn builder() {
        let options = QueueOptions::seeded(42)
            .implementation("heap")
            .tie_break(TieBreak::Random)
            .requeue_absent(RequeueAbsent::Insert);
        assert_eq!(options.seed, Some(42));
        assert_eq!(options.selection, Selection::Named("heap".into()));
        assert_eq!(options.tie_break, TieBreak::Random);
        assert_eq!(options.requeue_absent, RequeueAbsent::Insert);
        assert_eq!(options.auto().selection, Selection::Auto);
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_IMPL, "btree"),
            (ENV_TIE_BREAK, "random"),
            (ENV_SEED, "17"),
            (ENV_REQUEUE_ABSENT, "insert"),
        ]
        .into_iter()
        .collect();

        let options = QueueOptions::default()
            .with_vars(|key| vars.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(options.selection, Selection::Named("btree".into()));
        assert_eq!(options.tie_break, TieBreak::Random);
        assert_eq!(options.seed, Some(17));
        assert_eq!(options.requeue_absent, RequeueAbsent::Insert);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = QueueOptions::default()
            .with_vars(|key| (key == ENV_SEED).then(|| "seventeen".to_string()))
            .unwrap_err();
        assert_eq!(err, Error::invalid_option(ENV_SEED, "seventeen"));

        let options = QueueOptions::default().with_vars(|_| None).unwrap();
        assert_eq!(options, QueueOptions::default());
    }
}
