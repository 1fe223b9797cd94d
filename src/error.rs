use std::{error::Error as StdError, fmt::Display};

/// A shorthand for results of setup-time operations.
pub type Result<T> = std::result::Result<T, Error>;

///
/// An error raised while configuring or selecting an event queue.
///
/// Regular queue operations never fail: an empty queue yields `None`
/// and cancelling an absent event yields `false`. Only misconfiguration
/// at setup time is surfaced as an [`Error`].
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A queue implementation was requested by a name the registry does not know.
    UnknownImplementation {
        /// The requested name.
        name: String,
        /// The names that would have been accepted.
        known: Vec<String>,
    },

    /// A configuration value could not be parsed.
    InvalidOption {
        /// The option key, e.g. the environment variable.
        key: String,
        /// The rejected raw value.
        value: String,
    },

    /// No registered implementation passed the selection criteria.
    NoCandidate,

    /// An efficiency benchmark failed to execute.
    Benchmark {
        /// The implementation under benchmark.
        name: String,
        /// The reason for the failure.
        reason: String,
    },
}

impl Error {
    pub(crate) fn benchmark(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Benchmark {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_option(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownImplementation { name, known } => write!(
                f,
                "unknown event queue implementation '{name}' (known: {})",
                known.join(", ")
            ),
            Self::InvalidOption { key, value } => {
                write!(f, "invalid value '{value}' for option '{key}'")
            }
            Self::NoCandidate => write!(f, "no event queue implementation matches the criteria"),
            Self::Benchmark { name, reason } => {
                write!(f, "benchmark of event queue '{name}' failed: {reason}")
            }
        }
    }
}

impl StdError for Error {}
