//!
//! Timestamps usable as keys in a pending-event set.
//!

use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

///
/// A totally ordered timestamp domain.
///
/// Bucketed queues need a numeric view of a timestamp to map it
/// onto a bucket, and the benchmark harness needs to build timestamps
/// from a synthetic trace. Both conversions must be monotonic:
/// `a <= b` implies `a.as_f64() <= b.as_f64()`.
///
pub trait TimeLike: Copy + Ord + Debug {
    /// The numeric position of this timestamp on the time axis.
    fn as_f64(self) -> f64;

    /// Builds a timestamp from a numeric position, saturating at the bounds.
    fn from_f64(value: f64) -> Self;
}

///
/// A simulation timestamp in abstract time units.
///
/// Unlike a raw `f64` this type is totally ordered, since
/// NaN values are rejected at construction.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct SimTime(f64);

impl SimTime {
    /// The start of simulated time.
    pub const ZERO: SimTime = SimTime(0.0);
    /// The smallest representable timestamp.
    pub const MIN: SimTime = SimTime(f64::NEG_INFINITY);
    /// The largest representable timestamp.
    pub const MAX: SimTime = SimTime(f64::INFINITY);

    ///
    /// Creates a new timestamp. Negative zero is stored as zero.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN.
    ///
    #[must_use]
    pub fn new(time: f64) -> Self {
        assert!(!time.is_nan(), "SimTime must not be NaN");
        // -0.0 and 0.0 are the same instant
        Self(if time == 0.0 { 0.0 } else { time })
    }

    /// Returns the raw value.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Whether the timestamp is neither infinite nor NaN.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<SimTime> for f64 {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.0 + rhs.0)
    }
}

impl Add<f64> for SimTime {
    type Output = Self;

    fn add(self, rhs: f64) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, rhs: f64) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.0 - rhs.0)
    }
}

impl Zero for SimTime {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl Bounded for SimTime {
    fn min_value() -> Self {
        Self::MIN
    }

    fn max_value() -> Self {
        Self::MAX
    }
}

impl TimeLike for SimTime {
    fn as_f64(self) -> f64 {
        self.0
    }

    fn from_f64(value: f64) -> Self {
        Self::new(value)
    }
}

impl TimeLike for Duration {
    fn as_f64(self) -> f64 {
        self.as_secs_f64()
    }

    fn from_f64(value: f64) -> Self {
        if value <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
        }
    }
}

macro_rules! impl_time_like_int {
    ($($t:ty),*) => {
        $(
            impl TimeLike for $t {
                fn as_f64(self) -> f64 {
                    self.to_f64().unwrap_or(f64::MAX)
                }

                fn from_f64(value: f64) -> Self {
                    <$t as NumCast>::from(value).unwrap_or(if value <= 0.0 {
                        <$t as Bounded>::min_value()
                    } else {
                        <$t as Bounded>::max_value()
                    })
                }
            }
        )*
    };
}

impl_time_like_int!(u32, u64, i64, usize);
