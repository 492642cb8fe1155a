//! Timestamps shared by the buffer, the messages and the bridge.
//!
//! Internally every instant is a count of nanoseconds since the Unix epoch,
//! matching the `timestamp_ns` columns of the EuRoC dataset. Messages carry the
//! split `sec`/`nanosec` form ([`Stamp`]).

use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// An instant in nanoseconds since the Unix epoch.
///
/// `Time::ZERO` doubles as the "latest available data" sentinel when passed to
/// a transform lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    pub const ZERO: Time = Time(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Negative and non-finite inputs clamp to `Time::ZERO`.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * NANOS_PER_SEC as f64).round() as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 * 1e-9
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    pub fn saturating_sub(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(nanos))
    }

    /// Elapsed time from `earlier` to `self`, zero if `earlier` is later.
    pub fn duration_since(self, earlier: Time) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09}",
            self.0 / NANOS_PER_SEC,
            self.0 % NANOS_PER_SEC
        )
    }
}

/// Converts seconds to a `Duration`, saturating instead of panicking.
///
/// Negative and NaN inputs give `Duration::ZERO`, values too large for a
/// `Duration` (including infinity) give `Duration::MAX`.
pub fn duration_from_secs_saturating(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Split seconds/nanoseconds stamp as carried in message headers.
///
/// `sec` is 64 bits wide so that every [`Time`] converts without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    /// The exact [`Time`] of this stamp, or `None` when it lies before the
    /// epoch or past the last representable `Time`.
    pub fn checked_time(self) -> Option<Time> {
        let sec = u64::try_from(self.sec).ok()?;
        sec.checked_mul(NANOS_PER_SEC)?
            .checked_add(u64::from(self.nanosec))
            .map(Time)
    }
}

impl From<Time> for Stamp {
    fn from(time: Time) -> Self {
        Self {
            sec: (time.0 / NANOS_PER_SEC) as i64,
            nanosec: (time.0 % NANOS_PER_SEC) as u32,
        }
    }
}

/// Negative stamps clamp to `Time::ZERO`, stamps past the range of `Time`
/// saturate. Use [`Stamp::checked_time`] to detect either case.
impl From<Stamp> for Time {
    fn from(stamp: Stamp) -> Self {
        if stamp.sec < 0 {
            return Time::ZERO;
        }
        stamp.checked_time().unwrap_or(Time(u64::MAX))
    }
}
