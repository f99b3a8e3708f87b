//! Hardware tick counts.

use core::fmt;
use core::time::Duration;

/// A number of hardware timer ticks.
///
/// Software timers count down in ticks, never in wall-clock time. Arithmetic
/// saturates at zero because a timer that is already due stays due.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u64);

impl Ticks {
    /// Zero ticks
    pub const ZERO: Self = Self(0);

    /// Maximum tick count
    pub const MAX: Self = Self(u64::MAX);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick count
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract, flooring at zero.
    pub const fn saturating_sub(self, other: Ticks) -> Ticks {
        Self(self.0.saturating_sub(other.0))
    }

    pub const fn saturating_add(self, other: Ticks) -> Ticks {
        Self(self.0.saturating_add(other.0))
    }

    /// Converts a duration into ticks of `resolution` each, rounding up so a
    /// timer never fires early.
    ///
    /// # Panics
    ///
    /// Panics if `resolution` is zero.
    pub fn from_duration(duration: Duration, resolution: Duration) -> Ticks {
        let res = resolution.as_nanos();
        assert!(res > 0, "timer resolution must be non-zero");
        let ticks = duration.as_nanos().div_ceil(res);
        Self(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Converts ticks of `resolution` each back into a duration.
    pub fn to_duration(self, resolution: Duration) -> Duration {
        let nanos = u128::from(self.0) * resolution.as_nanos();
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        Duration::new(secs, (nanos % 1_000_000_000) as u32)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}
