//! Millisecond tick arithmetic over a wrapping counter.
//!
//! Ticks wrap at [`TICKS_PERIOD`]. Two ticks are only comparable while they
//! are less than half a period apart, so every comparison goes through the
//! signed difference instead of plain subtraction.

use std::fmt;

pub const TICKS_PERIOD: u32 = 1 << 29;
pub const TICKS_MAX: u32 = TICKS_PERIOD - 1;
pub const TICKS_HALF_PERIOD: u32 = TICKS_PERIOD / 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Tick(u32);

impl Tick {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & TICKS_MAX)
    }

    #[cfg(test)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Offset by `delta_ms`, which may be negative. `delta_ms` must stay within
    /// half a period for the result to remain comparable with `self`.
    pub fn add(self, delta_ms: i64) -> Self {
        let period = i64::from(TICKS_PERIOD);
        let wrapped = (i64::from(self.0) + delta_ms).rem_euclid(period);
        Self(wrapped as u32)
    }

    /// Signed `self - earlier` in milliseconds, in `[-period/2, period/2)`.
    pub fn diff(self, earlier: Tick) -> i64 {
        let period = i64::from(TICKS_PERIOD);
        let half = i64::from(TICKS_HALF_PERIOD);
        (i64::from(self.0) - i64::from(earlier.0) + half).rem_euclid(period) - half
    }

    pub fn is_before(self, other: Tick) -> bool {
        self.diff(other) < 0
    }

    pub fn is_at_or_after(self, other: Tick) -> bool {
        self.diff(other) >= 0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
