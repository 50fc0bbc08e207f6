use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Utc};

use crate::error::DeviceError;
use crate::tick::{TICKS_PERIOD, Tick};

/// Earliest calendar year a synchronised wall clock can report.
pub const MIN_SYNCED_YEAR: i32 = 2023;

/// Ticks start this far before the wrap point so wraparound is exercised
/// about a minute after boot instead of days later.
pub const TICKS_BOOT_OFFSET: u32 = TICKS_PERIOD - 65_536;

/// Monotonic tick counter plus wall clock. All timed effects block through
/// `sleep_ms` so a simulated source can advance time without waiting.
pub trait TimeSource {
    fn ticks(&self) -> Tick;
    fn epoch_seconds(&self) -> i64;
    fn sleep_ms(&self, ms: u64);

    fn check_synchronized(&self) -> Result<(), DeviceError> {
        validate_wall_clock(self.epoch_seconds())
    }
}

pub fn validate_wall_clock(unix_seconds: i64) -> Result<(), DeviceError> {
    let Some(wall) = DateTime::<Utc>::from_timestamp(unix_seconds, 0) else {
        return Err(DeviceError::ClockSync(format!(
            "wall clock value {unix_seconds} is out of range"
        )));
    };
    if wall.year() < MIN_SYNCED_YEAR {
        return Err(DeviceError::ClockSync(format!(
            "wall clock reads {} which predates {MIN_SYNCED_YEAR}; clock is not set",
            wall.format("%Y-%m-%dT%H:%M:%SZ")
        )));
    }
    Ok(())
}

pub struct SystemTimeSource {
    monotonic_anchor: Instant,
    tick_anchor: Tick,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::with_tick_start(Tick::from_raw(TICKS_BOOT_OFFSET))
    }

    pub fn with_tick_start(tick_anchor: Tick) -> Self {
        Self {
            monotonic_anchor: Instant::now(),
            tick_anchor,
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn ticks(&self) -> Tick {
        let elapsed_ms = self.monotonic_anchor.elapsed().as_millis();
        let wrapped = (elapsed_ms % u128::from(TICKS_PERIOD)) as i64;
        self.tick_anchor.add(wrapped)
    }

    fn epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}
