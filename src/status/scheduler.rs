use crate::tick::{TICKS_HALF_PERIOD, Tick};

pub const DEFAULT_POLL_INTERVAL_MS: u32 = 63_000;
/// Longest interval whose seed, two intervals back, stays inside the
/// comparable half period.
pub const MAX_POLL_INTERVAL_MS: u32 = TICKS_HALF_PERIOD / 2 - 1;

/// True once strictly more than `interval_ms` has passed since `last_poll`.
pub fn poll_due(now: Tick, last_poll: Tick, interval_ms: u32) -> bool {
    now.diff(last_poll) > i64::from(interval_ms)
}

/// Gates how often the status API is queried.
#[derive(Debug, Clone)]
pub struct StatusScheduler {
    interval_ms: u32,
    last_poll: Tick,
}

impl StatusScheduler {
    pub fn new(now: Tick, interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_poll: seeded_last_poll(now, interval_ms),
        }
    }

    pub fn is_due(&self, now: Tick) -> bool {
        poll_due(now, self.last_poll, self.interval_ms)
    }

    pub fn mark_polled(&mut self, now: Tick) {
        self.last_poll = now;
    }

    /// Push the last poll back far enough that the next check fires.
    pub fn force_next(&mut self, now: Tick) {
        self.last_poll = seeded_last_poll(now, self.interval_ms);
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

fn seeded_last_poll(now: Tick, interval_ms: u32) -> Tick {
    let rewind = (2 * i64::from(interval_ms) + 1).min(i64::from(TICKS_HALF_PERIOD) - 1);
    now.add(-rewind)
}
