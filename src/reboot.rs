use crate::peripherals::{Peripherals, Rgb};
use crate::tick::Tick;

pub const COUNTDOWN_STEP_MS: u64 = 100;
pub const MANUAL_REBOOT_DELAY_S: u32 = 10;
pub const SCHEDULED_REBOOT_DELAY_S: u32 = 5;

/// Why the device is about to reset. Returned all the way up to `main`,
/// which performs the actual restart.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Restart {
    pub reason: String,
}

/// Periodic maintenance reset, actionable only while offline.
#[derive(Debug, Clone)]
pub struct RebootScheduler {
    delay_ms: u32,
    deadline: Tick,
}

impl RebootScheduler {
    pub fn new(now: Tick, delay_ms: u32) -> Self {
        let mut scheduler = Self {
            delay_ms,
            deadline: now,
        };
        scheduler.schedule(now);
        scheduler
    }

    pub fn schedule(&mut self, now: Tick) -> Tick {
        self.deadline = now.add(i64::from(self.delay_ms));
        self.deadline
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    /// A deadline that passes while the device is busy is held at `now`, so
    /// it stays comparable however long the busy stretch lasts.
    pub fn due(&mut self, now: Tick, offline: bool) -> bool {
        if now.is_before(self.deadline) {
            return false;
        }
        if offline {
            return true;
        }
        self.deadline = now;
        false
    }
}

/// Show a descending countdown with warning colours, then hand back the
/// restart request. Nothing polls input here, so it cannot be cancelled.
pub fn execute(io: &mut Peripherals, delay_s: u32, reason: impl Into<String>) -> Restart {
    let reason = reason.into();
    log::warn!("restarting in {delay_s}s: {reason}");
    io.lights.set_status(Rgb::RED);
    io.lights.fill_strip(Rgb::RED);

    let boot_at = io.clock.ticks().add(i64::from(delay_s) * 1_000);
    loop {
        let remaining_ms = boot_at.diff(io.clock.ticks()).max(0);
        let remaining_s = (remaining_ms + 999) / 1_000;
        io.text_padded(&format!("REBOOT {remaining_s:02}s"));
        if remaining_ms == 0 {
            break;
        }
        io.pause(COUNTDOWN_STEP_MS);
    }
    Restart { reason }
}
