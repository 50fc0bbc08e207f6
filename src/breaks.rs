//! Rest-break reminders during a live session.
//!
//! A schedule holds a break deadline and five notices at 5, 4, 3, 2 and 1
//! minutes before it, one per strip pixel. Each notice cue fires once per
//! schedule; reaching the deadline shows the break prompt and starts a new
//! schedule.

use crate::peripherals::{Peripherals, Rgb, STRIP_LEN, color_wheel};
use crate::tick::Tick;

pub const NOTICE_COUNT: usize = STRIP_LEN;
pub const NOTICE_SPACING_MS: i64 = 60_000;
pub const REACHED_COLOR: Rgb = Rgb::GREEN;
pub const WHEEL_PIXEL_SPACING: i32 = 5;
pub const BREAK_PAUSE_MS: u64 = 5_000;

const NOTICE_CUE_HZ: u32 = 440;
const NOTICE_CUE_MS: u64 = 50;
const BREAK_CUE_HZ: u32 = 1_500;
const BREAK_CUE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct BreakSchedule {
    break_delay_ms: u32,
    deadline: Tick,
    notice_ticks: [Tick; NOTICE_COUNT],
    notice_fired: [bool; NOTICE_COUNT],
}

/// What the strip and speaker should do for one loop iteration.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BreakFrame {
    pub level: Option<usize>,
    pub fire_cue: bool,
    pub strip: [Rgb; STRIP_LEN],
    pub deadline_reached: bool,
}

impl BreakSchedule {
    pub fn new(now: Tick, break_delay_ms: u32) -> Self {
        let mut schedule = Self {
            break_delay_ms,
            deadline: now,
            notice_ticks: [now; NOTICE_COUNT],
            notice_fired: [false; NOTICE_COUNT],
        };
        schedule.initialize(now);
        schedule
    }

    pub fn initialize(&mut self, now: Tick) {
        self.deadline = now.add(i64::from(self.break_delay_ms));
        for (index, notice) in self.notice_ticks.iter_mut().enumerate() {
            let minutes_left = (NOTICE_COUNT - index) as i64;
            *notice = self.deadline.add(-minutes_left * NOTICE_SPACING_MS);
        }
        self.notice_fired = [false; NOTICE_COUNT];
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    #[cfg(test)]
    pub fn notice_ticks(&self) -> &[Tick; NOTICE_COUNT] {
        &self.notice_ticks
    }

    #[cfg(test)]
    pub fn notice_fired(&self) -> &[bool; NOTICE_COUNT] {
        &self.notice_fired
    }

    /// Highest notice whose threshold has been reached.
    pub fn current_notice_level(&self, now: Tick) -> Option<usize> {
        self.notice_ticks
            .iter()
            .rposition(|notice| now.is_at_or_after(*notice))
    }

    /// Marks `level` as entered; true only the first time.
    pub fn enter_level(&mut self, level: usize) -> bool {
        match self.notice_fired.get_mut(level) {
            Some(fired) if !*fired => {
                *fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_deadline_reached(&self, now: Tick) -> bool {
        now.is_at_or_after(self.deadline)
    }

    pub fn evaluate(&mut self, now: Tick, wheel_offset: i32) -> BreakFrame {
        let level = self.current_notice_level(now);
        let fire_cue = level.is_some_and(|level| self.enter_level(level));
        BreakFrame {
            level,
            fire_cue,
            strip: indicator_strip(level, wheel_offset),
            deadline_reached: self.is_deadline_reached(now),
        }
    }

    /// Renders one iteration of the reminder and handles the break prompt.
    pub fn drive(&mut self, io: &mut Peripherals, now: Tick, wheel_offset: i32) {
        let frame = self.evaluate(now, wheel_offset);
        for (index, color) in frame.strip.iter().enumerate() {
            io.lights.set_strip_pixel(index, *color);
        }
        if frame.fire_cue {
            if let Some(level) = frame.level {
                log::info!("break notice level {level}");
            }
            io.beep(NOTICE_CUE_HZ, NOTICE_CUE_MS, 0.5);
        }
        if frame.deadline_reached {
            self.on_deadline_reached(io);
        }
    }

    /// Break prompt, then a fresh schedule anchored after the pause.
    pub fn on_deadline_reached(&mut self, io: &mut Peripherals) {
        log::info!("break deadline reached");
        io.text("TAKE A BREAK");
        io.lights.fill_strip(Rgb::BLACK);
        io.beep(BREAK_CUE_HZ, BREAK_CUE_MS, 0.5);
        io.pause(BREAK_PAUSE_MS);
        let resumed = io.clock.ticks();
        self.initialize(resumed);
    }
}

/// Pixels below the level are off, the level itself shows the reached
/// colour, and pixels above it keep cycling the color wheel.
pub fn indicator_strip(level: Option<usize>, wheel_offset: i32) -> [Rgb; STRIP_LEN] {
    let mut strip = [Rgb::BLACK; STRIP_LEN];
    for (index, pixel) in strip.iter_mut().enumerate() {
        let wheel = color_wheel(wheel_offset + index as i32 * WHEEL_PIXEL_SPACING);
        *pixel = match level {
            None => wheel,
            Some(level) if index < level => Rgb::BLACK,
            Some(level) if index == level => REACHED_COLOR,
            Some(_) => wheel,
        };
    }
    strip
}
