//! Staged "code breaking" reveal played when a live session is detected.

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::peripherals::{Button, ButtonAction, Peripherals, Rgb, STRIP_LEN};

pub const REVEAL_TARGET: &str = "HERE WE GO  ";
pub const REVEAL_POSITIONS: [usize; 8] = [0, 1, 2, 3, 5, 6, 8, 9];
pub const SCRAMBLE_ALPHABET: &[u8] = b"ABCDEF0123456789";
pub const SCRAMBLE_MIN_MS: u64 = 4_000;
pub const SCRAMBLE_MAX_MS: u64 = 8_000;
pub const SCRAMBLE_FRAME_MS: u64 = 10;
pub const SCRAMBLE_TONE_HZ: (u32, u32) = (90, 250);
pub const ABORT_BUTTON: Button = Button::B;
pub const LIVE_BANNER: &str = "LIVE NOW ...";
pub const PROGRESS_COLORS: [Rgb; STRIP_LEN] =
    [Rgb::WHITE, Rgb::RED, Rgb::YELLOW, Rgb::GREEN, Rgb::BLUE];

const CONFIRM_HZ: u32 = 1_500;
const CONFIRM_MS: u64 = 500;
const FLOURISH_CYCLES: usize = 5;
const FLOURISH_HALF_MS: u64 = 500;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum RevealSpecError {
    #[error("reveal position {position} is outside a {len} character target")]
    OutOfRange { position: usize, len: usize },
    #[error("reveal position {0} is listed twice")]
    Duplicate(usize),
}

/// Target text and the order in which its positions get revealed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RevealSpec {
    target: Vec<char>,
    reveal_order: Vec<usize>,
}

impl RevealSpec {
    pub fn new(target: &str, reveal_order: Vec<usize>) -> Result<Self, RevealSpecError> {
        let target: Vec<char> = target.chars().collect();
        let mut seen = vec![false; target.len()];
        for &position in &reveal_order {
            let Some(slot) = seen.get_mut(position) else {
                return Err(RevealSpecError::OutOfRange {
                    position,
                    len: target.len(),
                });
            };
            if *slot {
                return Err(RevealSpecError::Duplicate(position));
            }
            *slot = true;
        }
        Ok(Self {
            target,
            reveal_order,
        })
    }

    pub fn shuffled<R: Rng + ?Sized>(
        target: &str,
        positions: &[usize],
        rng: &mut R,
    ) -> Result<Self, RevealSpecError> {
        let mut order = positions.to_vec();
        order.shuffle(rng);
        Self::new(target, order)
    }

    #[cfg(test)]
    pub fn reveal_order(&self) -> &[usize] {
        &self.reveal_order
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RevealOutcome {
    Completed,
    Aborted { revealed: usize },
}

/// Strip pixel lit after `completed` of `total` positions are revealed.
pub fn progress_pixel(completed: usize, total: usize) -> usize {
    if total == 0 {
        return 1;
    }
    let remaining = total.saturating_sub(completed);
    let scaled = (remaining * 4).div_ceil(total);
    (scaled + 1).min(STRIP_LEN - 1)
}

pub struct RevealAnimation<'a, R: Rng + ?Sized> {
    spec: &'a RevealSpec,
    rng: &'a mut R,
    shown: Vec<char>,
    revealed: usize,
}

impl<'a, R: Rng + ?Sized> RevealAnimation<'a, R> {
    pub fn new(spec: &'a RevealSpec, rng: &'a mut R) -> Self {
        Self {
            spec,
            rng,
            shown: vec![' '; spec.target.len()],
            revealed: 0,
        }
    }

    #[cfg(test)]
    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn shown(&self) -> String {
        self.shown.iter().collect()
    }

    /// Blocks until every position is revealed or the abort button is
    /// released during scrambling. The closing flourish cannot be aborted.
    pub fn run(&mut self, io: &mut Peripherals) -> RevealOutcome {
        io.lights.fill_strip(Rgb::BLACK);
        io.text("");

        let total = self.spec.reveal_order.len();
        while self.revealed < total {
            let scramble_ms = self.rng.gen_range(SCRAMBLE_MIN_MS..=SCRAMBLE_MAX_MS);
            let until = io.clock.ticks().add(scramble_ms as i64);
            while io.clock.ticks().is_before(until) {
                if abort_requested(io) {
                    log::info!("reveal aborted after {} positions", self.revealed);
                    io.text("ABORT");
                    io.beep(CONFIRM_HZ, CONFIRM_MS, 0.5);
                    return RevealOutcome::Aborted {
                        revealed: self.revealed,
                    };
                }
                let (low, high) = SCRAMBLE_TONE_HZ;
                io.tone_continuous(self.rng.gen_range(low..=high), 0.5);
                self.scramble_pending();
                io.text(&self.shown());
                io.pause(SCRAMBLE_FRAME_MS);
            }
            self.commit_next();
            io.text(&self.shown());

            let pixel = progress_pixel(self.revealed, total);
            io.lights.fill_strip(Rgb::BLACK);
            io.lights.set_strip_pixel(pixel, PROGRESS_COLORS[pixel]);
            io.beep(CONFIRM_HZ, CONFIRM_MS, 0.5);
        }

        self.flourish(io);
        RevealOutcome::Completed
    }

    fn scramble_pending(&mut self) {
        for &position in &self.spec.reveal_order[self.revealed..] {
            let code = SCRAMBLE_ALPHABET[self.rng.gen_range(0..SCRAMBLE_ALPHABET.len())];
            self.shown[position] = char::from(code);
        }
    }

    fn commit_next(&mut self) {
        let position = self.spec.reveal_order[self.revealed];
        self.shown[position] = self.spec.target[position];
        self.revealed += 1;
    }

    fn flourish(&mut self, io: &mut Peripherals) {
        let solved = self.shown();
        io.lights.fill_strip(Rgb::BLACK);
        io.lights.set_strip_pixel(0, PROGRESS_COLORS[0]);
        io.pause(2 * FLOURISH_HALF_MS);
        for _ in 0..FLOURISH_CYCLES {
            io.lights.fill_strip(Rgb::BLACK);
            io.text("");
            io.pause(FLOURISH_HALF_MS);
            io.lights.set_strip_pixel(0, PROGRESS_COLORS[0]);
            io.text(&solved);
            io.beep(CONFIRM_HZ, CONFIRM_MS, 0.5);
        }
        for _ in 0..FLOURISH_CYCLES {
            io.text("");
            io.pause(FLOURISH_HALF_MS);
            io.text(LIVE_BANNER);
            io.pause(FLOURISH_HALF_MS);
        }
    }
}

fn abort_requested(io: &mut Peripherals) -> bool {
    io.input
        .poll()
        .iter()
        .any(|event| event.button == ABORT_BUTTON && event.action == ButtonAction::Released)
}
