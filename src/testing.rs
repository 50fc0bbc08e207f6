//! Simulated clock and recording peripherals for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::DeviceError;
use crate::peripherals::{
    AudioOutput, ButtonEvent, DisplayOutput, InputDevice, LightOutput, Peripherals, Rgb, STRIP_LEN,
};
use crate::status::{StatusClient, StatusReport};
use crate::tick::{TICKS_PERIOD, Tick};
use crate::time_provider::TimeSource;

pub const SIM_EPOCH_BASE: i64 = 1_700_000_000;

/// Clock whose sleeps advance time instantly. Clones share the same time.
#[derive(Clone)]
pub struct SimClock {
    elapsed_ms: Rc<Cell<u64>>,
    tick_start: Tick,
    epoch_base: i64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(Tick::from_raw(1_000))
    }

    pub fn starting_at(tick_start: Tick) -> Self {
        Self {
            elapsed_ms: Rc::new(Cell::new(0)),
            tick_start,
            epoch_base: SIM_EPOCH_BASE,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.elapsed_ms.set(self.elapsed_ms.get() + ms);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.get()
    }

    pub fn ticks_now(&self) -> Tick {
        let wrapped = self.elapsed_ms.get() % u64::from(TICKS_PERIOD);
        self.tick_start.add(wrapped as i64)
    }
}

impl TimeSource for SimClock {
    fn ticks(&self) -> Tick {
        self.ticks_now()
    }

    fn epoch_seconds(&self) -> i64 {
        self.epoch_base + (self.elapsed_ms.get() / 1_000) as i64
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

#[derive(Debug, Default)]
pub struct Recording {
    pub frames: Vec<String>,
    pub status: Vec<Rgb>,
    pub strip: [Rgb; STRIP_LEN],
    pub tones: Vec<u32>,
    pub playing: Option<u32>,
}

impl Recording {
    pub fn last_frame(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    pub fn count_frames(&self, text: &str) -> usize {
        self.frames.iter().filter(|frame| *frame == text).count()
    }
}

pub type SharedRecording = Rc<RefCell<Recording>>;

struct RecordingDisplay(SharedRecording);

impl DisplayOutput for RecordingDisplay {
    fn render(&mut self, text: &str) {
        self.0.borrow_mut().frames.push(text.to_string());
    }
}

struct RecordingLights(SharedRecording);

impl LightOutput for RecordingLights {
    fn set_status(&mut self, color: Rgb) {
        self.0.borrow_mut().status.push(color);
    }

    fn set_strip_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.0.borrow_mut().strip.get_mut(index) {
            *pixel = color;
        }
    }
}

struct RecordingAudio(SharedRecording);

impl AudioOutput for RecordingAudio {
    fn start(&mut self, frequency_hz: u32, _duty_cycle: f32) {
        let mut recording = self.0.borrow_mut();
        recording.tones.push(frequency_hz);
        recording.playing = Some(frequency_hz);
    }

    fn stop(&mut self) {
        self.0.borrow_mut().playing = None;
    }
}

/// Button events released once the simulated clock reaches their time.
#[derive(Clone)]
pub struct InputScript {
    clock: SimClock,
    pending: Rc<RefCell<Vec<(u64, ButtonEvent)>>>,
}

impl InputScript {
    pub fn at(&self, elapsed_ms: u64, event: ButtonEvent) {
        self.pending.borrow_mut().push((elapsed_ms, event));
    }
}

struct ScriptedInput(InputScript);

impl InputDevice for ScriptedInput {
    fn poll(&mut self) -> Vec<ButtonEvent> {
        let now = self.0.clock.elapsed_ms();
        let mut pending = self.0.pending.borrow_mut();
        let mut ready = Vec::new();
        pending.retain(|(at, event)| {
            if *at <= now {
                ready.push(*event);
                false
            } else {
                true
            }
        });
        ready
    }
}

pub fn sim_peripherals(clock: &SimClock) -> (Peripherals, SharedRecording, InputScript) {
    let recording = SharedRecording::default();
    let script = InputScript {
        clock: clock.clone(),
        pending: Rc::new(RefCell::new(Vec::new())),
    };
    let io = Peripherals {
        display: Box::new(RecordingDisplay(Rc::clone(&recording))),
        lights: Box::new(RecordingLights(Rc::clone(&recording))),
        audio: Box::new(RecordingAudio(Rc::clone(&recording))),
        input: Box::new(ScriptedInput(script.clone())),
        clock: Box::new(clock.clone()),
    };
    (io, recording, script)
}

/// Status API double: replies are consumed in order, then the fallback
/// repeats forever.
#[derive(Clone)]
pub struct ScriptedStatus {
    pub token: Rc<RefCell<Result<String, String>>>,
    pub replies: Rc<RefCell<VecDeque<Result<StatusReport, String>>>>,
    pub fallback: Rc<RefCell<StatusReport>>,
    pub queries: Rc<Cell<usize>>,
    pub token_requests: Rc<Cell<usize>>,
}

impl ScriptedStatus {
    pub fn new() -> Self {
        Self {
            token: Rc::new(RefCell::new(Ok("sim-token".to_string()))),
            replies: Rc::new(RefCell::new(VecDeque::new())),
            fallback: Rc::new(RefCell::new(StatusReport::Offline)),
            queries: Rc::new(Cell::new(0)),
            token_requests: Rc::new(Cell::new(0)),
        }
    }

    pub fn push(&self, reply: Result<StatusReport, String>) {
        self.replies.borrow_mut().push_back(reply);
    }

    pub fn set_fallback(&self, report: StatusReport) {
        *self.fallback.borrow_mut() = report;
    }
}

impl StatusClient for ScriptedStatus {
    fn fetch_token(&mut self) -> Result<String, DeviceError> {
        self.token_requests.set(self.token_requests.get() + 1);
        self.token.borrow().clone().map_err(DeviceError::token)
    }

    fn query(&mut self, _token: &str, _account: &str) -> Result<StatusReport, DeviceError> {
        self.queries.set(self.queries.get() + 1);
        match self.replies.borrow_mut().pop_front() {
            Some(reply) => reply.map_err(DeviceError::status),
            None => Ok(self.fallback.borrow().clone()),
        }
    }
}
