//! Workstation stand-ins for the device drivers.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use super::{
    AudioOutput, Button, ButtonAction, ButtonEvent, DisplayOutput, InputDevice, LightOutput, Rgb,
    STRIP_LEN,
};

#[derive(Default)]
pub struct ConsoleDisplay {
    last_text: Option<String>,
}

impl DisplayOutput for ConsoleDisplay {
    fn render(&mut self, text: &str) {
        if self.last_text.as_deref() == Some(text) {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\r[{text:<12}]");
        let _ = stdout.flush();
        self.last_text = Some(text.to_string());
    }
}

#[derive(Default)]
pub struct ConsoleLights {
    status: Rgb,
    strip: [Rgb; STRIP_LEN],
}

impl LightOutput for ConsoleLights {
    fn set_status(&mut self, color: Rgb) {
        if self.status != color {
            log::debug!("status pixel -> {color:?}");
            self.status = color;
        }
    }

    fn set_strip_pixel(&mut self, index: usize, color: Rgb) {
        let Some(pixel) = self.strip.get_mut(index) else {
            log::warn!("strip index {index} out of range");
            return;
        };
        if *pixel != color {
            *pixel = color;
            log::trace!("strip -> {:?}", self.strip);
        }
    }
}

#[derive(Default)]
pub struct ConsoleAudio {
    playing: Option<u32>,
}

impl AudioOutput for ConsoleAudio {
    fn start(&mut self, frequency_hz: u32, duty_cycle: f32) {
        log::trace!("tone {frequency_hz} Hz duty {duty_cycle:.2}");
        self.playing = Some(frequency_hz);
    }

    fn stop(&mut self) {
        if self.playing.take().is_some() {
            log::trace!("tone off");
        }
    }
}

/// Reads button gestures from stdin lines on a helper thread. Lower-case
/// `a`..`d` is a short press, upper-case `A`..`D` a long press.
pub struct StdinButtons {
    events: Receiver<ButtonEvent>,
}

impl StdinButtons {
    pub fn spawn() -> Self {
        let (sender, events) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                for event in parse_gesture(line.trim()) {
                    if sender.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        Self { events }
    }
}

impl InputDevice for StdinButtons {
    fn poll(&mut self) -> Vec<ButtonEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

fn parse_gesture(line: &str) -> Vec<ButtonEvent> {
    let mut chars = line.chars();
    let (Some(key), None) = (chars.next(), chars.next()) else {
        return Vec::new();
    };
    let button = match key.to_ascii_lowercase() {
        'a' => Button::A,
        'b' => Button::B,
        'c' => Button::C,
        'd' => Button::D,
        _ => return Vec::new(),
    };
    if key.is_ascii_uppercase() {
        vec![
            ButtonEvent::new(button, ButtonAction::Pressed),
            ButtonEvent::new(button, ButtonAction::LongPress),
            ButtonEvent::new(button, ButtonAction::Released),
        ]
    } else {
        vec![
            ButtonEvent::new(button, ButtonAction::Pressed),
            ButtonEvent::new(button, ButtonAction::Released),
        ]
    }
}
