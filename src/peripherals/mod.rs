//! Output and input seams around the device hardware.
//!
//! Drivers only render; every timed effect (tone length, pauses) is built on
//! top of them here and blocks through the shared [`TimeSource`].

pub mod console;

use crate::time_provider::TimeSource;

pub const DISPLAY_WIDTH: usize = 12;
pub const STRIP_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const MAGENTA: Rgb = Rgb(255, 0, 255);
    pub const CYAN: Rgb = Rgb(0, 255, 255);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Classic 256 step RGB wheel; any integer position is accepted.
pub fn color_wheel(position: i32) -> Rgb {
    let pos = position.rem_euclid(255) as u8;
    if pos < 85 {
        Rgb(255 - pos * 3, 0, pos * 3)
    } else if pos < 170 {
        let pos = pos - 85;
        Rgb(0, pos * 3, 255 - pos * 3)
    } else {
        let pos = pos - 170;
        Rgb(pos * 3, 255 - pos * 3, 0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Button {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ButtonAction {
    Pressed,
    Released,
    LongPress,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ButtonEvent {
    pub button: Button,
    pub action: ButtonAction,
}

impl ButtonEvent {
    pub fn new(button: Button, action: ButtonAction) -> Self {
        Self { button, action }
    }
}

pub trait DisplayOutput {
    /// Clear the display and draw `text`.
    fn render(&mut self, text: &str);
}

pub trait LightOutput {
    fn set_status(&mut self, color: Rgb);
    fn set_strip_pixel(&mut self, index: usize, color: Rgb);

    fn fill_strip(&mut self, color: Rgb) {
        for index in 0..STRIP_LEN {
            self.set_strip_pixel(index, color);
        }
    }
}

pub trait AudioOutput {
    /// Start a tone that keeps sounding until `stop` or the next `start`.
    fn start(&mut self, frequency_hz: u32, duty_cycle: f32);
    fn stop(&mut self);
}

/// Debounced buttons; long-press threshold is the driver's concern.
pub trait InputDevice {
    fn poll(&mut self) -> Vec<ButtonEvent>;
}

pub struct Peripherals {
    pub display: Box<dyn DisplayOutput>,
    pub lights: Box<dyn LightOutput>,
    pub audio: Box<dyn AudioOutput>,
    pub input: Box<dyn InputDevice>,
    pub clock: Box<dyn TimeSource>,
}

impl Peripherals {
    pub fn text(&mut self, text: &str) {
        self.display.render(text);
    }

    /// Left-align `text` by padding with spaces, cutting anything past the
    /// display width.
    pub fn text_padded(&mut self, text: &str) {
        let padded = pad_to_display(text);
        self.display.render(&padded);
    }

    pub fn beep(&mut self, frequency_hz: u32, duration_ms: u64, duty_cycle: f32) {
        self.audio.start(frequency_hz, duty_cycle);
        self.clock.sleep_ms(duration_ms);
        self.audio.stop();
    }

    pub fn tone_continuous(&mut self, frequency_hz: u32, duty_cycle: f32) {
        self.audio.start(frequency_hz, duty_cycle);
    }

    pub fn pause(&self, ms: u64) {
        self.clock.sleep_ms(ms);
    }
}

pub fn pad_to_display(text: &str) -> String {
    format!("{text:<width$}", width = DISPLAY_WIDTH)
        .chars()
        .take(DISPLAY_WIDTH)
        .collect()
}
