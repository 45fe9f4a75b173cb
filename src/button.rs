//! Push-to-talk button: debouncing and gesture recognition.
//!
//! The button is sampled on a fixed period. A level change is accepted once
//! it has been seen on `debounce_ticks` consecutive samples. Accepted edges
//! become gestures:
//!
//! - press edge → `PressDown`
//! - release edge → `PressUp`, then `Click` if the press was short
//!
//! The recognizer only reports gestures; dispatching them is the job of
//! `interaction::InteractionController`.

use embedded_hal::digital::InputPin;
use heapless::Vec;

use crate::board;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGesture {
    PressDown,
    PressUp,
    /// A complete short press-release cycle
    Click,
}

impl ButtonGesture {
    pub const fn name(self) -> &'static str {
        match self {
            ButtonGesture::PressDown => "press-down",
            ButtonGesture::PressUp => "press-up",
            ButtonGesture::Click => "click",
        }
    }
}

impl core::fmt::Display for ButtonGesture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Gestures produced by one sample, in emission order.
pub type Gestures = Vec<ButtonGesture, 2>;

pub struct GestureRecognizer {
    debounce_ticks: u8,
    short_press_ms: u32,
    pressed: bool,
    pending: u8,
    pressed_at: u32,
}

impl GestureRecognizer {
    pub const fn new(debounce_ticks: u8, short_press_ms: u32) -> Self {
        Self {
            debounce_ticks,
            short_press_ms,
            pressed: false,
            pending: 0,
            pressed_at: 0,
        }
    }

    pub const fn for_board() -> Self {
        Self::new(board::BUTTON_DEBOUNCE_TICKS, board::BUTTON_SHORT_PRESS_MS)
    }

    /// Debounced state.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Feed one sample of the logical (already polarity-corrected) level.
    pub fn update(&mut self, pressed: bool, now_ms: u32) -> Gestures {
        let mut out = Gestures::new();

        if pressed == self.pressed {
            self.pending = 0;
            return out;
        }

        self.pending += 1;
        if self.pending < self.debounce_ticks {
            return out;
        }
        self.pending = 0;
        self.pressed = pressed;

        if pressed {
            self.pressed_at = now_ms;
            let _ = out.push(ButtonGesture::PressDown);
        } else {
            let held = now_ms.wrapping_sub(self.pressed_at);
            let _ = out.push(ButtonGesture::PressUp);
            if held <= self.short_press_ms {
                let _ = out.push(ButtonGesture::Click);
            }
        }
        out
    }
}

/// Reads a button pin and feeds the recognizer.
pub struct ButtonSampler<PIN> {
    pin: PIN,
    recognizer: GestureRecognizer,
}

impl<PIN: InputPin> ButtonSampler<PIN> {
    /// Button to ground with a pull-up: low means pressed.
    pub fn active_low(pin: PIN, recognizer: GestureRecognizer) -> Self {
        Self { pin, recognizer }
    }

    /// Sample the pin once. A failed read repeats the last debounced level.
    pub fn poll(&mut self, now_ms: u32) -> Gestures {
        let pressed = match self.pin.is_low() {
            Ok(low) => low,
            Err(_) => self.recognizer.is_pressed(),
        };
        self.recognizer.update(pressed, now_ms)
    }
}
