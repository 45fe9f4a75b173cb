//! talkboard library: board adaptation for a push-to-talk voice device.
//!
//! Binds an ESP32-C3 with an INMP441 microphone, a MAX98357A amplifier, an
//! optional SSD1306 OLED and a single button to the abstract capabilities a
//! voice application expects: an audio codec, a display and gesture input.
//!
//! All decision logic lives here, behind small hardware traits, and is
//! testable on any host with `cargo test`. The ESP-IDF firmware in
//! `firmware-std/` is a thin consumer that implements those traits with the
//! real I2C, I2S and GPIO drivers.
//!
//! - `board`: build-time pin map, sample rates, display and button constants.
//! - `bus`: opens the shared I2C control bus.
//! - `audio`, `resample`: the duplex I2S bridge and its rate reconciliation.
//! - `display`: probe-and-fallback panel resolution, no-op display.
//! - `button`, `interaction`: gesture recognition and push-to-talk dispatch.
//! - `context`: memoized capability accessors for the host application.
//! - `protocol`: board descriptor line reported to the host.

#![cfg_attr(not(test), no_std)]

pub mod audio;
pub mod board;
pub mod bus;
pub mod button;
pub mod context;
pub mod display;
pub mod error;
pub mod interaction;
pub mod protocol;
pub mod resample;
