//! Talkboard: ESP-IDF std firmware
//!
//! Brings the board up in dependency order (control bus, display probe,
//! duplex audio), then runs two threads: a button thread that samples the
//! push-to-talk button every few milliseconds and dispatches gestures, and
//! the application loop on the main thread that consumes the resulting
//! session commands through a bounded channel.

mod app;
mod audio;
mod bus;
mod panel;

use std::sync::atomic::AtomicU8;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use static_cell::StaticCell;

use talkboard::board;
use talkboard::bus::{init_bus, BusConfig};
use talkboard::button::{ButtonSampler, GestureRecognizer};
use talkboard::context::BoardContext;
use talkboard::display::Display;
use talkboard::interaction::{DeviceState, InteractionController, SessionCommand};
use talkboard::protocol::{DeviceMessage, VERSION};

use app::{App, AppHost};
use audio::EspI2s;
use bus::EspBusOpener;
use panel::EspPanelProbe;

/// Shared I2C bus, lent to one panel candidate at a time
static I2C_BUS: StaticCell<Mutex<I2cDriver<'static>>> = StaticCell::new();

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("Talkboard v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // ── Control bus (must precede the display probe) ────────────────

    let opener = EspBusOpener {
        i2c: peripherals.i2c0,
        sda: pins.gpio8,
        scl: pins.gpio9,
    };
    let i2c = init_bus(opener, &BusConfig::for_board()).inspect_err(|e| log::error!("{}", e))?;
    let probe = EspPanelProbe::new(I2C_BUS.init(Mutex::new(i2c)));

    // ── Board context ───────────────────────────────────────────────

    let i2s = EspI2s {
        i2s: peripherals.i2s0,
        bclk: pins.gpio5,
        ws: pins.gpio6,
        dout: pins.gpio7,
        din: pins.gpio4,
    };
    let mut ctx = BoardContext::for_board(i2s, probe)?;

    // No audio means no product: claim now and halt on failure
    ctx.audio_codec().inspect_err(|e| log::error!("{}", e))?;
    ctx.display().set_status("Starting");
    app::emit(&ctx.board_info());

    // ── Button thread ───────────────────────────────────────────────

    let state = Arc::new(AtomicU8::new(DeviceState::Starting.to_u8()));
    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<SessionCommand>(4);
    let host = AppHost::new(state.clone(), cmd_tx);

    let mut button = PinDriver::input(pins.gpio3)?;
    button.set_pull(Pull::Up)?;
    let sampler = ButtonSampler::active_low(button, GestureRecognizer::for_board());

    thread::Builder::new()
        .name("button".into())
        .stack_size(4096)
        .spawn(move || {
            button_thread(sampler, host);
        })?;
    log::info!("Button thread spawned (GPIO{})", ctx.pins().button);

    // ── Application loop (main thread) ─────────────────────────

    App::new(ctx, state, cmd_rx).run()
}

// ── Button thread ────────────────────────────────────────────────────

fn button_thread<PIN: InputPin>(mut sampler: ButtonSampler<PIN>, host: AppHost) {
    let start = Instant::now();
    let period = Duration::from_millis(board::BUTTON_POLL_MS as u64);

    loop {
        let now = (start.elapsed().as_millis() & 0xFFFF_FFFF) as u32;
        for gesture in sampler.poll(now) {
            let command = InteractionController::dispatch(&host, gesture);
            app::emit(&DeviceMessage::Gesture {
                gesture: gesture.name(),
                command: command.map(SessionCommand::name),
                ts: now,
            });
        }
        thread::sleep(period);
    }
}
