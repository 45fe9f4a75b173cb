//! Minimal host application on top of the board context.
//!
//! Owns the lifecycle state and consumes session commands queued by the
//! button thread. While listening it meters the microphone; on release it
//! plays a short acknowledgement tone and reports the peak level.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use talkboard::audio::{AudioCodec, DuplexPeripheral};
use talkboard::context::BoardContext;
use talkboard::display::{ChatRole, Display, PanelProbe};
use talkboard::interaction::{DeviceState, Host, SessionCommand};
use talkboard::protocol::{self, DeviceMessage};

/// Clicks during this window after boot enter config mode
const STARTUP_WINDOW: Duration = Duration::from_secs(3);
const IDLE_POLL: Duration = Duration::from_millis(20);
/// 20 ms of input per capture
const FRAME_SAMPLES: usize = 320;
const TONE_HZ: u32 = 880;
const TONE_MS: u32 = 120;

/// Log an NDJSON status line.
pub fn emit(msg: &DeviceMessage) {
    if let Some(line) = protocol::to_line(msg) {
        if let Ok(s) = std::str::from_utf8(&line) {
            log::info!("{}", s.trim_end());
        }
    }
}

// ── Host handle given to the button thread ──────────────────────────

pub struct AppHost {
    state: Arc<AtomicU8>,
    commands: SyncSender<SessionCommand>,
}

impl AppHost {
    pub fn new(state: Arc<AtomicU8>, commands: SyncSender<SessionCommand>) -> Self {
        Self { state, commands }
    }

    fn send(&self, cmd: SessionCommand) {
        if self.commands.try_send(cmd).is_err() {
            log::warn!("Command queue full, dropped {}", cmd.name());
        }
    }
}

impl Host for AppHost {
    fn device_state(&self) -> DeviceState {
        DeviceState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn start_listening(&self) {
        self.send(SessionCommand::StartListening);
    }

    fn stop_listening(&self) {
        self.send(SessionCommand::StopListening);
    }

    fn enter_config_mode(&self) {
        self.send(SessionCommand::EnterConfigMode);
    }
}

// ── Application loop ────────────────────────────────────────────────

pub struct App<A, P>
where
    A: DuplexPeripheral,
    P: PanelProbe,
{
    ctx: BoardContext<A, P>,
    state: Arc<AtomicU8>,
    commands: Receiver<SessionCommand>,
    peak: i16,
}

impl<A, P> App<A, P>
where
    A: DuplexPeripheral,
    P: PanelProbe,
{
    pub fn new(ctx: BoardContext<A, P>, state: Arc<AtomicU8>, commands: Receiver<SessionCommand>) -> Self {
        Self {
            ctx,
            state,
            commands,
            peak: 0,
        }
    }

    fn state(&self) -> DeviceState {
        DeviceState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&mut self, state: DeviceState) {
        let prev = self.state.swap(state.to_u8(), Ordering::Relaxed);
        if prev == state.to_u8() {
            return;
        }
        log::info!("State: {} -> {}", DeviceState::from_u8(prev), state);
        emit(&DeviceMessage::State { state: state.name() });
        self.ctx.display().set_status(status_text(state));
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        let boot = Instant::now();
        self.set_state(DeviceState::Starting);
        self.ctx.audio_codec()?.enable_input(false);

        loop {
            let timeout = if self.state() == DeviceState::Listening {
                Duration::ZERO
            } else {
                IDLE_POLL
            };
            match self.commands.recv_timeout(timeout) {
                Ok(cmd) => self.handle(cmd)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    anyhow::bail!("button thread exited");
                }
            }

            if self.state() == DeviceState::Starting && boot.elapsed() >= STARTUP_WINDOW {
                self.set_state(DeviceState::Idle);
            }
            if self.state() == DeviceState::Listening {
                self.capture()?;
            }
        }
    }

    fn handle(&mut self, cmd: SessionCommand) -> anyhow::Result<()> {
        log::debug!("Command: {}", cmd.name());
        match cmd {
            SessionCommand::StartListening => match self.state() {
                DeviceState::Starting
                | DeviceState::WifiConfiguring
                | DeviceState::Upgrading
                | DeviceState::FatalError => {
                    log::info!("Not listening in state {}", self.state());
                }
                _ => {
                    self.peak = 0;
                    self.ctx.audio_codec()?.enable_input(true);
                    self.set_state(DeviceState::Listening);
                }
            },
            SessionCommand::StopListening => {
                if self.state() == DeviceState::Listening {
                    self.ctx.audio_codec()?.enable_input(false);
                    self.set_state(DeviceState::Speaking);
                    self.acknowledge()?;
                    self.set_state(DeviceState::Idle);
                }
            }
            SessionCommand::EnterConfigMode => {
                self.ctx.audio_codec()?.enable_input(false);
                self.set_state(DeviceState::WifiConfiguring);
                self.ctx.display().show_notification("Config mode");
            }
        }
        Ok(())
    }

    /// Read one frame and track the peak level.
    fn capture(&mut self) -> anyhow::Result<()> {
        let mut pcm = [0i16; FRAME_SAMPLES];
        let n = match self.ctx.audio_codec()?.read(&mut pcm) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Mic read: {}", e);
                return Ok(());
            }
        };
        let frame_peak = pcm[..n]
            .iter()
            .map(|s| s.saturating_abs())
            .max()
            .unwrap_or(0);
        self.peak = self.peak.max(frame_peak);
        Ok(())
    }

    /// Short triangle tone, then the captured peak on screen.
    fn acknowledge(&mut self) -> anyhow::Result<()> {
        let codec = self.ctx.audio_codec()?;
        let rate = codec.output_rate();
        let period = (rate / TONE_HZ).max(2) as i32;
        let total = (rate * TONE_MS / 1000) as usize;
        let amplitude = 8000i32;

        let mut buf = [0i16; 240];
        let mut sent = 0;
        while sent < total {
            let n = (total - sent).min(buf.len());
            for (i, s) in buf[..n].iter_mut().enumerate() {
                let phase = ((sent + i) as i32) % period;
                let tri = (phase * 4 * amplitude / period) - amplitude;
                *s = (if tri > amplitude { 2 * amplitude - tri } else { tri }) as i16;
            }
            match codec.write(&buf[..n]) {
                Ok(0) => break,
                Ok(w) => sent += w,
                Err(e) => {
                    log::warn!("Speaker write: {}", e);
                    break;
                }
            }
        }

        let percent = self.peak as u32 * 100 / i16::MAX as u32;
        let mut text = heapless::String::<32>::new();
        let _ = core::fmt::write(&mut text, format_args!("Peak level {}%", percent));
        log::info!("{}", text);
        self.ctx.display().set_chat_message(ChatRole::System, &text);
        Ok(())
    }
}

fn status_text(state: DeviceState) -> &'static str {
    match state {
        DeviceState::Starting => "Starting",
        DeviceState::WifiConfiguring => "Wi-Fi config",
        DeviceState::Idle => "Standby",
        DeviceState::Connecting => "Connecting",
        DeviceState::Listening => "Listening",
        DeviceState::Speaking => "Speaking",
        DeviceState::Upgrading => "Upgrading",
        DeviceState::Activating => "Activating",
        DeviceState::FatalError => "Error",
        DeviceState::Unknown => "",
    }
}
