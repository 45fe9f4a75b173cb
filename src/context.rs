/// Process-scoped board context.
///
/// Owns every board resource and hands out the capabilities the host
/// application asks for. Each capability is built on first request and the
/// same instance is returned afterwards:
///
/// - `audio_codec()` claims the I2S peripheral once and keeps the bridge.
/// - `display()` runs the probe sequence once and keeps the result, panel
///   or no-op.
///
/// Exclusive `&mut self` access makes construction race-free; a firmware
/// sharing the context between threads wraps it in a mutex.
use crate::audio::{AudioBridge, AudioCodec, DuplexConfig, DuplexPeripheral};
use crate::board::{self, PinAssignment};
use crate::display::{self, DisplayHandle, PanelConfig, PanelProbe};
use crate::error::BoardError;
use crate::protocol::{DeviceMessage, VERSION};

pub struct BoardContext<A, P>
where
    A: DuplexPeripheral,
    P: PanelProbe,
{
    pins: PinAssignment,
    duplex: DuplexConfig,
    /// Unclaimed I2S controller, taken by the first `audio_codec()` call
    audio_peripheral: Option<A>,
    audio: Option<AudioBridge<A::Port>>,
    /// Owns the opened control bus
    probe: P,
    display_addresses: &'static [u8],
    panel_config: PanelConfig,
    display: Option<DisplayHandle<P::Panel>>,
}

impl<A, P> BoardContext<A, P>
where
    A: DuplexPeripheral,
    P: PanelProbe,
{
    pub fn new(
        pins: PinAssignment,
        duplex: DuplexConfig,
        audio_peripheral: A,
        probe: P,
        display_addresses: &'static [u8],
        panel_config: PanelConfig,
    ) -> Self {
        Self {
            pins,
            duplex,
            audio_peripheral: Some(audio_peripheral),
            audio: None,
            probe,
            display_addresses,
            panel_config,
            display: None,
        }
    }

    /// Context for the compiled-in board. `probe` must wrap the already
    /// opened control bus.
    #[cfg(feature = "board-esp32c3-inmp441")]
    pub fn for_board(audio_peripheral: A, probe: P) -> Result<Self, BoardError> {
        Ok(Self::new(
            board::PINS,
            DuplexConfig::for_board()?,
            audio_peripheral,
            probe,
            board::DISPLAY_ADDRESSES,
            PanelConfig::for_board(),
        ))
    }

    pub fn pins(&self) -> &PinAssignment {
        &self.pins
    }

    /// The duplex audio codec, claimed on first call.
    pub fn audio_codec(&mut self) -> Result<&mut AudioBridge<A::Port>, BoardError> {
        if self.audio.is_none() {
            let peripheral = self.audio_peripheral.take().ok_or(BoardError::AudioTaken)?;
            self.audio = Some(AudioBridge::claim(peripheral, &self.duplex)?);
        }
        self.audio.as_mut().ok_or(BoardError::AudioTaken)
    }

    /// The resolved display, probed on first call. Never fails.
    pub fn display(&mut self) -> &mut DisplayHandle<P::Panel> {
        let probe = &mut self.probe;
        let addresses = self.display_addresses;
        let config = &self.panel_config;
        self.display
            .get_or_insert_with(|| display::resolve(probe, addresses, config))
    }

    /// Board descriptor. Display fields reflect the resolution so far.
    pub fn board_info(&self) -> DeviceMessage {
        let (input_rate, output_rate) = match &self.audio {
            Some(bridge) => (bridge.input_rate(), bridge.output_rate()),
            None => (self.duplex.rates.input_rate(), self.duplex.rates.output_rate()),
        };
        let (display, display_address) = match &self.display {
            Some(handle) => (handle.is_present(), handle.address()),
            None => (false, None),
        };

        DeviceMessage::Board {
            name: board::BOARD_NAME,
            version: VERSION,
            input_rate,
            output_rate,
            duplex: true,
            display,
            display_address,
        }
    }
}
