/// Duplex I2S audio bridge.
///
/// The ESP32-C3 has a single I2S controller, so the INMP441 microphone and the
/// MAX98357A amplifier share one bit clock and one word-select line while
/// using separate data lines. The bus runs at the higher of the two declared
/// sample rates; the lower-rate direction is resampled inside the bridge, so
/// callers always see the rates they declared.
use core::fmt::Debug;

use crate::board;
use crate::error::{AudioError, BoardError};
use crate::resample::LinearResampler;

/// Samples moved per hardware transfer, one DMA frame.
const CHUNK: usize = board::I2S_DMA_FRAME_NUM as usize;

/// Bits per I2S slot. The INMP441 shifts out 24-bit samples left-justified.
pub const SLOT_BITS: u32 = 32;
/// Slots per frame (left + right); the board uses the left slot only.
pub const SLOTS_PER_FRAME: u32 = 2;
pub const MCLK_MULTIPLE: u32 = 256;

/// Right shift that brings a raw mic slot down to 16-bit PCM.
const MIC_SHIFT: u32 = 12;

/// Highest declared rate accepted. Keeps the derived clocks within `u32`.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Declared input and output rates, both in `1..=MAX_SAMPLE_RATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRatePair {
    input_rate: u32,
    output_rate: u32,
}

impl SampleRatePair {
    pub const fn new(input_rate: u32, output_rate: u32) -> Result<Self, BoardError> {
        if input_rate == 0
            || output_rate == 0
            || input_rate > MAX_SAMPLE_RATE
            || output_rate > MAX_SAMPLE_RATE
        {
            return Err(BoardError::InvalidSampleRate);
        }
        Ok(Self {
            input_rate,
            output_rate,
        })
    }

    pub const fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Rate of the shared clock domain.
    pub const fn bus_rate(&self) -> u32 {
        if self.input_rate > self.output_rate {
            self.input_rate
        } else {
            self.output_rate
        }
    }
}

/// I2S pins in duplex mode. Clock and frame-sync serve both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplexPins {
    pub clock: u8,
    pub frame_sync: u8,
    pub data_out: u8,
    pub data_in: u8,
}

impl DuplexPins {
    fn validate(&self) -> Result<(), BoardError> {
        let pins = [self.clock, self.frame_sync, self.data_out, self.data_in];
        for (i, a) in pins.iter().enumerate() {
            if pins[i + 1..].contains(a) {
                return Err(BoardError::InvalidPinPlan);
            }
        }
        Ok(())
    }
}

/// Timing of the single shared clock, sized for the faster direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPlan {
    pub sample_rate_hz: u32,
    pub slot_bits: u32,
    pub slots_per_frame: u32,
    pub mclk_multiple: u32,
    pub dma_desc_num: u32,
    pub dma_frame_num: u32,
}

impl ClockPlan {
    pub const fn for_rates(rates: &SampleRatePair) -> Self {
        Self {
            sample_rate_hz: rates.bus_rate(),
            slot_bits: SLOT_BITS,
            slots_per_frame: SLOTS_PER_FRAME,
            mclk_multiple: MCLK_MULTIPLE,
            dma_desc_num: board::I2S_DMA_DESC_NUM,
            dma_frame_num: board::I2S_DMA_FRAME_NUM,
        }
    }

    pub const fn bit_clock_hz(&self) -> u32 {
        self.sample_rate_hz * self.slot_bits * self.slots_per_frame
    }

    pub const fn master_clock_hz(&self) -> u32 {
        self.sample_rate_hz * self.mclk_multiple
    }
}

/// Everything the platform needs to configure the I2S controller once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplexConfig {
    pub rates: SampleRatePair,
    pub pins: DuplexPins,
    pub clock: ClockPlan,
}

impl DuplexConfig {
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        clock: u8,
        frame_sync: u8,
        data_out: u8,
        data_in: u8,
    ) -> Result<Self, BoardError> {
        let rates = SampleRatePair::new(input_rate, output_rate)?;
        let pins = DuplexPins {
            clock,
            frame_sync,
            data_out,
            data_in,
        };
        pins.validate()?;
        Ok(Self {
            rates,
            pins,
            clock: ClockPlan::for_rates(&rates),
        })
    }

    /// Duplex configuration for the compiled-in board.
    #[cfg(feature = "board-esp32c3-inmp441")]
    pub fn for_board() -> Result<Self, BoardError> {
        Self::new(
            board::AUDIO_INPUT_SAMPLE_RATE,
            board::AUDIO_OUTPUT_SAMPLE_RATE,
            board::PINS.clock,
            board::PINS.frame_sync,
            board::PINS.speaker_data_out,
            board::PINS.mic_data_in,
        )
    }
}

/// A configured duplex I2S port moving raw 32-bit slot samples at the bus rate.
pub trait DuplexPort {
    type Error: Debug;

    /// Fill `slots` with captured mic samples. Returns the count read.
    fn read(&mut self, slots: &mut [i32]) -> Result<usize, Self::Error>;

    /// Queue `slots` for playback. Returns the count accepted.
    fn write(&mut self, slots: &[i32]) -> Result<usize, Self::Error>;
}

/// The unclaimed I2S controller. Consumed by a successful claim.
pub trait DuplexPeripheral {
    type Port: DuplexPort;
    type Error: Debug;

    fn claim(self, config: &DuplexConfig) -> Result<Self::Port, Self::Error>;
}

/// Input/output stream capability exposed to the host application.
pub trait AudioCodec {
    fn input_rate(&self) -> u32;
    fn output_rate(&self) -> u32;
    fn input_channels(&self) -> u8;
    fn output_channels(&self) -> u8;
    fn is_duplex(&self) -> bool;

    /// Read captured PCM at the input rate. Returns samples written to `pcm`.
    fn read(&mut self, pcm: &mut [i16]) -> Result<usize, AudioError>;

    /// Play PCM at the output rate. Returns samples consumed from `pcm`.
    fn write(&mut self, pcm: &[i16]) -> Result<usize, AudioError>;

    fn output_volume(&self) -> u8;
    fn set_output_volume(&mut self, volume: u8);
    fn input_enabled(&self) -> bool;
    fn output_enabled(&self) -> bool;
    fn enable_input(&mut self, enable: bool);
    fn enable_output(&mut self, enable: bool);
}

/// Scale a raw mic slot to 16-bit PCM. The range is symmetric, so the
/// most negative value is `-i16::MAX`.
pub fn mic_to_pcm(raw: i32) -> i16 {
    (raw >> MIC_SHIFT).clamp(-(i16::MAX as i32), i16::MAX as i32) as i16
}

/// Output gain in 16.16 fixed point: (volume / 100)^2.
pub fn volume_factor(volume: u8) -> i64 {
    let v = volume.min(100) as i64;
    v * v * 65536 / 10_000
}

/// Widen 16-bit PCM to a 32-bit slot at the given gain.
pub fn pcm_to_slot(sample: i16, factor: i64) -> i32 {
    (sample as i64 * factor).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Duplex bridge over one claimed I2S port.
pub struct AudioBridge<P: DuplexPort> {
    port: P,
    config: DuplexConfig,
    /// Bus rate down to input rate, when they differ
    input_resampler: Option<LinearResampler>,
    /// Output rate up to bus rate, when they differ
    output_resampler: Option<LinearResampler>,
    volume: u8,
    input_enabled: bool,
    output_enabled: bool,
}

impl<P: DuplexPort> AudioBridge<P> {
    /// Configure the I2S controller in duplex mode. Failure is fatal: there
    /// is no other audio path on this board.
    pub fn claim<D>(peripheral: D, config: &DuplexConfig) -> Result<Self, BoardError>
    where
        D: DuplexPeripheral<Port = P>,
    {
        let clock = &config.clock;
        log::info!(
            "I2S duplex: BCLK GPIO{}, WS GPIO{}, DOUT GPIO{}, DIN GPIO{}",
            config.pins.clock,
            config.pins.frame_sync,
            config.pins.data_out,
            config.pins.data_in,
        );
        log::info!(
            "I2S clock: {} Hz frames, {} Hz BCLK (in {} Hz, out {} Hz)",
            clock.sample_rate_hz,
            clock.bit_clock_hz(),
            config.rates.input_rate(),
            config.rates.output_rate(),
        );

        let port = peripheral.claim(config).map_err(|e| {
            log::error!("I2S claim failed: {:?}", e);
            BoardError::AudioClaim
        })?;

        Ok(Self::with_port(port, *config))
    }

    fn with_port(port: P, config: DuplexConfig) -> Self {
        let bus = config.rates.bus_rate();
        let input = config.rates.input_rate();
        let output = config.rates.output_rate();
        Self {
            port,
            config,
            input_resampler: (input != bus).then(|| LinearResampler::new(bus, input)),
            output_resampler: (output != bus).then(|| LinearResampler::new(output, bus)),
            volume: board::DEFAULT_OUTPUT_VOLUME,
            input_enabled: true,
            output_enabled: true,
        }
    }

    pub fn config(&self) -> &DuplexConfig {
        &self.config
    }
}

impl<P: DuplexPort> AudioCodec for AudioBridge<P> {
    fn input_rate(&self) -> u32 {
        self.config.rates.input_rate()
    }

    fn output_rate(&self) -> u32 {
        self.config.rates.output_rate()
    }

    fn input_channels(&self) -> u8 {
        1
    }

    fn output_channels(&self) -> u8 {
        1
    }

    fn is_duplex(&self) -> bool {
        true
    }

    fn read(&mut self, pcm: &mut [i16]) -> Result<usize, AudioError> {
        if !self.input_enabled {
            return Ok(0);
        }

        let mut raw = [0i32; CHUNK];
        let mut scaled = [0i16; CHUNK];
        let mut filled = 0;

        while filled < pcm.len() {
            let remaining = pcm.len() - filled;
            match &mut self.input_resampler {
                None => {
                    let want = remaining.min(CHUNK);
                    let got = self.port.read(&mut raw[..want]).map_err(|e| {
                        log::warn!("I2S read error: {:?}", e);
                        AudioError::Read
                    })?;
                    for (dst, &src) in pcm[filled..filled + got].iter_mut().zip(&raw[..got]) {
                        *dst = mic_to_pcm(src);
                    }
                    filled += got;
                    if got < want {
                        break;
                    }
                }
                Some(rs) => {
                    let per_chunk = ((CHUNK - 2) as u64 * rs.to_rate() as u64
                        / rs.from_rate() as u64)
                        .max(1) as usize;
                    let outputs = remaining.min(per_chunk);
                    let want = rs.input_for(outputs).min(CHUNK);
                    let got = self.port.read(&mut raw[..want]).map_err(|e| {
                        log::warn!("I2S read error: {:?}", e);
                        AudioError::Read
                    })?;
                    for (dst, &src) in scaled[..got].iter_mut().zip(&raw[..got]) {
                        *dst = mic_to_pcm(src);
                    }
                    filled += rs.process(&scaled[..got], &mut pcm[filled..]);
                    if got < want {
                        break;
                    }
                }
            }
        }

        Ok(filled)
    }

    fn write(&mut self, pcm: &[i16]) -> Result<usize, AudioError> {
        if !self.output_enabled {
            return Ok(0);
        }

        let factor = volume_factor(self.volume);
        let mut slots = [0i32; CHUNK];
        let mut consumed = 0;

        match &mut self.output_resampler {
            None => {
                for chunk in pcm.chunks(CHUNK) {
                    for (dst, &src) in slots.iter_mut().zip(chunk) {
                        *dst = pcm_to_slot(src, factor);
                    }
                    let n = self.port.write(&slots[..chunk.len()]).map_err(|e| {
                        log::warn!("I2S write error: {:?}", e);
                        AudioError::Write
                    })?;
                    consumed += n;
                    if n < chunk.len() {
                        break;
                    }
                }
            }
            Some(rs) => {
                let mut up = [0i16; CHUNK];
                let per_chunk = ((CHUNK - 2) as u64 * rs.from_rate() as u64
                    / rs.to_rate() as u64)
                    .max(1) as usize;
                for chunk in pcm.chunks(per_chunk) {
                    let before = rs.clone();
                    let n = rs.process(chunk, &mut up);
                    for (dst, &src) in slots.iter_mut().zip(&up[..n]) {
                        *dst = pcm_to_slot(src, factor);
                    }
                    let w = self.port.write(&slots[..n]).map_err(|e| {
                        log::warn!("I2S write error: {:?}", e);
                        AudioError::Write
                    })?;
                    if w < n {
                        // Report only the input behind the accepted slots and
                        // rewind the converter to it, so the rest can be resent
                        let played = before.inputs_behind(w).min(chunk.len());
                        *rs = before;
                        rs.process(&chunk[..played], &mut up);
                        consumed += played;
                        break;
                    }
                    consumed += chunk.len();
                }
            }
        }

        Ok(consumed)
    }

    fn output_volume(&self) -> u8 {
        self.volume
    }

    fn set_output_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        log::info!("Output volume set to {}", self.volume);
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    fn enable_input(&mut self, enable: bool) {
        if enable != self.input_enabled {
            log::info!("Audio input {}", if enable { "enabled" } else { "disabled" });
        }
        self.input_enabled = enable;
    }

    fn enable_output(&mut self, enable: bool) {
        if enable != self.output_enabled {
            log::info!("Audio output {}", if enable { "enabled" } else { "disabled" });
        }
        self.output_enabled = enable;
    }
}
