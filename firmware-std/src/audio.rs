//! Duplex I2S port on the ESP-IDF standard-mode driver.
//!
//! One controller drives BCLK and WS for both the INMP441 and the
//! MAX98357A. Slots are 32-bit, mono on the left slot, moved as
//! little-endian bytes through the DMA ring.

use esp_idf_svc::hal::delay::BLOCK;
use esp_idf_svc::hal::gpio::{AnyIOPin, Gpio4, Gpio5, Gpio6, Gpio7};
use esp_idf_svc::hal::i2s::config::{
    Config, DataBitWidth, SlotMode, StdClkConfig, StdConfig, StdGpioConfig,
    StdSlotConfig,
};
use esp_idf_svc::hal::i2s::{I2sBiDir, I2sDriver, I2S0};
use esp_idf_svc::sys::EspError;

use talkboard::audio::{DuplexConfig, DuplexPeripheral, DuplexPort};

const SLOT_BYTES: usize = 4;
/// Slots moved per driver call
const BLOCK_SLOTS: usize = 240;

/// The unclaimed I2S controller and its four pins.
pub struct EspI2s {
    pub i2s: I2S0,
    pub bclk: Gpio5,
    pub ws: Gpio6,
    pub dout: Gpio7,
    pub din: Gpio4,
}

impl DuplexPeripheral for EspI2s {
    type Port = EspDuplexPort;
    type Error = EspError;

    fn claim(self, config: &DuplexConfig) -> Result<EspDuplexPort, EspError> {
        let clock = &config.clock;

        let channel = Config::default()
            .dma_buffer_count(clock.dma_desc_num)
            .frames_per_buffer(clock.dma_frame_num)
            .auto_clear(true);
        // Default MCLK multiple is 256
        let clk = StdClkConfig::from_sample_rate_hz(clock.sample_rate_hz);
        let slot = StdSlotConfig::philips_slot_default(DataBitWidth::Bits32, SlotMode::Mono);
        let std_config = StdConfig::new(channel, clk, slot, StdGpioConfig::default());

        let mut driver = I2sDriver::new_std_bidir(
            self.i2s,
            &std_config,
            self.bclk,
            self.din,
            self.dout,
            Option::<AnyIOPin>::None,
            self.ws,
        )?;
        driver.rx_enable()?;
        driver.tx_enable()?;

        Ok(EspDuplexPort { driver })
    }
}

pub struct EspDuplexPort {
    driver: I2sDriver<'static, I2sBiDir>,
}

impl DuplexPort for EspDuplexPort {
    type Error = EspError;

    fn read(&mut self, slots: &mut [i32]) -> Result<usize, EspError> {
        let mut bytes = [0u8; BLOCK_SLOTS * SLOT_BYTES];
        let mut filled = 0;

        for chunk in slots.chunks_mut(BLOCK_SLOTS) {
            let want = chunk.len() * SLOT_BYTES;
            let got = self.driver.read(&mut bytes[..want], BLOCK)? / SLOT_BYTES;
            for (dst, src) in chunk.iter_mut().zip(bytes[..got * SLOT_BYTES].chunks_exact(SLOT_BYTES)) {
                *dst = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
            }
            filled += got;
            if got < chunk.len() {
                break;
            }
        }
        Ok(filled)
    }

    fn write(&mut self, slots: &[i32]) -> Result<usize, EspError> {
        let mut bytes = [0u8; BLOCK_SLOTS * SLOT_BYTES];
        let mut sent = 0;

        for chunk in slots.chunks(BLOCK_SLOTS) {
            for (dst, src) in bytes.chunks_exact_mut(SLOT_BYTES).zip(chunk) {
                dst.copy_from_slice(&src.to_le_bytes());
            }
            let n = self.driver.write(&bytes[..chunk.len() * SLOT_BYTES], BLOCK)? / SLOT_BYTES;
            sent += n;
            if n < chunk.len() {
                break;
            }
        }
        Ok(sent)
    }
}
