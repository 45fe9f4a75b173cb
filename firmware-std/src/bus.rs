//! I2C master bus on the ESP-IDF driver.
//!
//! The legacy driver wrapped by esp-idf-hal fixes its own glitch filter, so
//! `glitch_ignore_cnt` is only logged here.

use esp_idf_svc::hal::gpio::{Gpio8, Gpio9};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver, I2C0};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;

use talkboard::bus::{BusConfig, BusOpener};

pub struct EspBusOpener {
    pub i2c: I2C0,
    pub sda: Gpio8,
    pub scl: Gpio9,
}

impl BusOpener for EspBusOpener {
    type Bus = I2cDriver<'static>;
    type Error = EspError;

    fn open(self, config: &BusConfig) -> Result<Self::Bus, EspError> {
        log::debug!(
            "I2C{} at {} Hz, glitch filter {} cycles",
            config.port,
            config.frequency_hz,
            config.glitch_ignore_cnt
        );

        let i2c_config = I2cConfig::new()
            .baudrate(Hertz(config.frequency_hz))
            .sda_enable_pullup(config.internal_pullup)
            .scl_enable_pullup(config.internal_pullup);

        I2cDriver::new(self.i2c, self.sda, self.scl, &i2c_config)
    }
}
