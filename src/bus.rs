/// Shared I2C control bus bring-up.
///
/// The bus is opened exactly once, before anything that talks to it. The
/// reference wiring has no external pull-up resistors, so the internal
/// pull-ups are part of the contract rather than a tuning knob.
use crate::board;
use crate::error::BoardError;

/// Parameters for the shared control bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub port: u8,
    pub sda: u8,
    pub scl: u8,
    pub frequency_hz: u32,
    pub glitch_ignore_cnt: u8,
    pub internal_pullup: bool,
}

impl BusConfig {
    pub const fn new(sda: u8, scl: u8, frequency_hz: u32) -> Self {
        Self {
            port: board::I2C_PORT,
            sda,
            scl,
            frequency_hz,
            glitch_ignore_cnt: board::I2C_GLITCH_IGNORE_CNT,
            internal_pullup: true,
        }
    }

    /// Bus parameters for the compiled-in board.
    #[cfg(feature = "board-esp32c3-inmp441")]
    pub const fn for_board() -> Self {
        Self::new(board::PINS.display_data, board::PINS.display_clock, board::I2C_FREQ_HZ)
    }
}

/// Platform hook that claims the bus controller.
///
/// Consumes itself: a controller can be turned into a bus at most once.
pub trait BusOpener {
    type Bus;
    type Error: core::fmt::Debug;

    fn open(self, config: &BusConfig) -> Result<Self::Bus, Self::Error>;
}

/// Open the shared control bus. Failure is a fatal configuration error.
pub fn init_bus<O: BusOpener>(opener: O, config: &BusConfig) -> Result<O::Bus, BoardError> {
    match opener.open(config) {
        Ok(bus) => {
            log::info!("I2C bus initialized (SDA: {}, SCL: {})", config.sda, config.scl);
            Ok(bus)
        }
        Err(e) => {
            log::error!("I2C bus claim failed: {:?}", e);
            Err(BoardError::BusClaim {
                sda: config.sda,
                scl: config.scl,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeController<'a> {
        fail: bool,
        seen: &'a Cell<Option<BusConfig>>,
    }

    impl BusOpener for FakeController<'_> {
        type Bus = u8;
        type Error = &'static str;

        fn open(self, config: &BusConfig) -> Result<u8, &'static str> {
            self.seen.set(Some(*config));
            if self.fail {
                Err("in use")
            } else {
                Ok(config.port)
            }
        }
    }

    #[test]
    fn board_bus_enables_pullups() {
        let cfg = BusConfig::for_board();
        assert!(cfg.internal_pullup);
        assert_eq!(cfg.sda, 8);
        assert_eq!(cfg.scl, 9);
        assert_eq!(cfg.glitch_ignore_cnt, 7);
        assert_eq!(cfg.frequency_hz, 400_000);
    }

    #[test]
    fn open_passes_config_through() {
        let seen = Cell::new(None);
        let cfg = BusConfig::for_board();
        let bus = init_bus(FakeController { fail: false, seen: &seen }, &cfg).unwrap();
        assert_eq!(bus, 0);
        assert_eq!(seen.get(), Some(cfg));
    }

    #[test]
    fn claim_failure_is_fatal_error() {
        let seen = Cell::new(None);
        let cfg = BusConfig::new(8, 9, 100_000);
        let err = init_bus(FakeController { fail: true, seen: &seen }, &cfg).unwrap_err();
        assert_eq!(err, BoardError::BusClaim { sda: 8, scl: 9 });
    }
}
