/// Error taxonomy for board bring-up.
///
/// Only unrecoverable configuration errors live here. A missing display is a
/// normal resolution (see `display::DisplayHandle::None`) and a failed probe
/// attempt is handled inside the resolver, so neither ever reaches a caller
/// as an error.
use core::fmt;

/// Structural failure that leaves the board unable to provide its core
/// function. The startup sequence halts on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// The shared I2C control bus could not be claimed.
    BusClaim { sda: u8, scl: u8 },
    /// The I2S peripheral could not be claimed or configured.
    AudioClaim,
    /// The audio peripheral was already handed to the bridge.
    AudioTaken,
    /// A sample rate of zero or above `audio::MAX_SAMPLE_RATE` was configured.
    InvalidSampleRate,
    /// Duplex mode needs distinct data pins and distinct clock/frame-sync pins.
    InvalidPinPlan,
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::BusClaim { sda, scl } => {
                write!(f, "cannot claim I2C bus (SDA: {}, SCL: {})", sda, scl)
            }
            BoardError::AudioClaim => f.write_str("cannot claim I2S peripheral"),
            BoardError::AudioTaken => f.write_str("I2S peripheral already claimed"),
            BoardError::InvalidSampleRate => f.write_str("sample rate out of range"),
            BoardError::InvalidPinPlan => f.write_str("invalid duplex pin assignment"),
        }
    }
}

impl core::error::Error for BoardError {}

/// Runtime failure of an audio transfer on an already configured bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    Read,
    Write,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Read => f.write_str("I2S read failed"),
            AudioError::Write => f.write_str("I2S write failed"),
        }
    }
}

impl core::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_claim_names_pins() {
        let e = BoardError::BusClaim { sda: 8, scl: 9 };
        assert_eq!(e.to_string(), "cannot claim I2C bus (SDA: 8, SCL: 9)");
    }
}
