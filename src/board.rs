/// Hardware constants for supported boards.
///
/// Each board module defines pin assignments, audio rates and display
/// parameters selected at compile time via feature flags.
///
/// Wiring (esp32c3-inmp441):
/// GPIO | Function
/// -----+------------------------------------------
///   3  | Push-to-talk button (active low, pull-up)
///   4  | INMP441 SD (mic data in)
///   5  | I2S BCLK (shared by mic and speaker)
///   6  | I2S WS/LRC (shared by mic and speaker)
///   7  | MAX98357A DIN (speaker data out)
///   8  | OLED SDA
///   9  | OLED SCL

/// Physical pin number for each logical role on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    /// I2S bit clock, shared by both directions
    pub clock: u8,
    /// I2S word select, shared by both directions
    pub frame_sync: u8,
    pub mic_data_in: u8,
    pub speaker_data_out: u8,
    pub button: u8,
    /// I2C SCL
    pub display_clock: u8,
    /// I2C SDA
    pub display_data: u8,
}

#[cfg(feature = "board-esp32c3-inmp441")]
mod hw {
    use super::PinAssignment;

    pub const BOARD_NAME: &str = "esp32c3-inmp441";

    pub const PINS: PinAssignment = PinAssignment {
        clock: 5,
        frame_sync: 6,
        mic_data_in: 4,
        speaker_data_out: 7,
        button: 3,
        display_clock: 9,
        display_data: 8,
    };

    // INMP441 captures at 16 kHz, MAX98357A plays at 24 kHz
    pub const AUDIO_INPUT_SAMPLE_RATE: u32 = 16_000;
    pub const AUDIO_OUTPUT_SAMPLE_RATE: u32 = 24_000;

    pub const DISPLAY_WIDTH: u16 = 128;
    pub const DISPLAY_HEIGHT: u16 = 64;
    pub const DISPLAY_MIRROR_X: bool = false;
    pub const DISPLAY_MIRROR_Y: bool = false;

    /// SSD1306 addresses, in probe order
    pub const DISPLAY_ADDRESSES: &[u8] = &[0x3C, 0x3D];

    pub const I2C_FREQ_HZ: u32 = 400_000;
}

#[cfg(not(feature = "board-esp32c3-inmp441"))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// I2C controller used for the display bus.
pub const I2C_PORT: u8 = 0;
/// Glitch filter width in APB cycles applied to SDA/SCL.
pub const I2C_GLITCH_IGNORE_CNT: u8 = 7;

/// Button sampling period.
pub const BUTTON_POLL_MS: u32 = 5;
/// Consecutive identical samples before a level change is accepted.
pub const BUTTON_DEBOUNCE_TICKS: u8 = 2;
/// Longest press that still counts as a click.
pub const BUTTON_SHORT_PRESS_MS: u32 = 180;

/// Output volume applied until the host changes it.
pub const DEFAULT_OUTPUT_VOLUME: u8 = 70;

/// I2S DMA descriptors and frames per descriptor.
pub const I2S_DMA_DESC_NUM: u32 = 6;
pub const I2S_DMA_FRAME_NUM: u32 = 240;
