//! SSD1306 panel bring-up over the shared I2C bus.
//!
//! The bus driver lives in a `'static` mutex. Each probe attempt gets its
//! own `MutexDevice` handle bound to one address; dropping the panel or the
//! interface gives the bus back for the next attempt.

use std::sync::Mutex;

use display_interface::DisplayError;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal_bus::i2c::MutexDevice;
use esp_idf_svc::hal::i2c::I2cDriver;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::size::DisplaySize;
use ssd1306::Ssd1306;

use talkboard::display::{PanelConfig, PanelDriver, PanelProbe};

type SharedI2c = MutexDevice<'static, I2cDriver<'static>>;
type PanelIo = I2CInterface<SharedI2c>;
type Inner = Ssd1306<PanelIo, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// SSD1306 control byte announcing a data stream
const DATA_CONTROL_BYTE: u8 = 0x40;

#[derive(Debug)]
pub enum PanelError {
    /// Only the 128x64 driver is built in
    UnsupportedGeometry { width: u16, height: u16 },
}

impl std::fmt::Display for PanelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelError::UnsupportedGeometry { width, height } => {
                write!(f, "no SSD1306 driver for {}x{}", width, height)
            }
        }
    }
}

pub struct EspPanelProbe {
    bus: &'static Mutex<I2cDriver<'static>>,
}

impl EspPanelProbe {
    pub fn new(bus: &'static Mutex<I2cDriver<'static>>) -> Self {
        Self { bus }
    }
}

impl PanelProbe for EspPanelProbe {
    type Io = PanelIo;
    type Panel = OledPanel;
    type Error = PanelError;

    fn open_io(&mut self, address: u8) -> Result<PanelIo, PanelError> {
        Ok(I2CInterface::new(MutexDevice::new(self.bus), address, DATA_CONTROL_BYTE))
    }

    fn new_panel(&mut self, io: PanelIo, config: &PanelConfig) -> Result<OledPanel, PanelError> {
        let supported = (DisplaySize128x64::WIDTH as u16, DisplaySize128x64::HEIGHT as u16);
        if (config.width, config.height) != supported {
            return Err(PanelError::UnsupportedGeometry {
                width: config.width,
                height: config.height,
            });
        }
        let display = Ssd1306::new(io, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Ok(OledPanel(display))
    }
}

pub struct OledPanel(Inner);

impl PanelDriver for OledPanel {
    type Error = DisplayError;

    /// No reset line on this board: switching the panel off is the first
    /// transaction and fails fast when nothing answers.
    fn reset(&mut self) -> Result<(), DisplayError> {
        self.0.set_display_on(false)
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.0.init()
    }

    fn set_display_on(&mut self, on: bool) -> Result<(), DisplayError> {
        self.0.set_display_on(on)
    }

    fn set_mirror(&mut self, mirror_x: bool, mirror_y: bool) -> Result<(), DisplayError> {
        // A 180° rotation flips both axes; segment remap then undoes X
        let rotation = if mirror_y {
            DisplayRotation::Rotate180
        } else {
            DisplayRotation::Rotate0
        };
        self.0.set_rotation(rotation)?;
        self.0.set_mirror(mirror_x != mirror_y)
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.0.flush()
    }
}

impl OriginDimensions for OledPanel {
    fn size(&self) -> Size {
        OriginDimensions::size(&self.0)
    }
}

impl DrawTarget for OledPanel {
    type Color = BinaryColor;
    type Error = DisplayError;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), DisplayError>
    where
        I: IntoIterator<Item = Pixel<BinaryColor>>,
    {
        DrawTarget::draw_iter(&mut self.0, pixels)
    }

    fn clear(&mut self, color: BinaryColor) -> Result<(), DisplayError> {
        DrawTarget::clear(&mut self.0, color)
    }
}
