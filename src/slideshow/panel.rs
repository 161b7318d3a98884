//! The slideshow's view of the display hardware.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use crate::error::Result;
use crate::frame::{Area, FrameBuffer, PanelGeometry};
use crate::it8951::{It8951, RefreshMode, Vcom};

/// Operations the slideshow drives. Implementations own their bus and pins.
pub trait Panel {
    fn initialize(&mut self, geometry: PanelGeometry, vcom: Vcom) -> Result<()>;

    fn load_frame(&mut self, frame: &FrameBuffer) -> Result<()>;

    fn refresh_area(&mut self, area: Area, mode: RefreshMode) -> Result<()>;

    /// White frame refreshed with the INIT waveform.
    fn clear(&mut self) -> Result<()>;

    /// Sleep if possible, then release the hardware. Must not fail.
    fn shutdown(&mut self);
}

impl<SPI, BSY, DC, RST, CS, DELAY> Panel for It8951<SPI, BSY, DC, RST, CS, DELAY>
where
    SPI: SpiBus,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    CS: OutputPin,
    DELAY: DelayNs,
{
    fn initialize(&mut self, geometry: PanelGeometry, vcom: Vcom) -> Result<()> {
        It8951::initialize(self, geometry, vcom)
    }

    fn load_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        It8951::load_frame(self, frame)
    }

    fn refresh_area(&mut self, area: Area, mode: RefreshMode) -> Result<()> {
        It8951::refresh_area(self, area, mode)
    }

    fn clear(&mut self) -> Result<()> {
        It8951::clear(self)
    }

    fn shutdown(&mut self) {
        It8951::shutdown(self);
    }
}
