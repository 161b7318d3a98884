//! Pin definitions for the IT8951 e-paper HAT on a Raspberry Pi header
//!
//! Numbers are BCM GPIO line offsets on `/dev/gpiochip0`.

/// Pin configuration constants for the IT8951 HAT
pub struct Pins;

impl Pins {
    /// Reset pin for the controller (active low)
    pub const RST: u32 = 17;
    /// Data/Command control pin (High for data, Low for command)
    pub const DC: u32 = 25;
    /// Chip Select pin, driven by the host instead of the SPI block
    pub const CS: u32 = 8;
    /// HRDY pin (Low while the controller is busy)
    pub const BSY: u32 = 24;
}
