//! IT8951 ePaper Display Driver
//!
//! Used with the Waveshare IT8951 HAT driving 16-level grayscale panels
//! (6", 7.8", 10.3") from a Raspberry Pi over SPI.
//!
//! Frames are always loaded whole at 8 bpp. Refreshes can target any area.
//!
//!
//! ### Usage
//! The driver owns the bus and pins. To show something you:
//!
//! 1. call [`driver::It8951::initialize`] once with the panel geometry and the VCOM
//!    printed on the panel cable
//! 1. send a palette-only frame with [`driver::It8951::load_frame`]
//! 1. kick off a refresh using [`driver::It8951::refresh_area`]
//! 1. finish with [`driver::It8951::shutdown`], which sleeps the panel and releases the handles
//!
//!
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod cmd;
pub mod driver;
pub mod flag;
pub mod interface;
pub mod pins;

#[cfg(test)]
pub(crate) mod mock;

pub use cmd::CommandTable;
pub use driver::It8951;
pub use interface::{BusyWait, DisplayInterface};
pub use pins::Pins;

/// Default bytes per pixel-data transaction, the spidev default buffer size
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Controller waveform used for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Full wipe to white, slow, removes ghosting
    Init,
    /// Direct update, black/white only, fast
    Du,
    /// High quality 16-level grayscale with flashing
    Gc16,
    /// 16-level grayscale without flashing, may ghost
    Gl16,
    /// Fastest black/white, for animation
    A2,
}

/// Power/lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Running,
    Standby,
    Sleeping,
}

impl DeviceState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::Running => "running",
            DeviceState::Standby => "in standby",
            DeviceState::Sleeping => "sleeping",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VCOM bias, in millivolts of magnitude as the controller expects it.
///
/// Panels print it as a negative voltage (e.g. `-1.48`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vcom(u16);

impl Vcom {
    pub const fn from_millivolts(millivolts: u16) -> Self {
        Self(millivolts)
    }

    /// Convert the voltage printed on the panel cable.
    pub fn from_volts(volts: f32) -> Self {
        Self((volts.abs() * 1000.0).round() as u16)
    }

    pub const fn millivolts(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Vcom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-{:.2} V", f32::from(self.0) / 1000.0)
    }
}

/// Answer to GET_DEV_INFO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub width: u16,
    pub height: u16,
    pub image_buffer_addr: u32,
    pub firmware: String,
    pub lut: String,
}

impl DeviceInfo {
    /// Decode the 20-word response.
    pub fn from_words(words: &[u16]) -> Option<Self> {
        if words.len() < flag::Flag::DEVICE_INFO_WORDS {
            return None;
        }
        Some(Self {
            width: words[0],
            height: words[1],
            image_buffer_addr: u32::from(words[2]) | (u32::from(words[3]) << 16),
            firmware: decode_text(&words[4..12]),
            lut: decode_text(&words[12..20]),
        })
    }
}

/// Version strings come as big-endian character pairs, NUL padded.
fn decode_text(words: &[u16]) -> String {
    words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .take_while(|&b| b != 0)
        .map(char::from)
        .collect::<String>()
        .trim()
        .to_string()
}
