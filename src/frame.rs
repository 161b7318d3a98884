//! Panel geometry and the one-byte-per-pixel frame buffer handed from the
//! pipeline to the driver.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::palette;

/// Panel resolution in pixels. Fixed for the lifetime of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelGeometry {
    pub width: u16,
    pub height: u16,
}

impl PanelGeometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of bytes a frame for this panel must hold.
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The whole panel as a refresh rectangle.
    pub const fn full_area(&self) -> Area {
        Area {
            x: 0,
            y: 0,
            w: self.width,
            h: self.height,
        }
    }

    /// True when `area` is non-empty and lies inside the panel.
    pub fn contains(&self, area: &Area) -> bool {
        area.w > 0
            && area.h > 0
            && u32::from(area.x) + u32::from(area.w) <= u32::from(self.width)
            && u32::from(area.y) + u32::from(area.h) <= u32::from(self.height)
    }
}

impl std::fmt::Display for PanelGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rectangle on the panel, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

/// Row-major grayscale frame, one byte per pixel, top-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap raw pixels without validation.
    pub fn from_pixels(pixels: Vec<u8>) -> Self {
        Self { pixels }
    }

    /// A frame of `geometry` filled with one value.
    pub fn filled(geometry: PanelGeometry, value: u8) -> Self {
        Self {
            pixels: vec![value; geometry.pixel_count()],
        }
    }

    /// All-white frame for `geometry`.
    pub fn white(geometry: PanelGeometry) -> Self {
        Self::filled(geometry, palette::WHITE)
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Check the frame against the panel contract: exact size and palette-only bytes.
    pub fn validate(&self, geometry: PanelGeometry) -> Result<()> {
        if self.pixels.len() != geometry.pixel_count() {
            return Err(Error::BufferSizeMismatch {
                expected: geometry.pixel_count(),
                actual: self.pixels.len(),
            });
        }
        match self
            .pixels
            .iter()
            .position(|&value| !palette::contains(value))
        {
            Some(index) => Err(Error::PaletteViolation {
                index,
                value: self.pixels[index],
            }),
            None => Ok(()),
        }
    }
}
