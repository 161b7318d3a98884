//! Image preparation pipeline
//!
//! Turns an arbitrary photo into a [`FrameBuffer`] the panel can show as-is:
//!
//! 1. letterbox the photo into the panel resolution on a white canvas
//! 1. reduce it to an 8-bit intensity map
//! 1. Floyd–Steinberg dither the intensities onto the 16-level [`palette`]
//!
//! The pipeline is pure. The same source and geometry always give the same bytes.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, PanelGeometry};

pub mod dither;
pub mod letterbox;
pub mod palette;

pub use dither::dither;
pub use letterbox::letterbox;

/// Luminance of every canvas pixel.
pub fn grayscale(canvas: &RgbImage) -> GrayImage {
    image::imageops::grayscale(canvas)
}

/// Run all stages on a decoded image.
pub fn prepare_image(image: &DynamicImage, geometry: PanelGeometry) -> Result<FrameBuffer> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::EmptyImage);
    }
    if geometry.pixel_count() == 0 {
        return Err(Error::Config(format!("panel geometry {geometry} has no pixels")));
    }

    let canvas = letterbox(image, geometry);
    let gray = grayscale(&canvas);
    let frame = dither(&gray);

    log::debug!("Prepared {} byte frame for {}", frame.len(), geometry);
    Ok(frame)
}

/// Decode an in-memory photo and prepare it.
pub fn prepare_bytes(bytes: &[u8], geometry: PanelGeometry) -> Result<FrameBuffer> {
    let image = image::load_from_memory(bytes)?;
    prepare_image(&image, geometry)
}

/// Decode a photo file and prepare it.
pub fn prepare_file(path: &Path, geometry: PanelGeometry) -> Result<FrameBuffer> {
    log::info!("Preparing {} for a {} panel", path.display(), geometry);
    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    prepare_image(&image, geometry)
}
