//! Floyd–Steinberg error diffusion onto the 16-level palette.
//!
//! Pixels are visited in row-major order. The carried error lives in a
//! two-row window (current row and the row below) since the kernel never
//! reaches further ahead.

use image::GrayImage;

use crate::frame::FrameBuffer;
use crate::pipeline::palette;

/// Share of the error pushed to the right neighbour.
pub const WEIGHT_RIGHT: f32 = 7.0 / 16.0;
/// Share pushed below-left.
pub const WEIGHT_BELOW_LEFT: f32 = 3.0 / 16.0;
/// Share pushed straight below.
pub const WEIGHT_BELOW: f32 = 5.0 / 16.0;
/// Share pushed below-right.
pub const WEIGHT_BELOW_RIGHT: f32 = 1.0 / 16.0;

/// Outcome of quantizing one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantized {
    /// Palette level emitted.
    pub level: u8,
    /// `pre-clamp value - level`, the error to diffuse.
    pub error: f32,
}

/// Quantize a gray value plus its carried error.
///
/// The palette choice is made on the clamped value while the error is taken
/// from the unclamped one.
pub fn quantize(gray: u8, carried: f32) -> Quantized {
    let value = f32::from(gray) + carried;
    let level = palette::nearest(value.clamp(0.0, 255.0));
    Quantized {
        level,
        error: value - f32::from(level),
    }
}

/// Error carry for the row being processed and the one below it.
struct ErrorWindow {
    current: Vec<f32>,
    below: Vec<f32>,
}

impl ErrorWindow {
    fn new(width: usize) -> Self {
        Self {
            current: vec![0.0; width],
            below: vec![0.0; width],
        }
    }

    /// Spread `error` from column `x` to the unvisited neighbours that exist.
    fn diffuse(&mut self, x: usize, error: f32, has_row_below: bool) {
        let width = self.current.len();
        if x + 1 < width {
            self.current[x + 1] += error * WEIGHT_RIGHT;
        }
        if !has_row_below {
            return;
        }
        if x > 0 {
            self.below[x - 1] += error * WEIGHT_BELOW_LEFT;
        }
        self.below[x] += error * WEIGHT_BELOW;
        if x + 1 < width {
            self.below[x + 1] += error * WEIGHT_BELOW_RIGHT;
        }
    }

    fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.below);
        self.below.iter_mut().for_each(|e| *e = 0.0);
    }
}

/// Dither an 8-bit intensity map into a palette-only frame of the same size.
pub fn dither(gray: &GrayImage) -> FrameBuffer {
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    let source = gray.as_raw();

    let mut pixels = Vec::with_capacity(width * height);
    let mut window = ErrorWindow::new(width);

    for y in 0..height {
        let row = &source[y * width..(y + 1) * width];
        let has_row_below = y + 1 < height;
        for (x, &value) in row.iter().enumerate() {
            let quantized = quantize(value, window.current[x]);
            pixels.push(quantized.level);
            window.diffuse(x, quantized.error, has_row_below);
        }
        window.advance();
    }

    FrameBuffer::from_pixels(pixels)
}
