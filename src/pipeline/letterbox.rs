//! Fit a photo inside the panel without cropping and center it on white.

use image::{imageops, DynamicImage, Rgb, RgbImage};

use crate::frame::PanelGeometry;
use crate::pipeline::palette;

/// Size of `source` scaled by `min(target_w / src_w, target_h / src_h)`.
///
/// Each axis is rounded and kept within `1..=target`.
pub fn fitted_size(source: (u32, u32), target: PanelGeometry) -> (u32, u32) {
    let (src_w, src_h) = source;
    let target_w = u32::from(target.width);
    let target_h = u32::from(target.height);

    let scale = f64::min(
        f64::from(target_w) / f64::from(src_w),
        f64::from(target_h) / f64::from(src_h),
    );

    let fit = |src: u32, limit: u32| ((f64::from(src) * scale).round() as u32).clamp(1, limit);
    (fit(src_w, target_w), fit(src_h, target_h))
}

/// Drop transparency by blending onto the white background.
fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let white = f32::from(palette::WHITE);
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = f32::from(a) / 255.0;
        let blend = |c: u8| (f32::from(c) * alpha + white * (1.0 - alpha)).round() as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Resize `image` to fit `target` and paste it centered on a white canvas of
/// exactly the panel size.
pub fn letterbox(image: &DynamicImage, target: PanelGeometry) -> RgbImage {
    let source = flatten(image);
    let (new_width, new_height) = fitted_size(source.dimensions(), target);

    log::debug!(
        "Letterboxing {}x{} into {} as {}x{}",
        source.width(),
        source.height(),
        target,
        new_width,
        new_height
    );

    let resized = if (new_width, new_height) == source.dimensions() {
        source
    } else {
        imageops::resize(
            &source,
            new_width,
            new_height,
            imageops::FilterType::Lanczos3,
        )
    };

    let target_w = u32::from(target.width);
    let target_h = u32::from(target.height);
    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb([palette::WHITE; 3]));

    let offset_x = (target_w - new_width) / 2;
    let offset_y = (target_h - new_height) / 2;
    imageops::replace(&mut canvas, &resized, i64::from(offset_x), i64::from(offset_y));
    canvas
}
