//! The fixed 16-level gray palette of the panel.

/// Number of gray levels the panel renders.
pub const LEVELS: usize = 16;

/// Distance between neighbouring levels.
pub const STEP: u8 = 17;

/// Black.
pub const BLACK: u8 = 0;

/// White, also the letterbox background.
pub const WHITE: u8 = 255;

/// 0, 17, 34, ... 255.
pub const PALETTE: [u8; LEVELS] = {
    let mut levels = [0u8; LEVELS];
    let mut i = 0;
    while i < LEVELS {
        levels[i] = i as u8 * STEP;
        i += 1;
    }
    levels
};

/// True when `value` is one of the palette levels.
pub const fn contains(value: u8) -> bool {
    value % STEP == 0
}

/// Palette level closest to `value`, which must already be clamped to `0.0..=255.0`.
///
/// Ties go to the darker level, the first minimum when scanning the palette upwards.
pub fn nearest(value: f32) -> u8 {
    let lower = ((value / STEP as f32).floor() as usize).min(LEVELS - 1);
    if lower == LEVELS - 1 {
        return PALETTE[lower];
    }
    let below = value - f32::from(PALETTE[lower]);
    let above = f32::from(PALETTE[lower + 1]) - value;
    if above < below {
        PALETTE[lower + 1]
    } else {
        PALETTE[lower]
    }
}
