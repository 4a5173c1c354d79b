// 8-bit gray -> 2-bit panel level.
// Plain: sample / 85, so 255 lands on 3 rather than spilling to 4.
// Ordered: 4x4 Bayer threshold keyed by absolute screen position, so a
// redraw of the same region reproduces the same pattern.

pub const LEVELS: u8 = 4;
pub const LEVEL_STEP: u32 = 85; // 255 / (LEVELS - 1)
pub const MAX_LEVEL: u8 = LEVELS - 1;

#[rustfmt::skip]
const BAYER4: [[u8; 4]; 4] = [
    [ 0,  8,  2, 10],
    [12,  4, 14,  6],
    [ 3, 11,  1,  9],
    [15,  7, 13,  5],
];

#[inline]
pub fn quantize(gray: u8) -> u8 {
    (gray / LEVEL_STEP as u8).min(MAX_LEVEL)
}

/// Threshold (2t+1)/32 of one level step is added before truncation;
/// exact palette grays (0, 85, 170, 255) never change level.
#[inline]
pub fn dither_bayer(gray: u8, x: i32, y: i32) -> u8 {
    let t = BAYER4[(y & 3) as usize][(x & 3) as usize] as u32;
    let v = gray as u32 * 32 + (2 * t + 1) * LEVEL_STEP;
    ((v / (LEVEL_STEP * 32)) as u8).min(MAX_LEVEL)
}

#[inline]
pub fn quantize_at(gray: u8, x: i32, y: i32, dithering: bool) -> u8 {
    if dithering {
        dither_bayer(gray, x, y)
    } else {
        quantize(gray)
    }
}
