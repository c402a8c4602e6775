use super::sample::YCbCr;

const LUMA_BLACK: f64 = 64.0;
const CHROMA_ZERO: f64 = 512.0;

/// Convert a 10-bit video-range BT.709 sample to 8-bit RGB.
///
/// Each channel is computed at 10-bit scale, divided by 4, truncated
/// toward zero and clamped to `0..=255`.
pub fn ycbcr_to_rgb(px: YCbCr) -> [u8; 3] {
    let y = 1.164 * (f64::from(px.y) - LUMA_BLACK);
    let cb = f64::from(px.cb) - CHROMA_ZERO;
    let cr = f64::from(px.cr) - CHROMA_ZERO;

    let r = y + 1.793 * cr;
    let g = y - 0.534 * cr - 0.213 * cb;
    let b = y + 2.115 * cb;

    [to_8bit(r as f32), to_8bit(g as f32), to_8bit(b as f32)]
}

fn to_8bit(value: f32) -> u8 {
    ((value / 4.0) as i32).clamp(0, 255) as u8
}
