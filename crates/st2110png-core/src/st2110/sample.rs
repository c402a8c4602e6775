//! 10-bit 4:2:2 sample unpacking.
//!
//! Samples are packed MSB first with no padding, in pixel groups of
//! `Cb Y0 Cr Y1` (40 bits, 5 octets, 2 pixels).

use crate::error::DecodeError;

pub const BITS_PER_SAMPLE: usize = 10;

/// One luma sample plus half of a chroma pair.
pub const BITS_PER_PIXEL: usize = 20;

const SAMPLE_MASK: u32 = (1 << BITS_PER_SAMPLE) - 1;

/// A single pixel with its (shared) chroma, 10-bit video range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YCbCr {
    pub y: u16,
    pub cb: u16,
    pub cr: u16,
}

/// Number of pixels in a segment of `length_octets` bytes.
pub fn pixel_count(length_octets: usize) -> usize {
    length_octets * 8 / BITS_PER_PIXEL
}

/// Bit offset of the chroma sample paired with `pixel`.
fn chroma_bit(pixel: usize) -> usize {
    pixel * BITS_PER_PIXEL
}

/// Bit offset of the luma sample of `pixel`.
fn luma_bit(pixel: usize) -> usize {
    pixel * BITS_PER_PIXEL + BITS_PER_SAMPLE
}

/// Read the 10-bit sample starting at `bit_offset`, or `None` if it does
/// not fit in `segment`.
pub fn read_sample(segment: &[u8], bit_offset: usize) -> Option<u16> {
    let end = bit_offset + BITS_PER_SAMPLE;
    if end > segment.len() * 8 {
        return None;
    }

    let first = bit_offset / 8;
    let last = (end - 1) / 8;
    let window = segment[first..=last]
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
    let trailing = (last + 1) * 8 - end;

    Some(((window >> trailing) & SAMPLE_MASK) as u16)
}

/// Unpack every pixel of one SR data segment.
///
/// Cb and Cr are taken at each even pixel and held for the following odd
/// one.
pub fn unpack_segment(segment: &[u8]) -> Result<Vec<YCbCr>, DecodeError> {
    let count = pixel_count(segment.len());
    let mut pixels = Vec::with_capacity(count);
    let (mut cb, mut cr) = (0, 0);

    for pixel in 0..count {
        if pixel % 2 == 0 {
            let chroma = read_sample(segment, chroma_bit(pixel))
                .zip(read_sample(segment, chroma_bit(pixel + 1)));
            let Some((b, r)) = chroma else {
                return Err(DecodeError::malformed(format!(
                    "segment of {} bytes ends inside the chroma pair of pixel {pixel}",
                    segment.len()
                )));
            };
            cb = b;
            cr = r;
        }

        let y = read_sample(segment, luma_bit(pixel)).ok_or_else(|| {
            DecodeError::malformed(format!(
                "segment of {} bytes ends inside the luma sample of pixel {pixel}",
                segment.len()
            ))
        })?;

        pixels.push(YCbCr { y, cb, cr });
    }

    Ok(pixels)
}
