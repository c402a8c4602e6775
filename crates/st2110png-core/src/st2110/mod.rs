//! SMPTE ST 2110-20 uncompressed video payloads (10-bit 4:2:2 only).

pub mod color;
pub mod geometry;
pub mod sample;
pub mod srd;

pub use color::ycbcr_to_rgb;
pub use geometry::{FrameGeometry, Resolution};
pub use sample::{pixel_count, read_sample, unpack_segment, YCbCr};
pub use srd::{parse_srd_payload, SrdHeader, SrdPayload, SrdSegment};
