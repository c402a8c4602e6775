use std::time::Duration;

use image::RgbaImage;

use crate::st2110::FrameGeometry;

/// A single reconstructed video frame with metadata.
#[derive(Debug)]
pub struct Frame {
    /// RGBA8 pixels, row-major, top row first.
    pub image: RgbaImage,
    pub geometry: FrameGeometry,
    /// RTP timestamp of the packet that completed the frame.
    pub rtp_timestamp: u32,
    /// Capture time of the packet that completed the frame.
    pub capture_timestamp: Duration,
    /// Packets decoded into the raster.
    pub packets: usize,
}
