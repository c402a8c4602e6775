//! Frame reassembly: accumulates SRD segments from consecutive RTP packets
//! into one RGBA raster.

use image::{Rgba, RgbaImage};
use tracing::{debug, error, info, warn};

use crate::error::DecodeError;
use crate::st2110::{parse_srd_payload, unpack_segment, ycbcr_to_rgb, FrameGeometry, SrdSegment};

const OPAQUE: u8 = 255;

/// The only state carried from one packet to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderState {
    /// Set once a marker bit has aligned the decoder to a frame boundary.
    pub collecting: bool,
    /// Marker bits still expected before the frame is complete.
    pub remaining_markers: u8,
}

impl DecoderState {
    pub fn new(geometry: &FrameGeometry) -> Self {
        Self {
            collecting: false,
            remaining_markers: geometry.fields_per_frame,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_markers == 0
    }
}

/// Outcome of feeding one packet to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not yet aligned to a frame boundary; the payload was not decoded.
    Skipped,
    /// Row data was written and more packets are needed.
    Consumed { pixels: usize },
    /// Row data was written and the last marker bit of the frame was seen.
    FrameComplete { pixels: usize },
}

/// Decode one packet into `raster`, advancing `state`.
///
/// On error `raster` holds a partial frame and must be discarded.
pub fn process_packet(
    state: &mut DecoderState,
    geometry: &FrameGeometry,
    raster: &mut RgbaImage,
    marker: bool,
    payload: &[u8],
) -> Result<Step, DecodeError> {
    geometry.validate()?;
    if state.is_complete() {
        return Ok(Step::FrameComplete { pixels: 0 });
    }

    if !state.collecting {
        if marker {
            debug!("marker bit seen, collecting from the next packet");
            state.collecting = true;
        }
        return Ok(Step::Skipped);
    }

    let srd = parse_srd_payload(payload)?;
    let mut pixels = 0;
    for segment in &srd.segments {
        pixels += write_segment(state, geometry, raster, segment)?;
    }

    debug!(
        extended_sequence_number = srd.extended_sequence_number,
        segments = srd.segments.len(),
        pixels,
        marker,
        "decoded packet"
    );

    if !marker {
        return Ok(Step::Consumed { pixels });
    }

    state.remaining_markers -= 1;
    debug!(remaining_markers = state.remaining_markers, "end of field");
    if state.is_complete() {
        Ok(Step::FrameComplete { pixels })
    } else {
        Ok(Step::Consumed { pixels })
    }
}

fn write_segment(
    state: &DecoderState,
    geometry: &FrameGeometry,
    raster: &mut RgbaImage,
    segment: &SrdSegment<'_>,
) -> Result<usize, DecodeError> {
    let header = &segment.header;
    let row = geometry.destination_row(header.row_number, state.remaining_markers);

    if geometry.interlaced {
        let second_field = geometry.field_index(state.remaining_markers) > 0;
        if header.field_identifier != second_field {
            debug!(
                row = header.row_number,
                field_identifier = header.field_identifier,
                second_field,
                "field identifier disagrees with marker count"
            );
        }
    }

    let samples = unpack_segment(segment.data)?;
    let first_column = u32::from(header.offset);
    let last_column = first_column + samples.len() as u32;

    if !samples.is_empty() && (row >= geometry.height || last_column > geometry.width) {
        let column = if last_column > geometry.width {
            geometry.width.max(first_column)
        } else {
            first_column
        };
        error!(
            row,
            first_column,
            pixels = samples.len(),
            width = geometry.width,
            height = geometry.height,
            "SRD segment outside the raster"
        );
        return Err(DecodeError::OutOfBounds {
            row,
            column,
            width: geometry.width,
            height: geometry.height,
        });
    }

    for (column, px) in (first_column..).zip(&samples) {
        let [r, g, b] = ycbcr_to_rgb(*px);
        raster.put_pixel(column, row, Rgba([r, g, b, OPAQUE]));
    }

    Ok(samples.len())
}

/// Owns the raster and decoder state for one frame.
pub struct FrameAssembler {
    geometry: FrameGeometry,
    state: DecoderState,
    raster: RgbaImage,
    pixels_written: u64,
    packets_decoded: usize,
}

impl FrameAssembler {
    /// Fails with [`DecodeError::InvalidGeometry`] before any raster is
    /// allocated.
    pub fn new(geometry: FrameGeometry) -> Result<Self, DecodeError> {
        if let Err(e) = geometry.validate() {
            error!(%e, "refusing to assemble frame");
            return Err(e);
        }

        info!(
            width = geometry.width,
            height = geometry.height,
            interlaced = geometry.interlaced,
            fields_per_frame = geometry.fields_per_frame,
            "frame assembler ready"
        );

        Ok(Self {
            geometry,
            state: DecoderState::new(&geometry),
            raster: RgbaImage::new(geometry.width, geometry.height),
            pixels_written: 0,
            packets_decoded: 0,
        })
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Packets whose payload was decoded into the raster.
    pub fn packets_decoded(&self) -> usize {
        self.packets_decoded
    }

    /// Feed the marker bit and payload of the next packet in capture order.
    pub fn push(&mut self, marker: bool, payload: &[u8]) -> Result<Step, DecodeError> {
        let already_complete = self.state.is_complete();
        let step = process_packet(
            &mut self.state,
            &self.geometry,
            &mut self.raster,
            marker,
            payload,
        )?;

        match step {
            Step::Consumed { pixels } => {
                self.packets_decoded += 1;
                self.pixels_written += pixels as u64;
            }
            Step::FrameComplete { pixels } if !already_complete => {
                self.packets_decoded += 1;
                self.pixels_written += pixels as u64;
                info!(
                    packets = self.packets_decoded,
                    pixels = self.pixels_written,
                    "frame complete"
                );
            }
            Step::FrameComplete { .. } | Step::Skipped => {}
        }

        Ok(step)
    }

    /// Hand over the finished raster.
    ///
    /// Fails with [`DecodeError::Incomplete`] if the final marker bit has not
    /// been seen; the partial raster is dropped.
    pub fn finish(self) -> Result<RgbaImage, DecodeError> {
        if !self.state.is_complete() {
            warn!(
                collecting = self.state.collecting,
                remaining_markers = self.state.remaining_markers,
                packets = self.packets_decoded,
                "discarding incomplete frame"
            );
            return Err(DecodeError::Incomplete {
                collecting: self.state.collecting,
                remaining_markers: self.state.remaining_markers,
            });
        }

        let expected = self.geometry.pixel_count();
        if self.pixels_written != expected {
            warn!(
                written = self.pixels_written,
                expected,
                "pixel writes do not match raster size, frame may have gaps"
            );
        }

        Ok(self.raster)
    }
}

/// Decode `(marker, payload)` pairs in order until a frame completes.
pub fn reassemble_frame<'a, I>(
    geometry: FrameGeometry,
    packets: I,
) -> Result<RgbaImage, DecodeError>
where
    I: IntoIterator<Item = (bool, &'a [u8])>,
{
    let mut assembler = FrameAssembler::new(geometry)?;
    for (marker, payload) in packets {
        if let Step::FrameComplete { .. } = assembler.push(marker, payload)? {
            break;
        }
    }
    assembler.finish()
}
