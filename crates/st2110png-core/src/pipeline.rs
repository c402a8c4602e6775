use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::assembler::{FrameAssembler, Step};
use crate::capture::CaptureReader;
use crate::error::DecodeError;
use crate::frame::Frame;
use crate::net::FlowFilter;
use crate::st2110::{FrameGeometry, Resolution};

/// Parameters for frame extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    /// Raster size and scan structure of the flow.
    pub resolution: Resolution,
    /// Datagrams outside this flow are ignored.
    pub flow: FlowFilter,
}

/// Per-run packet counters.
#[derive(Debug, Default)]
struct Tally {
    records: usize,
    skipped: usize,
    before_alignment: usize,
}

/// Read a pcap file and reconstruct the first complete frame in it.
pub fn run_pipeline(input: &Path, config: &PipelineConfig) -> Result<Frame> {
    if !input.exists() {
        bail!("input capture does not exist: {}", input.display());
    }

    info!(
        ?input,
        resolution = %config.resolution,
        destination_addr = ?config.flow.destination_addr,
        destination_port = ?config.flow.destination_port,
        "pipeline starting"
    );

    let capture =
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    info!(bytes = capture.len(), "capture loaded");

    extract_frame(&capture, config)
}

/// Reconstruct the first complete frame from an in-memory pcap file.
pub fn extract_frame(capture: &[u8], config: &PipelineConfig) -> Result<Frame> {
    extract_frame_with(capture, config.resolution.geometry(), config.flow)
}

/// Like [`extract_frame`], for a geometry outside the presets.
///
/// Stops at the packet that completes the frame; later packets are never
/// read. Any fatal condition aborts without producing an image.
pub fn extract_frame_with(
    capture: &[u8],
    geometry: FrameGeometry,
    flow: FlowFilter,
) -> Result<Frame> {
    let mut assembler = FrameAssembler::new(geometry).context("cannot decode with this geometry")?;
    let reader = CaptureReader::new(capture).context("failed to open capture")?;
    let mut tally = Tally::default();

    for record in reader {
        let record = record.context("failed to read capture")?;
        tally.records += 1;

        let packet = flow
            .classify(record.data)
            .with_context(|| format!("cannot decode capture record {}", record.index))?;
        let Some(packet) = packet else {
            tally.skipped += 1;
            continue;
        };

        let step = assembler
            .push(packet.marker(), packet.payload)
            .with_context(|| {
                format!(
                    "cannot decode RTP packet {} (capture record {})",
                    packet.header.sequence_number, record.index
                )
            })?;

        match step {
            Step::Skipped => tally.before_alignment += 1,
            Step::Consumed { .. } => {}
            Step::FrameComplete { .. } => {
                let packets = assembler.packets_decoded();
                info!(
                    records = tally.records,
                    skipped = tally.skipped,
                    before_alignment = tally.before_alignment,
                    packets,
                    rtp_timestamp = packet.header.timestamp,
                    "frame extracted"
                );
                let image = assembler.finish()?;
                return Ok(Frame {
                    image,
                    geometry,
                    rtp_timestamp: packet.header.timestamp,
                    capture_timestamp: record.timestamp,
                    packets,
                });
            }
        }
    }

    if tally.records == 0 {
        warn!("capture contains no records");
    }
    debug!(?tally, "capture exhausted");

    let state = assembler.state();
    warn!(
        records = tally.records,
        collecting = state.collecting,
        remaining_markers = state.remaining_markers,
        "no complete frame in capture"
    );

    let records = tally.records;
    let scan = if geometry.interlaced { "interlaced" } else { "progressive" };
    Err(DecodeError::Incomplete {
        collecting: state.collecting,
        remaining_markers: state.remaining_markers,
    })
    .with_context(|| {
        format!(
            "capture ended after {records} records without a complete {}x{} {scan} frame",
            geometry.width, geometry.height
        )
    })
}
