use thiserror::Error;

/// Fatal conditions raised while turning captured packets into a frame.
///
/// Packets that merely fail to classify as RTP-over-UDP are not errors;
/// the classifier reports them as `None` and they are skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The RTP header extension bit is set. SRD layout after an extension
    /// differs, so the run cannot continue.
    #[error("RTP header extension present, header extensions are not supported")]
    UnsupportedExtension,

    /// A header or data segment runs past the end of the bytes available.
    #[error("malformed packet: {reason}")]
    Malformed { reason: String },

    /// A sample would land outside the configured raster.
    #[error("sample at row {row}, column {column} is outside the {width}x{height} raster")]
    OutOfBounds {
        row: u32,
        column: u32,
        width: u32,
        height: u32,
    },

    /// The packet source ran dry before the final marker bit was seen.
    #[error(
        "capture ended before the frame was complete \
         (collecting: {collecting}, {remaining_markers} marker(s) outstanding)"
    )]
    Incomplete {
        collecting: bool,
        remaining_markers: u8,
    },

    /// Width or height is zero, or the field count does not match the scan
    /// type (1 for progressive, 2 for interlaced).
    #[error(
        "invalid frame geometry {width}x{height} \
         (interlaced: {interlaced}, {fields_per_frame} field(s) per frame)"
    )]
    InvalidGeometry {
        width: u32,
        height: u32,
        interlaced: bool,
        fields_per_frame: u8,
    },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            reason: reason.into(),
        }
    }
}

/// Failures reading the capture container itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("not a pcap or pcapng file (magic number {magic:#010x})")]
    BadMagic { magic: u32 },

    #[error("capture file header is truncated or malformed")]
    TruncatedHeader,

    #[error("unsupported link type {link_type}, only Ethernet (1) is supported")]
    UnsupportedLinkType { link_type: i32 },

    #[error("record {index} is truncated or malformed ({available} bytes left in file)")]
    TruncatedRecord { index: usize, available: usize },

    #[error("packet {index} refers to undeclared interface {interface_id}")]
    UnknownInterface { index: usize, interface_id: u32 },
}
