//! Sample Row Data headers and segments.
//!
//! Payload layout after the RTP header:
//!
//! ```text
//! | extended seq (16) | SRD header 1 | ... | SRD header n | segment 1 | ... | segment n |
//! ```
//!
//! Each 6-byte header is `length (16) | F (1) | row (15) | C (1) | offset (15)`.
//! `C` set means another header follows.

use nom::bits::bits;
use nom::bits::complete::take as take_bits;
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::number::complete::be_u16;
use nom::sequence::tuple;
use nom::IResult;
use tracing::{debug, warn};

use crate::error::DecodeError;

pub const EXTENDED_SEQUENCE_LEN: usize = 2;
pub const SRD_HEADER_LEN: usize = 6;

/// Upper bound on headers per packet set by ST 2110-20.
pub const MAX_SRD_HEADERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrdHeader {
    /// Octets in the matching data segment.
    pub length: u16,
    /// Set for the second field of an interlaced frame.
    pub field_identifier: bool,
    pub row_number: u16,
    pub continuation: bool,
    /// Column of the first pixel in the segment.
    pub offset: u16,
}

/// One header together with the bytes it describes.
#[derive(Debug, Clone, Copy)]
pub struct SrdSegment<'a> {
    pub header: SrdHeader,
    pub data: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct SrdPayload<'a> {
    /// High-order 16 bits of the extended RTP sequence number.
    pub extended_sequence_number: u16,
    pub segments: Vec<SrdSegment<'a>>,
}

type BitInput<'a> = (&'a [u8], usize);

fn flag(input: BitInput<'_>) -> IResult<BitInput<'_>, bool> {
    map(take_bits(1usize), |bit: u8| bit == 1)(input)
}

fn value15(input: BitInput<'_>) -> IResult<BitInput<'_>, u16> {
    take_bits(15usize)(input)
}

fn parse_srd_header(input: &[u8]) -> IResult<&[u8], SrdHeader> {
    let (input, length) = be_u16(input)?;
    let (input, (field_identifier, row_number, continuation, offset)) =
        bits(tuple((flag, value15, flag, value15)))(input)?;

    Ok((
        input,
        SrdHeader {
            length,
            field_identifier,
            row_number,
            continuation,
            offset,
        },
    ))
}

fn segment(input: &[u8], length: usize) -> IResult<&[u8], &[u8]> {
    take(length)(input)
}

/// Split an RTP payload into its SRD headers and data segments.
///
/// Any header or segment that runs past the end of `payload` makes the
/// whole packet malformed. Bytes following the last segment are ignored.
pub fn parse_srd_payload(payload: &[u8]) -> Result<SrdPayload<'_>, DecodeError> {
    let (mut input, extended_sequence_number) = be_u16::<_, nom::error::Error<&[u8]>>(payload)
        .map_err(|_| {
            DecodeError::malformed(format!(
                "payload of {} bytes has no room for the \
                 {EXTENDED_SEQUENCE_LEN}-byte extended sequence number",
                payload.len()
            ))
        })?;

    let mut headers = Vec::with_capacity(MAX_SRD_HEADERS);
    loop {
        let (rest, header) = parse_srd_header(input).map_err(|_| {
            DecodeError::malformed(format!(
                "SRD header {} needs {SRD_HEADER_LEN} bytes, {} left",
                headers.len() + 1,
                input.len()
            ))
        })?;
        input = rest;
        headers.push(header);
        if !header.continuation {
            break;
        }
    }

    if headers.len() > MAX_SRD_HEADERS {
        warn!(
            count = headers.len(),
            max = MAX_SRD_HEADERS,
            "packet carries more SRD headers than ST 2110-20 allows"
        );
    }

    let mut segments = Vec::with_capacity(headers.len());
    for (i, header) in headers.into_iter().enumerate() {
        let (rest, data) = segment(input, usize::from(header.length)).map_err(|_| {
            DecodeError::malformed(format!(
                "SRD segment {} declares {} bytes, {} left (row {}, offset {})",
                i + 1,
                header.length,
                input.len(),
                header.row_number,
                header.offset
            ))
        })?;
        input = rest;

        debug!(
            segment = i,
            length = header.length,
            row = header.row_number,
            offset = header.offset,
            field = header.field_identifier,
            "SRD segment"
        );
        segments.push(SrdSegment { header, data });
    }

    if !input.is_empty() {
        debug!(trailing = input.len(), "ignoring bytes after the last SRD segment");
    }

    Ok(SrdPayload {
        extended_sequence_number,
        segments,
    })
}
