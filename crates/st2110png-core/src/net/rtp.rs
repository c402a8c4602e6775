//! RTP fixed header, see [RFC 3550](https://tools.ietf.org/html/rfc3550#section-5.1).

use nom::bits::bits;
use nom::bits::complete::take;
use nom::number::complete::{be_u16, be_u32};
use nom::sequence::tuple;
use nom::IResult;

/// Size of the fixed RTP header, without CSRC identifiers.
pub const RTP_HEADER_LEN: usize = 12;

pub const RTP_VERSION: u8 = 2;

/// The fixed part of an RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    // 2 bits
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    // 4 bits
    pub csrc_count: u8,
    pub marker: bool,
    // 7 bits
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

type BitInput<'a> = (&'a [u8], usize);

fn take_bits<'a>(count: usize) -> impl FnMut(BitInput<'a>) -> IResult<BitInput<'a>, u8> {
    take(count)
}

/// Parse the 12-byte fixed header. CSRC identifiers and payload are left in
/// the returned remainder.
pub fn parse_rtp_header(input: &[u8]) -> IResult<&[u8], RtpHeader> {
    let (input, ((version, padding, extension, csrc_count), (marker, payload_type))) =
        tuple((parse_vpxcc, parse_mpt))(input)?;
    let (input, (sequence_number, timestamp, ssrc)) = tuple((be_u16, be_u32, be_u32))(input)?;

    Ok((
        input,
        RtpHeader {
            version,
            padding: padding == 1,
            extension: extension == 1,
            csrc_count,
            marker: marker == 1,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
        },
    ))
}

fn parse_vpxcc(input: &[u8]) -> IResult<&[u8], (u8, u8, u8, u8)> {
    bits(tuple((take_bits(2), take_bits(1), take_bits(1), take_bits(4))))(input)
}

fn parse_mpt(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    bits(tuple((take_bits(1), take_bits(7))))(input)
}
