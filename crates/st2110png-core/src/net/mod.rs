//! Link-layer classification: finds the RTP payload inside an
//! Ethernet/IPv4/UDP frame.

pub mod rtp;

use std::net::{Ipv4Addr, SocketAddrV4};

use nom::bits::bits;
use nom::bits::complete::take as take_bits;
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::sequence::tuple;
use nom::IResult;
use tracing::{debug, error, trace};

use crate::error::DecodeError;
use rtp::{parse_rtp_header, RtpHeader, RTP_HEADER_LEN, RTP_VERSION};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const IPPROTO_UDP: u8 = 17;

const IPV4_MIN_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// An RTP packet located inside a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct RtpPacket<'a> {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
    pub header: RtpHeader,
    /// RTP payload, after CSRC identifiers and without padding.
    pub payload: &'a [u8],
}

impl RtpPacket<'_> {
    pub fn marker(&self) -> bool {
        self.header.marker
    }
}

/// Restricts classification to one flow. Empty fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowFilter {
    pub destination_addr: Option<Ipv4Addr>,
    pub destination_port: Option<u16>,
}

impl FlowFilter {
    pub fn matches(&self, destination: &SocketAddrV4) -> bool {
        self.destination_addr.map_or(true, |a| a == *destination.ip())
            && self.destination_port.map_or(true, |p| p == destination.port())
    }

    /// Locate the RTP packet in `frame` if it belongs to this flow.
    ///
    /// Returns `Ok(None)` for anything that is not IPv4/UDP/RTPv2 or does
    /// not match the filter. A header extension or a UDP length that runs
    /// past the captured bytes is an error.
    pub fn classify<'a>(&self, frame: &'a [u8]) -> Result<Option<RtpPacket<'a>>, DecodeError> {
        let Ok((input, ether_type)) = parse_ethernet(frame) else {
            trace!(len = frame.len(), "frame too short for an Ethernet header");
            return Ok(None);
        };
        if ether_type != ETHERTYPE_IPV4 {
            trace!(ether_type, "skipping non-IPv4 frame");
            return Ok(None);
        }

        let Ok((input, ip)) = parse_ipv4(input) else {
            trace!("skipping frame with unreadable IPv4 header");
            return Ok(None);
        };
        if ip.protocol != IPPROTO_UDP {
            trace!(protocol = ip.protocol, "skipping non-UDP datagram");
            return Ok(None);
        }

        let Ok((input, udp)) = parse_udp(input) else {
            trace!("skipping datagram with truncated UDP header");
            return Ok(None);
        };

        let source = SocketAddrV4::new(ip.source, udp.source_port);
        let destination = SocketAddrV4::new(ip.destination, udp.destination_port);
        if !self.matches(&destination) {
            trace!(%source, %destination, "skipping datagram outside the selected flow");
            return Ok(None);
        }

        let udp_data_len = usize::from(udp.length)
            .checked_sub(UDP_HEADER_LEN)
            .ok_or_else(|| {
                DecodeError::malformed(format!(
                    "UDP length {} is shorter than its header",
                    udp.length
                ))
            })?;
        if udp_data_len > input.len() {
            error!(
                %source,
                %destination,
                udp_data_len,
                captured = input.len(),
                "UDP datagram truncated in capture"
            );
            return Err(DecodeError::malformed(format!(
                "UDP datagram declares {udp_data_len} payload bytes, only {} captured",
                input.len()
            )));
        }
        let udp_data = &input[..udp_data_len];

        let Ok((rest, header)) = parse_rtp_header(udp_data) else {
            trace!(%destination, udp_data_len, "UDP payload too short for RTP");
            return Ok(None);
        };
        if header.version != RTP_VERSION {
            trace!(
                %destination,
                version = header.version,
                "skipping datagram that is not RTP version 2"
            );
            return Ok(None);
        }
        if header.extension {
            error!(
                %source,
                %destination,
                sequence_number = header.sequence_number,
                "RTP header extension present"
            );
            return Err(DecodeError::UnsupportedExtension);
        }

        let payload = strip_csrc_and_padding(rest, &header)?;

        debug!(
            %source,
            %destination,
            marker = header.marker,
            payload_type = header.payload_type,
            sequence_number = header.sequence_number,
            timestamp = header.timestamp,
            rtp_data_len = udp_data_len - RTP_HEADER_LEN,
            "classified RTP packet"
        );

        Ok(Some(RtpPacket {
            source,
            destination,
            header,
            payload,
        }))
    }
}

/// Classify a frame without any flow restriction.
pub fn classify(frame: &[u8]) -> Result<Option<RtpPacket<'_>>, DecodeError> {
    FlowFilter::default().classify(frame)
}

fn strip_csrc_and_padding<'a>(
    rest: &'a [u8],
    header: &RtpHeader,
) -> Result<&'a [u8], DecodeError> {
    let csrc_len = usize::from(header.csrc_count) * 4;
    let payload = rest.get(csrc_len..).ok_or_else(|| {
        DecodeError::malformed(format!(
            "{} CSRC identifiers do not fit in the RTP packet",
            header.csrc_count
        ))
    })?;

    if !header.padding {
        return Ok(payload);
    }
    let pad = payload.last().map_or(0, |&n| usize::from(n));
    if pad == 0 || pad > payload.len() {
        return Err(DecodeError::malformed(format!(
            "RTP padding of {pad} bytes is invalid for a {} byte payload",
            payload.len()
        )));
    }
    Ok(&payload[..payload.len() - pad])
}

struct Ipv4Header {
    protocol: u8,
    source: Ipv4Addr,
    destination: Ipv4Addr,
}

struct UdpHeader {
    source_port: u16,
    destination_port: u16,
    length: u16,
}

fn parse_ethernet(input: &[u8]) -> IResult<&[u8], u16> {
    let (input, (_destination, _source, ether_type)) =
        tuple((take(6usize), take(6usize), be_u16))(input)?;
    Ok((input, ether_type))
}

fn parse_version_ihl(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    bits(tuple((
        take_bits::<_, u8, _, nom::error::Error<(&[u8], usize)>>(4usize),
        take_bits(4usize),
    )))(input)
}

fn parse_ipv4(input: &[u8]) -> IResult<&[u8], Ipv4Header> {
    let start = input;
    let (input, (version, ihl)) = parse_version_ihl(input)?;
    if version != 4 {
        return Err(nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Verify)));
    }
    let header_len = usize::from(ihl) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return Err(nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Verify)));
    }

    let (input, (_tos, _total_len, _id, _flags_fragment, _ttl, protocol, _checksum)) =
        tuple((be_u8, be_u16, be_u16, be_u16, be_u8, be_u8, be_u16))(input)?;
    let (input, (source, destination)) = tuple((be_u32, be_u32))(input)?;
    let (input, _options) = take(header_len - IPV4_MIN_HEADER_LEN)(input)?;

    Ok((
        input,
        Ipv4Header {
            protocol,
            source: Ipv4Addr::from(source),
            destination: Ipv4Addr::from(destination),
        },
    ))
}

fn parse_udp(input: &[u8]) -> IResult<&[u8], UdpHeader> {
    let (input, (source_port, destination_port, length, _checksum)) =
        tuple((be_u16, be_u16, be_u16, be_u16))(input)?;
    Ok((
        input,
        UdpHeader {
            source_port,
            destination_port,
            length,
        },
    ))
}
