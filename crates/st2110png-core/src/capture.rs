//! Offline reader for capture files, classic libpcap and pcapng.
//!
//! Container framing is decoded by `pcap-parser`; the link-layer bytes of
//! each packet are handed to [`crate::net::classify`] untouched.

use std::time::Duration;

use pcap_parser::{
    parse_block_be, parse_block_le, parse_pcap_frame, parse_pcap_frame_be, parse_pcap_header,
    Block, Linktype,
};
use tracing::{debug, error, info, trace, warn};

use crate::error::CaptureError;

const MAGIC_LEN: usize = 4;
const PCAPNG_SECTION_HEADER: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
const PCAPNG_BYTE_ORDER_LE: [u8; 4] = [0x4d, 0x3c, 0x2b, 0x1a];
const PCAPNG_BYTE_ORDER_BE: [u8; 4] = [0x1a, 0x2b, 0x3c, 0x4d];

/// if_tsresol default: microseconds.
const DEFAULT_TICKS_PER_SECOND: u64 = 1_000_000;

/// Container flavour, detected from the first four bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap {
        big_endian: bool,
        nanosecond_timestamps: bool,
    },
    PcapNg,
}

/// One captured link-layer frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRecord<'a> {
    /// Zero-based position among the packets of the file.
    pub index: usize,
    pub timestamp: Duration,
    /// Length of the frame on the wire, which may exceed `data.len()` when
    /// the capture used a short snaplen.
    pub original_len: u32,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
struct Interface {
    link_type: Linktype,
    ticks_per_second: u64,
}

/// Iterates the packets of an in-memory capture file in capture order.
///
/// Iteration ends after the first error.
pub struct CaptureReader<'a> {
    format: CaptureFormat,
    rest: &'a [u8],
    index: usize,
    done: bool,
    big_endian: bool,
    /// Interfaces of the current pcapng section, by interface id.
    interfaces: Vec<Interface>,
}

impl<'a> CaptureReader<'a> {
    /// Validate the file header and position the reader at the first packet.
    pub fn new(data: &'a [u8]) -> Result<Self, CaptureError> {
        let format =
            detect_format(data).inspect_err(|e| error!(%e, "unrecognised capture file"))?;

        let mut reader = Self {
            format,
            rest: data,
            index: 0,
            done: false,
            big_endian: false,
            interfaces: Vec::new(),
        };

        match format {
            CaptureFormat::Pcap {
                big_endian,
                nanosecond_timestamps,
            } => {
                let (rest, header) = parse_pcap_header(data).map_err(|_| {
                    error!(len = data.len(), "pcap global header is truncated");
                    CaptureError::TruncatedHeader
                })?;

                if header.network != Linktype::ETHERNET {
                    error!(link_type = header.network.0, "unsupported pcap link type");
                    return Err(CaptureError::UnsupportedLinkType {
                        link_type: header.network.0,
                    });
                }

                info!(
                    version_major = header.version_major,
                    version_minor = header.version_minor,
                    snaplen = header.snaplen,
                    big_endian,
                    nanosecond_timestamps,
                    "opened pcap capture"
                );
                reader.rest = rest;
                reader.big_endian = big_endian;
            }
            CaptureFormat::PcapNg => match reader.next_block() {
                Some(Block::SectionHeader(_)) => {
                    info!(big_endian = reader.big_endian, "opened pcapng capture");
                }
                _ => {
                    error!(len = data.len(), "pcapng section header is truncated");
                    return Err(CaptureError::TruncatedHeader);
                }
            },
        }

        Ok(reader)
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    fn read_pcap(
        &mut self,
        nanosecond_timestamps: bool,
    ) -> Result<Option<CaptureRecord<'a>>, CaptureError> {
        if self.rest.is_empty() {
            return Ok(None);
        }

        let parsed = if self.big_endian {
            parse_pcap_frame_be(self.rest)
        } else {
            parse_pcap_frame(self.rest)
        };
        let (rest, frame) = parsed.map_err(|_| CaptureError::TruncatedRecord {
            index: self.index,
            available: self.rest.len(),
        })?;
        self.rest = rest;

        let nanos = if nanosecond_timestamps {
            frame.ts_usec
        } else {
            frame.ts_usec.saturating_mul(1_000)
        };
        let timestamp =
            Duration::from_secs(u64::from(frame.ts_sec)) + Duration::from_nanos(u64::from(nanos));

        Ok(Some(self.emit(timestamp, frame.origlen, frame.data)))
    }

    fn read_pcapng(&mut self) -> Result<Option<CaptureRecord<'a>>, CaptureError> {
        loop {
            if self.rest.is_empty() {
                return Ok(None);
            }

            let truncated = CaptureError::TruncatedRecord {
                index: self.index,
                available: self.rest.len(),
            };
            let block = self.next_block().ok_or(truncated)?;

            match block {
                Block::SectionHeader(_) => {
                    debug!(big_endian = self.big_endian, "new pcapng section");
                    self.interfaces.clear();
                }
                Block::InterfaceDescription(idb) => {
                    let ticks_per_second = ticks_per_second(idb.if_tsresol).unwrap_or_else(|| {
                        warn!(if_tsresol = idb.if_tsresol, "unusable timestamp resolution");
                        DEFAULT_TICKS_PER_SECOND
                    });
                    debug!(
                        interface_id = self.interfaces.len(),
                        link_type = idb.linktype.0,
                        ticks_per_second,
                        "interface declared"
                    );
                    self.interfaces.push(Interface {
                        link_type: idb.linktype,
                        ticks_per_second,
                    });
                }
                Block::EnhancedPacket(epb) => {
                    let interface = self.interface(epb.if_id)?;
                    let ticks = (u64::from(epb.ts_high) << 32) | u64::from(epb.ts_low);
                    let timestamp = timestamp_from_ticks(ticks, interface.ticks_per_second);
                    let data: &'a [u8] = epb.data;
                    let len = data.len().min(epb.caplen as usize);
                    return Ok(Some(self.emit(timestamp, epb.origlen, &data[..len])));
                }
                Block::SimplePacket(spb) => {
                    self.interface(0)?;
                    let data: &'a [u8] = spb.data;
                    let len = data.len().min(spb.origlen as usize);
                    return Ok(Some(self.emit(Duration::ZERO, spb.origlen, &data[..len])));
                }
                _ => trace!("skipping pcapng block"),
            }
        }
    }

    /// Parse the next pcapng block, switching byte order at section headers.
    fn next_block(&mut self) -> Option<Block<'a>> {
        if self.rest.starts_with(&PCAPNG_SECTION_HEADER) {
            if let Some(big_endian) = section_byte_order(self.rest) {
                self.big_endian = big_endian;
            }
        }

        let parsed = if self.big_endian {
            parse_block_be(self.rest)
        } else {
            parse_block_le(self.rest)
        };
        let (rest, block) = parsed.ok()?;
        self.rest = rest;
        Some(block)
    }

    fn interface(&self, interface_id: u32) -> Result<Interface, CaptureError> {
        let interface = self
            .interfaces
            .get(interface_id as usize)
            .copied()
            .ok_or(CaptureError::UnknownInterface {
                index: self.index,
                interface_id,
            })?;

        if interface.link_type != Linktype::ETHERNET {
            return Err(CaptureError::UnsupportedLinkType {
                link_type: interface.link_type.0,
            });
        }
        Ok(interface)
    }

    fn emit(
        &mut self,
        timestamp: Duration,
        original_len: u32,
        data: &'a [u8],
    ) -> CaptureRecord<'a> {
        let record = CaptureRecord {
            index: self.index,
            timestamp,
            original_len,
            data,
        };
        self.index += 1;
        record
    }
}

impl<'a> Iterator for CaptureReader<'a> {
    type Item = Result<CaptureRecord<'a>, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.format {
            CaptureFormat::Pcap {
                nanosecond_timestamps,
                ..
            } => self.read_pcap(nanosecond_timestamps),
            CaptureFormat::PcapNg => self.read_pcapng(),
        };

        match result {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                debug!(records = self.index, "end of capture");
                self.done = true;
                None
            }
            Err(e) => {
                error!(%e, "failed to read capture");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn detect_format(data: &[u8]) -> Result<CaptureFormat, CaptureError> {
    let magic: [u8; MAGIC_LEN] = data
        .get(..MAGIC_LEN)
        .and_then(|m| m.try_into().ok())
        .ok_or(CaptureError::TruncatedHeader)?;

    let pcap = |big_endian, nanosecond_timestamps| CaptureFormat::Pcap {
        big_endian,
        nanosecond_timestamps,
    };
    match magic {
        [0xd4, 0xc3, 0xb2, 0xa1] => Ok(pcap(false, false)),
        [0x4d, 0x3c, 0xb2, 0xa1] => Ok(pcap(false, true)),
        [0xa1, 0xb2, 0xc3, 0xd4] => Ok(pcap(true, false)),
        [0xa1, 0xb2, 0x3c, 0x4d] => Ok(pcap(true, true)),
        PCAPNG_SECTION_HEADER => Ok(CaptureFormat::PcapNg),
        _ => Err(CaptureError::BadMagic {
            magic: u32::from_be_bytes(magic),
        }),
    }
}

/// Byte order of a pcapng section, from the magic after the block length.
fn section_byte_order(block: &[u8]) -> Option<bool> {
    match block.get(8..12)? {
        magic if magic == &PCAPNG_BYTE_ORDER_LE[..] => Some(false),
        magic if magic == &PCAPNG_BYTE_ORDER_BE[..] => Some(true),
        _ => None,
    }
}

/// Decode if_tsresol: high bit clear is a power of ten, set a power of two.
fn ticks_per_second(if_tsresol: u8) -> Option<u64> {
    let exponent = u32::from(if_tsresol & 0x7f);
    if if_tsresol & 0x80 == 0 {
        10u64.checked_pow(exponent)
    } else {
        1u64.checked_shl(exponent)
    }
}

fn timestamp_from_ticks(ticks: u64, ticks_per_second: u64) -> Duration {
    let seconds = ticks / ticks_per_second;
    let remainder = u128::from(ticks % ticks_per_second);
    let nanos = remainder * 1_000_000_000 / u128::from(ticks_per_second);
    Duration::new(seconds, nanos as u32)
}
