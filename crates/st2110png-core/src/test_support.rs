//! Builders for synthetic captures used across the unit tests.

/// Pack `[Cb, Y0, Cr, Y1]` groups of 10-bit samples, MSB first.
pub fn pack_pgroups(groups: &[[u16; 4]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(groups.len() * 5);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;

    for &sample in groups.iter().flatten() {
        acc = (acc << 10) | u32::from(sample & 0x3FF);
        bits += 10;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
        acc &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push((acc << (8 - bits)) as u8);
    }
    out
}

/// One SRD header plus its data segment.
#[derive(Debug, Clone)]
pub struct SrdSpec {
    pub row: u16,
    pub offset: u16,
    pub second_field: bool,
    pub data: Vec<u8>,
}

impl SrdSpec {
    pub fn new(row: u16, offset: u16, data: Vec<u8>) -> Self {
        Self {
            row,
            offset,
            second_field: false,
            data,
        }
    }

    pub fn second_field(mut self) -> Self {
        self.second_field = true;
        self
    }
}

/// Build an ST 2110-20 payload; continuation bits are set on all but the
/// last header.
pub fn srd_payload(extended_sequence_number: u16, specs: &[SrdSpec]) -> Vec<u8> {
    let mut out = extended_sequence_number.to_be_bytes().to_vec();

    for (i, spec) in specs.iter().enumerate() {
        let continuation = i + 1 < specs.len();
        out.extend_from_slice(&(spec.data.len() as u16).to_be_bytes());
        let row = (u16::from(spec.second_field) << 15) | (spec.row & 0x7FFF);
        let offset = (u16::from(continuation) << 15) | (spec.offset & 0x7FFF);
        out.extend_from_slice(&row.to_be_bytes());
        out.extend_from_slice(&offset.to_be_bytes());
    }
    for spec in specs {
        out.extend_from_slice(&spec.data);
    }
    out
}

/// RTP version 2, payload type 96, no CSRC.
pub fn rtp_header(marker: bool, sequence_number: u16) -> [u8; 12] {
    let mut header = [0u8; 12];
    header[0] = 0x80;
    header[1] = (u8::from(marker) << 7) | 96;
    header[2..4].copy_from_slice(&sequence_number.to_be_bytes());
    header[4..8].copy_from_slice(&90_000u32.to_be_bytes());
    header[8..12].copy_from_slice(&0x2110_0020u32.to_be_bytes());
    header
}

/// Ethernet/IPv4/UDP framing around an RTP packet.
pub struct FrameBuilder {
    ether_type: u16,
    protocol: u8,
    ip_options: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            ether_type: 0x0800,
            protocol: 17,
            ip_options: Vec::new(),
        }
    }

    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = ether_type;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn ip_options(mut self, options: &[u8]) -> Self {
        assert_eq!(options.len() % 4, 0, "IPv4 options must be whole words");
        self.ip_options = options.to_vec();
        self
    }

    /// Source 10.0.0.1:10000, destination 239.0.0.1:20000.
    pub fn build(&self, rtp_header: &[u8], payload: &[u8]) -> Vec<u8> {
        let udp_len = (8 + rtp_header.len() + payload.len()) as u16;
        let ihl = (20 + self.ip_options.len()) / 4;
        let ip_total = (ihl * 4) as u16 + udp_len;

        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x01, 0x00, 0x5E, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&self.ether_type.to_be_bytes());

        frame.push(0x40 | ihl as u8);
        frame.push(0);
        frame.extend_from_slice(&ip_total.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0x40, 0, 64, self.protocol, 0, 0]);
        frame.extend_from_slice(&[10, 0, 0, 1]);
        frame.extend_from_slice(&[239, 0, 0, 1]);
        frame.extend_from_slice(&self.ip_options);

        frame.extend_from_slice(&10000u16.to_be_bytes());
        frame.extend_from_slice(&20000u16.to_be_bytes());
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);

        frame.extend_from_slice(rtp_header);
        frame.extend_from_slice(payload);
        frame
    }
}

pub fn udp_frame(rtp_header: &[u8], payload: &[u8]) -> Vec<u8> {
    FrameBuilder::new().build(rtp_header, payload)
}

/// A complete link-layer frame carrying one RTP packet.
pub fn rtp_frame(marker: bool, sequence_number: u16, payload: &[u8]) -> Vec<u8> {
    udp_frame(&rtp_header(marker, sequence_number), payload)
}

/// Writes capture files: classic pcap, little-endian microsecond by
/// default, or a single-interface pcapng section.
pub struct PcapBuilder {
    big_endian: bool,
    nanoseconds: bool,
    pcapng: bool,
    link_type: u32,
    records: Vec<(u32, u32, Vec<u8>)>,
}

impl PcapBuilder {
    pub fn new() -> Self {
        Self {
            big_endian: false,
            nanoseconds: false,
            pcapng: false,
            link_type: 1,
            records: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn nanoseconds(mut self) -> Self {
        self.nanoseconds = true;
        self
    }

    pub fn pcapng(mut self) -> Self {
        self.pcapng = true;
        self
    }

    pub fn link_type(mut self, link_type: u32) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn record(self, data: &[u8]) -> Self {
        let n = self.records.len() as u32;
        self.record_at(data, n, 0)
    }

    /// `fraction` is in microseconds, or nanoseconds after `nanoseconds()`.
    pub fn record_at(mut self, data: &[u8], seconds: u32, fraction: u32) -> Self {
        self.records.push((seconds, fraction, data.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        if self.pcapng {
            self.build_pcapng()
        } else {
            self.build_pcap()
        }
    }

    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn build_pcap(&self) -> Vec<u8> {
        let magic = if self.nanoseconds { 0xa1b2_3c4d } else { 0xa1b2_c3d4 };
        let mut out = Vec::new();
        out.extend_from_slice(&self.u32_bytes(magic));
        out.extend_from_slice(&self.u16_bytes(2));
        out.extend_from_slice(&self.u16_bytes(4));
        out.extend_from_slice(&self.u32_bytes(0));
        out.extend_from_slice(&self.u32_bytes(0));
        out.extend_from_slice(&self.u32_bytes(65535));
        out.extend_from_slice(&self.u32_bytes(self.link_type));

        for (seconds, fraction, data) in &self.records {
            out.extend_from_slice(&self.u32_bytes(*seconds));
            out.extend_from_slice(&self.u32_bytes(*fraction));
            out.extend_from_slice(&self.u32_bytes(data.len() as u32));
            out.extend_from_slice(&self.u32_bytes(data.len() as u32));
            out.extend_from_slice(data);
        }
        out
    }

    fn build_pcapng(&self) -> Vec<u8> {
        let mut out = Vec::new();

        // Section header, 28 bytes: byte-order magic, version 1.0, unknown length.
        let mut shb = self.u32_bytes(0x1a2b_3c4d).to_vec();
        shb.extend_from_slice(&self.u16_bytes(1));
        shb.extend_from_slice(&self.u16_bytes(0));
        shb.extend_from_slice(&[0xff; 8]);
        self.pcapng_block(&mut out, 0x0a0d_0d0a, &shb);

        // Interface description, 20 bytes unless if_tsresol is given.
        let mut idb = self.u16_bytes(self.link_type as u16).to_vec();
        idb.extend_from_slice(&self.u16_bytes(0));
        idb.extend_from_slice(&self.u32_bytes(65535));
        if self.nanoseconds {
            idb.extend_from_slice(&self.u16_bytes(9));
            idb.extend_from_slice(&self.u16_bytes(1));
            idb.extend_from_slice(&[9, 0, 0, 0]);
            idb.extend_from_slice(&[0; 4]);
        }
        self.pcapng_block(&mut out, 1, &idb);

        let ticks_per_second: u64 = if self.nanoseconds { 1_000_000_000 } else { 1_000_000 };
        for (seconds, fraction, data) in &self.records {
            let ticks = u64::from(*seconds) * ticks_per_second + u64::from(*fraction);
            let mut epb = self.u32_bytes(0).to_vec();
            epb.extend_from_slice(&self.u32_bytes((ticks >> 32) as u32));
            epb.extend_from_slice(&self.u32_bytes(ticks as u32));
            epb.extend_from_slice(&self.u32_bytes(data.len() as u32));
            epb.extend_from_slice(&self.u32_bytes(data.len() as u32));
            epb.extend_from_slice(data);
            epb.resize(epb.len().next_multiple_of(4), 0);
            self.pcapng_block(&mut out, 6, &epb);
        }
        out
    }

    fn pcapng_block(&self, out: &mut Vec<u8>, block_type: u32, body: &[u8]) {
        let total_len = (body.len() + 12) as u32;
        out.extend_from_slice(&self.u32_bytes(block_type));
        out.extend_from_slice(&self.u32_bytes(total_len));
        out.extend_from_slice(body);
        out.extend_from_slice(&self.u32_bytes(total_len));
    }
}

pub const PATTERN_WIDTH: u32 = 8;
pub const PATTERN_HEIGHT: u32 = 4;

const K: [u16; 4] = [512, 64, 512, 940]; // black, white
const G: [u16; 4] = [512, 502, 512, 502]; // gray, gray
const R: [u16; 4] = [512, 64, 1023, 64]; // red, red
const B: [u16; 4] = [1023, 64, 512, 64]; // blue, blue
const W: [u16; 4] = [512, 940, 512, 64]; // white, black

const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [254, 254, 254];
const GRAY: [u8; 3] = [127, 127, 127];
const RED: [u8; 3] = [229, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

const PATTERN: [[[u16; 4]; 4]; 4] = [[K, K, K, K], [R, B, R, B], [G, G, W, W], [B, R, G, K]];

/// Packets for an 8x4 progressive frame: one stray packet, the aligning
/// marker packet, then three data packets ending on a marker bit.
pub fn test_pattern_packets() -> Vec<(bool, Vec<u8>)> {
    let row = |r: usize, groups: std::ops::Range<usize>| pack_pgroups(&PATTERN[r][groups]);

    vec![
        // Before alignment; decoding it would fail since row 9 is off the raster.
        (false, srd_payload(0, &[SrdSpec::new(9, 0, pack_pgroups(&[G; 4]))])),
        (true, vec![0xDE, 0xAD]),
        (false, srd_payload(1, &[SrdSpec::new(0, 0, row(0, 0..4))])),
        (
            false,
            srd_payload(
                1,
                &[SrdSpec::new(1, 0, row(1, 0..2)), SrdSpec::new(1, 4, row(1, 2..4))],
            ),
        ),
        (
            true,
            srd_payload(
                1,
                &[SrdSpec::new(2, 0, row(2, 0..4)), SrdSpec::new(3, 0, row(3, 0..4))],
            ),
        ),
    ]
}

/// The RGBA bytes `test_pattern_packets` must decode to.
pub fn test_pattern_rgba() -> Vec<u8> {
    let rows: [[[u8; 3]; 8]; 4] = [
        [BLACK, WHITE, BLACK, WHITE, BLACK, WHITE, BLACK, WHITE],
        [RED, RED, BLUE, BLUE, RED, RED, BLUE, BLUE],
        [GRAY, GRAY, GRAY, GRAY, WHITE, BLACK, WHITE, BLACK],
        [BLUE, BLUE, RED, RED, GRAY, GRAY, BLACK, WHITE],
    ];

    rows.iter()
        .flatten()
        .flat_map(|&[r, g, b]| [r, g, b, 255])
        .collect()
}

/// `test_pattern_packets` wrapped in Ethernet frames inside a pcap file.
pub fn test_pattern_pcap() -> Vec<u8> {
    test_pattern_packets()
        .iter()
        .enumerate()
        .fold(PcapBuilder::new(), |pcap, (i, (marker, payload))| {
            pcap.record(&rtp_frame(*marker, i as u16, payload))
        })
        .build()
}
