//! 128-bit TLP stream types.
//!
//! A beat carries four DWORD lanes, lane 0 being the first DWORD on the wire. Header DWORDs are
//! stored in their numeric (field) order, so `data[0] >> 29` is the `Fmt` field. Payload DWORDs are
//! stored in wire byte order: the byte at the lowest address sits in bits 31:24. Backends see
//! payload in native order, see [`swap_dword`].

use bitflags::bitflags;

use crate::error::{EncodeError, TlpError};

/// Largest read/write length expressible in the 10-bit length field.
pub const MAX_TLP_DWORDS: usize = 1024;

const FMT_TYPE_CPLD: u8 = 0b0100_1010;

bitflags! {
    /// Per-DWORD lane valid mask of a beat.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DwordKeep: u8 {
        const DW0 = 1 << 0;
        const DW1 = 1 << 1;
        const DW2 = 1 << 2;
        const DW3 = 1 << 3;
    }
}

impl DwordKeep {
    /// Mask with lanes `0..count` set.
    pub fn first_lanes(count: usize) -> Self {
        Self::from_bits_truncate(((1u16 << count.min(4)) - 1) as u8)
    }

    pub fn lane(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }

    pub fn has_lane(self, index: usize) -> bool {
        index < 4 && self.contains(Self::lane(index))
    }
}

bitflags! {
    /// BAR hit selector decoded by the PCIe core from address routing.
    ///
    /// Normally one-hot; empty means the TLP did not target a BAR.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BarHit: u8 {
        const BAR0 = 1 << 0;
        const BAR1 = 1 << 1;
        const BAR2 = 1 << 2;
        const BAR3 = 1 << 3;
        const BAR4 = 1 << 4;
        const BAR5 = 1 << 5;
        const BAR6 = 1 << 6;
    }
}

impl BarHit {
    /// One-hot selector for slot `index` (0..7). Out-of-range indices yield an empty selector.
    pub fn slot(index: usize) -> Self {
        if index < 7 {
            Self::from_bits_truncate(1 << index)
        } else {
            Self::empty()
        }
    }

    pub fn selects(self, index: usize) -> bool {
        index < 7 && self.contains(Self::slot(index))
    }
}

/// Reverses the byte order of one DWORD lane (wire order <-> backend-native order).
#[inline]
pub const fn swap_dword(value: u32) -> u32 {
    value.swap_bytes()
}

/// One inbound beat of the TLP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlpBeat {
    pub data: [u32; 4],
    pub keep: DwordKeep,
    pub first: bool,
    pub last: bool,
    pub bar: BarHit,
}

impl TlpBeat {
    /// `Fmt` field (DW0 bits 31:29). Only meaningful on a first beat.
    pub fn fmt(&self) -> u8 {
        (self.data[0] >> 29) as u8
    }

    /// `Type` field (DW0 bits 28:24).
    pub fn tlp_type(&self) -> u8 {
        ((self.data[0] >> 24) & 0x1f) as u8
    }

    pub fn has_4dw_header(&self) -> bool {
        self.fmt() & 0b001 != 0
    }

    pub fn has_data(&self) -> bool {
        self.fmt() & 0b010 != 0
    }

    /// Decoded length in DWORDs; a raw length field of zero means 1024.
    pub fn length_dw(&self) -> u16 {
        decode_length(self.data[0])
    }

    pub fn requester_id(&self) -> u16 {
        (self.data[1] >> 16) as u16
    }

    pub fn tag(&self) -> u8 {
        (self.data[1] >> 8) as u8
    }

    pub fn first_be(&self) -> u8 {
        (self.data[1] & 0xf) as u8
    }

    pub fn last_be(&self) -> u8 {
        ((self.data[1] >> 4) & 0xf) as u8
    }

    /// Low 32 bits of the target address, DWORD aligned.
    ///
    /// 4DW headers carry the upper half in DW2 and the lower half in DW3; only the lower half is
    /// routed to backends.
    pub fn address(&self) -> u32 {
        let raw = if self.has_4dw_header() {
            self.data[3]
        } else {
            self.data[2]
        };
        raw & !0x3
    }
}

pub(crate) fn decode_length(dw0: u32) -> u16 {
    match (dw0 & 0x3ff) as u16 {
        0 => MAX_TLP_DWORDS as u16,
        len => len,
    }
}

fn encode_length(length_dw: usize) -> u32 {
    (length_dw as u32) & 0x3ff
}

/// Header kinds the engines claim. Everything else is ignored by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// Memory (3DW/4DW) or I/O read request.
    Read,
    /// Memory (3DW/4DW) or I/O write request.
    Write,
    Other,
}

/// Classifies a first-beat DW0 by its `Fmt`/`Type` bits.
pub fn classify_header(dw0: u32) -> HeaderClass {
    let fmt_type7 = dw0 >> 25;
    let fmt_type8 = dw0 >> 24;
    match (fmt_type7, fmt_type8) {
        // MRd 3DW, MRd 4DW, IORd
        (0b000_0000, _) | (0b001_0000, _) | (_, 0b0000_0010) => HeaderClass::Read,
        // MWr 3DW, MWr 4DW, IOWr
        (0b010_0000, _) | (0b011_0000, _) | (_, 0b0100_0010) => HeaderClass::Write,
        _ => HeaderClass::Other,
    }
}

fn header_dw1(requester_id: u16, tag: u8, first_be: u8, last_be: u8) -> u32 {
    (u32::from(requester_id) << 16)
        | (u32::from(tag) << 8)
        | (u32::from(last_be & 0xf) << 4)
        | u32::from(first_be & 0xf)
}

fn check_address(address: u64) -> Result<(), EncodeError> {
    if address & 0x3 != 0 {
        return Err(EncodeError::Unaligned(address));
    }
    Ok(())
}

/// Memory read request, used by harnesses to drive the controller.
///
/// Addresses above 4 GiB are encoded with a 4DW header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRead {
    pub requester_id: u16,
    pub tag: u8,
    pub address: u64,
    pub length_dw: usize,
    pub first_be: u8,
    pub last_be: u8,
}

impl MemRead {
    pub fn new(address: u64, length_dw: usize) -> Self {
        Self {
            requester_id: 0,
            tag: 0,
            address,
            length_dw,
            first_be: 0xf,
            last_be: 0xf,
        }
    }

    pub fn with_requester(mut self, requester_id: u16, tag: u8) -> Self {
        self.requester_id = requester_id;
        self.tag = tag;
        self
    }

    pub fn with_byte_enables(mut self, first_be: u8, last_be: u8) -> Self {
        self.first_be = first_be;
        self.last_be = last_be;
        self
    }

    pub fn encode(&self, bar: BarHit) -> Result<TlpBeat, EncodeError> {
        if !(1..=MAX_TLP_DWORDS).contains(&self.length_dw) {
            return Err(EncodeError::Length(self.length_dw));
        }
        check_address(self.address)?;

        let last_be = if self.length_dw == 1 { 0 } else { self.last_be };
        let dw1 = header_dw1(self.requester_id, self.tag, self.first_be, last_be);
        let len = encode_length(self.length_dw);
        let data = if self.address > u64::from(u32::MAX) {
            [
                0x2000_0000 | len,
                dw1,
                (self.address >> 32) as u32,
                self.address as u32,
            ]
        } else {
            [len, dw1, self.address as u32, 0]
        };
        let keep = if self.address > u64::from(u32::MAX) {
            DwordKeep::all()
        } else {
            DwordKeep::first_lanes(3)
        };
        Ok(TlpBeat {
            data,
            keep,
            first: true,
            last: true,
            bar,
        })
    }
}

/// Memory write request with a backend-native payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemWrite {
    pub requester_id: u16,
    pub tag: u8,
    pub address: u64,
    pub first_be: u8,
    pub last_be: u8,
    pub payload: Vec<u32>,
}

impl MemWrite {
    pub fn new(address: u64, payload: Vec<u32>) -> Self {
        Self {
            requester_id: 0,
            tag: 0,
            address,
            first_be: 0xf,
            last_be: 0xf,
            payload,
        }
    }

    pub fn with_byte_enables(mut self, first_be: u8, last_be: u8) -> Self {
        self.first_be = first_be;
        self.last_be = last_be;
        self
    }

    /// Serializes the request into 128-bit beats.
    pub fn encode(&self, bar: BarHit) -> Result<Vec<TlpBeat>, EncodeError> {
        let len = self.payload.len();
        if !(1..=MAX_TLP_DWORDS).contains(&len) {
            return Err(EncodeError::Length(len));
        }
        check_address(self.address)?;

        let last_be = if len == 1 { 0 } else { self.last_be };
        let dw1 = header_dw1(self.requester_id, self.tag, self.first_be, last_be);

        let mut dwords: Vec<u32> = Vec::with_capacity(len + 4);
        if self.address > u64::from(u32::MAX) {
            dwords.push(0x6000_0000 | encode_length(len));
            dwords.push(dw1);
            dwords.push((self.address >> 32) as u32);
            dwords.push(self.address as u32);
        } else {
            dwords.push(0x4000_0000 | encode_length(len));
            dwords.push(dw1);
            dwords.push(self.address as u32);
        }
        dwords.extend(self.payload.iter().map(|&v| swap_dword(v)));

        let beat_count = dwords.len().div_ceil(4);
        let beats = dwords
            .chunks(4)
            .enumerate()
            .map(|(i, lanes)| {
                let mut data = [0u32; 4];
                data[..lanes.len()].copy_from_slice(lanes);
                TlpBeat {
                    data,
                    keep: DwordKeep::first_lanes(lanes.len()),
                    first: i == 0,
                    last: i + 1 == beat_count,
                    bar,
                }
            })
            .collect();
        Ok(beats)
    }
}

/// Number of beats a write TLP with `payload_dw` DWORDs occupies in the worst case (4DW header).
pub fn write_tlp_beats(payload_dw: usize) -> usize {
    1 + payload_dw.div_ceil(4)
}

/// One outgoing beat of the completion stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionBeat {
    pub data: [u32; 4],
    pub keep: DwordKeep,
    pub last: bool,
    /// More completion data is in flight after this beat: the rest of this packet, or another
    /// packet already started.
    pub has_more_data: bool,
}

/// The three header DWORDs of a completion with data (CplD).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionHeader {
    pub length_dw: u16,
    pub completer_id: u16,
    pub status: u8,
    /// Remaining bytes including this packet; 4096 is carried as 0 on the wire.
    pub byte_count: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub lower_address: u8,
}

impl CompletionHeader {
    pub fn to_dwords(&self) -> [u32; 3] {
        [
            (u32::from(FMT_TYPE_CPLD) << 24) | encode_length(usize::from(self.length_dw)),
            (u32::from(self.completer_id) << 16)
                | (u32::from(self.status & 0x7) << 13)
                | (u32::from(self.byte_count) & 0xfff),
            (u32::from(self.requester_id) << 16)
                | (u32::from(self.tag) << 8)
                | u32::from(self.lower_address & 0x7f),
        ]
    }

    pub fn from_dwords(dwords: [u32; 3]) -> Result<Self, TlpError> {
        let fmt_type = (dwords[0] >> 24) as u8;
        if fmt_type != FMT_TYPE_CPLD {
            return Err(TlpError::NotCompletion { fmt_type });
        }
        let byte_count = match (dwords[1] & 0xfff) as u16 {
            0 => 4096,
            n => n,
        };
        Ok(Self {
            length_dw: decode_length(dwords[0]),
            completer_id: (dwords[1] >> 16) as u16,
            status: ((dwords[1] >> 13) & 0x7) as u8,
            byte_count,
            requester_id: (dwords[2] >> 16) as u16,
            tag: (dwords[2] >> 8) as u8,
            lower_address: (dwords[2] & 0x7f) as u8,
        })
    }
}

/// A decoded completion packet with its payload in backend-native byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub header: CompletionHeader,
    pub data: Vec<u32>,
}

impl Completion {
    /// Splits a beat stream at its last flags and decodes every packet.
    pub fn collect(beats: &[CompletionBeat]) -> Result<Vec<Completion>, TlpError> {
        let mut packets = Vec::new();
        let mut start = 0;
        for (i, beat) in beats.iter().enumerate() {
            if beat.last {
                packets.push(Self::parse(&beats[start..=i])?);
                start = i + 1;
            }
        }
        if start != beats.len() {
            return Err(TlpError::MissingLast);
        }
        Ok(packets)
    }

    /// Decodes one packet (beats up to and including its last beat).
    pub fn parse(beats: &[CompletionBeat]) -> Result<Completion, TlpError> {
        let dwords: Vec<u32> = beats
            .iter()
            .flat_map(|beat| {
                (0..4)
                    .filter(|&lane| beat.keep.has_lane(lane))
                    .map(|lane| beat.data[lane])
            })
            .collect();
        if dwords.len() < 3 {
            return Err(TlpError::Truncated {
                dwords: dwords.len(),
            });
        }
        let header = CompletionHeader::from_dwords([dwords[0], dwords[1], dwords[2]])?;
        let data: Vec<u32> = dwords[3..].iter().map(|&v| swap_dword(v)).collect();
        if data.len() != usize::from(header.length_dw) {
            return Err(TlpError::LengthMismatch {
                expected: usize::from(header.length_dw),
                actual: data.len(),
            });
        }
        Ok(Completion { header, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_read_and_write_headers() {
        assert_eq!(classify_header(0x0000_0004), HeaderClass::Read);
        assert_eq!(classify_header(0x2000_0001), HeaderClass::Read);
        assert_eq!(classify_header(0x0200_0001), HeaderClass::Read);
        assert_eq!(classify_header(0x4000_0001), HeaderClass::Write);
        assert_eq!(classify_header(0x6000_0010), HeaderClass::Write);
        assert_eq!(classify_header(0x4200_0001), HeaderClass::Write);

        // Config read type 0, completion, message.
        assert_eq!(classify_header(0x0400_0001), HeaderClass::Other);
        assert_eq!(classify_header(0x4a00_0001), HeaderClass::Other);
        assert_eq!(classify_header(0x3000_0000), HeaderClass::Other);
    }

    #[test]
    fn zero_length_field_decodes_as_1024() {
        let beat = MemRead::new(0x1000, 1024).encode(BarHit::BAR0).unwrap();
        assert_eq!(beat.data[0] & 0x3ff, 0);
        assert_eq!(beat.length_dw(), 1024);
    }

    #[test]
    fn read_header_fields_round_trip() {
        let beat = MemRead::new(0x1234_5678, 7)
            .with_requester(0xbeef, 0x42)
            .with_byte_enables(0xe, 0x3)
            .encode(BarHit::BAR3)
            .unwrap();
        assert!(!beat.has_4dw_header());
        assert!(!beat.has_data());
        assert_eq!(beat.length_dw(), 7);
        assert_eq!(beat.requester_id(), 0xbeef);
        assert_eq!(beat.tag(), 0x42);
        assert_eq!(beat.first_be(), 0xe);
        assert_eq!(beat.last_be(), 0x3);
        assert_eq!(beat.address(), 0x1234_5678);
        assert_eq!(beat.keep, DwordKeep::first_lanes(3));
    }

    #[test]
    fn high_addresses_use_4dw_header() {
        let beat = MemRead::new(0x1_0000_2000, 1).encode(BarHit::BAR0).unwrap();
        assert!(beat.has_4dw_header());
        assert_eq!(beat.address(), 0x2000);
        assert_eq!(beat.data[2], 1);
        // Single-DWORD requests never carry a last byte enable.
        assert_eq!(beat.last_be(), 0);
    }

    #[test]
    fn write_encoding_places_first_payload_in_lane_3_of_3dw_header() {
        let beats = MemWrite::new(0x2000, vec![0x1122_3344, 0x5566_7788])
            .encode(BarHit::BAR1)
            .unwrap();
        assert_eq!(beats.len(), 2);
        assert!(beats[0].first && !beats[0].last);
        assert_eq!(beats[0].data[3], 0x4433_2211);
        assert_eq!(beats[1].keep, DwordKeep::DW0);
        assert!(beats[1].last);
        assert_eq!(beats[1].data[0], 0x8877_6655);
    }

    #[test]
    fn encode_rejects_bad_requests() {
        assert_eq!(
            MemRead::new(0x1000, 0).encode(BarHit::BAR0),
            Err(EncodeError::Length(0))
        );
        assert_eq!(
            MemRead::new(0x1002, 1).encode(BarHit::BAR0),
            Err(EncodeError::Unaligned(0x1002))
        );
        assert_eq!(
            MemWrite::new(0x1000, vec![0; 1025]).encode(BarHit::BAR0),
            Err(EncodeError::Length(1025))
        );
    }

    #[test]
    fn completion_header_round_trip() {
        let header = CompletionHeader {
            length_dw: 32,
            completer_id: 0x0800,
            status: 0,
            byte_count: 4096,
            requester_id: 0x0100,
            tag: 0x05,
            lower_address: 0x40,
        };
        let dwords = header.to_dwords();
        assert_eq!(dwords[0], 0x4a00_0020);
        assert_eq!(dwords[1] & 0xfff, 0);
        assert_eq!(CompletionHeader::from_dwords(dwords), Ok(header));
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        let header = CompletionHeader {
            length_dw: 2,
            completer_id: 0,
            status: 0,
            byte_count: 8,
            requester_id: 0,
            tag: 0,
            lower_address: 0,
        }
        .to_dwords();
        let beat = CompletionBeat {
            data: [header[0], header[1], header[2], 0],
            keep: DwordKeep::all(),
            last: true,
            has_more_data: false,
        };
        assert_eq!(
            Completion::parse(&[beat]),
            Err(TlpError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            Completion::collect(&[CompletionBeat {
                last: false,
                ..beat
            }]),
            Err(TlpError::MissingLast)
        );
    }
}
