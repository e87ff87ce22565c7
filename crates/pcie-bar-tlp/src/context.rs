//! Read-request context threaded through the backends.
//!
//! Bit layout of the 88-bit raw form:
//!
//! | bits   | field                                              |
//! |--------|----------------------------------------------------|
//! | 31:0   | chunk base address                                 |
//! | 38:32  | BAR hit                                            |
//! | 45:39  | lower address (chunk base bits 6:0)                |
//! | 53:46  | tag                                                |
//! | 69:54  | requester ID                                       |
//! | 80:70  | DWORDs remaining in the request from the chunk base |
//! | 85:81  | reserved, zero                                     |
//! | 86     | last DWORD of the completion packet                |
//! | 87     | first DWORD of the completion packet               |

use crate::tlp::BarHit;

pub const CONTEXT_BITS: u32 = 88;

const ADDRESS_SHIFT: u32 = 0;
const BAR_SHIFT: u32 = 32;
const LOWER_ADDRESS_SHIFT: u32 = 39;
const TAG_SHIFT: u32 = 46;
const REQUESTER_SHIFT: u32 = 54;
const REMAINING_SHIFT: u32 = 70;
const LAST_SHIFT: u32 = 86;
const FIRST_SHIFT: u32 = 87;

/// Opaque context as seen by backends. Must be returned unmodified with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawContext(u128);

impl RawContext {
    pub const MASK: u128 = (1u128 << CONTEXT_BITS) - 1;

    /// Bits above 87 are discarded.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u128 {
        self.0
    }
}

/// Typed view of a [`RawContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    pub first: bool,
    pub last: bool,
    /// 1..=1024.
    pub dwords_remaining: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub bar: BarHit,
    pub lower_address: u8,
    pub address: u32,
}

fn field(bits: u128, shift: u32, width: u32) -> u128 {
    (bits >> shift) & ((1u128 << width) - 1)
}

impl ReadContext {
    pub fn pack(&self) -> RawContext {
        let bits = (u128::from(self.address) << ADDRESS_SHIFT)
            | (u128::from(self.bar.bits() & 0x7f) << BAR_SHIFT)
            | (u128::from(self.lower_address & 0x7f) << LOWER_ADDRESS_SHIFT)
            | (u128::from(self.tag) << TAG_SHIFT)
            | (u128::from(self.requester_id) << REQUESTER_SHIFT)
            | (u128::from(self.dwords_remaining & 0x7ff) << REMAINING_SHIFT)
            | (u128::from(self.last) << LAST_SHIFT)
            | (u128::from(self.first) << FIRST_SHIFT);
        RawContext::from_bits(bits)
    }

    pub fn unpack(raw: RawContext) -> Self {
        let bits = raw.bits();
        Self {
            first: field(bits, FIRST_SHIFT, 1) != 0,
            last: field(bits, LAST_SHIFT, 1) != 0,
            dwords_remaining: field(bits, REMAINING_SHIFT, 11) as u16,
            requester_id: field(bits, REQUESTER_SHIFT, 16) as u16,
            tag: field(bits, TAG_SHIFT, 8) as u8,
            bar: BarHit::from_bits_truncate(field(bits, BAR_SHIFT, 7) as u8),
            lower_address: field(bits, LOWER_ADDRESS_SHIFT, 7) as u8,
            address: field(bits, ADDRESS_SHIFT, 32) as u32,
        }
    }

    /// Byte count reported in the completion: every remaining byte of the request.
    pub fn byte_count(&self) -> u16 {
        self.dwords_remaining * 4
    }

    /// DWORDs carried by this completion packet: up to the next 128-byte boundary.
    pub fn packet_length_dw(&self) -> u16 {
        let to_boundary = (128 - u16::from(self.lower_address & 0x7c)) / 4;
        self.dwords_remaining.min(to_boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReadContext {
        ReadContext {
            first: true,
            last: false,
            dwords_remaining: 1024,
            requester_id: 0xa5c3,
            tag: 0x7e,
            bar: BarHit::BAR6,
            lower_address: 0x44,
            address: 0xdead_bec4,
        }
    }

    #[test]
    fn pack_unpack_round_trip() {
        let ctx = sample();
        assert_eq!(ReadContext::unpack(ctx.pack()), ctx);
    }

    #[test]
    fn raw_context_fits_in_88_bits() {
        let raw = ReadContext {
            first: true,
            last: true,
            dwords_remaining: 0x7ff,
            requester_id: 0xffff,
            tag: 0xff,
            bar: BarHit::all(),
            lower_address: 0x7f,
            address: u32::MAX,
        }
        .pack();
        assert_eq!(raw.bits() >> CONTEXT_BITS, 0);
        assert_eq!(RawContext::from_bits(u128::MAX).bits(), RawContext::MASK);
    }

    #[test]
    fn packet_length_stops_at_128_byte_boundary() {
        let mut ctx = sample();
        // 0x44 is 17 DWORDs into the 32-DWORD window.
        assert_eq!(ctx.packet_length_dw(), 15);
        ctx.lower_address = 0;
        assert_eq!(ctx.packet_length_dw(), 32);
        ctx.dwords_remaining = 3;
        assert_eq!(ctx.packet_length_dw(), 3);
        assert_eq!(ctx.byte_count(), 12);
    }
}
