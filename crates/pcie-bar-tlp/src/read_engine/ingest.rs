use crate::tlp::{BarHit, TlpBeat};

/// A decoded read request waiting to be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequestEntry {
    pub bar: BarHit,
    pub requester_id: u16,
    pub tag: u8,
    pub address: u32,
    /// 1..=1024.
    pub length_dw: u16,
    pub first_be: u8,
    pub last_be: u8,
}

impl ReadRequestEntry {
    /// Decodes a single-beat read TLP (3DW or 4DW header).
    pub fn decode(beat: &TlpBeat) -> Self {
        Self {
            bar: beat.bar,
            requester_id: beat.requester_id(),
            tag: beat.tag(),
            address: beat.address(),
            length_dw: beat.length_dw(),
            first_be: beat.first_be(),
            last_be: beat.last_be(),
        }
    }
}
