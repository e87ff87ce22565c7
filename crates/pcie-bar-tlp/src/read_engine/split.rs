//! Stage 2: splits read requests into chunks that never cross a 32-DWORD (128-byte) boundary.

use super::ingest::ReadRequestEntry;
use crate::fifo::BoundedFifo;
use crate::tlp::BarHit;

/// Maximum chunk size in DWORDs; chunks are naturally aligned to it.
pub const CHUNK_DWORDS: u16 = 32;

/// One completion packet's worth of a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub address: u32,
    /// 1..=32.
    pub length_dw: u8,
    /// DWORDs left in the read request, counting from this chunk's start.
    pub dwords_remaining: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub bar: BarHit,
    /// Byte enable for the chunk's first DWORD, if it differs from full.
    pub first_be: Option<u8>,
    /// Byte enable for the chunk's final DWORD, if it differs from full.
    pub last_be: Option<u8>,
}

impl Chunk {
    /// 12-bit completion byte count (4096 wraps to 0).
    pub fn byte_count(&self) -> u16 {
        (self.dwords_remaining * 4) & 0xfff
    }
}

fn dwords_to_boundary(address: u32) -> u16 {
    CHUNK_DWORDS - ((address >> 2) & 0x1f) as u16
}

/// Advances `address` by `dwords`, staying within its 4 KiB page.
pub(crate) fn advance_in_page(address: u32, dwords: u16) -> u32 {
    (address & !0xfff) | (address.wrapping_add(u32::from(dwords) * 4) & 0xfff)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    ReqData,
    Processing,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    entry: ReadRequestEntry,
    address: u32,
    remaining: u16,
}

#[derive(Debug)]
pub struct Splitter {
    state: SplitState,
    pending: Option<Pending>,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter {
    pub fn new() -> Self {
        Self {
            state: SplitState::ReqData,
            pending: None,
        }
    }

    /// Emits at most one chunk per tick, and only while `chunks` has room.
    pub fn tick(
        &mut self,
        requests: &mut BoundedFifo<ReadRequestEntry>,
        chunks: &mut BoundedFifo<Chunk>,
    ) {
        if chunks.is_full() {
            return;
        }
        match self.state {
            SplitState::ReqData => {
                let Some(entry) = requests.pop() else {
                    return;
                };
                if entry.length_dw == 1 {
                    chunks.push(Chunk {
                        address: entry.address,
                        length_dw: 1,
                        dwords_remaining: 1,
                        requester_id: entry.requester_id,
                        tag: entry.tag,
                        bar: entry.bar,
                        first_be: Some(entry.first_be),
                        last_be: None,
                    });
                    return;
                }
                self.emit(
                    Pending {
                        entry,
                        address: entry.address,
                        remaining: entry.length_dw,
                    },
                    chunks,
                );
            }
            SplitState::Processing => {
                if let Some(pending) = self.pending.take() {
                    self.emit(pending, chunks);
                }
            }
        }
    }

    fn emit(&mut self, mut pending: Pending, chunks: &mut BoundedFifo<Chunk>) {
        let entry = pending.entry;
        let len = pending.remaining.min(dwords_to_boundary(pending.address));
        let is_first = pending.remaining == entry.length_dw;
        let is_final = len == pending.remaining;

        tracing::trace!(
            addr = pending.address,
            len,
            remaining = pending.remaining,
            "read chunk"
        );
        chunks.push(Chunk {
            address: pending.address,
            length_dw: len as u8,
            dwords_remaining: pending.remaining,
            requester_id: entry.requester_id,
            tag: entry.tag,
            bar: entry.bar,
            first_be: is_first.then_some(entry.first_be),
            last_be: is_final.then_some(entry.last_be),
        });

        pending.remaining -= len;
        pending.address = advance_in_page(pending.address, len);
        if pending.remaining == 0 {
            self.state = SplitState::ReqData;
            self.pending = None;
        } else {
            self.state = SplitState::Processing;
            self.pending = Some(pending);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SplitState::ReqData
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
