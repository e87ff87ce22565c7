//! Stage 3: walks each chunk one DWORD per tick, producing backend read requests.

use super::split::{advance_in_page, Chunk};
use crate::bar::ReadRequest;
use crate::context::ReadContext;
use crate::fifo::BoundedFifo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpandState {
    ReqData,
    Processing,
}

#[derive(Debug, Clone, Copy)]
struct Walk {
    chunk: Chunk,
    index: u8,
}

impl Walk {
    fn request(&self) -> ReadRequest {
        let chunk = &self.chunk;
        let first = self.index == 0;
        let last = self.index + 1 == chunk.length_dw;

        let byte_enable = match (first, last) {
            (true, _) if chunk.first_be.is_some() => chunk.first_be,
            (_, true) if chunk.last_be.is_some() => chunk.last_be,
            _ => None,
        }
        .unwrap_or(0xf);

        let ctx = ReadContext {
            first,
            last,
            dwords_remaining: chunk.dwords_remaining,
            requester_id: chunk.requester_id,
            tag: chunk.tag,
            bar: chunk.bar,
            lower_address: (chunk.address & 0x7f) as u8,
            address: chunk.address,
        };
        ReadRequest {
            ctx: ctx.pack(),
            bar: chunk.bar,
            addr: advance_in_page(chunk.address, u16::from(self.index)),
            byte_enable,
        }
    }
}

#[derive(Debug)]
pub struct Expander {
    state: ExpandState,
    walk: Option<Walk>,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    pub fn new() -> Self {
        Self {
            state: ExpandState::ReqData,
            walk: None,
        }
    }

    /// Emits the next single-DWORD read while `enable` is asserted.
    ///
    /// In `ReqData` the first DWORD of a fresh chunk goes out on the same tick it is dequeued.
    pub fn tick(&mut self, chunks: &mut BoundedFifo<Chunk>, enable: bool) -> Option<ReadRequest> {
        if !enable {
            return None;
        }
        let walk = match self.state {
            ExpandState::ReqData => Walk {
                chunk: chunks.pop()?,
                index: 0,
            },
            ExpandState::Processing => self.walk.take()?,
        };

        let req = walk.request();
        if walk.index + 1 < walk.chunk.length_dw {
            self.state = ExpandState::Processing;
            self.walk = Some(Walk {
                index: walk.index + 1,
                ..walk
            });
        } else {
            self.state = ExpandState::ReqData;
            self.walk = None;
        }
        Some(req)
    }

    pub fn is_idle(&self) -> bool {
        self.state == ExpandState::ReqData
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
