//! Stage 4: packs backend responses into completion (CplD) beats.

use crate::bar::ReadResponse;
use crate::context::ReadContext;
use crate::fifo::BoundedFifo;
use crate::tlp::{swap_dword, CompletionBeat, CompletionHeader, DwordKeep};

/// What a response did to the packet being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assembled {
    /// A new completion header was synthesized.
    Started,
    /// Payload was appended to the open packet.
    Appended,
    /// The response belonged to no open packet and was discarded.
    Discarded,
}

/// Single-instance shift buffer for one completion packet.
#[derive(Debug, Default)]
pub struct Assembler {
    lanes: [u32; 4],
    fill: usize,
    open: bool,
    discarded: u64,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one backend response. Beats are flushed into `output` when four lanes are filled
    /// or the response carries the packet's last DWORD.
    pub fn accept(
        &mut self,
        rsp: &ReadResponse,
        completer_id: u16,
        output: &mut BoundedFifo<CompletionBeat>,
    ) -> Assembled {
        let ctx = ReadContext::unpack(rsp.ctx);
        let data = swap_dword(rsp.data);

        let outcome = if ctx.first {
            if self.open {
                tracing::warn!(
                    tag = ctx.tag,
                    "completion started before the previous packet finished"
                );
            }
            let header = CompletionHeader {
                length_dw: ctx.packet_length_dw(),
                completer_id,
                status: 0,
                byte_count: ctx.byte_count(),
                requester_id: ctx.requester_id,
                tag: ctx.tag,
                lower_address: ctx.lower_address,
            };
            tracing::debug!(
                requester_id = header.requester_id,
                tag = header.tag,
                length_dw = header.length_dw,
                byte_count = header.byte_count,
                lower_address = header.lower_address,
                "completion started"
            );
            let [dw0, dw1, dw2] = header.to_dwords();
            self.lanes = [dw0, dw1, dw2, data];
            self.fill = 4;
            self.open = true;
            Assembled::Started
        } else if self.open {
            self.lanes[self.fill] = data;
            self.fill += 1;
            Assembled::Appended
        } else {
            self.discarded += 1;
            tracing::warn!(tag = ctx.tag, "response outside any completion, discarded");
            return Assembled::Discarded;
        };

        if self.fill == 4 || ctx.last {
            output.push(CompletionBeat {
                data: self.lanes,
                keep: DwordKeep::first_lanes(self.fill),
                last: ctx.last,
                has_more_data: false,
            });
            self.lanes = [0; 4];
            self.fill = 0;
            if ctx.last {
                self.open = false;
            }
        }
        outcome
    }

    /// No packet is open.
    pub fn is_idle(&self) -> bool {
        !self.open
    }

    /// Responses that arrived without a preceding `first` response.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
