//! Read engine: read TLPs in, single-DWORD backend reads out, completion beats back.
//!
//! Four stages connected by bounded FIFOs:
//!
//! 1. [`ingest`] decodes a single-beat read TLP into a request entry.
//! 2. [`split`] cuts the request into chunks that never cross a 128-byte boundary.
//! 3. [`expand`] walks each chunk one DWORD per tick and issues backend reads.
//! 4. [`assemble`] packs backend responses into completion beats.
//!
//! Backend dispatch is gated by the output queue's programmable-empty flag so that every read
//! in flight has room to land.

pub mod assemble;
pub mod expand;
pub mod ingest;
pub mod split;

use crate::bar::{ReadRequest, ReadResponse};
use crate::fifo::BoundedFifo;
use crate::tlp::{CompletionBeat, TlpBeat};

use assemble::{Assembled, Assembler};
use expand::Expander;
use ingest::ReadRequestEntry;
use split::{Chunk, Splitter};

/// Outputs of one read-engine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadTick {
    pub request: Option<ReadRequest>,
    pub completion: Option<CompletionBeat>,
}

/// FIFO overflow counters of the read path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadDrops {
    pub requests: u64,
    pub chunks: u64,
    pub output: u64,
    pub responses: u64,
}

#[derive(Debug)]
pub struct ReadEngine {
    requests: BoundedFifo<ReadRequestEntry>,
    splitter: Splitter,
    chunks: BoundedFifo<Chunk>,
    expander: Expander,
    assembler: Assembler,
    output: BoundedFifo<CompletionBeat>,
    /// Completion packets started but whose last beat has not left the output queue.
    outstanding_packets: usize,
}

impl ReadEngine {
    pub fn new(
        request_depth: usize,
        chunk_depth: usize,
        output_depth: usize,
        output_ready_threshold: usize,
    ) -> Self {
        Self {
            requests: BoundedFifo::new("read request", request_depth, 0),
            splitter: Splitter::new(),
            chunks: BoundedFifo::new("read chunk", chunk_depth, 0),
            expander: Expander::new(),
            assembler: Assembler::new(),
            output: BoundedFifo::new("completion", output_depth, output_ready_threshold),
            outstanding_packets: 0,
        }
    }

    /// Queues a claimed single-beat read TLP.
    pub fn push(&mut self, beat: &TlpBeat) {
        let entry = ReadRequestEntry::decode(beat);
        tracing::debug!(
            bar = entry.bar.bits(),
            addr = entry.address,
            length_dw = entry.length_dw,
            requester_id = entry.requester_id,
            tag = entry.tag,
            "read TLP claimed"
        );
        self.requests.push(entry);
    }

    /// Advances every stage by one clock.
    ///
    /// `response` is this tick's muxed backend response. `out_ready` is the downstream
    /// handshake for the completion stream.
    pub fn tick(
        &mut self,
        response: Option<&ReadResponse>,
        out_ready: bool,
        completer_id: u16,
    ) -> ReadTick {
        if let Some(rsp) = response {
            if self.assembler.accept(rsp, completer_id, &mut self.output) == Assembled::Started {
                self.outstanding_packets += 1;
            }
        }

        let completion = if out_ready {
            self.output.pop().map(|mut beat| {
                if beat.last {
                    self.outstanding_packets = self.outstanding_packets.saturating_sub(1);
                }
                beat.has_more_data = self.outstanding_packets > 0;
                beat
            })
        } else {
            None
        };

        let enable = self.output.prog_empty();
        let request = self.expander.tick(&mut self.chunks, enable);

        self.splitter.tick(&mut self.requests, &mut self.chunks);

        ReadTick {
            request,
            completion,
        }
    }

    /// Completion data is queued or still being assembled.
    pub fn has_more_data(&self) -> bool {
        self.outstanding_packets > 0
    }

    pub fn outstanding_packets(&self) -> usize {
        self.outstanding_packets
    }

    /// Nothing queued in any stage and no packet open. Reads still inside a backend's latency
    /// window are not visible here.
    pub fn is_idle(&self) -> bool {
        self.requests.is_empty()
            && self.splitter.is_idle()
            && self.chunks.is_empty()
            && self.expander.is_idle()
            && self.assembler.is_idle()
            && self.output.is_empty()
    }

    pub fn drops(&self) -> ReadDrops {
        ReadDrops {
            requests: self.requests.dropped(),
            chunks: self.chunks.dropped(),
            output: self.output.dropped(),
            responses: self.assembler.discarded(),
        }
    }

    pub fn reset(&mut self) {
        self.requests.clear();
        self.splitter.reset();
        self.chunks.clear();
        self.expander.reset();
        self.assembler.reset();
        self.output.clear();
        self.outstanding_packets = 0;
    }
}
