//! Top level: ingress classification, both engines, the BAR slots and the response mux.
//!
//! One call to [`BarController::tick`] is one clock edge. Stages are evaluated downstream first
//! so every inter-stage FIFO behaves like a registered queue: a beat accepted on tick `n` is
//! first visible to the engines on tick `n + 1`.

use crate::bar::{
    select_response, BarImplementation, BarSlot, ReadRequest, ReadResponse, Unmapped,
    WriteRequest, BAR_SLOTS,
};
use crate::config::BarControllerConfig;
use crate::error::{AttachError, ConfigError};
use crate::read_engine::ReadEngine;
use crate::stats::ControllerStats;
use crate::tlp::{classify_header, CompletionBeat, HeaderClass, TlpBeat};
use crate::write_engine::WriteEngine;

/// Everything observable on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutput {
    /// Write fanned out to the addressed slot(s) this tick.
    pub write: Option<WriteRequest>,
    /// Read presented to the addressed slot(s) this tick.
    pub read_request: Option<ReadRequest>,
    /// Backend response selected by the mux this tick.
    pub read_response: Option<ReadResponse>,
    pub completion: Option<CompletionBeat>,
    /// Backpressure towards the ingress: a new write TLP would be claimed.
    pub write_ready: bool,
    pub has_more_data: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct IngressCounters {
    read_tlps: u64,
    write_tlps: u64,
    refused_writes: u64,
    ignored_beats: u64,
    response_conflicts: u64,
    completions: u64,
}

#[derive(Debug)]
pub struct BarController {
    config: BarControllerConfig,
    write: WriteEngine,
    read: ReadEngine,
    slots: [BarSlot; BAR_SLOTS],
    /// The previous beat started or continued a claimed write TLP that has not ended yet.
    write_continuation: bool,
    counters: IngressCounters,
}

impl BarController {
    pub fn new(config: BarControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let latency = usize::from(config.backend_latency);
        Ok(Self {
            write: WriteEngine::new(config.write_fifo_depth, config.write_ready_threshold),
            read: ReadEngine::new(
                config.read_fifo_depth,
                config.chunk_fifo_depth,
                config.output_fifo_depth,
                config.output_ready_threshold,
            ),
            slots: std::array::from_fn(|_| BarSlot::new(Box::new(Unmapped), latency)),
            write_continuation: false,
            counters: IngressCounters::default(),
            config,
        })
    }

    pub fn config(&self) -> &BarControllerConfig {
        &self.config
    }

    /// Installs `backend` behind BAR `slot`, replacing the previous occupant.
    pub fn attach<B>(&mut self, slot: usize, backend: B) -> Result<(), AttachError>
    where
        B: BarImplementation + 'static,
    {
        let latency = usize::from(self.config.backend_latency);
        let entry = self.slots.get_mut(slot).ok_or(AttachError {
            slot,
            slots: BAR_SLOTS,
        })?;
        *entry = BarSlot::new(Box::new(backend), latency);
        Ok(())
    }

    pub fn backend(&self, slot: usize) -> Option<&dyn BarImplementation> {
        self.slots.get(slot).map(BarSlot::backend)
    }

    /// Advances the whole controller by one clock.
    ///
    /// `input` is the beat offered by the ingress this tick; `out_ready` is the completion
    /// stream handshake.
    pub fn tick(&mut self, input: Option<&TlpBeat>, out_ready: bool) -> TickOutput {
        let write = self.write.tick();
        if let Some(req) = &write {
            for (index, slot) in self.slots.iter_mut().enumerate() {
                if req.bar.selects(index) {
                    slot.write(req);
                }
            }
        }

        let responses: [Option<ReadResponse>; BAR_SLOTS] =
            std::array::from_fn(|index| self.slots[index].take_response());
        let asserted = responses.iter().flatten().count();
        if asserted > 1 {
            self.counters.response_conflicts += 1;
            tracing::warn!(asserted, "multiple BAR slots responded, lowest slot wins");
        }
        let read_response = select_response(&responses);

        let read = self
            .read
            .tick(read_response.as_ref(), out_ready, self.config.completer_id);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.issue(read.request.as_ref().filter(|req| req.bar.selects(index)));
        }
        if read.completion.is_some_and(|beat| beat.last) {
            self.counters.completions += 1;
        }

        if let Some(beat) = input {
            self.ingest(beat);
        }

        TickOutput {
            write,
            read_request: read.request,
            read_response,
            completion: read.completion,
            write_ready: self.write.ready(),
            has_more_data: self.read.has_more_data(),
        }
    }

    fn ingest(&mut self, beat: &TlpBeat) {
        if self.write_continuation {
            if !beat.first {
                self.write.push(beat);
                self.write_continuation = !beat.last;
                return;
            }
            // Upstream started a new TLP without ending the previous one.
            self.write_continuation = false;
        }

        if !self.config.bar_enable || beat.bar.is_empty() || !beat.first {
            self.counters.ignored_beats += 1;
            return;
        }

        match classify_header(beat.data[0]) {
            HeaderClass::Read if beat.last => {
                self.counters.read_tlps += 1;
                self.read.push(beat);
            }
            HeaderClass::Write if self.write.ready() => {
                self.counters.write_tlps += 1;
                tracing::debug!(
                    bar = beat.bar.bits(),
                    addr = beat.address(),
                    length_dw = beat.length_dw(),
                    "write TLP claimed"
                );
                self.write.push(beat);
                self.write_continuation = !beat.last;
            }
            HeaderClass::Write => {
                self.counters.refused_writes += 1;
                tracing::debug!(bar = beat.bar.bits(), "write engine not ready, TLP ignored");
            }
            HeaderClass::Read | HeaderClass::Other => {
                self.counters.ignored_beats += 1;
            }
        }
    }

    /// Level signal: completion data is queued or being assembled.
    pub fn has_more_data(&self) -> bool {
        self.read.has_more_data()
    }

    /// OR of the backends' interrupt-enable lines.
    pub fn interrupt_enable(&self) -> bool {
        self.slots.iter().any(BarSlot::interrupt_enable)
    }

    /// No request queued, in flight or being assembled anywhere.
    pub fn is_idle(&self) -> bool {
        !self.write_continuation
            && self.write.is_idle()
            && self.read.is_idle()
            && self.slots.iter().all(BarSlot::is_idle)
    }

    pub fn stats(&self) -> ControllerStats {
        let drops = self.read.drops();
        ControllerStats {
            read_tlps: self.counters.read_tlps,
            write_tlps: self.counters.write_tlps,
            refused_writes: self.counters.refused_writes,
            ignored_beats: self.counters.ignored_beats,
            response_conflicts: self.counters.response_conflicts,
            completions: self.counters.completions,
            write_fifo_drops: self.write.dropped_beats(),
            read_fifo_drops: drops.requests,
            chunk_fifo_drops: drops.chunks,
            output_fifo_drops: drops.output,
            discarded_responses: drops.responses,
        }
    }

    /// Returns every state machine, queue, delay line and backend to its initial state.
    pub fn reset(&mut self) {
        tracing::debug!("BAR controller reset");
        self.write.reset();
        self.read.reset();
        for slot in &mut self.slots {
            slot.reset();
        }
        self.write_continuation = false;
        self.counters = IngressCounters::default();
    }
}
