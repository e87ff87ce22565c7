use serde::Serialize;

/// Diagnostic counters. Never fed back into the datapath.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub read_tlps: u64,
    pub write_tlps: u64,
    /// Write TLPs seen while the write engine was not ready.
    pub refused_writes: u64,
    /// Beats claimed by neither engine.
    pub ignored_beats: u64,
    /// Ticks on which more than one slot presented a response.
    pub response_conflicts: u64,
    /// Completion packets fully emitted.
    pub completions: u64,
    pub write_fifo_drops: u64,
    pub read_fifo_drops: u64,
    pub chunk_fifo_drops: u64,
    pub output_fifo_drops: u64,
    /// Responses that arrived with no completion open.
    pub discarded_responses: u64,
}
