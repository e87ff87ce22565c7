use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tlp::{write_tlp_beats, MAX_TLP_DWORDS};

/// Upper bound on the uniform backend read latency, in ticks.
pub const MAX_BACKEND_LATENCY: u8 = 16;

/// Static configuration of a [`crate::BarController`].
///
/// Missing JSON fields fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarControllerConfig {
    /// Global gate: when cleared no TLP is claimed.
    pub bar_enable: bool,
    /// Completer ID written into completion DW1.
    pub completer_id: u16,
    /// Read latency shared by every backend slot.
    pub backend_latency: u8,
    /// Largest write payload the upstream may deliver in one TLP.
    pub max_write_payload_dw: u16,
    pub write_fifo_depth: usize,
    /// A write TLP is claimed only while the write FIFO holds at most this many beats.
    pub write_ready_threshold: usize,
    pub read_fifo_depth: usize,
    pub chunk_fifo_depth: usize,
    pub output_fifo_depth: usize,
    /// Backend dispatch runs only while the completion queue holds at most this many beats.
    pub output_ready_threshold: usize,
}

impl Default for BarControllerConfig {
    fn default() -> Self {
        Self {
            bar_enable: true,
            completer_id: 0,
            backend_latency: 2,
            max_write_payload_dw: 64,
            write_fifo_depth: 64,
            write_ready_threshold: 32,
            read_fifo_depth: 16,
            chunk_fifo_depth: 8,
            output_fifo_depth: 64,
            output_ready_threshold: 16,
        }
    }
}

impl BarControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (fifo, depth) in [
            ("write", self.write_fifo_depth),
            ("read request", self.read_fifo_depth),
            ("read chunk", self.chunk_fifo_depth),
            ("completion", self.output_fifo_depth),
        ] {
            if depth == 0 {
                return Err(ConfigError::ZeroDepth { fifo });
            }
        }

        if !(1..=MAX_BACKEND_LATENCY).contains(&self.backend_latency) {
            return Err(ConfigError::LatencyOutOfRange {
                latency: self.backend_latency,
                max: MAX_BACKEND_LATENCY,
            });
        }

        let payload_dw = usize::from(self.max_write_payload_dw);
        if !(1..=MAX_TLP_DWORDS).contains(&payload_dw) {
            return Err(ConfigError::PayloadOutOfRange {
                payload_dw: self.max_write_payload_dw,
            });
        }

        // A TLP accepted right at the threshold must fit entirely.
        let tlp_beats = write_tlp_beats(payload_dw);
        if self.write_fifo_depth < self.write_ready_threshold + tlp_beats {
            return Err(ConfigError::WriteFifoTooShallow {
                depth: self.write_fifo_depth,
                threshold: self.write_ready_threshold,
                tlp_beats,
            });
        }

        // Reads already inside a backend still land after dispatch stops.
        let in_flight = usize::from(self.backend_latency) + 2;
        if self.output_fifo_depth < self.output_ready_threshold + in_flight {
            return Err(ConfigError::OutputFifoTooShallow {
                depth: self.output_fifo_depth,
                threshold: self.output_ready_threshold,
                in_flight,
            });
        }
        Ok(())
    }
}
