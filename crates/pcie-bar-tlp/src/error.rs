use thiserror::Error;

/// Rejected [`crate::BarControllerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{fifo} FIFO depth must be non-zero")]
    ZeroDepth { fifo: &'static str },

    #[error("backend latency {latency} out of range (expected 1..={max})")]
    LatencyOutOfRange { latency: u8, max: u8 },

    #[error("max write payload {payload_dw} DWORDs out of range (expected 1..=1024)")]
    PayloadOutOfRange { payload_dw: u16 },

    #[error(
        "write FIFO depth {depth} cannot absorb a {tlp_beats}-beat TLP above the ready threshold {threshold}"
    )]
    WriteFifoTooShallow {
        depth: usize,
        threshold: usize,
        tlp_beats: usize,
    },

    #[error(
        "output FIFO depth {depth} cannot absorb {in_flight} in-flight responses above the ready threshold {threshold}"
    )]
    OutputFifoTooShallow {
        depth: usize,
        threshold: usize,
        in_flight: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("BAR slot {slot} does not exist (controller has {slots} slots)")]
pub struct AttachError {
    pub slot: usize,
    pub slots: usize,
}

/// Failure to build a request TLP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("request length {0} DWORDs out of range (expected 1..=1024)")]
    Length(usize),

    #[error("address {0:#x} is not DWORD aligned")]
    Unaligned(u64),
}

/// Failure to decode an outgoing completion stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlpError {
    #[error("completion packet truncated after {dwords} DWORDs")]
    Truncated { dwords: usize },

    #[error("not a completion with data: DW0[31:24]={fmt_type:#04x}")]
    NotCompletion { fmt_type: u8 },

    #[error("length field says {expected} DWORDs but packet carries {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("completion stream ends without a last beat")]
    MissingLast,
}
