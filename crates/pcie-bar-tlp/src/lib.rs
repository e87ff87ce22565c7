//! Cycle-level model of a PCIe BAR TLP engine.
//!
//! Memory read and write TLPs arrive as 128-bit beats. Writes are decomposed into single-DWORD
//! backend writes; reads are split, issued to the backends one DWORD at a time, and the
//! responses are reassembled into completion-with-data TLPs.
//!
//! The model is fully synchronous: [`BarController::tick`] advances every stage by one clock.
//! Overflowing queues drop silently (counted in [`ControllerStats`]); nothing in the datapath
//! returns an error.

pub mod bar;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod fifo;
pub mod read_engine;
pub mod stats;
pub mod tlp;
pub mod write_engine;

pub use bar::{
    BarImplementation, BarSlot, ReadRequest, ReadResponse, Unmapped, WriteRequest, BAR_SLOTS,
};
pub use config::{BarControllerConfig, MAX_BACKEND_LATENCY};
pub use context::{RawContext, ReadContext};
pub use controller::{BarController, TickOutput};
pub use error::{AttachError, ConfigError, EncodeError, TlpError};
pub use stats::ControllerStats;
pub use tlp::{
    BarHit, Completion, CompletionBeat, CompletionHeader, DwordKeep, MemRead, MemWrite, TlpBeat,
};
