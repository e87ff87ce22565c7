//! Write engine: turns write TLP beats into single-DWORD backend writes.

use crate::bar::WriteRequest;
use crate::fifo::BoundedFifo;
use crate::tlp::{swap_dword, BarHit, DwordKeep, TlpBeat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Idle,
    /// Waiting for the first beat of a TLP.
    First,
    /// Waiting for the next payload beat (after a 4DW header or a full beat).
    Dw4ReqData,
    /// Emitting DWORD `lane` of the captured beat.
    Tx(usize),
}

#[derive(Debug, Clone, Copy, Default)]
struct Burst {
    data: [u32; 4],
    keep: DwordKeep,
    last: bool,
}

impl Burst {
    fn load(beat: &TlpBeat) -> Self {
        Self {
            data: beat.data,
            keep: beat.keep,
            last: beat.last,
        }
    }
}

#[derive(Debug)]
pub struct WriteEngine {
    fifo: BoundedFifo<TlpBeat>,
    state: WriteState,
    burst: Burst,
    bar: BarHit,
    addr: u32,
    be_first: u8,
    be_last: u8,
    first_dw: bool,
    tlps: u64,
}

impl WriteEngine {
    /// `ready_threshold` is the FIFO occupancy at or below which a new write TLP may be accepted.
    pub fn new(fifo_depth: usize, ready_threshold: usize) -> Self {
        Self {
            fifo: BoundedFifo::new("write", fifo_depth, ready_threshold),
            state: WriteState::Idle,
            burst: Burst::default(),
            bar: BarHit::empty(),
            addr: 0,
            be_first: 0,
            be_last: 0,
            first_dw: false,
            tlps: 0,
        }
    }

    /// Backpressure towards the ingress: a new write TLP may start.
    pub fn ready(&self) -> bool {
        self.fifo.prog_empty()
    }

    /// Queues one beat of a claimed write TLP. Dropped silently if the FIFO is full.
    pub fn push(&mut self, beat: &TlpBeat) {
        self.fifo.push(*beat);
    }

    /// Advances one clock. Returns the write emitted this cycle, if any.
    pub fn tick(&mut self) -> Option<WriteRequest> {
        match self.state {
            WriteState::Idle => {
                self.state = WriteState::First;
                None
            }
            WriteState::First => {
                self.start_tlp();
                None
            }
            WriteState::Dw4ReqData => {
                self.refill();
                None
            }
            WriteState::Tx(lane) => Some(self.emit(lane)),
        }
    }

    fn start_tlp(&mut self) {
        let Some(beat) = self.fifo.pop() else {
            return;
        };
        if !beat.first {
            // Tail of a TLP that was abandoned mid-burst.
            tracing::trace!("write engine discarding orphan beat");
            return;
        }

        self.bar = beat.bar;
        self.burst = Burst::load(&beat);
        self.first_dw = true;
        self.be_first = beat.first_be();
        self.be_last = beat.last_be();
        self.tlps += 1;

        match beat.fmt() {
            0b010 => {
                self.addr = beat.data[2] & !0x3;
                self.state = if beat.keep.has_lane(3) {
                    WriteState::Tx(3)
                } else {
                    WriteState::First
                };
            }
            0b011 if !beat.last => {
                self.addr = beat.data[3] & !0x3;
                self.state = WriteState::Dw4ReqData;
            }
            _ => self.state = WriteState::First,
        }
        tracing::trace!(
            addr = self.addr,
            bar = self.bar.bits(),
            state = ?self.state,
            "write engine captured TLP header"
        );
    }

    /// Loads the next payload beat of the current TLP, or waits for it.
    fn refill(&mut self) {
        match self.fifo.peek() {
            None => self.state = WriteState::Dw4ReqData,
            // A new TLP started before this one finished: abandon the current burst.
            Some(beat) if beat.first => self.state = WriteState::First,
            Some(_) => {
                if let Some(beat) = self.fifo.pop() {
                    self.burst = Burst::load(&beat);
                    self.state = if beat.keep.has_lane(0) {
                        WriteState::Tx(0)
                    } else {
                        WriteState::First
                    };
                }
            }
        }
    }

    fn emit(&mut self, lane: usize) -> WriteRequest {
        let next_valid = lane < 3 && self.burst.keep.has_lane(lane + 1);
        let final_dw = !next_valid && (lane < 3 || self.burst.last);

        let byte_enable = if self.first_dw {
            self.be_first
        } else if final_dw {
            self.be_last
        } else {
            0xf
        };
        let req = WriteRequest {
            bar: self.bar,
            addr: self.addr,
            byte_enable,
            data: swap_dword(self.burst.data[lane]),
        };

        self.addr = self.addr.wrapping_add(4);
        self.first_dw = false;
        if next_valid {
            self.state = WriteState::Tx(lane + 1);
        } else if !final_dw {
            self.refill();
        } else {
            self.state = WriteState::First;
        }
        req
    }

    /// No TLP in progress and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.fifo.is_empty() && matches!(self.state, WriteState::Idle | WriteState::First)
    }

    pub fn dropped_beats(&self) -> u64 {
        self.fifo.dropped()
    }

    pub fn tlps_started(&self) -> u64 {
        self.tlps
    }

    pub fn reset(&mut self) {
        self.fifo.clear();
        self.state = WriteState::Idle;
        self.burst = Burst::default();
        self.bar = BarHit::empty();
        self.addr = 0;
        self.be_first = 0;
        self.be_last = 0;
        self.first_dw = false;
        self.tlps = 0;
    }
}
