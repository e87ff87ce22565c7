#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use pcie_bar_tlp::{
    BarController, BarImplementation, CompletionBeat, ReadRequest, ReadResponse, TlpBeat,
    WriteRequest,
};

/// Upper bound on ticks spent draining a controller in one run.
pub const MAX_TICKS: usize = 50_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Backend accesses seen by a [`Recorder`].
#[derive(Debug, Default)]
pub struct AccessLog {
    pub writes: Vec<(u32, u8, u32)>,
    pub reads: Vec<(u32, u8)>,
    pub resets: usize,
}

pub type SharedLog = Rc<RefCell<AccessLog>>;

/// Wraps a backend and records every access into a shared log.
pub struct Recorder<B> {
    inner: B,
    log: SharedLog,
}

impl<B: BarImplementation> Recorder<B> {
    pub fn new(inner: B) -> (Self, SharedLog) {
        let log = SharedLog::default();
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }
}

impl<B: BarImplementation> BarImplementation for Recorder<B> {
    fn read(&mut self, addr: u32, byte_enable: u8) -> u32 {
        self.log.borrow_mut().reads.push((addr, byte_enable));
        self.inner.read(addr, byte_enable)
    }

    fn write(&mut self, addr: u32, byte_enable: u8, data: u32) {
        self.log.borrow_mut().writes.push((addr, byte_enable, data));
        self.inner.write(addr, byte_enable, data);
    }

    fn reset(&mut self) {
        self.log.borrow_mut().resets += 1;
        self.inner.reset();
    }

    fn interrupt_enable(&self) -> bool {
        self.inner.interrupt_enable()
    }
}

/// Everything a controller produced during [`run`], tagged with the tick it happened on.
#[derive(Debug, Default)]
pub struct Trace {
    pub completions: Vec<CompletionBeat>,
    pub writes: Vec<WriteRequest>,
    pub read_requests: Vec<(usize, ReadRequest)>,
    pub read_responses: Vec<(usize, ReadResponse)>,
    pub ticks: usize,
}

impl Trace {
    fn record(&mut self, out: pcie_bar_tlp::TickOutput) {
        let tick = self.ticks;
        self.completions.extend(out.completion);
        self.writes.extend(out.write);
        self.read_requests.extend(out.read_request.map(|req| (tick, req)));
        self.read_responses.extend(out.read_response.map(|rsp| (tick, rsp)));
        self.ticks += 1;
    }
}

/// Offers `input` one beat per tick, then ticks until the controller is idle.
pub fn run(ctrl: &mut BarController, input: &[TlpBeat]) -> Trace {
    let mut trace = Trace::default();
    for beat in input {
        trace.record(ctrl.tick(Some(beat), true));
    }
    while !ctrl.is_idle() {
        assert!(trace.ticks < MAX_TICKS, "controller did not drain");
        trace.record(ctrl.tick(None, true));
    }
    trace
}

/// Ticks `count` times with no input.
pub fn idle_ticks(ctrl: &mut BarController, count: usize) -> Trace {
    let mut trace = Trace::default();
    for _ in 0..count {
        trace.record(ctrl.tick(None, true));
    }
    trace
}
