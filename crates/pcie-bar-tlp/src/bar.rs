//! Backend BAR contract.
//!
//! Every backend is driven through a [`BarSlot`], which owns the read pipeline: the backend only
//! produces data, while the slot carries the opaque context and delays the response by the
//! controller-wide latency. Backends therefore cannot alter the context or disagree on latency.

use std::collections::VecDeque;

use crate::context::RawContext;
use crate::tlp::BarHit;

/// Number of BAR slots behind one controller.
pub const BAR_SLOTS: usize = 7;

/// Single-DWORD write produced by the write engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub bar: BarHit,
    /// DWORD aligned.
    pub addr: u32,
    pub byte_enable: u8,
    /// Backend-native byte order.
    pub data: u32,
}

/// Single-DWORD read produced by the read engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub ctx: RawContext,
    pub bar: BarHit,
    pub addr: u32,
    pub byte_enable: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse {
    pub ctx: RawContext,
    pub data: u32,
}

/// A register/memory implementation behind one BAR.
///
/// Reads are answered synchronously; the owning [`BarSlot`] supplies the pipeline delay.
/// Writes are fire-and-forget.
pub trait BarImplementation {
    fn read(&mut self, addr: u32, byte_enable: u8) -> u32;

    fn write(&mut self, addr: u32, byte_enable: u8, data: u32);

    /// Called on controller reset.
    fn reset(&mut self) {}

    /// Optional interrupt-enable output line.
    fn interrupt_enable(&self) -> bool {
        false
    }
}

/// Default slot occupant: reads return zero, writes are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unmapped;

impl BarImplementation for Unmapped {
    fn read(&mut self, _addr: u32, _byte_enable: u8) -> u32 {
        0
    }

    fn write(&mut self, _addr: u32, _byte_enable: u8, _data: u32) {}
}

/// A backend plus its fixed-latency read pipeline.
pub struct BarSlot {
    backend: Box<dyn BarImplementation>,
    pipeline: VecDeque<Option<ReadResponse>>,
    latency: usize,
}

impl BarSlot {
    /// `latency` is clamped to at least one tick.
    pub fn new(backend: Box<dyn BarImplementation>, latency: usize) -> Self {
        let latency = latency.max(1);
        Self {
            backend,
            pipeline: std::iter::repeat(None).take(latency).collect(),
            latency,
        }
    }

    pub fn latency(&self) -> usize {
        self.latency
    }

    pub fn write(&mut self, req: &WriteRequest) {
        self.backend.write(req.addr, req.byte_enable, req.data);
    }

    /// Retires the response issued `latency` ticks ago. Call once per tick, before
    /// [`BarSlot::issue`].
    pub fn take_response(&mut self) -> Option<ReadResponse> {
        self.pipeline.pop_front().flatten()
    }

    /// Accepts this tick's request (or a bubble).
    pub fn issue(&mut self, req: Option<&ReadRequest>) {
        let rsp = req.map(|req| ReadResponse {
            ctx: req.ctx,
            data: self.backend.read(req.addr, req.byte_enable),
        });
        self.pipeline.push_back(rsp);
    }

    /// One full tick: retire then issue.
    pub fn tick(&mut self, req: Option<&ReadRequest>) -> Option<ReadResponse> {
        let rsp = self.take_response();
        self.issue(req);
        rsp
    }

    pub fn is_idle(&self) -> bool {
        self.pipeline.iter().all(Option::is_none)
    }

    pub fn reset(&mut self) {
        self.pipeline.clear();
        self.pipeline.extend(std::iter::repeat(None).take(self.latency));
        self.backend.reset();
    }

    pub fn backend(&self) -> &dyn BarImplementation {
        self.backend.as_ref()
    }

    pub fn interrupt_enable(&self) -> bool {
        self.backend.interrupt_enable()
    }
}

impl std::fmt::Debug for BarSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarSlot")
            .field("latency", &self.latency)
            .field("in_flight", &self.pipeline.iter().flatten().count())
            .finish()
    }
}

/// Fixed-priority response select across the slots.
///
/// At most one slot may present a response per tick. If that precondition is broken the
/// lowest-indexed response wins and the others are lost.
pub fn select_response(responses: &[Option<ReadResponse>]) -> Option<ReadResponse> {
    responses.iter().flatten().next().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReadContext;

    struct Echo;

    impl BarImplementation for Echo {
        fn read(&mut self, addr: u32, _byte_enable: u8) -> u32 {
            !addr
        }

        fn write(&mut self, _addr: u32, _byte_enable: u8, _data: u32) {}
    }

    fn request(addr: u32, tag: u8) -> ReadRequest {
        let ctx = ReadContext {
            first: true,
            last: true,
            dwords_remaining: 1,
            requester_id: 0x0100,
            tag,
            bar: BarHit::BAR0,
            lower_address: (addr & 0x7f) as u8,
            address: addr,
        };
        ReadRequest {
            ctx: ctx.pack(),
            bar: BarHit::BAR0,
            addr,
            byte_enable: 0xf,
        }
    }

    #[test]
    fn response_appears_after_exact_latency() {
        for latency in 1..=5 {
            let mut slot = BarSlot::new(Box::new(Echo), latency);
            let req = request(0x40, 9);
            assert_eq!(slot.tick(Some(&req)), None);
            for _ in 1..latency {
                assert_eq!(slot.tick(None), None);
            }
            let rsp = slot.tick(None).expect("response after latency ticks");
            assert_eq!(rsp.ctx, req.ctx);
            assert_eq!(rsp.data, !0x40);
            assert!(slot.is_idle());
        }
    }

    #[test]
    fn back_to_back_requests_keep_order() {
        let mut slot = BarSlot::new(Box::new(Echo), 2);
        let reqs: Vec<_> = (0..4).map(|i| request(i * 4, i as u8)).collect();
        let mut out = Vec::new();
        for req in &reqs {
            out.extend(slot.tick(Some(req)));
        }
        for _ in 0..2 {
            out.extend(slot.tick(None));
        }
        let tags: Vec<u8> = out.iter().map(|r| ReadContext::unpack(r.ctx).tag).collect();
        assert_eq!(tags, vec![0, 1, 2, 3]);
    }

    #[test]
    fn reset_discards_in_flight_responses() {
        let mut slot = BarSlot::new(Box::new(Echo), 3);
        slot.tick(Some(&request(0, 0)));
        slot.reset();
        for _ in 0..4 {
            assert_eq!(slot.tick(None), None);
        }
    }

    #[test]
    fn lowest_slot_wins_on_conflict() {
        let a = ReadResponse {
            ctx: RawContext::from_bits(1),
            data: 1,
        };
        let b = ReadResponse {
            ctx: RawContext::from_bits(2),
            data: 2,
        };
        assert_eq!(select_response(&[None, Some(b), Some(a)]), Some(b));
        assert_eq!(select_response(&[None, None]), None);
    }
}
