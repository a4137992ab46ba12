//! In-process virtual CAN bus
//!
//! Two endpoints share one bus: everything one side sends is queued for the
//! other. Each frame carries a bus-wide sequence number so that
//! `clear_queue` can drop only frames that arrived before the endpoint's own
//! last transmission. A reply racing in right after our last consecutive
//! frame is therefore kept.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gmlan::transport::{CanFrame, FrameTransport, TransportError};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Queued {
    seq: u64,
    frame: CanFrame,
}

#[derive(Debug, Default)]
struct BusState {
    /// Inbound queue per endpoint (0 = tester, 1 = ECU)
    inbound: [VecDeque<Queued>; 2],
    next_seq: u64,
    closed: bool,
    capture: Option<Vec<CanFrame>>,
}

#[derive(Debug, Default)]
struct Bus {
    state: Mutex<BusState>,
    ready: Condvar,
}

/// Shared virtual bus
#[derive(Debug, Clone, Default)]
pub struct VirtualBus {
    bus: Arc<Bus>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that records every frame sent by either side
    pub fn with_capture() -> Self {
        let bus = Self::new();
        bus.bus.state.lock().capture = Some(Vec::new());
        bus
    }

    /// Tester and ECU endpoints
    pub fn endpoints(&self) -> (VirtualEndpoint, VirtualEndpoint) {
        (self.endpoint(0), self.endpoint(1))
    }

    fn endpoint(&self, side: usize) -> VirtualEndpoint {
        VirtualEndpoint {
            bus: self.bus.clone(),
            side,
            armed_id: None,
            last_send: 0,
        }
    }

    /// Every frame sent so far, in bus order (empty without capture)
    pub fn captured(&self) -> Vec<CanFrame> {
        self.bus.state.lock().capture.clone().unwrap_or_default()
    }

    /// Fail further sends and wake blocked waiters
    pub fn close(&self) {
        self.bus.state.lock().closed = true;
        self.bus.ready.notify_all();
    }
}

/// One node's view of a [`VirtualBus`]
#[derive(Debug)]
pub struct VirtualEndpoint {
    bus: Arc<Bus>,
    side: usize,
    armed_id: Option<u32>,
    /// Sequence number of our most recent transmission
    last_send: u64,
}

impl FrameTransport for VirtualEndpoint {
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), TransportError> {
        let frame = CanFrame::new(id, data)
            .ok_or_else(|| TransportError::SendFailed(format!("frame too long: {}", data.len())))?;
        let mut state = self.bus.state.lock();
        if state.closed {
            return Err(TransportError::SendFailed("virtual bus closed".to_string()));
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.inbound[1 - self.side].push_back(Queued { seq, frame });
        if let Some(capture) = state.capture.as_mut() {
            capture.push(frame);
        }
        self.last_send = seq;
        drop(state);
        self.bus.ready.notify_all();
        Ok(())
    }

    fn wait_frame(&mut self, timeout: Duration) -> Result<Option<CanFrame>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.bus.state.lock();
        loop {
            while let Some(queued) = state.inbound[self.side].pop_front() {
                match self.armed_id {
                    Some(id) if id != queued.frame.id => {
                        debug!(frame = ?queued.frame, "Virtual bus: dropped frame for unarmed ID");
                    }
                    _ => return Ok(Some(queued.frame)),
                }
            }
            if state.closed {
                return Ok(None);
            }
            if self.bus.ready.wait_until(&mut state, deadline).timed_out()
                && state.inbound[self.side].is_empty()
            {
                return Ok(None);
            }
        }
    }

    fn clear_queue(&mut self) {
        let last_send = self.last_send;
        let mut state = self.bus.state.lock();
        let queue = &mut state.inbound[self.side];
        let before = queue.len();
        queue.retain(|q| q.seq > last_send);
        let dropped = before - queue.len();
        if dropped > 0 {
            debug!(dropped, "Virtual bus: cleared stale frames");
        }
    }

    fn arm_wait(&mut self, expected_id: u32) {
        self.armed_id = Some(expected_id);
    }
}
