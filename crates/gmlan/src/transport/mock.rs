//! Scripted transport for testing
//!
//! Inbound frames are queued ahead of time and model frames that arrive
//! from the target later: `wait_frame` pops them in order and an empty queue
//! is an immediate timeout. `clear_queue` is recorded but does not drop
//! scripted frames, since they have not "arrived" yet.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{CanFrame, FrameTransport, TransportError};
use crate::isotp::frame;

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
    armed: Vec<u32>,
    clear_calls: usize,
    fail_sends: bool,
}

/// Mock frame transport
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    armed_id: Option<u32>,
}

/// Inspection and scripting handle, usable after the transport is moved
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

impl MockHandle {
    /// Queue a raw inbound frame
    pub fn push_frame(&self, id: u32, data: &[u8]) {
        if let Some(frame) = CanFrame::new(id, data) {
            self.state.lock().inbound.push_back(frame);
        }
    }

    /// Queue a logical message, segmented into single/first/consecutive frames
    pub fn push_message(&self, id: u32, payload: &[u8]) {
        let mut state = self.state.lock();
        for data in frame::segment(payload, 0x00) {
            if let Some(frame) = CanFrame::new(id, &data) {
                state.inbound.push_back(frame);
            }
        }
    }

    /// Every frame sent so far
    pub fn sent(&self) -> Vec<CanFrame> {
        self.state.lock().sent.clone()
    }

    /// IDs passed to `arm_wait`, in order
    pub fn armed_ids(&self) -> Vec<u32> {
        self.state.lock().armed.clone()
    }

    pub fn clear_calls(&self) -> usize {
        self.state.lock().clear_calls
    }

    /// Inbound frames not yet consumed
    pub fn pending(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Make every subsequent `send` fail
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }
}

impl FrameTransport for MockTransport {
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(TransportError::SendFailed("mock send failure".to_string()));
        }
        let frame = CanFrame::new(id, data)
            .ok_or_else(|| TransportError::SendFailed(format!("frame too long: {}", data.len())))?;
        tracing::debug!(?frame, "Mock transport: sent frame");
        state.sent.push(frame);
        Ok(())
    }

    fn wait_frame(&mut self, _timeout: Duration) -> Result<Option<CanFrame>, TransportError> {
        let mut state = self.state.lock();
        while let Some(frame) = state.inbound.pop_front() {
            match self.armed_id {
                Some(id) if id != frame.id => {
                    tracing::debug!(?frame, "Mock transport: dropped frame for unarmed ID");
                }
                _ => return Ok(Some(frame)),
            }
        }
        Ok(None)
    }

    fn clear_queue(&mut self) {
        self.state.lock().clear_calls += 1;
    }

    fn arm_wait(&mut self, expected_id: u32) {
        self.armed_id = Some(expected_id);
        self.state.lock().armed.push(expected_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_for_other_ids_are_dropped_once_armed() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_frame(0x123, &[0x01, 0x00]);
        handle.push_frame(0x7E8, &[0x01, 0x7E]);

        transport.arm_wait(0x7E8);
        let frame = transport.wait_frame(Duration::from_millis(500)).unwrap();
        assert_eq!(frame.map(|f| f.id), Some(0x7E8));
        assert!(transport.wait_frame(Duration::from_millis(500)).unwrap().is_none());
        assert_eq!(handle.armed_ids(), vec![0x7E8]);
    }

    #[test]
    fn push_message_segments_long_payloads() {
        let transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_message(0x7E8, &[0xAA; 20]);
        // first frame (6 bytes) + 2 consecutive frames (7 + 7)
        assert_eq!(handle.pending(), 3);
    }

    #[test]
    fn send_failure_is_reported() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.set_fail_sends(true);
        assert!(matches!(
            transport.send(0x7E0, &[0x01, 0x3E]),
            Err(TransportError::SendFailed(_))
        ));
        assert!(handle.sent().is_empty());
    }
}
