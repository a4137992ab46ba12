//! Segmentation engine
//!
//! One engine drives one frame transport. A transfer sends the first
//! `send_len` bytes of [`TransferBuffers::send`] and leaves the reassembled
//! response at the start of [`TransferBuffers::receive`].

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::events::{EventCategory, SharedSink};
use crate::transport::{CanFrame, FrameTransport};

use super::error::TransferError;
use super::flow::{separation_delay, FlowControl, FlowStatus};
use super::frame::{
    self, FrameKind, SequenceCounter, CONSECUTIVE_FRAME_DATA, FIRST_FRAME_DATA,
    MAX_MESSAGE_LEN, SINGLE_FRAME_DATA,
};
use super::IsoTpSettings;

/// Capacity of each transfer buffer (one consecutive frame past the 4095 limit)
pub const BUFFER_CAPACITY: usize = MAX_MESSAGE_LEN + CONSECUTIVE_FRAME_DATA + 2;

/// Send and receive buffers for one session
///
/// Owned by the caller and passed into every transfer, so a session can
/// never alias another session's data.
pub struct TransferBuffers {
    send: Box<[u8; BUFFER_CAPACITY]>,
    receive: Box<[u8; BUFFER_CAPACITY]>,
}

impl Default for TransferBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransferBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffers")
            .field("capacity", &BUFFER_CAPACITY)
            .finish()
    }
}

impl TransferBuffers {
    pub fn new() -> Self {
        Self {
            send: Box::new([0u8; BUFFER_CAPACITY]),
            receive: Box::new([0u8; BUFFER_CAPACITY]),
        }
    }

    /// Whole send buffer, for in-place request formatting
    pub fn send_mut(&mut self) -> &mut [u8] {
        &mut self.send[..]
    }

    /// Copy `request` into the send buffer and return its length
    ///
    /// Requests longer than the buffer are truncated to its capacity, which
    /// then fails the transfer's length check.
    pub fn load(&mut self, request: &[u8]) -> usize {
        let len = request.len().min(BUFFER_CAPACITY);
        self.send[..len].copy_from_slice(&request[..len]);
        if request.len() > BUFFER_CAPACITY {
            BUFFER_CAPACITY
        } else {
            len
        }
    }

    /// First `len` bytes of the last response
    pub fn received(&self, len: usize) -> &[u8] {
        &self.receive[..len.min(BUFFER_CAPACITY)]
    }
}

/// Blocking ISO-TP style engine over a [`FrameTransport`]
pub struct IsoTpEngine<T: FrameTransport> {
    transport: T,
    settings: IsoTpSettings,
    sink: SharedSink,
}

impl<T: FrameTransport> IsoTpEngine<T> {
    pub fn new(transport: T, settings: IsoTpSettings, sink: SharedSink) -> Self {
        Self {
            transport,
            settings,
            sink,
        }
    }

    pub fn settings(&self) -> &IsoTpSettings {
        &self.settings
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a request and wait for its response
    ///
    /// Returns the response length. Every failure emits one
    /// [`EventCategory::TransferLayer`] event before returning.
    pub fn transfer(
        &mut self,
        buffers: &mut TransferBuffers,
        send_len: usize,
    ) -> Result<usize, TransferError> {
        let result = self
            .send_inner(buffers, send_len)
            .and_then(|()| self.receive_inner(&mut buffers.receive[..]));
        self.report(result)
    }

    /// Send a request for which the target is expected to stay silent
    ///
    /// `Ok(None)` means no response arrived within the frame timeout. A
    /// response that does arrive is returned as `Ok(Some(len))` for the
    /// caller to judge.
    pub fn transfer_expect_silence(
        &mut self,
        buffers: &mut TransferBuffers,
        send_len: usize,
    ) -> Result<Option<usize>, TransferError> {
        let result = self.send_inner(buffers, send_len).and_then(|()| {
            match self.receive_inner(&mut buffers.receive[..]) {
                Ok(len) => Ok(Some(len)),
                Err(TransferError::NoResponse) => Ok(None),
                Err(e) => Err(e),
            }
        });
        self.report(result)
    }

    /// Send one logical message without waiting for a reply
    pub fn send_message(&mut self, payload: &[u8]) -> Result<(), TransferError> {
        let result = self.send_payload(payload);
        self.report(result)
    }

    /// Wait for one logical message, reassembling it into `out`
    pub fn receive_message(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        self.transport.arm_wait(self.settings.rx_id);
        let result = self.receive_inner(out);
        self.report(result)
    }

    /// Finish receiving a message whose first frame was already read
    ///
    /// Lets a serving loop poll the transport with its own idle timeout.
    pub fn receive_started(&mut self, first: &CanFrame, out: &mut [u8]) -> Result<usize, TransferError> {
        let pci = first.byte(0);
        let result = match FrameKind::from_pci(pci) {
            Some(FrameKind::Single) => copy_single(first.data(), out),
            Some(FrameKind::First) => self.receive_segmented(first, out),
            _ => Err(TransferError::UnexpectedFrame {
                expected: "request",
                pci,
            }),
        };
        self.report(result)
    }

    fn report<R>(&self, result: Result<R, TransferError>) -> Result<R, TransferError> {
        if let Err(e) = &result {
            warn!(error = %e, "Transfer failed");
            self.sink.emit(&e.to_string(), EventCategory::TransferLayer);
        }
        result
    }

    fn send_inner(
        &mut self,
        buffers: &TransferBuffers,
        send_len: usize,
    ) -> Result<(), TransferError> {
        if send_len == 0 || send_len > MAX_MESSAGE_LEN {
            return Err(TransferError::LengthOutOfRange(send_len));
        }
        self.send_payload(&buffers.send[..send_len])
    }

    fn send_payload(&mut self, payload: &[u8]) -> Result<(), TransferError> {
        let len = payload.len();
        if len == 0 || len > MAX_MESSAGE_LEN {
            return Err(TransferError::LengthOutOfRange(len));
        }
        let (tx, rx, padding) = (self.settings.tx_id, self.settings.rx_id, self.settings.padding);

        if len <= SINGLE_FRAME_DATA {
            self.transport.arm_wait(rx);
            self.send_frame(tx, &frame::single(payload, padding))?;
            return Ok(());
        }

        let (head, rest) = payload.split_at(FIRST_FRAME_DATA);
        self.transport.arm_wait(rx);
        self.send_frame(tx, &frame::first(len, head, padding))?;

        let fc = self.await_flow_control()?;
        if fc.block_size != 0 {
            return Err(TransferError::BlockSizeUnsupported(fc.block_size));
        }
        let delay = self
            .settings
            .forced_separation_time
            .unwrap_or_else(|| separation_delay(fc.separation_time));

        let mut seq = SequenceCounter::new();
        let mut chunks = rest.chunks(CONSECUTIVE_FRAME_DATA).peekable();
        while let Some(chunk) = chunks.next() {
            self.send_frame(tx, &frame::consecutive(seq.advance(), chunk, padding))?;
            if chunks.peek().is_some() && !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        self.transport.clear_queue();
        self.transport.arm_wait(rx);
        Ok(())
    }

    fn await_flow_control(&mut self) -> Result<FlowControl, TransferError> {
        let mut waits = 0u32;
        loop {
            let frame = self.wait_frame()?.ok_or(TransferError::Timeout {
                stage: "flow control",
            })?;
            let fc = FlowControl::parse(frame.data())?;
            match fc.status {
                FlowStatus::Continue => return Ok(fc),
                FlowStatus::Wait => {
                    waits += 1;
                    if waits > self.settings.max_flow_control_waits {
                        return Err(TransferError::RetriesExhausted {
                            what: "flow-control wait",
                            attempts: waits - 1,
                        });
                    }
                    debug!(waits, "Target asked us to wait");
                    self.transport.arm_wait(self.settings.rx_id);
                }
                FlowStatus::Overflow => return Err(TransferError::Overflow),
            }
        }
    }

    fn receive_inner(&mut self, out: &mut [u8]) -> Result<usize, TransferError> {
        let mut pending = 0u32;
        loop {
            let frame = self.wait_frame()?.ok_or(TransferError::NoResponse)?;
            let data = frame.data();
            if data.iter().all(|&b| b == 0) {
                return Err(TransferError::Malformed("empty or all-zero frame".to_string()));
            }

            let pci = data[0];
            match FrameKind::from_pci(pci) {
                Some(FrameKind::Single) => {
                    if frame::is_response_pending(data) {
                        pending += 1;
                        if pending > self.settings.max_response_pending {
                            return Err(TransferError::RetriesExhausted {
                                what: "response-pending",
                                attempts: pending - 1,
                            });
                        }
                        debug!(service = data[2], pending, "Response pending");
                        self.transport.arm_wait(self.settings.rx_id);
                        continue;
                    }
                    return copy_single(data, out);
                }
                Some(FrameKind::First) => return self.receive_segmented(&frame, out),
                _ => {
                    return Err(TransferError::UnexpectedFrame {
                        expected: "response",
                        pci,
                    })
                }
            }
        }
    }

    fn receive_segmented(&mut self, first: &CanFrame, out: &mut [u8]) -> Result<usize, TransferError> {
        let data = first.data();
        let total = (((data[0] & 0x0F) as usize) << 8) | first.byte(1) as usize;
        if total <= SINGLE_FRAME_DATA {
            return Err(TransferError::Malformed(format!(
                "first frame length {}",
                total
            )));
        }
        if data.len() < 2 + FIRST_FRAME_DATA {
            return Err(TransferError::Malformed("short first frame".to_string()));
        }
        if out.len() < total {
            return Err(TransferError::Malformed(format!(
                "{} bytes do not fit the receive buffer",
                total
            )));
        }
        out[..FIRST_FRAME_DATA].copy_from_slice(&data[2..2 + FIRST_FRAME_DATA]);

        let (tx, rx) = (self.settings.tx_id, self.settings.rx_id);
        let fc = frame::flow_control(
            FlowStatus::Continue,
            0,
            self.settings.rx_separation_time,
            self.settings.padding,
        );
        self.transport.arm_wait(rx);
        self.send_frame(tx, &fc)?;

        let mut received = FIRST_FRAME_DATA;
        let mut seq = SequenceCounter::new();
        while received < total {
            let frame = self.wait_frame()?.ok_or(TransferError::Timeout {
                stage: "consecutive frame",
            })?;
            let pci = frame.byte(0);
            if FrameKind::from_pci(pci) != Some(FrameKind::Consecutive) {
                return Err(TransferError::UnexpectedFrame {
                    expected: "consecutive frame",
                    pci,
                });
            }
            let expected = seq.advance();
            let got = pci & 0x0F;
            if got != expected {
                return Err(TransferError::SequenceMismatch { expected, got });
            }

            let take = CONSECUTIVE_FRAME_DATA.min(total - received);
            if frame.len() < 1 + take {
                return Err(TransferError::Malformed("short consecutive frame".to_string()));
            }
            out[received..received + take].copy_from_slice(&frame.data()[1..=take]);
            received += take;
            self.transport.arm_wait(rx);
        }
        Ok(total)
    }

    fn send_frame(&mut self, id: u32, data: &[u8]) -> Result<(), TransferError> {
        debug!(id = %format!("0x{:03X}", id), data = %hex::encode(data), "TX");
        self.transport.send(id, data)?;
        Ok(())
    }

    fn wait_frame(&mut self) -> Result<Option<CanFrame>, TransferError> {
        let frame = self.transport.wait_frame(self.frame_timeout())?;
        if let Some(frame) = &frame {
            debug!(?frame, "RX");
        }
        Ok(frame)
    }

    fn frame_timeout(&self) -> Duration {
        self.settings.frame_timeout
    }
}

fn copy_single(data: &[u8], out: &mut [u8]) -> Result<usize, TransferError> {
    let len = (data.first().copied().unwrap_or(0) & 0x0F) as usize;
    if len == 0 || len > SINGLE_FRAME_DATA || len >= data.len() {
        return Err(TransferError::Malformed(format!(
            "single frame length {}",
            len
        )));
    }
    if out.len() < len {
        return Err(TransferError::Malformed(format!(
            "{} bytes do not fit the receive buffer",
            len
        )));
    }
    out[..len].copy_from_slice(&data[1..=len]);
    Ok(len)
}
