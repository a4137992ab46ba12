//! Raw SocketCAN transport (Linux only)
//!
//! The kernel does the frame I/O; the ISO-TP segmentation stays in
//! [`crate::isotp`], so no `CAN_ISOTP` socket is involved.

use std::io::ErrorKind;
use std::time::Duration;

use socketcan::{
    CanFilter, CanFrame as RawFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket,
    SocketOptions, StandardId,
};

use super::{CanFrame, FrameTransport, TransportError};

const STANDARD_MASK: u32 = 0x7FF;
const EXTENDED_MASK: u32 = 0x1FFF_FFFF;

/// SocketCAN frame transport
pub struct SocketCanTransport {
    interface: String,
    socket: CanSocket,
}

impl SocketCanTransport {
    /// Open a raw CAN socket on `interface` (e.g. "can0")
    pub fn open(interface: &str) -> Result<Self, TransportError> {
        let socket = CanSocket::open(interface).map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to open {}: {}", interface, e))
        })?;

        tracing::info!(interface = %interface, "SocketCAN transport opened");

        Ok(Self {
            interface: interface.to_string(),
            socket,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn can_id(id: u32) -> Result<Id, TransportError> {
        let can_id = if id <= STANDARD_MASK {
            StandardId::new(id as u16).map(Id::Standard)
        } else {
            ExtendedId::new(id).map(Id::Extended)
        };
        can_id.ok_or_else(|| TransportError::InvalidConfig(format!("Invalid CAN ID: 0x{:X}", id)))
    }
}

impl FrameTransport for SocketCanTransport {
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), TransportError> {
        let can_id = Self::can_id(id)?;
        let frame = RawFrame::new(can_id, data)
            .ok_or_else(|| TransportError::SendFailed(format!("Invalid frame: {} bytes", data.len())))?;

        self.socket
            .write_frame(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn wait_frame(&mut self, timeout: Duration) -> Result<Option<CanFrame>, TransportError> {
        match self.socket.read_frame_timeout(timeout) {
            Ok(frame) => Ok(CanFrame::new(frame.raw_id(), frame.data())),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    fn clear_queue(&mut self) {
        if self.socket.set_nonblocking(true).is_err() {
            return;
        }
        while let Ok(frame) = self.socket.read_frame() {
            tracing::debug!(id = frame.raw_id(), "Drained stale frame");
        }
        if let Err(e) = self.socket.set_nonblocking(false) {
            tracing::warn!(error = %e, "Failed to restore blocking mode");
        }
    }

    fn arm_wait(&mut self, expected_id: u32) {
        let mask = if expected_id <= STANDARD_MASK {
            STANDARD_MASK
        } else {
            EXTENDED_MASK
        };
        let filter = CanFilter::new(expected_id, mask);
        if let Err(e) = self.socket.set_filters(&[filter]) {
            tracing::warn!(error = %e, id = expected_id, "Failed to install CAN filter");
        }
    }
}
