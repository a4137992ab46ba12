//! Frame transport contract
//!
//! The core only ever talks to the CAN bus through [`FrameTransport`]:
//! - `send` one physical frame
//! - `arm_wait` for a specific arbitration ID, immediately before waiting
//! - `wait_frame` with a timeout
//! - `clear_queue` to drop anything pending
//!
//! Implementations:
//! - [`mock::MockTransport`] for scripted unit tests
//! - [`socketcan::SocketCanTransport`] for raw SocketCAN (Linux only)

mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use error::TransportError;

use std::fmt;
use std::time::Duration;

use crate::config::TransportConfig;

/// Largest classic CAN payload
pub const MAX_FRAME_DATA: usize = 8;

/// One physical CAN frame
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// Arbitration ID (11- or 29-bit)
    pub id: u32,
    data: [u8; MAX_FRAME_DATA],
    len: u8,
}

impl CanFrame {
    /// Build a frame; `None` if `data` exceeds 8 bytes
    pub fn new(id: u32, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_FRAME_DATA {
            return None;
        }
        let mut buf = [0u8; MAX_FRAME_DATA];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            data: buf,
            len: data.len() as u8,
        })
    }

    /// Frame payload
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Payload byte at `index`, or 0 past the end
    pub fn byte(&self, index: usize) -> u8 {
        self.data().get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanFrame(0x{:03X} [", self.id)?;
        for (i, b) in self.data().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        f.write_str("])")
    }
}

/// Transport-agnostic access to a CAN bus
///
/// All calls block. There is no background polling: the caller must call
/// [`FrameTransport::arm_wait`] immediately before every wait.
pub trait FrameTransport: Send {
    /// Send a single physical frame
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), TransportError>;

    /// Block until the next frame matching the armed ID arrives
    ///
    /// Returns `Ok(None)` on timeout.
    fn wait_frame(&mut self, timeout: Duration) -> Result<Option<CanFrame>, TransportError>;

    /// Drop any frames already queued
    fn clear_queue(&mut self);

    /// Arm the next wait for frames carrying `expected_id`
    fn arm_wait(&mut self, expected_id: u32);
}

impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(id, data)
    }

    fn wait_frame(&mut self, timeout: Duration) -> Result<Option<CanFrame>, TransportError> {
        (**self).wait_frame(timeout)
    }

    fn clear_queue(&mut self) {
        (**self).clear_queue()
    }

    fn arm_wait(&mut self, expected_id: u32) {
        (**self).arm_wait(expected_id)
    }
}

/// Open a hardware transport from configuration
///
/// The simulated transport lives in `example-ecu` and is wired up by the
/// caller, so only hardware variants are handled here.
pub fn open_transport(config: &TransportConfig) -> Result<Box<dyn FrameTransport>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan { interface } => {
            let transport = socketcan::SocketCanTransport::open(interface)?;
            Ok(Box::new(transport))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan { .. } => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Sim => Err(TransportError::Unsupported(
            "the simulated transport is provided by example-ecu".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_more_than_eight_bytes() {
        assert!(CanFrame::new(0x7E0, &[0; 9]).is_none());
        let frame = CanFrame::new(0x7E0, &[0x02, 0x1A, 0x90]).unwrap();
        assert_eq!(frame.data(), &[0x02, 0x1A, 0x90]);
        assert_eq!(frame.byte(1), 0x1A);
        assert_eq!(frame.byte(7), 0x00);
    }

    #[test]
    fn frame_debug_is_hex() {
        let frame = CanFrame::new(0x7E8, &[0x01, 0x7E]).unwrap();
        assert_eq!(format!("{:?}", frame), "CanFrame(0x7E8 [01 7E])");
    }
}
