//! Flow-control frames and separation time

use std::time::Duration;

use super::error::TransferError;

/// Flow status nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlowStatus {
    Continue = 0,
    Wait = 1,
    Overflow = 2,
}

impl FlowStatus {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(FlowStatus::Continue),
            1 => Some(FlowStatus::Wait),
            2 => Some(FlowStatus::Overflow),
            _ => None,
        }
    }
}

/// Parsed flow-control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    pub status: FlowStatus,
    pub block_size: u8,
    /// Raw separation-time byte, see [`separation_delay`]
    pub separation_time: u8,
}

impl FlowControl {
    pub fn parse(data: &[u8]) -> Result<Self, TransferError> {
        let pci = data.first().copied().unwrap_or(0);
        if pci >> 4 != 0x3 || data.len() < 3 {
            return Err(TransferError::InvalidFlowControl(pci));
        }
        let status =
            FlowStatus::from_nibble(pci & 0x0F).ok_or(TransferError::InvalidFlowControl(pci))?;
        Ok(Self {
            status,
            block_size: data[1],
            separation_time: data[2],
        })
    }

    /// Delay the sender must leave between consecutive frames
    pub fn delay(&self) -> Duration {
        separation_delay(self.separation_time)
    }
}

/// Decode a separation-time byte
///
/// `0x00..=0x7F` is milliseconds, `0xF1..=0xF9` is 100..900 µs, and every
/// reserved value is treated as the 127 ms maximum.
pub fn separation_delay(raw: u8) -> Duration {
    match raw {
        0x00..=0x7F => Duration::from_millis(raw as u64),
        0xF1..=0xF9 => Duration::from_micros((raw - 0xF0) as u64 * 100),
        _ => Duration::from_millis(0x7F),
    }
}
