//! Segmentation engine errors

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Length check failed: {0} bytes is outside 1..=4095")]
    LengthOutOfRange(usize),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No response from target")]
    NoResponse,

    #[error("Timeout waiting for {stage}")]
    Timeout { stage: &'static str },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unexpected frame (PCI 0x{pci:02X}) while waiting for {expected}")]
    UnexpectedFrame { expected: &'static str, pci: u8 },

    #[error("Sequence mismatch: expected {expected:X}, got {got:X}")]
    SequenceMismatch { expected: u8, got: u8 },

    #[error("Unimplemented: flow-control block size {0} (only 0 is supported)")]
    BlockSizeUnsupported(u8),

    #[error("Target aborted the transfer (flow-control overflow)")]
    Overflow,

    #[error("Invalid flow-control frame (PCI 0x{0:02X})")]
    InvalidFlowControl(u8),

    #[error("Retries exhausted after {attempts} {what} frames")]
    RetriesExhausted { what: &'static str, attempts: u32 },
}

impl TransferError {
    /// True when the failure happened at the frame transport boundary
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TransferError::Transport(_) | TransferError::NoResponse | TransferError::Timeout { .. }
        )
    }
}
