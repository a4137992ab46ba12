//! Diagnostic service errors

use thiserror::Error;

use crate::isotp::TransferError;

/// Why a key-derivation function result was rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key function returned no key")]
    Absent,

    #[error("key function returned an empty key")]
    Empty,

    #[error("key of {len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Negative response for service 0x{service:02X}: {description} (0x{code:02X})")]
    NegativeResponse {
        service: u8,
        code: u8,
        description: String,
    },

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Echo mismatch for service 0x{service:02X}: expected {expected}, got {got}")]
    EchoMismatch {
        service: u8,
        expected: String,
        got: String,
    },

    #[error("Key derivation failed: {0}")]
    Key(#[from] KeyError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Send or wait failed at the frame transport boundary
    Transport,
    /// Framing or response-format violation
    Protocol,
    /// The target answered with `7F`
    NegativeResponse,
    /// Bad input data or key derivation failure
    Data,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NegativeResponse { .. } => ErrorKind::NegativeResponse,
            ServiceError::Transfer(e) if e.is_transport() => ErrorKind::Transport,
            ServiceError::Transfer(_)
            | ServiceError::InvalidResponse(_)
            | ServiceError::EchoMismatch { .. } => ErrorKind::Protocol,
            ServiceError::Key(_) | ServiceError::InvalidArgument(_) => ErrorKind::Data,
        }
    }

    /// Cause byte of a negative response
    pub fn negative_code(&self) -> Option<u8> {
        match self {
            ServiceError::NegativeResponse { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn echo(service: u8, expected: &[u8], got: &[u8]) -> Self {
        ServiceError::EchoMismatch {
            service,
            expected: hex::encode_upper(expected),
            got: hex::encode_upper(got),
        }
    }
}
