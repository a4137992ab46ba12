//! Crate-level error type

use thiserror::Error;

use crate::checksum::ChecksumError;
use crate::config::ConfigError;
use crate::gmlan::ServiceError;
use crate::isotp::TransferError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum GmlanError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, GmlanError>;
