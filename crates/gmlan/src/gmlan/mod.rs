//! GMLAN diagnostic service layer
//!
//! Every service formats a request into the session's send buffer, runs one
//! transfer through the segmentation engine and checks that the response
//! echoes the positive-response code (service ID + 0x40) before decoding the
//! rest. `7F <sid> <code>` is a negative response.

pub mod did;
pub mod dtc;
mod error;
mod nrc;
mod services;
mod state;

pub use did::{DidDescriptor, DidReading, DisplayKind, GM_IDENTIFIERS, ODOMETER_DID};
pub use dtc::{DtcCategory, FailureRecord};
pub use error::{ErrorKind, KeyError, ServiceError};
pub use nrc::{translate_error_code, NegativeResponseCode};
pub use services::{
    FieldWidth, FixedKey, GmlanSession, KeyDerivation, SecurityOutcome, ServiceOptions,
    MAX_KEY_LENGTH,
};
pub use state::ProgrammedState;

/// GMLAN service identifiers
pub mod service_id {
    pub const CLEAR_DIAGNOSTIC_INFORMATION: u8 = 0x04;
    pub const INITIATE_DIAGNOSTIC_OPERATION: u8 = 0x10;
    pub const READ_FAILURE_RECORD_DATA: u8 = 0x12;
    pub const READ_DATA_BY_IDENTIFIER: u8 = 0x1A;
    pub const RETURN_TO_NORMAL: u8 = 0x20;
    pub const READ_MEMORY_BY_ADDRESS: u8 = 0x23;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const DISABLE_NORMAL_COMMUNICATION: u8 = 0x28;
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const WRITE_DATA_BY_IDENTIFIER: u8 = 0x3B;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const REPORT_PROGRAMMED_STATE: u8 = 0xA2;
    pub const PROGRAMMING_MODE: u8 = 0xA5;

    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}

/// Positive response code for a service
pub const fn positive_response(service: u8) -> u8 {
    service.wrapping_add(0x40)
}

/// ProgrammingMode (0xA5) levels
pub mod programming_mode {
    /// Request programming mode
    pub const REQUEST: u8 = 0x01;
    /// Request programming mode with high-speed bus
    pub const REQUEST_HIGH_SPEED: u8 = 0x02;
    /// Enable programming mode (no response)
    pub const ENABLE: u8 = 0x03;
}

/// TransferData (0x36) sub-functions
pub mod transfer_sub_function {
    pub const DOWNLOAD: u8 = 0x00;
    pub const DOWNLOAD_AND_EXECUTE: u8 = 0x80;
}

/// ReadFailureRecordData (0x12) sub-functions
pub mod failure_record_sub_function {
    pub const READ_IDENTIFIERS: u8 = 0x01;
}
