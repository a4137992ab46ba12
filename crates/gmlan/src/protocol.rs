//! Protocol variants
//!
//! A session is bound to one variant when it is built. Both variants ride
//! the same segmentation engine; they differ in negative-response tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::gmlan::translate_error_code;
use crate::isotp::{IsoTpEngine, TransferBuffers, TransferError};
use crate::transport::FrameTransport;

/// Capabilities a diagnostic protocol provides to the service layer
pub trait DiagnosticProtocol {
    fn name(&self) -> &'static str;

    /// Run one request/response transfer
    fn transfer_frame<T: FrameTransport>(
        &self,
        engine: &mut IsoTpEngine<T>,
        buffers: &mut TransferBuffers,
        len: usize,
    ) -> Result<usize, TransferError>;

    /// Run a transfer for a request the target does not answer
    fn transfer_silent<T: FrameTransport>(
        &self,
        engine: &mut IsoTpEngine<T>,
        buffers: &mut TransferBuffers,
        len: usize,
    ) -> Result<Option<usize>, TransferError> {
        engine.transfer_expect_silence(buffers, len)
    }

    /// Text for a negative-response cause byte
    fn translate_error_code(&self, code: u8) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVariant {
    #[default]
    Gmlan,
    Kwp2000,
}

impl DiagnosticProtocol for ProtocolVariant {
    fn name(&self) -> &'static str {
        match self {
            ProtocolVariant::Gmlan => "GMLAN",
            ProtocolVariant::Kwp2000 => "KWP2000",
        }
    }

    fn transfer_frame<T: FrameTransport>(
        &self,
        engine: &mut IsoTpEngine<T>,
        buffers: &mut TransferBuffers,
        len: usize,
    ) -> Result<usize, TransferError> {
        engine.transfer(buffers, len)
    }

    fn translate_error_code(&self, code: u8) -> String {
        match self {
            ProtocolVariant::Gmlan => translate_error_code(code),
            ProtocolVariant::Kwp2000 => kwp2000_error_text(code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("code {:02X}", code)),
        }
    }
}

/// ISO 14230 negative response names
fn kwp2000_error_text(code: u8) -> Option<&'static str> {
    let text = match code {
        0x10 => "General reject",
        0x11 => "Service not supported",
        0x12 => "Sub-function not supported or invalid format",
        0x21 => "Busy, repeat request",
        0x22 => "Conditions not correct or request sequence error",
        0x23 => "Routine not complete",
        0x31 => "Request out of range",
        0x33 => "Security access denied",
        0x35 => "Invalid key",
        0x36 => "Exceeded number of attempts",
        0x37 => "Required time delay not expired",
        0x40 => "Download not accepted",
        0x41 => "Improper download type",
        0x42 => "Can't download to specified address",
        0x43 => "Can't download number of bytes requested",
        0x50 => "Upload not accepted",
        0x51 => "Improper upload type",
        0x52 => "Can't upload from specified address",
        0x53 => "Can't upload number of bytes requested",
        0x71 => "Transfer suspended",
        0x72 => "Transfer aborted",
        0x74 => "Illegal address in block transfer",
        0x75 => "Illegal byte count in block transfer",
        0x76 => "Illegal block transfer type",
        0x77 => "Block transfer data checksum error",
        0x78 => "Request correctly received, response pending",
        0x79 => "Incorrect byte count during block transfer",
        0x80 => "Service not supported in active diagnostic session",
        _ => return None,
    };
    Some(text)
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmlan" => Ok(ProtocolVariant::Gmlan),
            "kwp2000" => Ok(ProtocolVariant::Kwp2000),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}
