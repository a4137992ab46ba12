//! GMLAN negative response codes

use std::fmt;

macro_rules! response_codes {
    ($($name:ident = $code:literal => $text:literal,)*) => {
        /// GMLAN negative response codes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NegativeResponseCode {
            $($name,)*
            /// Unknown/reserved code
            Unknown(u8),
        }

        impl From<u8> for NegativeResponseCode {
            fn from(value: u8) -> Self {
                match value {
                    $($code => Self::$name,)*
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<NegativeResponseCode> for u8 {
            fn from(nrc: NegativeResponseCode) -> Self {
                match nrc {
                    $(NegativeResponseCode::$name => $code,)*
                    NegativeResponseCode::Unknown(v) => v,
                }
            }
        }

        impl NegativeResponseCode {
            /// Human-readable name, `None` for unknown codes
            pub fn description(&self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some($text),)*
                    Self::Unknown(_) => None,
                }
            }
        }
    };
}

response_codes! {
    GeneralReject = 0x10 => "General reject",
    ServiceNotSupported = 0x11 => "Service not supported",
    SubFunctionNotSupported = 0x12 => "Sub-function not supported or invalid format",
    IncorrectMessageLength = 0x13 => "Incorrect message length",
    BusyRepeatRequest = 0x21 => "Busy, repeat request",
    ConditionsNotCorrect = 0x22 => "Conditions not correct or request sequence error",
    RoutineNotComplete = 0x23 => "Routine not complete",
    RequestSequenceError = 0x24 => "Request sequence error",
    RequestOutOfRange = 0x31 => "Request out of range",
    SecurityAccessDenied = 0x33 => "Security access denied",
    InvalidKey = 0x35 => "Invalid key",
    ExceededNumberOfAttempts = 0x36 => "Exceeded number of attempts",
    RequiredTimeDelayNotExpired = 0x37 => "Required time delay not expired",
    DownloadNotAccepted = 0x40 => "Download not accepted",
    ImproperDownloadType = 0x41 => "Improper download type",
    CantDownloadToAddress = 0x42 => "Can't download to specified address",
    CantDownloadByteCount = 0x43 => "Can't download number of bytes requested",
    UploadNotAccepted = 0x50 => "Upload not accepted",
    ImproperUploadType = 0x51 => "Improper upload type",
    CantUploadFromAddress = 0x52 => "Can't upload from specified address",
    CantUploadByteCount = 0x53 => "Can't upload number of bytes requested",
    TransferSuspended = 0x71 => "Transfer suspended",
    TransferAborted = 0x72 => "Transfer aborted",
    IllegalAddressInBlockTransfer = 0x74 => "Illegal address in block transfer",
    IllegalByteCountInBlockTransfer = 0x75 => "Illegal byte count in block transfer",
    IllegalBlockTransferType = 0x76 => "Illegal block transfer type",
    BlockTransferChecksumError = 0x77 => "Block transfer data checksum error",
    ResponsePending = 0x78 => "Response pending",
    IncorrectByteCountDuringTransfer = 0x79 => "Incorrect byte count during block transfer",
    ServiceNotSupportedInActiveMode = 0x80 => "Service not supported in active diagnostic mode",
    ReadyForDownload = 0x99 => "Ready for download",
    DeviceControlLimitsExceeded = 0xE3 => "Device control limits exceeded",
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => f.write_str(text),
            None => write!(f, "code {:02X}", self),
        }
    }
}

/// Text for a negative-response cause byte
pub fn translate_error_code(code: u8) -> String {
    NegativeResponseCode::from(code).to_string()
}
