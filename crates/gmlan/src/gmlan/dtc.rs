//! Failure records from ReadFailureRecordData (0x12)

use std::fmt;

use serde::Serialize;

use super::ServiceError;

/// Size of one failure-record identifier entry
pub const RECORD_LEN: usize = 4;

/// Trouble-code category from the two top bits of the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DtcCategory {
    /// P codes
    Powertrain,
    /// C codes
    Chassis,
    /// B codes
    Body,
    /// U codes
    Network,
}

impl DtcCategory {
    pub fn from_code(code: u16) -> Self {
        match (code >> 14) & 0x03 {
            0 => DtcCategory::Powertrain,
            1 => DtcCategory::Chassis,
            2 => DtcCategory::Body,
            _ => DtcCategory::Network,
        }
    }

    pub fn prefix(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }
}

/// One failure-record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Record number
    pub number: u8,
    /// 16-bit diagnostic trouble code
    pub code: u16,
    /// Failure type byte
    pub failure_type: u8,
}

impl FailureRecord {
    pub fn category(&self) -> DtcCategory {
        DtcCategory::from_code(self.code)
    }

    /// Standard code string (e.g. P0420, U0100)
    pub fn code_string(&self) -> String {
        format!(
            "{}{:01X}{:03X}",
            self.category().prefix(),
            (self.code >> 12) & 0x03,
            self.code & 0x0FFF
        )
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (type 0x{:02X})",
            self.number,
            self.code_string(),
            self.failure_type
        )
    }
}

/// Parse the record list following the `52 01` header
///
/// An empty payload means the target has no records stored.
pub fn parse_failure_records(payload: &[u8]) -> Result<Vec<FailureRecord>, ServiceError> {
    if payload.len() % RECORD_LEN != 0 {
        return Err(ServiceError::InvalidResponse(format!(
            "failure record payload of {} bytes is not a multiple of {}",
            payload.len(),
            RECORD_LEN
        )));
    }

    Ok(payload
        .chunks_exact(RECORD_LEN)
        .map(|r| FailureRecord {
            number: r[0],
            code: u16::from_be_bytes([r[1], r[2]]),
            failure_type: r[3],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_records() {
        let records = parse_failure_records(&[0x01, 0x04, 0x20, 0x00, 0x02, 0xC1, 0x00, 0x71])
            .unwrap();
        assert_eq!(
            records,
            vec![
                FailureRecord {
                    number: 1,
                    code: 0x0420,
                    failure_type: 0x00
                },
                FailureRecord {
                    number: 2,
                    code: 0xC100,
                    failure_type: 0x71
                },
            ]
        );
        assert_eq!(records[0].code_string(), "P0420");
        assert_eq!(records[1].code_string(), "U0100");
    }

    #[test]
    fn empty_payload_is_no_records() {
        assert!(parse_failure_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn partial_record_is_rejected() {
        assert!(matches!(
            parse_failure_records(&[0x01, 0x04, 0x20]),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn chassis_and_body_prefixes() {
        let chassis = FailureRecord {
            number: 1,
            code: 0x4420,
            failure_type: 0,
        };
        let body = FailureRecord {
            number: 2,
            code: 0x9234,
            failure_type: 0,
        };
        assert_eq!(chassis.code_string(), "C0420");
        assert_eq!(body.code_string(), "B1234");
    }
}
