//! Simulator configuration
//!
//! Fully data-driven: identifiers, trouble codes, security and injected
//! faults all come from TOML. Every section has a default, so an empty file
//! simulates a healthy E38 module.
//!
//! ```toml
//! family = "e38"
//!
//! [[identifiers]]
//! id = 0x90
//! text = "1G1ZT53806F109149"
//!
//! [[identifiers]]
//! id = 0xDF
//! hex = "00002710"
//!
//! [[dtcs]]
//! code = "P0420"
//! failure_type = 0x01
//!
//! [faults]
//! response_pending = 2
//! negative_responses = [{ service = 0x3B, code = 0x22 }]
//! ```

use std::path::Path;

use gmlan::EcuFamily;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Identifier 0x{id:02X}: {reason}")]
    InvalidIdentifier { id: u8, reason: String },

    #[error("Invalid trouble code '{0}'")]
    InvalidDtc(String),

    #[error("Invalid security secret: {0}")]
    InvalidSecret(String),
}

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Module family being simulated
    #[serde(default)]
    pub family: EcuFamily,

    /// Identifier values; empty means the built-in defaults
    #[serde(default)]
    pub identifiers: Vec<IdentifierDef>,

    /// Stored trouble codes; absent means the built-in defaults
    #[serde(default)]
    pub dtcs: Option<Vec<DtcDef>>,

    #[serde(default)]
    pub security: SecurityConfig,

    /// Raw ReportProgrammedState byte
    #[serde(default)]
    pub programmed_state: u8,

    /// Raw separation-time byte the simulator advertises
    #[serde(default)]
    pub rx_separation_time: u8,

    #[serde(default)]
    pub faults: FaultConfig,
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SimConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults for a given family
    pub fn for_family(family: EcuFamily) -> Self {
        Self {
            family,
            ..Self::default()
        }
    }
}

// =============================================================================
// Identifier Definitions
// =============================================================================

/// One identifier value, given as text or hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierDef {
    pub id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl IdentifierDef {
    pub fn text(id: u8, value: &str) -> Self {
        Self {
            id,
            text: Some(value.to_string()),
            hex: None,
        }
    }

    pub fn hex(id: u8, value: &str) -> Self {
        Self {
            id,
            text: None,
            hex: Some(value.to_string()),
        }
    }

    /// Raw identifier payload
    pub fn bytes(&self) -> Result<Vec<u8>, SimConfigError> {
        let invalid = |reason: String| SimConfigError::InvalidIdentifier {
            id: self.id,
            reason,
        };
        let bytes = match (&self.text, &self.hex) {
            (Some(text), None) => text.as_bytes().to_vec(),
            (None, Some(hex)) => hex::decode(hex.trim()).map_err(|e| invalid(e.to_string()))?,
            _ => return Err(invalid("exactly one of 'text' or 'hex' is required".to_string())),
        };
        if bytes.is_empty() {
            return Err(invalid("empty value".to_string()));
        }
        Ok(bytes)
    }
}

/// Identifiers answered when the config lists none
pub fn default_identifiers() -> Vec<IdentifierDef> {
    vec![
        IdentifierDef::text(0x90, "1G1ZT53806F109149"),
        IdentifierDef::text(0x92, "DELPHI 12633238"),
        IdentifierDef::hex(0x99, "20240115"),
        IdentifierDef::text(0xB4, "TRC0012345678"),
        IdentifierDef::hex(0xC0, "00BFA4A2"),
        IdentifierDef::hex(0xC1, "00C0AE5C"),
        IdentifierDef::hex(0xC2, "00C0B6E1"),
        IdentifierDef::hex(0xCB, "00C0C604"),
        IdentifierDef::hex(0xCC, "00C0C605"),
        // 10000 / 64 = 156 km
        IdentifierDef::hex(0xDF, "00002710"),
    ]
}

// =============================================================================
// Trouble Code Definitions
// =============================================================================

/// One stored failure record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtcDef {
    /// Code string such as "P0420" or "U0100"
    pub code: String,
    #[serde(default)]
    pub failure_type: u8,
}

impl DtcDef {
    pub fn new(code: &str, failure_type: u8) -> Self {
        Self {
            code: code.to_string(),
            failure_type,
        }
    }

    /// 16-bit encoding: category in the top two bits, then the digits
    pub fn encode(&self) -> Result<u16, SimConfigError> {
        let invalid = || SimConfigError::InvalidDtc(self.code.clone());
        let code = self.code.trim();
        let mut chars = code.chars();
        let category: u16 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('P') => 0,
            Some('C') => 1,
            Some('B') => 2,
            Some('U') => 3,
            _ => return Err(invalid()),
        };
        let digits = chars.as_str();
        if digits.len() != 4 {
            return Err(invalid());
        }
        let value = u16::from_str_radix(digits, 16).map_err(|_| invalid())?;
        if value > 0x3FFF {
            return Err(invalid());
        }
        Ok((category << 14) | value)
    }
}

/// Records stored when the config does not say otherwise
pub fn default_dtcs() -> Vec<DtcDef> {
    vec![DtcDef::new("P0420", 0x01), DtcDef::new("U0100", 0x00)]
}

// =============================================================================
// Security Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret; the expected key is the seed XOR-ed with it (hex)
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Seed length in bytes
    #[serde(default = "default_seed_length")]
    pub seed_length: usize,

    /// Answer seed requests with an all-zero seed
    #[serde(default)]
    pub always_unlocked: bool,
}

fn default_secret() -> String {
    "a5c3".to_string()
}

fn default_seed_length() -> usize {
    2
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            seed_length: default_seed_length(),
            always_unlocked: false,
        }
    }
}

impl SecurityConfig {
    pub fn secret_bytes(&self) -> Result<Vec<u8>, SimConfigError> {
        let bytes = hex::decode(self.secret.trim())
            .map_err(|e| SimConfigError::InvalidSecret(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SimConfigError::InvalidSecret("empty secret".to_string()));
        }
        Ok(bytes)
    }
}

// =============================================================================
// Fault Injection
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Response-pending frames sent ahead of every answer
    #[serde(default)]
    pub response_pending: u32,

    /// Services answered with a fixed negative response
    #[serde(default)]
    pub negative_responses: Vec<InjectedNrc>,

    /// Services that are never answered
    #[serde(default)]
    pub silent_services: Vec<u8>,

    /// ReadMemoryByAddress fails for any block covering this address
    #[serde(default)]
    pub fail_read_address: Option<u32>,

    /// Answer the execute and enable-programming requests instead of staying silent
    #[serde(default)]
    pub answer_silent_requests: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedNrc {
    pub service: u8,
    pub code: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn empty_config_is_healthy_e38() {
        let config = SimConfig::from_toml("").unwrap();
        assert_eq!(config.family, EcuFamily::E38);
        assert!(config.identifiers.is_empty());
        assert_eq!(config.security.secret_bytes().unwrap(), vec![0xA5, 0xC3]);
        assert_eq!(config.faults, FaultConfig::default());
    }

    #[test]
    fn parses_faults_and_identifiers() {
        let config = SimConfig::from_toml(
            r#"
            family = "t43"
            programmed_state = 0x02

            [[identifiers]]
            id = 0x90
            text = "VIN"

            [[identifiers]]
            id = 0xDF
            hex = "00002710"

            [faults]
            response_pending = 3
            negative_responses = [{ service = 0x3B, code = 0x22 }]
            fail_read_address = 0x1080
            "#,
        )
        .unwrap();

        assert_eq!(config.family, EcuFamily::T43);
        assert_eq!(config.identifiers[1].bytes().unwrap(), vec![0x00, 0x00, 0x27, 0x10]);
        assert_eq!(config.faults.response_pending, 3);
        assert_eq!(
            config.faults.negative_responses,
            vec![InjectedNrc {
                service: 0x3B,
                code: 0x22
            }]
        );
        assert_eq!(config.faults.fail_read_address, Some(0x1080));
    }

    #[rstest]
    #[case("P0420", 0x0420)]
    #[case("C1234", 0x5234)]
    #[case("B0001", 0x8001)]
    #[case("U0100", 0xC100)]
    fn dtc_codes_encode(#[case] code: &str, #[case] expected: u16) {
        assert_eq!(DtcDef::new(code, 0).encode().unwrap(), expected);
    }

    #[rstest]
    #[case("X0420")]
    #[case("P042")]
    #[case("P4000")]
    fn bad_dtc_codes_are_rejected(#[case] code: &str) {
        assert!(DtcDef::new(code, 0).encode().is_err());
    }

    #[test]
    fn identifier_needs_one_value() {
        let both = IdentifierDef {
            id: 0x90,
            text: Some("a".to_string()),
            hex: Some("61".to_string()),
        };
        assert!(both.bytes().is_err());
        assert!(IdentifierDef::hex(0x99, "zz").bytes().is_err());
    }
}
