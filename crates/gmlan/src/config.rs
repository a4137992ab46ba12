//! GMLAN tool configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! ecu = "e38"
//!
//! [transport]
//! type = "socketcan"
//! interface = "can0"
//!
//! [isotp]
//! request_id = "0x7E0"
//! response_id = "0x7E8"
//! frame_timeout_ms = 500
//!
//! [services]
//! read_block_size = 128
//! address_width = "bits32"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ecu::EcuFamily;
use crate::gmlan::{FieldWidth, ServiceOptions};
use crate::isotp::{
    IsoTpSettings, DEFAULT_MAX_FLOW_CONTROL_WAITS, DEFAULT_MAX_RESPONSE_PENDING,
};
use crate::protocol::ProtocolVariant;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid CAN ID '{0}'")]
    InvalidCanId(String),
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GmlanConfig {
    /// Target ECU family
    #[serde(default)]
    pub ecu: EcuFamily,

    /// Diagnostic protocol variant
    #[serde(default)]
    pub protocol: ProtocolVariant,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub isotp: IsoTpConfig,

    #[serde(default)]
    pub services: ServiceConfig,
}

impl GmlanConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Engine settings, with CAN IDs defaulting to the ECU family's
    pub fn isotp_settings(&self) -> Result<IsoTpSettings, ConfigError> {
        let tx_id = match &self.isotp.request_id {
            Some(id) => parse_can_id(id)?,
            None => self.ecu.request_id(),
        };
        let rx_id = match &self.isotp.response_id {
            Some(id) => parse_can_id(id)?,
            None => self.ecu.response_id(),
        };
        Ok(IsoTpSettings {
            tx_id,
            rx_id,
            frame_timeout: Duration::from_millis(self.isotp.frame_timeout_ms),
            rx_separation_time: self.isotp.rx_separation_time,
            forced_separation_time: self.isotp.forced_separation_time_us.map(Duration::from_micros),
            max_flow_control_waits: self.isotp.max_flow_control_waits,
            max_response_pending: self.isotp.max_response_pending,
            padding: self.isotp.padding,
        })
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            read_block_size: self.services.read_block_size,
            transfer_block_size: self.services.transfer_block_size,
            address_width: self
                .services
                .address_width
                .unwrap_or_else(|| self.ecu.address_width()),
        }
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Frame transport selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// In-process simulated ECU
    #[default]
    Sim,
    /// Raw SocketCAN (Linux only)
    SocketCan {
        #[serde(default = "default_interface")]
        interface: String,
    },
}

fn default_interface() -> String {
    "can0".to_string()
}

// =============================================================================
// Segmentation Engine Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoTpConfig {
    /// Tester -> ECU CAN ID (e.g. "0x7E0"); defaults to the ECU family's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// ECU -> tester CAN ID (e.g. "0x7E8"); defaults to the ECU family's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,

    /// Per-frame wait
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    /// Raw separation-time byte advertised in our flow-control frames
    #[serde(default)]
    pub rx_separation_time: u8,

    /// Host-forced delay between consecutive frames (microseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_separation_time_us: Option<u64>,

    #[serde(default = "default_max_flow_control_waits")]
    pub max_flow_control_waits: u32,

    #[serde(default = "default_max_response_pending")]
    pub max_response_pending: u32,

    /// Filler for unused frame bytes
    #[serde(default)]
    pub padding: u8,
}

fn default_frame_timeout_ms() -> u64 {
    500
}

fn default_max_flow_control_waits() -> u32 {
    DEFAULT_MAX_FLOW_CONTROL_WAITS
}

fn default_max_response_pending() -> u32 {
    DEFAULT_MAX_RESPONSE_PENDING
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            request_id: None,
            response_id: None,
            frame_timeout_ms: default_frame_timeout_ms(),
            rx_separation_time: 0,
            forced_separation_time_us: None,
            max_flow_control_waits: default_max_flow_control_waits(),
            max_response_pending: default_max_response_pending(),
            padding: 0x00,
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bytes per ReadMemoryByAddress block
    #[serde(default = "default_read_block_size")]
    pub read_block_size: u16,

    /// Bytes per TransferData block
    #[serde(default = "default_transfer_block_size")]
    pub transfer_block_size: u16,

    /// Address width override; defaults to the ECU family's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_width: Option<FieldWidth>,
}

fn default_read_block_size() -> u16 {
    0x80
}

fn default_transfer_block_size() -> u16 {
    0xF0
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            read_block_size: default_read_block_size(),
            transfer_block_size: default_transfer_block_size(),
            address_width: None,
        }
    }
}

/// Parse a CAN ID, hex with a `0x` prefix or decimal
pub fn parse_can_id(s: &str) -> Result<u32, ConfigError> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };
    match parsed {
        Ok(id) if id <= 0x1FFF_FFFF => Ok(id),
        _ => Err(ConfigError::InvalidCanId(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GmlanConfig::from_toml("").unwrap();
        assert_eq!(config, GmlanConfig::default());

        let settings = config.isotp_settings().unwrap();
        assert_eq!(settings, IsoTpSettings::default());
        assert_eq!(config.service_options().address_width, FieldWidth::Bits32);
    }

    #[test]
    fn parses_full_config() {
        let config = GmlanConfig::from_toml(
            r#"
            ecu = "t43"
            protocol = "kwp2000"

            [transport]
            type = "socketcan"
            interface = "vcan0"

            [isotp]
            request_id = "0x241"
            response_id = "1601"
            frame_timeout_ms = 250
            forced_separation_time_us = 500
            padding = 0xAA

            [services]
            read_block_size = 64
            address_width = "bits32"
            "#,
        )
        .unwrap();

        assert_eq!(config.ecu, EcuFamily::T43);
        assert_eq!(config.protocol, ProtocolVariant::Kwp2000);
        assert_eq!(
            config.transport,
            TransportConfig::SocketCan {
                interface: "vcan0".to_string()
            }
        );

        let settings = config.isotp_settings().unwrap();
        assert_eq!(settings.tx_id, 0x241);
        assert_eq!(settings.rx_id, 1601);
        assert_eq!(settings.frame_timeout, Duration::from_millis(250));
        assert_eq!(settings.forced_separation_time, Some(Duration::from_micros(500)));
        assert_eq!(settings.padding, 0xAA);
        assert_eq!(settings.max_response_pending, 40);

        let options = config.service_options();
        assert_eq!(options.read_block_size, 64);
        assert_eq!(options.transfer_block_size, 0xF0);
        assert_eq!(options.address_width, FieldWidth::Bits32);
    }

    #[test]
    fn family_supplies_ids_and_width() {
        let config = GmlanConfig::from_toml("ecu = \"t43\"").unwrap();
        let settings = config.isotp_settings().unwrap();
        assert_eq!((settings.tx_id, settings.rx_id), (0x7E2, 0x7EA));
        assert_eq!(config.service_options().address_width, FieldWidth::Bits24);
    }

    #[test]
    fn bad_can_ids_are_rejected() {
        assert!(matches!(parse_can_id("0xZZ"), Err(ConfigError::InvalidCanId(_))));
        assert!(matches!(parse_can_id("0x20000000"), Err(ConfigError::InvalidCanId(_))));
        assert_eq!(parse_can_id(" 0X7e0 ").unwrap(), 0x7E0);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmlan.toml");
        std::fs::write(&path, "[transport]\ntype = \"sim\"\n").unwrap();
        assert_eq!(GmlanConfig::load(&path).unwrap().transport, TransportConfig::Sim);
        assert!(matches!(
            GmlanConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
