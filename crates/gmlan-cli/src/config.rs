//! Configuration file handling for gmlan-cli
//!
//! The file format is [`GmlanConfig`]. Without `--config`, the user file at
//! `<config dir>/gmlan-cli/config.toml` is used when present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use gmlan::{EcuFamily, GmlanConfig, TransportConfig};

/// Transport selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// In-process simulated ECU
    Sim,
    /// SocketCAN interface
    Socketcan,
}

/// Configuration for the CLI tool
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub gmlan: GmlanConfig,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let gmlan = GmlanConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;
        Ok(Self { gmlan })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("gmlan-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    ///
    /// An interface without an explicit transport selects SocketCAN.
    pub fn merge_with_args(
        &self,
        ecu: Option<EcuFamily>,
        transport: Option<TransportKind>,
        interface: Option<&str>,
    ) -> GmlanConfig {
        let mut merged = self.gmlan.clone();
        if let Some(ecu) = ecu {
            merged.ecu = ecu;
        }

        let configured_interface = match &self.gmlan.transport {
            TransportConfig::SocketCan { interface } => Some(interface.as_str()),
            TransportConfig::Sim => None,
        };
        merged.transport = match (transport, interface) {
            (Some(TransportKind::Sim), _) => TransportConfig::Sim,
            (Some(TransportKind::Socketcan), _) | (None, Some(_)) => TransportConfig::SocketCan {
                interface: interface
                    .or(configured_interface)
                    .unwrap_or("can0")
                    .to_string(),
            },
            (None, None) => merged.transport,
        };
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn socketcan(interface: &str) -> TransportConfig {
        TransportConfig::SocketCan {
            interface: interface.to_string(),
        }
    }

    #[test]
    fn args_override_file_values() {
        let config = Config {
            gmlan: GmlanConfig::from_toml("ecu = \"e67\"").unwrap(),
        };
        let merged = config.merge_with_args(Some(EcuFamily::T43), None, None);
        assert_eq!(merged.ecu, EcuFamily::T43);
        assert_eq!(merged.transport, TransportConfig::Sim);

        let merged = config.merge_with_args(None, None, None);
        assert_eq!(merged.ecu, EcuFamily::E67);
    }

    #[rstest]
    #[case(None, None, TransportConfig::Sim)]
    #[case(None, Some("vcan0"), socketcan("vcan0"))]
    #[case(Some(TransportKind::Socketcan), None, socketcan("can0"))]
    #[case(Some(TransportKind::Sim), Some("vcan0"), TransportConfig::Sim)]
    fn transport_selection(
        #[case] kind: Option<TransportKind>,
        #[case] interface: Option<&str>,
        #[case] expected: TransportConfig,
    ) {
        let merged = Config::default().merge_with_args(None, kind, interface);
        assert_eq!(merged.transport, expected);
    }

    #[test]
    fn configured_interface_is_kept() {
        let config = Config {
            gmlan: GmlanConfig::from_toml("[transport]\ntype = \"socketcan\"\ninterface = \"can1\"")
                .unwrap(),
        };
        let merged = config.merge_with_args(None, Some(TransportKind::Socketcan), None);
        assert_eq!(merged.transport, socketcan("can1"));
    }

    #[test]
    fn load_from_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ecu = \"t43\"\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().gmlan.ecu, EcuFamily::T43);
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
