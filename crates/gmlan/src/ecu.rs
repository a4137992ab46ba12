//! Supported ECU families
//!
//! Each family carries its CAN IDs, addressing, feature set and firmware
//! layout as static data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum::{LayoutVariant, TYPE_1, TYPE_2};
use crate::gmlan::{DidDescriptor, FieldWidth, GM_IDENTIFIERS};

/// What a family supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcuFeatures {
    /// Download / TransferData / ProgrammingMode
    pub programming: bool,
    /// ReadMemoryByAddress
    pub memory_read: bool,
    /// ReadFailureRecordData
    pub failure_records: bool,
    /// Seed request levels the module answers
    pub security_levels: &'static [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EcuFamily {
    /// Engine control module, 1 MiB flash
    #[default]
    E38,
    /// Engine control module, 2 MiB flash
    E67,
    /// Transmission control module
    T43,
    /// Any GMLAN module on the standard powertrain IDs
    Generic,
}

impl EcuFamily {
    pub const ALL: [EcuFamily; 4] = [
        EcuFamily::E38,
        EcuFamily::E67,
        EcuFamily::T43,
        EcuFamily::Generic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EcuFamily::E38 => "e38",
            EcuFamily::E67 => "e67",
            EcuFamily::T43 => "t43",
            EcuFamily::Generic => "generic",
        }
    }

    /// Tester-to-module arbitration ID
    pub fn request_id(&self) -> u32 {
        match self {
            EcuFamily::T43 => 0x7E2,
            _ => 0x7E0,
        }
    }

    /// Module-to-tester arbitration ID
    pub fn response_id(&self) -> u32 {
        match self {
            EcuFamily::T43 => 0x7EA,
            _ => 0x7E8,
        }
    }

    pub fn address_width(&self) -> FieldWidth {
        match self {
            EcuFamily::E38 | EcuFamily::E67 => FieldWidth::Bits32,
            EcuFamily::T43 | EcuFamily::Generic => FieldWidth::Bits24,
        }
    }

    /// Firmware partition layout, if the family's images are verifiable
    pub fn layout(&self) -> Option<&'static LayoutVariant> {
        match self {
            EcuFamily::E38 => Some(&TYPE_1),
            EcuFamily::E67 => Some(&TYPE_2),
            EcuFamily::T43 | EcuFamily::Generic => None,
        }
    }

    pub fn features(&self) -> EcuFeatures {
        match self {
            EcuFamily::E38 | EcuFamily::E67 => EcuFeatures {
                programming: true,
                memory_read: true,
                failure_records: true,
                security_levels: &[0x01],
            },
            EcuFamily::T43 => EcuFeatures {
                programming: false,
                memory_read: true,
                failure_records: true,
                security_levels: &[0x01],
            },
            EcuFamily::Generic => EcuFeatures {
                programming: false,
                memory_read: false,
                failure_records: true,
                security_levels: &[],
            },
        }
    }

    /// Identifiers read by an info scan
    pub fn identifiers(&self) -> &'static [DidDescriptor] {
        GM_IDENTIFIERS
    }
}

impl fmt::Display for EcuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EcuFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        EcuFamily::ALL
            .iter()
            .copied()
            .find(|family| family.name() == lower)
            .ok_or_else(|| format!("unknown ECU family '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for family in EcuFamily::ALL {
            assert_eq!(family.name().parse::<EcuFamily>(), Ok(family));
        }
        assert_eq!("E38".parse::<EcuFamily>(), Ok(EcuFamily::E38));
        assert!("e99".parse::<EcuFamily>().is_err());
    }

    #[test]
    fn family_data() {
        assert_eq!(EcuFamily::T43.request_id(), 0x7E2);
        assert_eq!(EcuFamily::T43.response_id(), 0x7EA);
        assert_eq!(EcuFamily::E38.layout().map(|l| l.name), Some("type 1"));
        assert!(EcuFamily::Generic.layout().is_none());
        assert!(!EcuFamily::Generic.features().memory_read);
    }
}
