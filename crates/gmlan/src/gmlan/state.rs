//! ReportProgrammedState (0xA2) decoding

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgrammedState {
    FullyProgrammed,
    MissingSoftware,
    MissingCalibration,
    GeneralMemoryFault,
    RamMemoryFault,
    NvramMemoryFault,
    BootMemoryFault,
    FlashMemoryFault,
    Unknown(u8),
}

impl From<u8> for ProgrammedState {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ProgrammedState::FullyProgrammed,
            0x01 => ProgrammedState::MissingSoftware,
            0x02 => ProgrammedState::MissingCalibration,
            0x50 => ProgrammedState::GeneralMemoryFault,
            0x51 => ProgrammedState::RamMemoryFault,
            0x52 => ProgrammedState::NvramMemoryFault,
            0x53 => ProgrammedState::BootMemoryFault,
            0x54 => ProgrammedState::FlashMemoryFault,
            other => ProgrammedState::Unknown(other),
        }
    }
}

impl ProgrammedState {
    pub fn is_memory_fault(&self) -> bool {
        matches!(
            self,
            ProgrammedState::GeneralMemoryFault
                | ProgrammedState::RamMemoryFault
                | ProgrammedState::NvramMemoryFault
                | ProgrammedState::BootMemoryFault
                | ProgrammedState::FlashMemoryFault
        )
    }
}

impl fmt::Display for ProgrammedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgrammedState::FullyProgrammed => f.write_str("fully programmed"),
            ProgrammedState::MissingSoftware => f.write_str("missing software"),
            ProgrammedState::MissingCalibration => f.write_str("missing calibration"),
            ProgrammedState::GeneralMemoryFault => f.write_str("general memory fault"),
            ProgrammedState::RamMemoryFault => f.write_str("RAM memory fault"),
            ProgrammedState::NvramMemoryFault => f.write_str("NVRAM memory fault"),
            ProgrammedState::BootMemoryFault => f.write_str("boot memory fault"),
            ProgrammedState::FlashMemoryFault => f.write_str("flash memory fault"),
            ProgrammedState::Unknown(v) => write!(f, "unknown (0x{:02X})", v),
        }
    }
}
