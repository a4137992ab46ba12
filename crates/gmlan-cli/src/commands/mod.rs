//! Command implementations for gmlan-cli

pub mod dtc;
pub mod dump;
pub mod info;
pub mod read_id;
pub mod state;
pub mod unlock;
pub mod verify;

pub use dtc::dtc;
pub use dump::dump;
pub use info::info;
pub use read_id::read_id;
pub use state::state;
pub use unlock::unlock;
pub use verify::verify;

/// Parse a number given as `0x`-prefixed hex or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

/// Parse an identifier byte; bare digits are hex, as identifiers are always written
pub fn parse_identifier(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid identifier '{}': {}", s, e))
}
