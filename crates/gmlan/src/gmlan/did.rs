//! Identifier descriptors and batch identifier scans

use serde::Serialize;
use tracing::debug;

use super::GmlanSession;
use crate::events::EventCategory;
use crate::transport::FrameTransport;

/// Odometer identifier, reported in 1/64 km units when 4 bytes long
pub const ODOMETER_DID: u8 = 0xDF;

/// How an identifier payload is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// Best-effort UTF-8
    Text,
    /// Raw bytes as hex
    Hex,
    /// Big-endian integer for 1, 2 or 4 bytes, else one number per byte
    Decimal,
}

/// One identifier in a scan list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DidDescriptor {
    pub id: u8,
    pub kind: DisplayKind,
    pub label: &'static str,
}

impl DidDescriptor {
    pub const fn new(id: u8, kind: DisplayKind, label: &'static str) -> Self {
        Self { id, kind, label }
    }
}

/// Identifiers common to GM powertrain modules
pub static GM_IDENTIFIERS: &[DidDescriptor] = &[
    DidDescriptor::new(0x90, DisplayKind::Text, "VIN"),
    DidDescriptor::new(0x92, DisplayKind::Text, "Supplier hardware number"),
    DidDescriptor::new(0x98, DisplayKind::Text, "Repair shop code"),
    DidDescriptor::new(0x99, DisplayKind::Hex, "Programming date"),
    DidDescriptor::new(0x9A, DisplayKind::Hex, "Diagnostic data identifier"),
    DidDescriptor::new(0xB4, DisplayKind::Text, "Traceability number"),
    DidDescriptor::new(0xC0, DisplayKind::Decimal, "Boot software part number"),
    DidDescriptor::new(0xC1, DisplayKind::Decimal, "Operating software part number"),
    DidDescriptor::new(0xC2, DisplayKind::Decimal, "Calibration 1 part number"),
    DidDescriptor::new(0xC3, DisplayKind::Decimal, "Calibration 2 part number"),
    DidDescriptor::new(0xC4, DisplayKind::Decimal, "Calibration 3 part number"),
    DidDescriptor::new(0xC5, DisplayKind::Decimal, "Calibration 4 part number"),
    DidDescriptor::new(0xC6, DisplayKind::Decimal, "Calibration 5 part number"),
    DidDescriptor::new(0xCB, DisplayKind::Decimal, "End model part number"),
    DidDescriptor::new(0xCC, DisplayKind::Decimal, "Base model part number"),
    DidDescriptor::new(ODOMETER_DID, DisplayKind::Decimal, "Odometer (km)"),
];

/// Result of reading one identifier in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DidReading {
    pub descriptor: DidDescriptor,
    /// Rendered value, `None` if the read failed
    pub value: Option<String>,
}

impl DidReading {
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or("(could not read)")
    }
}

/// UTF-8 text with trailing NULs removed, `None` if not valid UTF-8
pub fn decode_text(raw: &[u8]) -> Option<String> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&raw[..end]).ok().map(|s| s.trim_end().to_string())
}

/// Render an identifier payload
pub fn format_value(id: u8, kind: DisplayKind, raw: &[u8]) -> String {
    match kind {
        DisplayKind::Text => decode_text(raw).unwrap_or_else(|| hex::encode_upper(raw)),
        DisplayKind::Hex => hex::encode_upper(raw),
        DisplayKind::Decimal => match raw.len() {
            1 | 2 | 4 => {
                let value = raw.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                if id == ODOMETER_DID && raw.len() == 4 {
                    (value / 64).to_string()
                } else {
                    value.to_string()
                }
            }
            _ => raw
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        },
    }
}

impl<T: FrameTransport> GmlanSession<T> {
    /// Read and render every identifier in `list`
    ///
    /// A failed read is recorded as "(could not read)" and the scan
    /// continues. One event per identifier is emitted; a failed read adds
    /// no service-level event of its own.
    pub fn read_did_list(&mut self, list: &[DidDescriptor]) -> Vec<DidReading> {
        list.iter()
            .map(|descriptor| {
                let value = match self.read_identifier_inner(descriptor.id) {
                    Ok(raw) => Some(format_value(descriptor.id, descriptor.kind, &raw)),
                    Err(e) => {
                        debug!(id = descriptor.id, error = %e, "Identifier not read");
                        None
                    }
                };
                let reading = DidReading {
                    descriptor: *descriptor,
                    value,
                };
                self.emit(
                    EventCategory::QueryingEcuTypeInfo,
                    &format!(
                        "{} (0x{:02X}): {}",
                        descriptor.label,
                        descriptor.id,
                        reading.display_value()
                    ),
                );
                reading
            })
            .collect()
    }

    /// Probe identifiers 0x00 to 0xFF
    ///
    /// Identifiers from [`GM_IDENTIFIERS`] keep their display kind, others
    /// are shown as hex. Only identifiers that answered are returned.
    pub fn scan_all_identifiers(&mut self) -> Vec<DidReading> {
        let list: Vec<DidDescriptor> = (0..=u8::MAX)
            .map(|id| {
                GM_IDENTIFIERS
                    .iter()
                    .find(|d| d.id == id)
                    .copied()
                    .unwrap_or(DidDescriptor::new(id, DisplayKind::Hex, "Identifier"))
            })
            .collect();
        self.read_did_list(&list)
            .into_iter()
            .filter(|r| r.value.is_some())
            .collect()
    }
}
