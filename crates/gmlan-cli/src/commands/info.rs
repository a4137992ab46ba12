//! Info command - identifier scan

use anyhow::Result;
use gmlan::gmlan::{DidDescriptor, DidReading, DisplayKind, GM_IDENTIFIERS};

use crate::connection::Connection;
use crate::output::{IdentifierRow, OutputContext};

/// Descriptor for `id`, falling back to a hex rendering for unknown identifiers
pub fn descriptor_for(id: u8) -> DidDescriptor {
    GM_IDENTIFIERS
        .iter()
        .find(|d| d.id == id)
        .copied()
        .unwrap_or(DidDescriptor::new(id, DisplayKind::Hex, "Identifier"))
}

/// Read the family's identifiers, a chosen list, or every identifier
pub fn info(conn: &mut Connection, ids: &[u8], all: bool, ctx: &OutputContext) -> Result<()> {
    ctx.info(&format!(
        "ECU family {} ({})",
        conn.family,
        if conn.is_simulated() { "simulated" } else { "CAN" }
    ));

    let readings = if all {
        ctx.info("Scanning identifiers 0x00-0xFF...");
        conn.session.scan_all_identifiers()
    } else if ids.is_empty() {
        conn.session.read_did_list(conn.family.identifiers())
    } else {
        let list: Vec<DidDescriptor> = ids.iter().map(|&id| descriptor_for(id)).collect();
        conn.session.read_did_list(&list)
    };

    let rows: Vec<IdentifierRow> = readings.iter().map(row).collect();
    ctx.print(&rows);
    Ok(())
}

fn row(reading: &DidReading) -> IdentifierRow {
    IdentifierRow {
        did: format!("0x{:02X}", reading.descriptor.id),
        name: reading.descriptor.label.to_string(),
        value: reading.display_value().to_string(),
    }
}
