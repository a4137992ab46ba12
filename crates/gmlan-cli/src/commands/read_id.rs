//! Read-id command - single identifier read

use anyhow::{Context, Result};
use gmlan::gmlan::did::format_value;

use super::info::descriptor_for;
use crate::connection::Connection;
use crate::output::{IdentifierRow, OutputContext};

/// Read one identifier, rendered by its known display kind unless `raw`
pub fn read_id(conn: &mut Connection, id: u8, raw: bool, ctx: &OutputContext) -> Result<()> {
    let payload = conn
        .session
        .read_identifier(id)
        .with_context(|| format!("Failed to read identifier 0x{:02X}", id))?;

    let descriptor = descriptor_for(id);
    let value = if raw {
        hex::encode_upper(&payload)
    } else {
        format_value(id, descriptor.kind, &payload)
    };

    ctx.print(&[IdentifierRow {
        did: format!("0x{:02X}", id),
        name: descriptor.label.to_string(),
        value,
    }]);
    Ok(())
}
