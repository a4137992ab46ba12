//! Dtc command - failure records

use anyhow::{Context, Result};

use crate::connection::Connection;
use crate::output::{DtcRow, OutputContext};

/// List failure record identifiers, or clear them
pub fn dtc(conn: &mut Connection, clear: bool, ctx: &OutputContext) -> Result<()> {
    if clear {
        conn.session
            .clear_diagnostic_information()
            .context("Failed to clear diagnostic information")?;
        ctx.success("Diagnostic information cleared");
        return Ok(());
    }

    let records = conn
        .session
        .read_failure_record_identifiers()
        .context("Failed to read failure records")?;

    if records.is_empty() {
        ctx.info("No failure records stored");
        return Ok(());
    }

    let rows: Vec<DtcRow> = records
        .iter()
        .map(|r| DtcRow {
            number: r.number,
            code: r.code_string(),
            category: format!("{:?}", r.category()),
            failure_type: format!("0x{:02X}", r.failure_type),
        })
        .collect();
    ctx.print(&rows);
    Ok(())
}
