//! State command - programmed state

use anyhow::{Context, Result};

use crate::connection::Connection;
use crate::output::OutputContext;

pub fn state(conn: &mut Connection, ctx: &OutputContext) -> Result<()> {
    let state = conn
        .session
        .report_programmed_state()
        .context("Failed to read programmed state")?;

    ctx.print_kv(&[
        ("ECU", conn.family.to_string()),
        ("Programmed state", state.to_string()),
        (
            "Memory fault",
            if state.is_memory_fault() { "yes" } else { "no" }.to_string(),
        ),
    ]);
    if state.is_memory_fault() {
        ctx.warn("The module reports a memory fault");
    }
    Ok(())
}
