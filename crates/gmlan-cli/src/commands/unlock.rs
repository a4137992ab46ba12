//! Unlock command - security access

use anyhow::{anyhow, Context, Result};
use gmlan::{FixedKey, SecurityOutcome};

use crate::connection::Connection;
use crate::output::OutputContext;

/// Perform security access with a key computed elsewhere
pub fn unlock(
    conn: &mut Connection,
    level: u8,
    mode: u8,
    key: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let key_bytes = hex::decode(key.trim().trim_start_matches("0x"))
        .map_err(|_| anyhow!("Invalid hex key: {}", key))?;

    let features = conn.family.features();
    if !features.security_levels.contains(&level) {
        ctx.warn(&format!(
            "Security level {} is not known for {} modules, trying anyway",
            level, conn.family
        ));
    }

    ctx.info(&format!("Requesting seed for security level {}...", level));
    let outcome = conn
        .session
        .security_access(conn.family, level, mode, &FixedKey(key_bytes))
        .context("Security access failed")?;

    match outcome {
        SecurityOutcome::AlreadyUnlocked => {
            ctx.success(&format!("Security level {} already unlocked", level))
        }
        SecurityOutcome::Unlocked => ctx.success("Security access granted"),
    }
    Ok(())
}
