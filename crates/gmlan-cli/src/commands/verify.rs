//! Verify command - firmware checksum verification and repair

use std::path::Path;

use anyhow::{bail, Context, Result};
use gmlan::checksum::compute_checksums;
use gmlan::{ChecksumStatus, ChecksumVerifier, SharedSink};

use crate::output::{OutputContext, RangeRow};

/// Verify `file`, asking before each correction unless `yes`
pub fn verify(file: &Path, fix: bool, yes: bool, sink: SharedSink, ctx: &OutputContext) -> Result<()> {
    let verifier = ChecksumVerifier::new(sink);
    let status = verifier
        .verify_file(file, fix, |layer, stored, computed| {
            ctx.warn(&format!(
                "{}: file 0x{:08X}, computed 0x{:08X}",
                layer, stored, computed
            ));
            fix && (yes || ctx.confirm(&format!("Correct {}?", layer)))
        })
        .context("Checksum verification failed")?;

    if matches!(status, ChecksumStatus::Ok | ChecksumStatus::MismatchCorrected) {
        print_ranges(file, ctx)?;
    }

    match status {
        ChecksumStatus::Ok => ctx.success("Checksums OK"),
        ChecksumStatus::MismatchCorrected => {
            ctx.success(&format!("Corrected checksums written to {}", file.display()))
        }
        ChecksumStatus::MismatchRejected if !fix => {
            bail!("Checksum mismatch (run with --fix to correct)")
        }
        ChecksumStatus::MismatchRejected => bail!("Checksum mismatch left uncorrected"),
        ChecksumStatus::InvalidFileLength => {
            bail!("{}: size matches no known firmware layout", file.display())
        }
        ChecksumStatus::UnknownLayout => {
            bail!("{}: metadata does not match any known layout", file.display())
        }
    }
    Ok(())
}

fn print_ranges(file: &Path, ctx: &OutputContext) -> Result<()> {
    let image =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let Ok(report) = compute_checksums(&image) else {
        return Ok(());
    };
    ctx.info(&format!(
        "Layout {}, metadata at 0x{:06X}",
        report.layout, report.metadata_base
    ));
    let rows: Vec<RangeRow> = report
        .ranges
        .iter()
        .map(|r| RangeRow {
            name: r.name.to_string(),
            start: format!("0x{:06X}", r.start),
            end: format!("0x{:06X}", r.end),
            modsum: format!("0x{:08X}", r.computed_modsum),
            crc: format!("0x{:08X}", r.computed_crc),
            valid: if r.is_valid() { "yes" } else { "no" }.to_string(),
        })
        .collect();
    ctx.print(&rows);
    Ok(())
}
