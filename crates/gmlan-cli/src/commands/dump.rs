//! Dump command - paginated memory read to a file
//!
//! The session is blocking, so the read runs on `spawn_blocking`. Session
//! events and progress come back over a channel and drive the progress bar.
//! Ctrl-C is checked between page groups.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use example_ecu::SimConfig;
use gmlan::{EventCategory, GmlanConfig, InfoSink};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

use crate::connection::Connection;
use crate::output::OutputContext;

/// Blocks read between cancellation checks
const PAGE_GROUP_BLOCKS: u32 = 16;

enum DumpMessage {
    Event(EventCategory, String),
    /// Bytes read so far
    Progress(u64),
}

/// Forwards session events to the async side
struct ChannelSink {
    tx: UnboundedSender<DumpMessage>,
}

impl InfoSink for ChannelSink {
    fn emit(&self, message: &str, category: EventCategory) {
        // The receiver only goes away once the dump is over
        let _ = self.tx.send(DumpMessage::Event(category, message.to_string()));
    }
}

/// Read `length` bytes at `address` into `out`
pub async fn dump(
    config: &GmlanConfig,
    sim: Option<&SimConfig>,
    address: u32,
    length: u32,
    block_size: Option<u16>,
    out: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    if length == 0 {
        bail!("Nothing to read: length is 0");
    }
    address
        .checked_add(length - 1)
        .ok_or_else(|| anyhow!("0x{:X} bytes at 0x{:X} overflow the address range", length, address))?;
    if !config.ecu.features().memory_read {
        bail!("{} modules do not support memory reads", config.ecu);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Connection::open(config, sim, Arc::new(ChannelSink { tx: tx.clone() }))?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl+C handler")?;
    }

    ctx.info(&format!(
        "Reading 0x{:X} bytes at 0x{:06X} from {}...",
        length, address, config.ecu
    ));
    let pb = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(length as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("=>-"),
    );

    let task = tokio::task::spawn_blocking(move || {
        read_pages(conn, address, length, block_size, &cancel, &tx)
    });

    // Ends once the task has dropped the session and its sink
    while let Some(message) = rx.recv().await {
        match message {
            DumpMessage::Progress(done) => pb.set_position(done),
            DumpMessage::Event(EventCategory::MemoryAccess, msg) => pb.set_message(msg),
            DumpMessage::Event(_, msg) => pb.println(msg),
        }
    }

    let image = match task.await.context("Dump task failed")? {
        Ok(image) => image,
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e);
        }
    };
    pb.finish_with_message("Complete");

    std::fs::write(out, &image)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(path = %out.display(), len = image.len(), "Memory dump written");
    ctx.success(&format!("Wrote {} bytes to {}", image.len(), out.display()));
    Ok(())
}

fn read_pages(
    mut conn: Connection,
    address: u32,
    length: u32,
    block_size: Option<u16>,
    cancel: &AtomicBool,
    tx: &UnboundedSender<DumpMessage>,
) -> Result<Vec<u8>> {
    let options = *conn.session.options();
    let block_size = block_size.unwrap_or(options.read_block_size);
    if block_size == 0 {
        bail!("Block size must be at least 1");
    }
    let group_len = u32::from(block_size).saturating_mul(PAGE_GROUP_BLOCKS);
    debug!(block_size, group_len, "Starting paged dump");

    let mut image = Vec::with_capacity(length as usize);
    let mut offset = 0u32;
    while offset < length {
        if cancel.load(Ordering::SeqCst) {
            bail!("Dump cancelled at 0x{:06X}", address + offset);
        }
        let chunk = (length - offset).min(group_len);
        let data = conn
            .session
            .read_memory_paged(options.address_width, address + offset, chunk, block_size)
            .with_context(|| format!("Memory read failed at 0x{:06X}", address + offset))?;
        image.extend_from_slice(&data);
        offset += chunk;
        let _ = tx.send(DumpMessage::Progress(offset as u64));
    }
    Ok(image)
}
