//! Info-event sink
//!
//! Human-readable progress and failure events are delivered synchronously
//! to an [`InfoSink`] as each frame or block completes. The caller decides
//! where they go (log, UI thread, channel).

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Category attached to every emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Segmentation engine and frame transport
    TransferLayer,
    /// Firmware file handling
    ConvertingFile,
    /// Identifier reads and scans
    QueryingEcuTypeInfo,
    /// Seed/key exchange
    SecurityAccess,
    /// Memory reads
    MemoryAccess,
    /// Download, transfer and programming mode
    Programming,
    /// Trouble codes and session control
    Diagnostics,
    /// Checksum / partition verification
    Checksum,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventCategory::TransferLayer => "transfer_layer",
            EventCategory::ConvertingFile => "converting_file",
            EventCategory::QueryingEcuTypeInfo => "querying_ecu_type_info",
            EventCategory::SecurityAccess => "security_access",
            EventCategory::MemoryAccess => "memory_access",
            EventCategory::Programming => "programming",
            EventCategory::Diagnostics => "diagnostics",
            EventCategory::Checksum => "checksum",
        };
        f.write_str(s)
    }
}

/// Receiver of human-readable events
pub trait InfoSink: Send + Sync {
    fn emit(&self, message: &str, category: EventCategory);
}

impl<F> InfoSink for F
where
    F: Fn(&str, EventCategory) + Send + Sync,
{
    fn emit(&self, message: &str, category: EventCategory) {
        self(message, category)
    }
}

/// Forwards events to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl InfoSink for TracingSink {
    fn emit(&self, message: &str, category: EventCategory) {
        tracing::info!(%category, "{}", message);
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl InfoSink for NullSink {
    fn emit(&self, _message: &str, _category: EventCategory) {}
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub category: EventCategory,
    pub message: String,
}

/// Collects events in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Messages emitted under one category, in order
    pub fn messages(&self, category: EventCategory) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl InfoSink for MemorySink {
    fn emit(&self, message: &str, category: EventCategory) {
        self.events.lock().push(Event {
            category,
            message: message.to_string(),
        });
    }
}

/// Shared sink handle used throughout the crate
pub type SharedSink = Arc<dyn InfoSink>;

/// Default sink: forward to tracing
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_filters_by_category() {
        let sink = MemorySink::new();
        sink.emit("frame sent", EventCategory::TransferLayer);
        sink.emit("VIN: W0L0000000", EventCategory::QueryingEcuTypeInfo);
        sink.emit("timeout", EventCategory::TransferLayer);

        assert_eq!(
            sink.messages(EventCategory::TransferLayer),
            vec!["frame sent".to_string(), "timeout".to_string()]
        );
        assert_eq!(sink.events().len(), 3);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink: SharedSink = Arc::new(move |msg: &str, cat: EventCategory| {
            captured.lock().push(format!("{}: {}", cat, msg));
        });

        sink.emit("ok", EventCategory::Checksum);
        assert_eq!(seen.lock().as_slice(), ["checksum: ok"]);
    }
}
