//! ISO-TP style segmentation engine
//!
//! Turns a logical message of 1..=4095 bytes into single / first /
//! consecutive frames, runs the flow-control handshake, and reassembles the
//! response. One transfer may be in flight per engine.

mod engine;
mod error;
pub mod flow;
pub mod frame;

pub use engine::{IsoTpEngine, TransferBuffers, BUFFER_CAPACITY};
pub use error::TransferError;
pub use flow::{separation_delay, FlowControl, FlowStatus};
pub use frame::{FrameKind, SequenceCounter, MAX_MESSAGE_LEN};

use std::time::Duration;

/// Default per-frame wait
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(500);
/// Default ceiling on consecutive flow-control "wait" frames
pub const DEFAULT_MAX_FLOW_CONTROL_WAITS: u32 = 10;
/// Default ceiling on consecutive response-pending frames
pub const DEFAULT_MAX_RESPONSE_PENDING: u32 = 40;

/// Resolved engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoTpSettings {
    /// Arbitration ID we transmit on
    pub tx_id: u32,
    /// Arbitration ID we expect replies on
    pub rx_id: u32,
    /// Timeout for every single frame wait
    pub frame_timeout: Duration,
    /// Raw separation-time byte advertised in our flow-control frames
    pub rx_separation_time: u8,
    /// Host-forced inter-frame delay, overriding the target's request
    pub forced_separation_time: Option<Duration>,
    /// Consecutive "wait" flow-control frames tolerated before giving up
    pub max_flow_control_waits: u32,
    /// Consecutive response-pending frames tolerated before giving up
    pub max_response_pending: u32,
    /// Filler for unused frame bytes
    pub padding: u8,
}

impl Default for IsoTpSettings {
    fn default() -> Self {
        Self {
            tx_id: 0x7E0,
            rx_id: 0x7E8,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            rx_separation_time: 0,
            forced_separation_time: None,
            max_flow_control_waits: DEFAULT_MAX_FLOW_CONTROL_WAITS,
            max_response_pending: DEFAULT_MAX_RESPONSE_PENDING,
            padding: 0x00,
        }
    }
}

impl IsoTpSettings {
    /// Same settings seen from the other end of the link
    pub fn reversed(&self) -> Self {
        Self {
            tx_id: self.rx_id,
            rx_id: self.tx_id,
            ..self.clone()
        }
    }
}
