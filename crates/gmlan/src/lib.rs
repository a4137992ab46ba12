//! gmlan - GMLAN diagnostics and reprogramming over CAN
//!
//! This crate provides the protocol stack used to diagnose and reflash GM
//! powertrain modules: a segmentation engine over a raw frame transport,
//! the diagnostic service catalogue built on it, and the firmware checksum
//! verifier consulted before a flash write.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GmlanSession                            │
//! │  identifiers, security access, memory, download, DTCs        │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │ EcuFamily   │  │ Protocol    │  │ InfoSink            │ │
//! │  │ (static)    │  │ Variant     │  │ (events)            │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │                          │                                  │
//! │                    ┌─────┴─────┐                            │
//! │                    │IsoTpEngine│                            │
//! │                    │(framing)  │                            │
//! │                    └─────┬─────┘                            │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │ FrameTransport  │                         │
//! │                 │(SocketCAN/mock) │                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//!
//!   ChecksumVerifier works on firmware files, independent of the bus
//! ```

pub mod checksum;
pub mod config;
pub mod ecu;
pub mod error;
pub mod events;
pub mod gmlan;
pub mod isotp;
pub mod protocol;
pub mod transport;

pub use checksum::{ChecksumError, ChecksumReport, ChecksumStatus, ChecksumVerifier, LayoutVariant};
pub use config::{ConfigError, GmlanConfig, TransportConfig};
pub use ecu::{EcuFamily, EcuFeatures};
pub use error::{GmlanError, Result};
pub use events::{EventCategory, InfoSink, MemorySink, NullSink, SharedSink, TracingSink};
pub use gmlan::{
    DidDescriptor, DidReading, FailureRecord, FixedKey, GmlanSession, KeyDerivation,
    NegativeResponseCode, ProgrammedState, SecurityOutcome, ServiceError, ServiceOptions,
};
pub use isotp::{IsoTpEngine, IsoTpSettings, TransferError};
pub use protocol::{DiagnosticProtocol, ProtocolVariant};
pub use transport::{open_transport, CanFrame, FrameTransport, TransportError};

/// Build a session over `transport` from configuration
pub fn session_from_config<T: FrameTransport>(
    transport: T,
    config: &GmlanConfig,
    sink: SharedSink,
) -> Result<GmlanSession<T>> {
    let settings = config.isotp_settings()?;
    tracing::info!(
        ecu = %config.ecu,
        protocol = %config.protocol,
        tx_id = %format!("0x{:03X}", settings.tx_id),
        rx_id = %format!("0x{:03X}", settings.rx_id),
        "Opening diagnostic session"
    );
    let engine = IsoTpEngine::new(transport, settings, sink);
    Ok(GmlanSession::new(engine, config.protocol, config.service_options()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    #[test]
    fn invalid_ids_fail_session_construction() {
        let mut config = GmlanConfig::default();
        config.isotp.request_id = Some("0xZZZ".to_string());
        let result = session_from_config(MockTransport::new(), &config, Arc::new(NullSink));
        assert!(matches!(result, Err(GmlanError::Config(_))));
    }

    #[test]
    fn session_uses_family_ids_and_options() {
        let config = GmlanConfig::from_toml("ecu = \"t43\"\nprotocol = \"kwp2000\"").unwrap();
        let transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_message(0x7EA, &[0x7E]);

        let mut session = session_from_config(transport, &config, Arc::new(NullSink)).unwrap();
        assert_eq!(session.protocol(), ProtocolVariant::Kwp2000);
        assert_eq!(session.options().address_width, crate::gmlan::FieldWidth::Bits24);

        session.tester_present().unwrap();
        assert_eq!(handle.sent()[0].id, 0x7E2);
    }
}
