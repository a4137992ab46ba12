//! Integration tests for the GMLAN stack
//!
//! Every test runs a tester session against `example-ecu` over an
//! in-process virtual CAN bus, so no CAN hardware or vcan setup is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gmlan-tests
//! RUST_LOG=debug cargo test -p gmlan-tests -- --nocapture
//! ```
//!
//! # Test Structure
//!
//! - `segmentation_test.rs` - framing and reassembly across the bus
//! - `services_test.rs` - identifiers, security, trouble codes, faults
//! - `programming_test.rs` - memory reads, download and programming mode
//! - `checksum_test.rs` - dumped images through the checksum verifier

use std::sync::Arc;

use example_ecu::{EcuSimulator, SimConfig, SimulatedEcu, VirtualBus, VirtualEndpoint};
use gmlan::{
    session_from_config, EcuFamily, GmlanConfig, GmlanSession, MemorySink, SecurityOutcome,
};

/// Frame timeout used by the tester side; the simulator answers in microseconds
pub const TEST_FRAME_TIMEOUT_MS: u64 = 300;

pub type HarnessResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Tester session wired to a running simulated ECU
pub struct TestHarness {
    pub session: GmlanSession<VirtualEndpoint>,
    /// Everything the tester session emitted
    pub events: MemorySink,
    pub bus: VirtualBus,
    simulator: EcuSimulator,
}

impl TestHarness {
    /// Healthy module of `family`
    pub fn new(family: EcuFamily) -> HarnessResult<Self> {
        Self::with_sim_config(SimConfig::for_family(family))
    }

    pub fn with_sim_config(sim: SimConfig) -> HarnessResult<Self> {
        Self::build(sim, VirtualBus::new(), |_| {})
    }

    /// Full control: simulator config, bus, and tester config overrides
    pub fn build(
        sim: SimConfig,
        bus: VirtualBus,
        configure: impl FnOnce(&mut GmlanConfig),
    ) -> HarnessResult<Self> {
        init_logging();

        let mut config = GmlanConfig {
            ecu: sim.family,
            ..GmlanConfig::default()
        };
        config.isotp.frame_timeout_ms = TEST_FRAME_TIMEOUT_MS;
        configure(&mut config);

        let ecu = Arc::new(SimulatedEcu::from_config(&sim)?);
        let (tester, ecu_side) = bus.endpoints();
        let simulator = EcuSimulator::spawn(ecu, ecu_side);

        let events = MemorySink::new();
        let session = session_from_config(tester, &config, Arc::new(events.clone()))?;
        Ok(Self {
            session,
            events,
            bus,
            simulator,
        })
    }

    pub fn ecu(&self) -> &SimulatedEcu {
        self.simulator.ecu()
    }

    /// Shared handle, for key functions that consult the simulator
    pub fn ecu_handle(&self) -> Arc<SimulatedEcu> {
        self.simulator.ecu().clone()
    }

    /// Unlock level 1 with the key the simulator expects
    pub fn unlock(&mut self) -> gmlan::Result<SecurityOutcome> {
        let ecu = self.ecu_handle();
        let family = ecu.family();
        let keys = move |seed: &[u8], _: EcuFamily, _: u8, _: u8| Some(ecu.expected_key(seed));
        Ok(self.session.security_access(family, 0x01, 0x00, &keys)?)
    }
}

/// Honour RUST_LOG when set; repeated calls are harmless
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
