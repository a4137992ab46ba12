//! Opening a diagnostic session from the merged configuration

use std::sync::Arc;

use anyhow::{Context, Result};
use example_ecu::{EcuSimulator, SimConfig, SimulatedEcu, VirtualBus};
use gmlan::{
    open_transport, session_from_config, EcuFamily, FrameTransport, GmlanConfig, GmlanSession,
    IsoTpSettings, SharedSink, TransportConfig,
};
use tracing::debug;

pub type Session = GmlanSession<Box<dyn FrameTransport>>;

/// A session plus whatever keeps its far end alive
pub struct Connection {
    pub session: Session,
    pub family: EcuFamily,
    // Dropped after `session`: the simulator stops once the tester is gone
    simulator: Option<EcuSimulator>,
}

impl Connection {
    /// `sim` configures the in-process simulator; its family follows `config`
    pub fn open(config: &GmlanConfig, sim: Option<&SimConfig>, sink: SharedSink) -> Result<Self> {
        let (transport, simulator): (Box<dyn FrameTransport>, _) = match &config.transport {
            TransportConfig::Sim => {
                let (tester, ecu_side) = VirtualBus::new().endpoints();
                let mut sim_config = sim.cloned().unwrap_or_default();
                sim_config.family = config.ecu;
                let ecu = SimulatedEcu::from_config(&sim_config)
                    .context("Failed to build simulated ECU")?;
                // The simulator answers on whatever IDs the tester was configured with
                let settings = IsoTpSettings {
                    rx_separation_time: ecu.settings().rx_separation_time,
                    ..config
                        .isotp_settings()
                        .context("Invalid segmentation settings")?
                        .reversed()
                };
                debug!(family = %config.ecu, "Starting in-process ECU simulator");
                let simulator = EcuSimulator::spawn_with_settings(Arc::new(ecu), ecu_side, settings);
                (Box::new(tester) as Box<dyn FrameTransport>, Some(simulator))
            }
            other => (
                open_transport(other).context("Failed to open CAN transport")?,
                None,
            ),
        };

        let session = session_from_config(transport, config, sink)
            .context("Failed to open diagnostic session")?;
        Ok(Self {
            session,
            family: config.ecu,
            simulator,
        })
    }

    pub fn is_simulated(&self) -> bool {
        self.simulator.is_some()
    }
}
