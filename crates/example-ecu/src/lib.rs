//! example-ecu - GMLAN ECU Simulator Library
//!
//! Provides an in-process GMLAN module for exercising the `gmlan` stack
//! without hardware.
//!
//! # Modules
//!
//! - [`bus`] - Virtual CAN bus with two [`gmlan::FrameTransport`] endpoints
//! - [`config`] - Simulator configuration (identifiers, security, faults)
//! - [`firmware`] - Synthetic firmware images with valid checksum metadata
//! - [`simulator`] - Request handling and the serving thread

pub mod bus;
pub mod config;
pub mod firmware;
mod responses;
pub mod simulator;

pub use bus::{VirtualBus, VirtualEndpoint};
pub use config::{FaultConfig, SimConfig};
pub use firmware::synthetic_image;
pub use simulator::{EcuSimulator, Reply, SimulatedEcu};
