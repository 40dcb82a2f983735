//! Grid-connected PV + battery site simulator.
//!
//! Replays a metered load series against a parametric PV profile and a
//! battery dispatch policy, then derives maximum-demand reductions, savings,
//! ROI, inverter clipping and battery health from the resulting trace.

pub mod config;
pub mod devices;
pub mod error;
/// Load ingestion, trace export and output persistence.
pub mod io;
pub mod runner;
/// Simulation engine, dispatch policies, analysis and recommendations.
pub mod sim;

pub use config::SiteConfig;
pub use error::{Error, Result};
pub use runner::{SimulationOutput, run_simulation};
