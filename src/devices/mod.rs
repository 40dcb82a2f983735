//! Device models for the site: PV array, battery, and synthetic load.

/// Synthetic commercial load profile generator.
pub mod baseload;
/// Battery state of energy and health accounting.
pub mod battery;
/// Parametric solar photovoltaic generation model.
pub mod solar;
pub mod types;

// Re-export the main types for convenience
pub use baseload::BaseLoad;
pub use battery::{Battery, BatteryHealth, HealthReport};
pub use solar::SolarPv;
pub use types::Device;
pub use types::DeviceContext;
