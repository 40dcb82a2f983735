//! Common types and traits for site device models.

use chrono::NaiveDateTime;
use rand::{Rng, rngs::StdRng};

/// Interval handed to a device: its wall-clock start and, for the battery,
/// the dispatch command (kW, + discharge / - charge).
pub struct DeviceContext {
    pub timestamp: NaiveDateTime,
    pub setpoint_kw: Option<f64>,
}

impl DeviceContext {
    /// Context for an uncontrolled device such as PV or load.
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            setpoint_kw: None,
        }
    }

    /// Context carrying a battery dispatch command.
    pub fn with_setpoint(timestamp: NaiveDateTime, setpoint_kw: f64) -> Self {
        Self {
            timestamp,
            setpoint_kw: Some(setpoint_kw),
        }
    }
}

/// A site asset that yields a power value per interval.
///
/// PV returns generation, load returns demand and the battery returns the
/// command it applied.
pub trait Device {
    /// Power for the interval starting at `context.timestamp` (kW).
    fn power_kw(&mut self, context: &DeviceContext) -> f64;

    /// Short label used in logs.
    fn device_type(&self) -> &'static str;
}

/// Zero-mean Gaussian sample with standard deviation `std_dev` (Box-Muller).
///
/// Non-positive `std_dev` yields exactly zero.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
