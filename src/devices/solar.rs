use chrono::{Datelike, NaiveDateTime};

use crate::config::PvSystemConfig;
use crate::devices::types::{Device, DeviceContext};
use crate::sim::clock::decimal_hour;

/// Decimal hour at which generation starts.
pub const SUNRISE_HOUR: f64 = 6.5;
/// Decimal hour at which generation stops (exclusive).
pub const SUNSET_HOUR: f64 = 19.0;

/// A deterministic parametric PV array.
///
/// Output follows a single sine hump between sunrise and sunset, scaled by a
/// seasonal factor peaking around day 172, by nameplate capacity, and by
/// `(1 - system_loss_frac)`, then clipped to the inverter limit.
///
/// # Power Flow Convention (Site)
/// Returns **positive** generation in kW, zero at night.
///
/// # Examples
///
/// ```
/// use bess_sim::devices::solar::SolarPv;
/// use chrono::NaiveDate;
///
/// let pv = SolarPv::new(1000.0, 0.0, Some(600.0));
/// let noon = NaiveDate::from_ymd_opt(2025, 6, 21)
///     .and_then(|d| d.and_hms_opt(12, 45, 0))
///     .expect("valid time");
/// assert_eq!(pv.output_kw(noon), 600.0);
/// assert!(pv.theoretical_kw(noon) > 1000.0);
/// ```
#[derive(Debug, Clone)]
pub struct SolarPv {
    /// Nameplate DC capacity in kWp.
    pub capacity_kwp: f64,

    /// System losses as a fraction.
    pub system_loss_frac: f64,

    /// AC inverter limit in kW.
    pub inverter_limit_kw: f64,
}

impl SolarPv {
    /// Creates a PV array.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwp` - Nameplate capacity (negative values clamp to 0)
    /// * `system_loss_frac` - Fractional system losses
    /// * `inverter_limit_kw` - Inverter limit; `None` means nameplate
    pub fn new(capacity_kwp: f64, system_loss_frac: f64, inverter_limit_kw: Option<f64>) -> Self {
        let capacity_kwp = capacity_kwp.max(0.0);
        Self {
            capacity_kwp,
            system_loss_frac,
            inverter_limit_kw: inverter_limit_kw.unwrap_or(capacity_kwp).max(0.0),
        }
    }

    pub fn from_config(config: &PvSystemConfig) -> Self {
        Self::new(
            config.capacity_kwp,
            config.system_loss_frac,
            Some(config.inverter_limit_kw()),
        )
    }

    /// Unclipped output at `at`, in kW.
    pub fn theoretical_kw(&self, at: NaiveDateTime) -> f64 {
        let hour = decimal_hour(at);
        if !(SUNRISE_HOUR..SUNSET_HOUR).contains(&hour) {
            return 0.0;
        }
        let solar_fraction = (hour - SUNRISE_HOUR) / (SUNSET_HOUR - SUNRISE_HOUR);
        let elevation = (solar_fraction * std::f64::consts::PI).sin();
        let day_of_year = f64::from(at.ordinal()) + hour / 24.0;
        let seasonal =
            1.0 + 0.15 * (2.0 * std::f64::consts::PI * (day_of_year - 172.0) / 365.0).cos();
        self.capacity_kwp * elevation * seasonal * (1.0 - self.system_loss_frac)
    }

    /// Inverter-clipped output at `at`, floored at 0.
    pub fn output_kw(&self, at: NaiveDateTime) -> f64 {
        self.theoretical_kw(at).min(self.inverter_limit_kw).max(0.0)
    }

    /// Polls the array once per timestamp, aligned one-to-one with `timestamps`.
    pub fn profile(&mut self, timestamps: &[NaiveDateTime]) -> Vec<f64> {
        timestamps
            .iter()
            .map(|&at| self.power_kw(&DeviceContext::new(at)))
            .collect()
    }
}

impl Device for SolarPv {
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        self.output_kw(context.timestamp)
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}
