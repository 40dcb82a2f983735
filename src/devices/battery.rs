use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::devices::types::{Device, DeviceContext};

/// Round-trip efficiency applied on both legs of a charge/discharge cycle.
pub const ROUNDTRIP_EFFICIENCY: f64 = 0.90;

/// Battery energy storage tracked as a state of energy (SoE) percentage.
///
/// # Power Flow Convention (Dispatch)
/// - Positive power: discharging into the site
/// - Negative power: charging from PV or grid
///
/// The setpoint is applied as given; SoE is then hard-clamped to
/// `[soe_min_pct, soe_max_pct]`. Dispatch policies are responsible for
/// keeping their requests inside the available energy.
#[derive(Debug, Clone)]
pub struct Battery {
    /// Rated capacity in MWh. Energy math always uses this value.
    pub capacity_mwh: f64,

    /// State of energy as a percentage of rated capacity.
    pub soe_pct: f64,

    pub soe_min_pct: f64,

    pub soe_max_pct: f64,

    /// Efficiency applied on charge and divided out on discharge.
    pub efficiency: f64,

    /// Duration of one timestep in hours.
    interval_hours: f64,
}

impl Battery {
    /// Creates a battery at `initial_soe_pct`, clamped into the operating band.
    ///
    /// # Arguments
    ///
    /// * `capacity_mwh` - Rated capacity in MWh (0 yields an inert battery)
    /// * `initial_soe_pct` - Starting state of energy (%)
    /// * `soe_min_pct` - Lower operating bound (%)
    /// * `soe_max_pct` - Upper operating bound (%)
    /// * `interval_hours` - Timestep length in hours
    pub fn new(
        capacity_mwh: f64,
        initial_soe_pct: f64,
        soe_min_pct: f64,
        soe_max_pct: f64,
        interval_hours: f64,
    ) -> Self {
        let soe_max_pct = soe_max_pct.max(soe_min_pct);
        Self {
            capacity_mwh: capacity_mwh.max(0.0),
            soe_pct: initial_soe_pct,
            soe_min_pct,
            soe_max_pct,
            efficiency: ROUNDTRIP_EFFICIENCY,
            interval_hours,
        }
    }

    /// SoE change in percentage points for `power_kw` held over one interval.
    ///
    /// Positive result for charging (negative power).
    pub fn soe_delta_pct(&self, power_kw: f64) -> f64 {
        if self.capacity_mwh <= 0.0 {
            return 0.0;
        }
        let energy_pct = power_kw.abs() * self.interval_hours / 1000.0 / self.capacity_mwh * 100.0;
        if power_kw < 0.0 {
            energy_pct * self.efficiency
        } else if power_kw > 0.0 {
            -energy_pct / self.efficiency
        } else {
            0.0
        }
    }

    /// Energy delivered by `power_kw` over one interval, in MWh.
    pub fn interval_energy_mwh(&self, power_kw: f64) -> f64 {
        power_kw.abs() * self.interval_hours / 1000.0
    }

    /// Stored energy above `soe_pct_floor`, in kWh.
    pub fn energy_above_kwh(&self, soe_pct: f64, soe_pct_floor: f64) -> f64 {
        (soe_pct - soe_pct_floor).max(0.0) / 100.0 * self.capacity_mwh * 1000.0
    }

    pub fn interval_hours(&self) -> f64 {
        self.interval_hours
    }
}

impl Device for Battery {
    /// Applies the signed dispatch setpoint and returns it unchanged.
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        let setpoint_kw = context.setpoint_kw.unwrap_or(0.0);
        let before = self.soe_pct;
        self.soe_pct = (self.soe_pct + self.soe_delta_pct(setpoint_kw))
            .clamp(self.soe_min_pct, self.soe_max_pct);
        trace!(
            at = %context.timestamp,
            setpoint_kw,
            soe_before = before,
            soe_after = self.soe_pct,
            "battery step"
        );
        setpoint_kw
    }

    fn device_type(&self) -> &'static str {
        "Battery"
    }
}

/// Cycle and state-of-health accounting for one battery over one run.
///
/// Health is reporting-only: `actual_capacity_mwh` shrinks with SoH, but
/// dispatch and SoE physics keep using the rated capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryHealth {
    rated_capacity_mwh: f64,
    current_soh: f64,
    actual_capacity_mwh: f64,
    total_cycles: f64,
    total_throughput_mwh: f64,
    estimated_cycles: f64,
}

impl BatteryHealth {
    /// SoH lost per equivalent full cycle, in percentage points.
    pub const DEGRADATION_PER_CYCLE: f64 = 0.0025;
    /// SoH never drops below this floor.
    pub const SOH_FLOOR: f64 = 80.0;

    pub fn new(rated_capacity_mwh: f64, estimated_cycles: f64) -> Self {
        let rated_capacity_mwh = rated_capacity_mwh.max(0.0);
        Self {
            rated_capacity_mwh,
            current_soh: 100.0,
            actual_capacity_mwh: rated_capacity_mwh,
            total_cycles: 0.0,
            total_throughput_mwh: 0.0,
            estimated_cycles,
        }
    }

    /// Records discharged energy and applies linear fade.
    ///
    /// Non-positive energy and zero-capacity batteries are ignored.
    pub fn record_discharge(&mut self, energy_mwh: f64) {
        if energy_mwh <= 0.0 || self.rated_capacity_mwh <= 0.0 {
            return;
        }
        let equivalent_cycle = energy_mwh / self.rated_capacity_mwh;
        self.total_cycles += equivalent_cycle;
        self.total_throughput_mwh += energy_mwh;
        self.current_soh = (self.current_soh - equivalent_cycle * Self::DEGRADATION_PER_CYCLE)
            .max(Self::SOH_FLOOR);
        self.actual_capacity_mwh = self.rated_capacity_mwh * self.current_soh / 100.0;
    }

    pub fn current_soh(&self) -> f64 {
        self.current_soh
    }

    pub fn report(&self) -> HealthReport {
        let remaining_cycles = (self.estimated_cycles - self.total_cycles).max(0.0);
        HealthReport {
            current_soh: self.current_soh,
            actual_capacity_mwh: self.actual_capacity_mwh,
            total_cycles: self.total_cycles,
            total_throughput_mwh: self.total_throughput_mwh,
            remaining_cycles,
            remaining_years: remaining_cycles / 365.0,
            capacity_fade: 100.0 - self.current_soh,
            estimated_cycles: self.estimated_cycles,
        }
    }
}

/// Snapshot of battery health at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub current_soh: f64,
    pub actual_capacity_mwh: f64,
    pub total_cycles: f64,
    pub total_throughput_mwh: f64,
    pub remaining_cycles: f64,
    pub remaining_years: f64,
    pub capacity_fade: f64,
    pub estimated_cycles: f64,
}
