//! Schedule-based dispatch: charge in one clock window, discharge in another.

use crate::config::{ControlMode, TimeOfUseConfig};
use crate::devices::BatteryHealth;
use crate::devices::battery::ROUNDTRIP_EFFICIENCY;

use super::clock::ClockWindow;
use super::controller::{Controller, max_charge_to_ceiling_kw, max_discharge_to_floor_kw};
use super::types::DecisionContext;

/// Fixed-window time-of-use policy.
///
/// Discharge wins when both windows cover the same hour.
#[derive(Debug, Clone)]
pub struct TimeOfUse {
    max_power_kw: f64,
    capacity_mwh: f64,
    charge_window: ClockWindow,
    discharge_window: ClockWindow,
    soe_min: f64,
    soe_max: f64,
    efficiency: f64,
    health: BatteryHealth,
}

impl TimeOfUse {
    /// Generic cycle-life estimate; no DOD table applies to a fixed schedule.
    pub const ESTIMATED_CYCLES: f64 = 4000.0;

    /// Builds the policy.
    ///
    /// SoE bounds are clamped into `[0, 100]` with `soe_max >= soe_min`, and
    /// both windows are wrapped onto the 24-hour clock.
    pub fn new(max_power_kw: f64, capacity_mwh: f64, config: &TimeOfUseConfig) -> Self {
        let capacity_mwh = capacity_mwh.max(0.0);
        let soe_min = config.min_soe_pct.clamp(0.0, 100.0);
        let soe_max = config.max_soe_pct.clamp(0.0, 100.0).max(soe_min);
        Self {
            max_power_kw: max_power_kw.max(0.0),
            capacity_mwh,
            charge_window: config.charge_window.normalized(),
            discharge_window: config.discharge_window.normalized(),
            soe_min,
            soe_max,
            efficiency: ROUNDTRIP_EFFICIENCY,
            health: BatteryHealth::new(capacity_mwh, Self::ESTIMATED_CYCLES),
        }
    }

    pub fn charge_window(&self) -> ClockWindow {
        self.charge_window
    }

    pub fn discharge_window(&self) -> ClockWindow {
        self.discharge_window
    }
}

impl Controller for TimeOfUse {
    fn mode(&self) -> ControlMode {
        ControlMode::TimeOfUse
    }

    fn decide(&self, ctx: &DecisionContext) -> f64 {
        if self.capacity_mwh <= 0.0 || self.max_power_kw <= 0.0 {
            return 0.0;
        }

        if self.is_discharge_period(ctx.hour) && ctx.soe_pct > self.soe_min {
            let by_soe = max_discharge_to_floor_kw(
                ctx.soe_pct,
                self.soe_min,
                self.capacity_mwh,
                ctx.interval_hours,
                self.efficiency,
            );
            return self.max_power_kw.min(by_soe).max(0.0);
        }

        if self.is_priority_charge_period(ctx.hour) && ctx.soe_pct < self.soe_max {
            let by_soe = max_charge_to_ceiling_kw(
                ctx.soe_pct,
                self.soe_max,
                self.capacity_mwh,
                ctx.interval_hours,
            ) / self.efficiency;
            let charge = self.max_power_kw.min(by_soe);
            if charge > 0.0 {
                return -charge;
            }
        }

        0.0
    }

    fn is_priority_charge_period(&self, hour: f64) -> bool {
        self.charge_window.contains_hour(hour)
    }

    fn is_constrained_charge_period(&self, _hour: f64) -> bool {
        false
    }

    fn is_discharge_period(&self, hour: f64) -> bool {
        self.discharge_window.contains_hour(hour)
    }

    fn soe_min(&self) -> f64 {
        self.soe_min
    }

    fn soe_max(&self) -> f64 {
        self.soe_max
    }

    fn health(&self) -> &BatteryHealth {
        &self.health
    }

    fn health_mut(&mut self) -> &mut BatteryHealth {
        &mut self.health
    }
}
