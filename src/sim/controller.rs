//! Dispatch policy contract shared by every control strategy.

use crate::config::ControlMode;
use crate::devices::{BatteryHealth, HealthReport};

use super::types::DecisionContext;

/// A battery dispatch policy driven by the simulation engine.
///
/// `decide` is pure: it reads the context and returns a signed power
/// (positive=discharge, negative=charge, kW). All mutable state the policy
/// owns is its [`BatteryHealth`], updated through
/// [`Controller::update_soh_degradation`].
pub trait Controller {
    /// Which control mode this policy implements.
    fn mode(&self) -> ControlMode;

    /// Signed power decision for one interval.
    fn decide(&self, ctx: &DecisionContext) -> f64;

    /// Whether `hour` falls in a phase where charging is PV-first.
    fn is_priority_charge_period(&self, hour: f64) -> bool;

    /// Whether `hour` falls in a PV-first phase that also respects MD headroom.
    fn is_constrained_charge_period(&self, hour: f64) -> bool;

    /// Whether `hour` falls in the policy's main discharge window.
    fn is_discharge_period(&self, hour: f64) -> bool;

    fn soe_min(&self) -> f64;

    fn soe_max(&self) -> f64;

    /// SoE the policy aims to reach by the end of its charging phases.
    fn charge_target_soe(&self) -> f64 {
        self.soe_max()
    }

    /// Intervals before this hour are replayed to drain the battery after
    /// the primary pass. `None` disables the extension pass.
    fn extension_cutoff_hour(&self) -> Option<f64> {
        None
    }

    fn health(&self) -> &BatteryHealth;

    fn health_mut(&mut self) -> &mut BatteryHealth;

    /// Records energy discharged during one interval (MWh).
    fn update_soh_degradation(&mut self, energy_discharged_mwh: f64) {
        self.health_mut().record_discharge(energy_discharged_mwh);
    }

    fn battery_health_report(&self) -> HealthReport {
        self.health().report()
    }

    /// Whether `hour` is in any charging phase.
    fn is_charge_period(&self, hour: f64) -> bool {
        self.is_priority_charge_period(hour) || self.is_constrained_charge_period(hour)
    }
}

/// Upper bound on discharge power that lands the battery exactly at
/// `floor_pct` after one interval, with `efficiency` applied.
pub(crate) fn max_discharge_to_floor_kw(
    soe_pct: f64,
    floor_pct: f64,
    capacity_mwh: f64,
    interval_hours: f64,
    efficiency: f64,
) -> f64 {
    if interval_hours <= 0.0 {
        return 0.0;
    }
    (soe_pct - floor_pct).max(0.0) / 100.0 * capacity_mwh * 1000.0 / interval_hours * efficiency
}

/// Upper bound on charge power that reaches `ceiling_pct` after one interval,
/// before charge efficiency is applied.
pub(crate) fn max_charge_to_ceiling_kw(
    soe_pct: f64,
    ceiling_pct: f64,
    capacity_mwh: f64,
    interval_hours: f64,
) -> f64 {
    if interval_hours <= 0.0 {
        return 0.0;
    }
    (ceiling_pct - soe_pct).max(0.0) / 100.0 * capacity_mwh * 1000.0 / interval_hours
}
