//! Adaptive peak shaving with PV-first charging and post-peak extended discharge.
//!
//! The day is split into phases derived from the configured peak window:
//!
//! | phase               | window                              | default       |
//! |---------------------|-------------------------------------|---------------|
//! | priority charge     | `[charge_start, priority_end)`      | 06:00–14:00   |
//! | constrained charge  | `[priority_end, charge_end)`        | 14:00–17:00   |
//! | pre-peak standby    | `[charge_end, peak_start)`          | 17:00–18:00   |
//! | peak shaving        | `[peak_start, peak_end)`            | 18:00–22:00   |
//! | extended discharge  | everything else                     | 22:00–06:00   |
//!
//! The peak window takes precedence when derived windows overlap it.

use crate::config::ControlMode;
use crate::devices::BatteryHealth;
use crate::devices::battery::ROUNDTRIP_EFFICIENCY;

use super::clock::{ClockWindow, hours_until, wrap_hour};
use super::controller::{Controller, max_charge_to_ceiling_kw, max_discharge_to_floor_kw};
use super::types::DecisionContext;

/// Phase of the time-of-control day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PriorityCharge,
    ConstrainedCharge,
    Standby,
    PeakShaving,
    ExtendedDischarge,
}

/// Adaptive peak-shaving policy.
#[derive(Debug, Clone)]
pub struct TimeOfControl {
    target_md_kw: f64,
    max_power_kw: f64,
    /// Rated capacity; energy budgets never use the SoH-faded value.
    capacity_mwh: f64,
    peak: ClockWindow,
    charge_start_hour: f64,
    priority_end_hour: f64,
    charge_end_hour: f64,
    health: BatteryHealth,
}

impl TimeOfControl {
    pub const SOE_MAX: f64 = 90.0;
    pub const SOE_MIN: f64 = 15.0;
    /// SoE to reach before the peak window opens.
    pub const TARGET_SOE_BEFORE_PEAK: f64 = 88.0;
    /// Floor for the extended discharge after the peak.
    pub const EXTENDED_TARGET_SOE: f64 = 15.0;
    /// Reserve kept above the extended target during the peak window.
    pub const SAFETY_MARGIN: f64 = 3.0;
    /// Minimum PV output before charging starts (kW).
    pub const MIN_PV_FOR_CHARGE_KW: f64 = 50.0;
    /// MD headroom at or below which constrained charging pauses (kW).
    pub const MIN_MD_HEADROOM_KW: f64 = 100.0;

    /// Hours between the end of charging and the peak window.
    const STANDBY_HOURS: f64 = 1.0;
    const CONSTRAINED_HOURS: f64 = 3.0;
    const PRIORITY_HOURS: f64 = 8.0;

    /// Builds the policy for a peak window.
    ///
    /// # Arguments
    ///
    /// * `target_md_kw` - Grid-side demand the peak window holds to
    /// * `max_power_kw` - Charge/discharge power limit
    /// * `capacity_mwh` - Rated battery capacity
    /// * `peak` - Core peak-shaving window (validated `end > start`)
    pub fn new(target_md_kw: f64, max_power_kw: f64, capacity_mwh: f64, peak: ClockWindow) -> Self {
        let charge_end_hour = wrap_hour(peak.start_hour - Self::STANDBY_HOURS);
        let priority_end_hour = wrap_hour(charge_end_hour - Self::CONSTRAINED_HOURS);
        let charge_start_hour = wrap_hour(priority_end_hour - Self::PRIORITY_HOURS);
        let capacity_mwh = capacity_mwh.max(0.0);

        Self {
            target_md_kw,
            max_power_kw: max_power_kw.max(0.0),
            capacity_mwh,
            peak,
            charge_start_hour,
            priority_end_hour,
            charge_end_hour,
            health: BatteryHealth::new(capacity_mwh, Self::estimated_cycles()),
        }
    }

    /// Fraction of capacity cycled between the pre-peak target and the peak reserve.
    pub fn effective_dod() -> f64 {
        (Self::TARGET_SOE_BEFORE_PEAK - (Self::EXTENDED_TARGET_SOE + Self::SAFETY_MARGIN)) / 100.0
    }

    /// Cycle life from the DOD/cycle table.
    pub fn estimated_cycles() -> f64 {
        match Self::effective_dod() {
            d if d <= 0.50 => 6000.0,
            d if d <= 0.65 => 4000.0,
            d if d <= 0.75 => 3000.0,
            d if d <= 0.80 => 2500.0,
            _ => 1200.0,
        }
    }

    pub fn charge_start_hour(&self) -> f64 {
        self.charge_start_hour
    }

    pub fn priority_end_hour(&self) -> f64 {
        self.priority_end_hour
    }

    pub fn charge_end_hour(&self) -> f64 {
        self.charge_end_hour
    }

    pub fn phase(&self, hour: f64) -> Phase {
        if self.peak.contains_hour(hour) {
            Phase::PeakShaving
        } else if ClockWindow::new(self.charge_start_hour, self.priority_end_hour).contains_hour(hour)
        {
            Phase::PriorityCharge
        } else if ClockWindow::new(self.priority_end_hour, self.charge_end_hour).contains_hour(hour)
        {
            Phase::ConstrainedCharge
        } else if ClockWindow::new(self.charge_end_hour, self.peak.start_hour).contains_hour(hour) {
            Phase::Standby
        } else {
            Phase::ExtendedDischarge
        }
    }

    fn is_inert(&self) -> bool {
        self.max_power_kw <= 0.0 || self.capacity_mwh <= 0.0
    }

    /// Average power needed to reach the pre-peak target by `charge_end`.
    fn required_charge_kw(&self, ctx: &DecisionContext) -> Option<f64> {
        let remaining_hours = hours_until(ctx.hour, self.charge_end_hour);
        if remaining_hours <= 0.0 {
            return None;
        }
        let deficit_mwh =
            (Self::TARGET_SOE_BEFORE_PEAK - ctx.soe_pct) / 100.0 * self.capacity_mwh;
        Some(deficit_mwh / remaining_hours * 1000.0)
    }

    fn charge_ceiling_kw(&self, ctx: &DecisionContext) -> f64 {
        max_charge_to_ceiling_kw(
            ctx.soe_pct,
            Self::SOE_MAX,
            self.capacity_mwh,
            ctx.interval_hours,
        )
    }

    fn priority_charge_kw(&self, ctx: &DecisionContext) -> f64 {
        if ctx.soe_pct >= Self::TARGET_SOE_BEFORE_PEAK
            || ctx.pv_power_kw < Self::MIN_PV_FOR_CHARGE_KW
        {
            return 0.0;
        }
        let Some(required_kw) = self.required_charge_kw(ctx) else {
            return 0.0;
        };
        (ctx.pv_power_kw * 0.95)
            .min(self.max_power_kw)
            .min(required_kw * 1.5)
            .min(self.charge_ceiling_kw(ctx))
    }

    fn constrained_charge_kw(&self, ctx: &DecisionContext) -> f64 {
        if ctx.soe_pct >= Self::TARGET_SOE_BEFORE_PEAK
            || ctx.pv_power_kw < Self::MIN_PV_FOR_CHARGE_KW
        {
            return 0.0;
        }
        let headroom_kw = (self.target_md_kw - ctx.md30_kw).max(0.0);
        if headroom_kw <= Self::MIN_MD_HEADROOM_KW {
            return 0.0;
        }
        let Some(required_kw) = self.required_charge_kw(ctx) else {
            return 0.0;
        };
        (ctx.pv_power_kw * 0.9)
            .min(self.max_power_kw)
            .min(required_kw * 1.3)
            .min(headroom_kw * 0.8)
            .min(self.charge_ceiling_kw(ctx))
    }

    fn peak_discharge_kw(&self, ctx: &DecisionContext) -> f64 {
        let reserve = Self::EXTENDED_TARGET_SOE + Self::SAFETY_MARGIN;
        if ctx.soe_pct <= reserve {
            return 0.0;
        }
        let remaining_hours = hours_until(ctx.hour, self.peak.end_hour);
        if remaining_hours <= 0.0 {
            return 0.0;
        }
        let available_mwh = (ctx.soe_pct - reserve) / 100.0 * self.capacity_mwh;
        let required_kw = available_mwh / remaining_hours * 1000.0;
        let excess_kw = (ctx.md30_kw - self.target_md_kw).max(0.0);
        if excess_kw <= 0.0 {
            return 0.0;
        }
        excess_kw.min(self.max_power_kw).min(required_kw * 1.2)
    }

    fn extended_discharge_kw(&self, ctx: &DecisionContext) -> f64 {
        if ctx.soe_pct <= Self::EXTENDED_TARGET_SOE {
            return 0.0;
        }
        self.max_power_kw.min(max_discharge_to_floor_kw(
            ctx.soe_pct,
            Self::EXTENDED_TARGET_SOE,
            self.capacity_mwh,
            ctx.interval_hours,
            ROUNDTRIP_EFFICIENCY,
        ))
    }
}

impl Controller for TimeOfControl {
    fn mode(&self) -> ControlMode {
        ControlMode::TimeOfControl
    }

    fn decide(&self, ctx: &DecisionContext) -> f64 {
        if self.is_inert() {
            return 0.0;
        }
        let power = match self.phase(ctx.hour) {
            Phase::PriorityCharge => -self.priority_charge_kw(ctx),
            Phase::ConstrainedCharge => -self.constrained_charge_kw(ctx),
            Phase::Standby => 0.0,
            Phase::PeakShaving => self.peak_discharge_kw(ctx),
            Phase::ExtendedDischarge => self.extended_discharge_kw(ctx),
        };
        // collapse -0.0 from the charge branches
        if power == 0.0 { 0.0 } else { power }
    }

    fn is_priority_charge_period(&self, hour: f64) -> bool {
        self.phase(hour) == Phase::PriorityCharge
    }

    fn is_constrained_charge_period(&self, hour: f64) -> bool {
        self.phase(hour) == Phase::ConstrainedCharge
    }

    fn is_discharge_period(&self, hour: f64) -> bool {
        self.phase(hour) == Phase::PeakShaving
    }

    fn soe_min(&self) -> f64 {
        Self::SOE_MIN
    }

    fn soe_max(&self) -> f64 {
        Self::SOE_MAX
    }

    fn charge_target_soe(&self) -> f64 {
        Self::TARGET_SOE_BEFORE_PEAK
    }

    fn extension_cutoff_hour(&self) -> Option<f64> {
        Some(self.charge_start_hour)
    }

    fn health(&self) -> &BatteryHealth {
        &self.health
    }

    fn health_mut(&mut self) -> &mut BatteryHealth {
        &mut self.health
    }
}
