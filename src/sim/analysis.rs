//! Post-hoc MD, savings, clipping and ROI analysis of a finished run.

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::{ControlMode, SiteConfig};
use crate::devices::{HealthReport, SolarPv};
use crate::io::non_finite;

use super::clock::{ClockWindow, decimal_hour};
use super::controller::Controller;
use super::time_of_use::TimeOfUse;
use super::types::{ExtensionReport, LeftoverEvent, SimulationTrace, TraceRecord};

/// First hour (inclusive) of the peak-rate billing window.
pub const BILLING_START_HOUR: u32 = 14;
/// Last hour (exclusive) of the peak-rate billing window.
pub const BILLING_END_HOUR: u32 = 22;
/// Days per billing month used to project daily figures.
pub const DAYS_PER_MONTH: f64 = 30.0;
/// Theoretical output at or above this share of the inverter limit counts as clipping.
pub const CLIPPING_THRESHOLD: f64 = 0.99;

fn is_weekday(at: NaiveDateTime) -> bool {
    at.weekday().num_days_from_monday() < 5
}

/// Weekday samples whose clock hour falls in `[14, 22)`.
pub fn in_billing_window(at: NaiveDateTime) -> bool {
    is_weekday(at) && (BILLING_START_HOUR..BILLING_END_HOUR).contains(&at.hour())
}

/// Monthly savings by source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsBreakdown {
    pub md_savings: f64,
    pub peak_discharge_savings: f64,
    pub offpeak_discharge_savings: f64,
    pub pv_self_consumption_savings: f64,
}

/// Energy attribution over the whole trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyMetrics {
    /// Discharge inside the configured peak window on weekdays.
    pub core_peak_discharge_mwh: f64,
    pub total_discharge_kwh: f64,
    /// Discharge inside the peak-rate billing window.
    pub peak_rate_discharge_kwh: f64,
    /// Discharge outside the peak-rate billing window.
    pub offpeak_discharge_kwh: f64,
    pub pv_self_consumption_kwh: f64,
    pub simulation_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingVerdict {
    Undersized,
    Optimal,
    Oversized,
}

/// Inverter-to-nameplate ratio and its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterSizing {
    pub ratio_pct: f64,
    pub verdict: SizingVerdict,
}

impl InverterSizing {
    /// `None` when the array has no nameplate capacity.
    pub fn classify(inverter_kw: f64, nameplate_kwp: f64) -> Option<Self> {
        if nameplate_kwp <= 0.0 {
            return None;
        }
        let ratio_pct = inverter_kw / nameplate_kwp * 100.0;
        let verdict = if ratio_pct < 100.0 {
            SizingVerdict::Undersized
        } else if ratio_pct > 130.0 {
            SizingVerdict::Oversized
        } else {
            SizingVerdict::Optimal
        };
        Some(Self { ratio_pct, verdict })
    }
}

/// PV energy lost to the inverter limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterClipping {
    pub hours: f64,
    pub percentage: f64,
    pub capacity_kw: f64,
    pub energy_lost_kwh: f64,
    pub sizing: Option<InverterSizing>,
}

/// Leftover-energy statistics for the time-of-use schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfUseReport {
    pub charge_window: ClockWindow,
    pub discharge_window: ClockWindow,
    pub min_soe_target: f64,
    pub max_soe_limit: f64,
    pub leftover_events: Vec<LeftoverEvent>,
    pub last_leftover: Option<LeftoverEvent>,
    pub max_excess_pct: f64,
    pub avg_excess_pct: f64,
    pub final_excess_pct: f64,
    pub final_excess_energy_kwh: f64,
    pub battery_capacity_mwh: f64,
}

impl TimeOfUseReport {
    fn from_trace(trace: &SimulationTrace, config: &SiteConfig) -> Self {
        let ems = &config.ems;
        let policy = TimeOfUse::new(
            ems.max_discharge_kw,
            ems.battery_capacity_mwh,
            &ems.time_of_use,
        );
        let events = &trace.leftover_events;
        let max_excess_pct = events
            .iter()
            .map(|e| e.excess_above_min_pct)
            .fold(0.0_f64, f64::max);
        let avg_excess_pct = if events.is_empty() {
            0.0
        } else {
            events.iter().map(|e| e.excess_above_min_pct).sum::<f64>() / events.len() as f64
        };
        let final_excess_pct = (trace.final_soe_pct - policy.soe_min()).max(0.0);

        Self {
            charge_window: policy.charge_window(),
            discharge_window: policy.discharge_window(),
            min_soe_target: policy.soe_min(),
            max_soe_limit: policy.soe_max(),
            leftover_events: events.clone(),
            last_leftover: events.last().cloned(),
            max_excess_pct,
            avg_excess_pct,
            final_excess_pct,
            final_excess_energy_kwh: final_excess_pct / 100.0 * ems.battery_capacity_mwh * 1000.0,
            battery_capacity_mwh: ems.battery_capacity_mwh,
        }
    }
}

/// Policy-specific block of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PolicyReport {
    TimeOfUse(TimeOfUseReport),
    TimeOfControl { extension: Option<ExtensionReport> },
}

/// Financial and technical summary of one simulation run.
///
/// Computed post-hoc from the full trace (primary plus extension records),
/// never from running state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub control_mode: ControlMode,
    pub md_no_pv_no_ems: f64,
    pub md_with_pv_no_ems: f64,
    pub md_with_pv_with_ems: f64,
    pub pv_contribution: f64,
    pub ems_contribution: f64,
    pub total_reduction: f64,
    /// Whether the MD maxima came from the billing window or the whole trace.
    pub billing_window_applied: bool,
    /// Monthly savings counted towards ROI.
    pub monthly_savings: f64,
    pub annual_savings: f64,
    /// Monthly savings including PV self-consumption regardless of ROI scope.
    pub monthly_total_savings: f64,
    pub annual_total_savings: f64,
    pub capex: f64,
    #[serde(with = "non_finite")]
    pub payback_years: f64,
    #[serde(with = "non_finite")]
    pub roi_5yr: f64,
    #[serde(with = "non_finite")]
    pub roi_10yr: f64,
    pub equivalent_cycles: f64,
    pub final_soh: f64,
    pub savings_breakdown: SavingsBreakdown,
    pub energy_metrics: EnergyMetrics,
    pub inverter_clipping: InverterClipping,
    pub battery_health: HealthReport,
    pub include_pv_savings: bool,
    pub policy: PolicyReport,
}

/// Running maxima of the three MD series.
#[derive(Debug, Clone, Copy)]
struct MdMax {
    no_pv: f64,
    with_pv: f64,
    with_ems: f64,
}

impl MdMax {
    fn over<'a>(records: impl Iterator<Item = &'a TraceRecord>) -> Option<Self> {
        records.fold(None, |acc: Option<Self>, r| {
            let next = match acc {
                None => Self {
                    no_pv: r.md30_baseline_kw,
                    with_pv: r.md30_pv_only_kw,
                    with_ems: r.md30_final_kw,
                },
                Some(m) => Self {
                    no_pv: m.no_pv.max(r.md30_baseline_kw),
                    with_pv: m.with_pv.max(r.md30_pv_only_kw),
                    with_ems: m.with_ems.max(r.md30_final_kw),
                },
            };
            Some(next)
        })
    }
}

/// Years-to-recover and N-year ROI with infinite sentinels for non-positive savings.
fn payback_and_roi(capex: f64, annual_savings: f64) -> (f64, f64, f64) {
    if annual_savings <= 0.0 {
        return (f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    }
    if capex <= 0.0 {
        return (0.0, f64::INFINITY, f64::INFINITY);
    }
    let roi = |years: f64| (annual_savings * years - capex) / capex * 100.0;
    (capex / annual_savings, roi(5.0), roi(10.0))
}

impl AnalysisResult {
    /// Derives every reported figure from a completed trace.
    ///
    /// # Arguments
    ///
    /// * `trace` - Completed simulation trace
    /// * `config` - Configuration the trace was produced with
    ///
    /// # Returns
    ///
    /// An `AnalysisResult` with all fields populated. An empty trace yields
    /// zero MD values and the non-positive-savings sentinels.
    pub fn from_trace(trace: &SimulationTrace, config: &SiteConfig) -> Self {
        let financial = &config.financial;
        let dt_hours = trace.interval_hours();

        let billed = MdMax::over(trace.all_records().filter(|r| in_billing_window(r.timestamp)));
        let billing_window_applied = billed.is_some();
        let md = billed
            .or_else(|| MdMax::over(trace.all_records()))
            .unwrap_or(MdMax {
                no_pv: 0.0,
                with_pv: 0.0,
                with_ems: 0.0,
            });

        let pv_contribution = md.no_pv - md.with_pv;
        let ems_contribution = md.with_pv - md.with_ems;
        let total_reduction = md.no_pv - md.with_ems;

        let energy_metrics = energy_metrics(trace, config.ems.peak_window, dt_hours);
        let days = energy_metrics.simulation_days as f64;
        let monthly = |kwh: f64, rate: f64| kwh / days * rate * DAYS_PER_MONTH;

        let savings_breakdown = SavingsBreakdown {
            md_savings: total_reduction * financial.md_charge_rate,
            peak_discharge_savings: monthly(
                energy_metrics.peak_rate_discharge_kwh,
                financial.peak_energy_rate,
            ),
            offpeak_discharge_savings: monthly(
                energy_metrics.offpeak_discharge_kwh,
                financial.offpeak_energy_rate,
            ),
            pv_self_consumption_savings: monthly(
                energy_metrics.pv_self_consumption_kwh,
                financial.peak_energy_rate,
            ),
        };

        let bess_monthly = savings_breakdown.md_savings
            + savings_breakdown.peak_discharge_savings
            + savings_breakdown.offpeak_discharge_savings;
        let monthly_total_savings = bess_monthly + savings_breakdown.pv_self_consumption_savings;
        let monthly_savings = if financial.include_pv_savings {
            monthly_total_savings
        } else {
            bess_monthly
        };
        let annual_savings = monthly_savings * 12.0;
        let (payback_years, roi_5yr, roi_10yr) = payback_and_roi(financial.capex, annual_savings);

        let policy = match trace.control_mode {
            ControlMode::TimeOfUse => {
                PolicyReport::TimeOfUse(TimeOfUseReport::from_trace(trace, config))
            }
            ControlMode::TimeOfControl => PolicyReport::TimeOfControl {
                extension: trace.extension.clone(),
            },
        };

        Self {
            control_mode: trace.control_mode,
            md_no_pv_no_ems: md.no_pv,
            md_with_pv_no_ems: md.with_pv,
            md_with_pv_with_ems: md.with_ems,
            pv_contribution,
            ems_contribution,
            total_reduction,
            billing_window_applied,
            monthly_savings,
            annual_savings,
            monthly_total_savings,
            annual_total_savings: monthly_total_savings * 12.0,
            capex: financial.capex,
            payback_years,
            roi_5yr,
            roi_10yr,
            equivalent_cycles: trace.health.total_cycles,
            final_soh: trace.health.current_soh,
            savings_breakdown,
            energy_metrics,
            inverter_clipping: inverter_clipping(trace, config, dt_hours),
            battery_health: trace.health.clone(),
            include_pv_savings: financial.include_pv_savings,
            policy,
        }
    }
}

fn energy_metrics(trace: &SimulationTrace, peak: ClockWindow, dt_hours: f64) -> EnergyMetrics {
    let mut total_kwh = 0.0;
    let mut peak_rate_kwh = 0.0;
    let mut core_peak_kwh = 0.0;
    let mut pv_self_kwh = 0.0;
    let mut first: Option<NaiveDateTime> = None;
    let mut last: Option<NaiveDateTime> = None;

    for r in trace.all_records() {
        first = Some(first.map_or(r.timestamp, |t| t.min(r.timestamp)));
        last = Some(last.map_or(r.timestamp, |t| t.max(r.timestamp)));
        pv_self_kwh += r.pv_to_load_kw * dt_hours;

        let discharge_kwh = r.discharge_only_kw() * dt_hours;
        if discharge_kwh <= 0.0 {
            continue;
        }
        total_kwh += discharge_kwh;
        if in_billing_window(r.timestamp) {
            peak_rate_kwh += discharge_kwh;
        }
        if is_weekday(r.timestamp) && peak.contains_hour(decimal_hour(r.timestamp)) {
            core_peak_kwh += discharge_kwh;
        }
    }

    let simulation_days = match (first, last) {
        (Some(a), Some(b)) => (b - a).num_days() + 1,
        _ => 1,
    };

    EnergyMetrics {
        core_peak_discharge_mwh: core_peak_kwh / 1000.0,
        total_discharge_kwh: total_kwh,
        peak_rate_discharge_kwh: peak_rate_kwh,
        offpeak_discharge_kwh: total_kwh - peak_rate_kwh,
        pv_self_consumption_kwh: pv_self_kwh,
        simulation_days,
    }
}

fn inverter_clipping(trace: &SimulationTrace, config: &SiteConfig, dt_hours: f64) -> InverterClipping {
    let pv = SolarPv::from_config(&config.pv_system);
    let threshold_kw = pv.inverter_limit_kw * CLIPPING_THRESHOLD;

    let mut clipped = 0_usize;
    let mut energy_lost_kwh = 0.0;
    for r in trace.all_records() {
        let theoretical_kw = pv.theoretical_kw(r.timestamp);
        if theoretical_kw >= threshold_kw && theoretical_kw > r.pv_power_kw {
            clipped += 1;
            energy_lost_kwh += (theoretical_kw - r.pv_power_kw) * dt_hours;
        }
    }

    let total = trace.len();
    InverterClipping {
        hours: clipped as f64 * dt_hours,
        percentage: if total > 0 {
            clipped as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        capacity_kw: pv.inverter_limit_kw,
        energy_lost_kwh,
        sizing: InverterSizing::classify(pv.inverter_limit_kw, pv.capacity_kwp),
    }
}

fn fmt_sentinel(value: f64, unit: &str) -> String {
    if value.is_finite() {
        format!("{value:.2}{unit}")
    } else if value > 0.0 {
        "never".to_string()
    } else {
        "n/a".to_string()
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Analysis ({}) ---", self.control_mode)?;
        writeln!(f, "MD no PV, no EMS:      {:.1} kW", self.md_no_pv_no_ems)?;
        writeln!(f, "MD with PV, no EMS:    {:.1} kW", self.md_with_pv_no_ems)?;
        writeln!(f, "MD with PV and EMS:    {:.1} kW", self.md_with_pv_with_ems)?;
        writeln!(
            f,
            "MD reduction:          {:.1} kW (PV {:.1}, EMS {:.1})",
            self.total_reduction, self.pv_contribution, self.ems_contribution
        )?;
        writeln!(f, "Monthly savings:       {:.2}", self.monthly_savings)?;
        writeln!(f, "Annual savings:        {:.2}", self.annual_savings)?;
        if !self.include_pv_savings {
            writeln!(f, "Annual incl. PV:       {:.2}", self.annual_total_savings)?;
        }
        writeln!(f, "Payback:               {}", fmt_sentinel(self.payback_years, " years"))?;
        writeln!(
            f,
            "ROI 5 yr / 10 yr:      {} / {}",
            fmt_sentinel(self.roi_5yr, "%"),
            fmt_sentinel(self.roi_10yr, "%")
        )?;
        writeln!(
            f,
            "Discharge:             {:.1} kWh over {} day(s), {:.3} MWh in core peak",
            self.energy_metrics.total_discharge_kwh,
            self.energy_metrics.simulation_days,
            self.energy_metrics.core_peak_discharge_mwh
        )?;
        writeln!(
            f,
            "Inverter clipping:     {:.1} h ({:.2}%), ~{:.0} kWh lost",
            self.inverter_clipping.hours,
            self.inverter_clipping.percentage,
            self.inverter_clipping.energy_lost_kwh
        )?;
        write!(
            f,
            "Battery:               {:.2} cycles, SoH {:.3}%",
            self.equivalent_cycles, self.final_soh
        )
    }
}
