//! Core simulation types: input samples, decision context, and trace records.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ControlMode;
use crate::devices::HealthReport;

use super::event::SimEvent;

/// One metered load reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    /// Start of the interval.
    pub timestamp: NaiveDateTime,
    /// Site consumption (kW). Expected non-negative but not enforced.
    pub load_kw: f64,
}

impl LoadSample {
    pub fn new(timestamp: NaiveDateTime, load_kw: f64) -> Self {
        Self { timestamp, load_kw }
    }
}

/// A load reading joined with the PV output for the same interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvSample {
    pub timestamp: NaiveDateTime,
    pub load_kw: f64,
    /// Inverter-clipped PV output (kW, >= 0).
    pub pv_power_kw: f64,
    /// `load_kw - pv_power_kw`; negative means PV surplus.
    pub net_load_kw: f64,
}

impl PvSample {
    pub fn new(timestamp: NaiveDateTime, load_kw: f64, pv_power_kw: f64) -> Self {
        Self {
            timestamp,
            load_kw,
            pv_power_kw,
            net_load_kw: load_kw - pv_power_kw,
        }
    }
}

/// Everything a control policy sees when making one decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub timestamp: NaiveDateTime,
    /// Decimal hour of `timestamp`.
    pub hour: f64,
    /// State of energy before this interval (%).
    pub soe_pct: f64,
    pub load_kw: f64,
    pub pv_power_kw: f64,
    pub net_load_kw: f64,
    /// Rolling 30-minute mean of net load, including this interval (kW).
    pub md30_kw: f64,
    /// Interval length in hours.
    pub interval_hours: f64,
}

/// Complete record of one simulated interval.
///
/// Power flows satisfy, within float tolerance:
/// `pv_power = pv_to_load + pv_to_battery + pv_curtailment` and
/// `load + charge + grid_export = pv_to_load + pv_to_battery + grid_import + discharge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub timestamp: NaiveDateTime,
    pub load_kw: f64,
    pub pv_power_kw: f64,
    pub net_load_kw: f64,
    /// Battery power (kW; positive=discharge, negative=charge).
    pub discharge_kw: f64,
    /// State of energy after this interval (%).
    pub soe_pct: f64,
    /// State of health after this interval (%).
    pub soh_pct: f64,
    pub grid_import_kw: f64,
    /// Battery discharge in excess of the post-PV load (kW).
    pub grid_export_kw: f64,
    pub pv_to_load_kw: f64,
    pub pv_to_battery_kw: f64,
    pub pv_curtailment_kw: f64,
    /// 30-minute mean of raw load (no PV, no battery).
    pub md30_baseline_kw: f64,
    /// 30-minute mean of load net of PV, floored at 0 per sample.
    pub md30_pv_only_kw: f64,
    /// 30-minute mean of grid import with PV and battery.
    pub md30_final_kw: f64,
}

impl TraceRecord {
    /// Charging power drawn by the battery (kW, >= 0).
    pub fn charge_kw(&self) -> f64 {
        (-self.discharge_kw).max(0.0)
    }

    /// Discharging power delivered by the battery (kW, >= 0).
    pub fn discharge_only_kw(&self) -> f64 {
        self.discharge_kw.max(0.0)
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | load={:>8.1} kW  pv={:>8.1} kW  bess={:>8.1} kW (SoE={:.1}%) | \
             grid={:>8.1} kW | md30 base={:.0} pv={:.0} final={:.0}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.load_kw,
            self.pv_power_kw,
            self.discharge_kw,
            self.soe_pct,
            self.grid_import_kw,
            self.md30_baseline_kw,
            self.md30_pv_only_kw,
            self.md30_final_kw,
        )
    }
}

/// The discharge window closed with energy still above the SoE floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftoverEvent {
    pub timestamp: NaiveDateTime,
    /// SoE after the interval that detected the exit (%).
    pub remaining_soe: f64,
    pub excess_above_min_pct: f64,
    pub excess_energy_kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of the post-run extended-discharge replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionReport {
    /// SoE above the floor when the primary pass ended (%).
    pub initial_excess_pct: f64,
    pub final_soe_pct: f64,
    pub extension_intervals: usize,
    pub extension_energy_kwh: f64,
    /// Whether the battery reached its floor.
    pub completed: bool,
}

/// The full output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    pub control_mode: ControlMode,
    pub interval_minutes: f64,
    /// Primary pass, strictly time-ordered.
    pub records: Vec<TraceRecord>,
    /// Replayed intervals from the extended-discharge pass, in replay order.
    pub extension_records: Vec<TraceRecord>,
    pub leftover_events: Vec<LeftoverEvent>,
    pub extension: Option<ExtensionReport>,
    pub events: Vec<SimEvent>,
    pub final_soe_pct: f64,
    pub health: HealthReport,
}

impl SimulationTrace {
    pub fn interval_hours(&self) -> f64 {
        self.interval_minutes / 60.0
    }

    /// Primary records followed by extension records.
    pub fn all_records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter().chain(self.extension_records.iter())
    }

    pub fn len(&self) -> usize {
        self.records.len() + self.extension_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.extension_records.is_empty()
    }
}
