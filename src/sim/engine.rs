//! Simulation engine: the sequential dispatch loop and the extension pass.

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info};

use crate::config::ControlMode;
use crate::devices::{Battery, Device, DeviceContext};

use super::clock::{Cadence, decimal_hour};
use super::controller::Controller;
use super::event::SimEvent;
use super::power_balance::split_flows;
use super::types::{
    DecisionContext, ExtensionReport, LeftoverEvent, PvSample, SimulationTrace, TraceRecord,
};
use super::window::RollingAverage;

/// Tolerance when comparing SoE against the floor.
pub const SOE_EPSILON: f64 = 1e-6;

/// Maximum number of synthetic days replayed by the extension pass.
pub const MAX_EXTENSION_CYCLES: i64 = 3;

/// Simulation engine owning the battery, the policy, and the rolling demand windows.
///
/// Generic over `C: Controller` for static dispatch. One engine runs one
/// simulation; state carries from each interval to the next and into the
/// extension pass.
pub struct Engine<C: Controller> {
    controller: C,
    battery: Battery,
    cadence: Cadence,
    /// Net load seen by the policy (raw, may be negative).
    net_md: RollingAverage,
    baseline_md: RollingAverage,
    pv_only_md: RollingAverage,
    final_md: RollingAverage,
    was_discharging: bool,
    was_charging: bool,
    window_discharged_mwh: f64,
    events: Vec<SimEvent>,
}

/// Result of processing one interval.
struct StepOutcome {
    record: TraceRecord,
    prev_soe: f64,
}

impl<C: Controller> Engine<C> {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `controller` - Dispatch policy
    /// * `capacity_mwh` - Rated battery capacity
    /// * `initial_soe_pct` - Starting state of energy
    /// * `cadence` - Sampling interval of the input series
    pub fn new(controller: C, capacity_mwh: f64, initial_soe_pct: f64, cadence: Cadence) -> Self {
        let battery = Battery::new(
            capacity_mwh,
            initial_soe_pct,
            controller.soe_min(),
            controller.soe_max(),
            cadence.hours(),
        );
        let window = cadence.md_window_len();
        debug!(
            device = battery.device_type(),
            capacity_mwh,
            initial_soe_pct,
            md_window = window,
            "engine ready"
        );
        Self {
            controller,
            battery,
            cadence,
            net_md: RollingAverage::new(window),
            baseline_md: RollingAverage::new(window),
            pv_only_md: RollingAverage::new(window),
            final_md: RollingAverage::new(window),
            was_discharging: false,
            was_charging: false,
            window_discharged_mwh: 0.0,
            events: Vec::new(),
        }
    }

    /// Runs the primary pass (and the extension pass when the policy asks for one).
    pub fn run(self, samples: &[PvSample]) -> SimulationTrace {
        self.run_with(samples, |_| {})
    }

    /// Like [`Engine::run`], handing every [`SimEvent`] to `observer` as it happens.
    pub fn run_with<F>(mut self, samples: &[PvSample], mut observer: F) -> SimulationTrace
    where
        F: FnMut(&SimEvent),
    {
        info!(
            mode = %self.controller.mode(),
            intervals = samples.len(),
            interval_minutes = self.cadence.minutes(),
            initial_soe = self.battery.soe_pct,
            "simulation started"
        );

        let mut records = Vec::with_capacity(samples.len());
        for sample in samples {
            let outcome = self.step(sample, &mut observer);
            records.push(outcome.record);
        }

        let mut leftover_events: Vec<LeftoverEvent> = self
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Leftover(l) => Some(l.clone()),
                _ => None,
            })
            .collect();

        if self.tracks_leftover() && self.was_discharging {
            if let Some(last) = samples.last() {
                let soe = self.battery.soe_pct;
                let excess = (soe - self.controller.soe_min()).max(0.0);
                let event = LeftoverEvent {
                    timestamp: last.timestamp,
                    remaining_soe: soe,
                    excess_above_min_pct: excess,
                    excess_energy_kwh: self.battery.energy_above_kwh(soe, self.controller.soe_min()),
                    note: Some("simulation ended within discharge window".to_string()),
                };
                leftover_events.push(event.clone());
                self.emit(SimEvent::Leftover(event), &mut observer);
            }
        }

        let mut extension_records = Vec::new();
        let extension = match self.controller.extension_cutoff_hour() {
            Some(cutoff) if !samples.is_empty() => {
                Some(self.extend(samples, cutoff, &mut extension_records, &mut observer))
            }
            _ => None,
        };

        let trace = SimulationTrace {
            control_mode: self.controller.mode(),
            interval_minutes: self.cadence.minutes(),
            records,
            extension_records,
            leftover_events,
            extension,
            events: self.events,
            final_soe_pct: self.battery.soe_pct,
            health: self.controller.battery_health_report(),
        };
        info!(
            final_soe = trace.final_soe_pct,
            soh = trace.health.current_soh,
            records = trace.records.len(),
            extension_records = trace.extension_records.len(),
            "simulation finished"
        );
        trace
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    fn tracks_leftover(&self) -> bool {
        self.controller.mode() == ControlMode::TimeOfUse
    }

    fn emit(&mut self, event: SimEvent, observer: &mut impl FnMut(&SimEvent)) {
        event.log();
        observer(&event);
        self.events.push(event);
    }

    /// Processes one interval: decide, split flows, update SoE and demand windows.
    fn step(&mut self, sample: &PvSample, observer: &mut impl FnMut(&SimEvent)) -> StepOutcome {
        let at = sample.timestamp;
        let hour = decimal_hour(at);
        let prev_soe = self.battery.soe_pct;
        let in_discharge = self.controller.is_discharge_period(hour);
        let in_charge = self.controller.is_charge_period(hour);

        let md30_kw = self.net_md.push(sample.net_load_kw);
        let ctx = DecisionContext {
            timestamp: at,
            hour,
            soe_pct: prev_soe,
            load_kw: sample.load_kw,
            pv_power_kw: sample.pv_power_kw,
            net_load_kw: sample.net_load_kw,
            md30_kw,
            interval_hours: self.cadence.hours(),
        };
        let power_kw = self.controller.decide(&ctx);

        let flows = split_flows(sample.load_kw, sample.pv_power_kw, power_kw, in_charge);

        self.battery.power_kw(&DeviceContext::with_setpoint(at, power_kw));
        if power_kw > 0.0 {
            let energy_mwh = self.battery.interval_energy_mwh(power_kw);
            self.controller.update_soh_degradation(energy_mwh);
            if in_discharge {
                self.window_discharged_mwh += energy_mwh;
            }
        }
        let soe = self.battery.soe_pct;

        let record = TraceRecord {
            timestamp: at,
            load_kw: sample.load_kw,
            pv_power_kw: sample.pv_power_kw,
            net_load_kw: sample.net_load_kw,
            discharge_kw: power_kw,
            soe_pct: soe,
            soh_pct: self.controller.health().current_soh(),
            grid_import_kw: flows.grid_import_kw,
            grid_export_kw: flows.grid_export_kw,
            pv_to_load_kw: flows.pv_to_load_kw,
            pv_to_battery_kw: flows.pv_to_battery_kw,
            pv_curtailment_kw: flows.pv_curtailment_kw,
            md30_baseline_kw: self.baseline_md.push(sample.load_kw),
            md30_pv_only_kw: self
                .pv_only_md
                .push((sample.load_kw - sample.pv_power_kw).max(0.0)),
            md30_final_kw: self.final_md.push(flows.grid_import_kw),
        };

        self.observe_transitions(at, prev_soe, soe, in_discharge, in_charge, observer);

        StepOutcome { record, prev_soe }
    }

    fn observe_transitions(
        &mut self,
        at: NaiveDateTime,
        prev_soe: f64,
        soe: f64,
        in_discharge: bool,
        in_charge: bool,
        observer: &mut impl FnMut(&SimEvent),
    ) {
        let soe_min = self.controller.soe_min();

        if self.was_charging && !in_charge {
            let target_soe_pct = self.controller.charge_target_soe();
            self.emit(
                SimEvent::ChargeWindowClosed {
                    at,
                    soe_pct: prev_soe,
                    target_soe_pct,
                },
                observer,
            );
        }
        self.was_charging = in_charge;

        if !self.was_discharging && in_discharge {
            self.emit(
                SimEvent::DischargeWindowOpened {
                    at,
                    soe_pct: prev_soe,
                },
                observer,
            );
        } else if self.was_discharging && !in_discharge {
            let discharged_mwh = self.window_discharged_mwh;
            self.window_discharged_mwh = 0.0;
            self.emit(
                SimEvent::DischargeWindowClosed {
                    at,
                    soe_pct: prev_soe,
                    discharged_mwh,
                },
                observer,
            );
            if self.tracks_leftover() {
                let excess = (prev_soe - soe_min).max(0.0);
                let leftover = LeftoverEvent {
                    timestamp: at,
                    remaining_soe: soe,
                    excess_above_min_pct: excess,
                    excess_energy_kwh: self.battery.energy_above_kwh(prev_soe, soe_min),
                    note: None,
                };
                self.emit(SimEvent::Leftover(leftover), observer);
            }
        }
        self.was_discharging = in_discharge;

        if prev_soe > soe_min + SOE_EPSILON && soe <= soe_min + SOE_EPSILON {
            self.emit(SimEvent::SoeFloorReached { at, soe_pct: soe }, observer);
        }
    }

    /// Keeps discharging into replayed early-morning intervals until the
    /// battery reaches its floor or [`MAX_EXTENSION_CYCLES`] days are used.
    fn extend(
        &mut self,
        samples: &[PvSample],
        cutoff_hour: f64,
        extension_records: &mut Vec<TraceRecord>,
        observer: &mut impl FnMut(&SimEvent),
    ) -> ExtensionReport {
        let soe_min = self.controller.soe_min();
        let floor = soe_min + SOE_EPSILON;
        let initial_excess_pct = (self.battery.soe_pct - soe_min).max(0.0);

        if self.battery.soe_pct <= floor {
            debug!(soe = self.battery.soe_pct, "battery already at floor, no extension");
            return ExtensionReport {
                initial_excess_pct,
                final_soe_pct: self.battery.soe_pct,
                extension_intervals: 0,
                extension_energy_kwh: 0.0,
                completed: true,
            };
        }

        let mut candidates: Vec<PvSample> = samples
            .iter()
            .filter(|s| decimal_hour(s.timestamp) < cutoff_hour)
            .copied()
            .collect();
        if candidates.is_empty() {
            candidates = samples.to_vec();
        }

        self.emit(
            SimEvent::ExtensionStarted {
                initial_excess_pct,
                candidate_intervals: candidates.len(),
            },
            observer,
        );

        let mut extension_intervals = 0_usize;
        let mut extension_energy_kwh = 0.0_f64;
        'cycles: for day_offset in 1..=MAX_EXTENSION_CYCLES {
            for candidate in &candidates {
                if self.battery.soe_pct <= floor {
                    break 'cycles;
                }
                let shifted = PvSample {
                    timestamp: candidate.timestamp + TimeDelta::days(day_offset),
                    ..*candidate
                };
                let outcome = self.step(&shifted, observer);
                extension_energy_kwh += self
                    .battery
                    .energy_above_kwh(outcome.prev_soe, outcome.record.soe_pct);
                extension_intervals += 1;
                extension_records.push(outcome.record);
            }
        }

        let report = ExtensionReport {
            initial_excess_pct,
            final_soe_pct: self.battery.soe_pct,
            extension_intervals,
            extension_energy_kwh,
            completed: self.battery.soe_pct <= floor,
        };
        self.emit(SimEvent::ExtensionFinished(report.clone()), observer);
        report
    }
}
