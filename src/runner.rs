//! One-call simulation pipeline: validate, prepare, simulate, analyse, recommend.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ControlMode, SiteConfig};
use crate::devices::{BaseLoad, SolarPv};
use crate::error::{Error, Result};
use crate::io::load::prepare_load;
use crate::sim::analysis::AnalysisResult;
use crate::sim::clock::{Cadence, DEFAULT_INTERVAL_MINUTES};
use crate::sim::controller::Controller;
use crate::sim::engine::Engine;
use crate::sim::event::SimEvent;
use crate::sim::recommendation::Recommendation;
use crate::sim::time_of_control::TimeOfControl;
use crate::sim::time_of_use::TimeOfUse;
use crate::sim::types::{LoadSample, PvSample, SimulationTrace};

/// Everything one run produces; plain data, safe to persist as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub data: SimulationTrace,
    pub analysis: AnalysisResult,
    pub recommendations: Recommendation,
}

/// Runs a full simulation for `config` over `load`.
///
/// # Errors
///
/// Returns a configuration error if `config` fails validation, the load
/// series is empty, or its samples are not evenly spaced.
pub fn run_simulation(config: &SiteConfig, load: Vec<LoadSample>) -> Result<SimulationOutput> {
    run_simulation_with(config, load, |_| {})
}

/// Like [`run_simulation`], handing every [`SimEvent`] to `observer` as it happens.
pub fn run_simulation_with<F>(
    config: &SiteConfig,
    load: Vec<LoadSample>,
    observer: F,
) -> Result<SimulationOutput>
where
    F: FnMut(&SimEvent),
{
    config.ensure_valid()?;

    let load = prepare_load(load);
    if load.is_empty() {
        return Err(Error::EmptyLoad);
    }
    let timestamps: Vec<NaiveDateTime> = load.iter().map(|s| s.timestamp).collect();
    let cadence = Cadence::infer(&timestamps)?;

    let mut pv = SolarPv::from_config(&config.pv_system);
    let samples: Vec<PvSample> = load
        .iter()
        .zip(pv.profile(&timestamps))
        .map(|(s, pv_kw)| PvSample::new(s.timestamp, s.load_kw, pv_kw))
        .collect();

    info!(
        site = %config.location.name,
        mode = %config.ems.control_mode,
        samples = samples.len(),
        interval_minutes = cadence.minutes(),
        "running simulation"
    );

    let ems = &config.ems;
    let trace = match ems.control_mode {
        ControlMode::TimeOfControl => {
            let policy = TimeOfControl::new(
                ems.target_md_kw,
                ems.max_discharge_kw,
                ems.battery_capacity_mwh,
                ems.peak_window,
            );
            simulate(policy, config, cadence, &samples, observer)
        }
        ControlMode::TimeOfUse => {
            let policy = TimeOfUse::new(
                ems.max_discharge_kw,
                ems.battery_capacity_mwh,
                &ems.time_of_use,
            );
            simulate(policy, config, cadence, &samples, observer)
        }
    };

    let analysis = AnalysisResult::from_trace(&trace, config);
    let recommendations = Recommendation::from_analysis(&analysis, config);
    Ok(SimulationOutput {
        data: trace,
        analysis,
        recommendations,
    })
}

fn simulate<C, F>(
    policy: C,
    config: &SiteConfig,
    cadence: Cadence,
    samples: &[PvSample],
    observer: F,
) -> SimulationTrace
where
    C: Controller,
    F: FnMut(&SimEvent),
{
    Engine::new(
        policy,
        config.ems.battery_capacity_mwh,
        config.ems.initial_soe_pct,
        cadence,
    )
    .run_with(samples, observer)
}

/// Synthetic load for `days` days at the default cadence, starting on a Monday.
///
/// Shaped so the daytime peak overshoots the reference site's MD target.
pub fn demo_load(days: u32, seed: u64) -> Vec<LoadSample> {
    let start = NaiveDate::from_ymd_opt(2025, 6, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let per_day = (24 * 60 / DEFAULT_INTERVAL_MINUTES) as usize;
    BaseLoad::new(
        5500.0, // base_kw
        3500.0, // amp_kw
        150.0,  // noise_std
        seed,
    )
    .series(start, DEFAULT_INTERVAL_MINUTES, per_day * days as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_config_before_running() {
        let mut config = SiteConfig::penang();
        config.ems.peak_window.end_hour = config.ems.peak_window.start_hour;
        let err = run_simulation(&config, demo_load(1, 1)).expect_err("invalid window");
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_empty_load() {
        let err = run_simulation(&SiteConfig::penang(), Vec::new()).expect_err("empty");
        assert!(matches!(err, Error::EmptyLoad));
    }

    #[test]
    fn rejects_uneven_spacing() {
        let mut load = demo_load(1, 1);
        load.remove(10);
        let err = run_simulation(&SiteConfig::penang(), load).expect_err("gap");
        assert!(matches!(err, Error::NonUniformCadence { .. }));
    }

    #[test]
    fn demo_run_produces_consistent_output() {
        let output = run_simulation(&SiteConfig::penang(), demo_load(2, 7)).expect("run");
        assert_eq!(output.data.records.len(), 2 * 288);
        assert_eq!(output.analysis.control_mode, ControlMode::TimeOfControl);
        assert!(output.analysis.md_no_pv_no_ems >= output.analysis.md_with_pv_with_ems);
    }

    #[test]
    fn observer_receives_events() {
        let mut count = 0;
        let output = run_simulation_with(&SiteConfig::time_of_use(), demo_load(1, 3), |_| count += 1)
            .expect("run");
        assert_eq!(count, output.data.events.len());
        assert!(count > 0);
    }

    #[test]
    fn demo_load_is_seeded() {
        assert_eq!(demo_load(1, 9), demo_load(1, 9));
        assert_ne!(demo_load(1, 9), demo_load(1, 10));
    }
}
