//! Shared test fixtures for integration tests.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use bess_sim::SiteConfig;
use bess_sim::runner::{SimulationOutput, demo_load, run_simulation};
use bess_sim::sim::types::{LoadSample, TraceRecord};

/// Tolerance for per-interval power balance checks (kW).
pub const BALANCE_TOLERANCE_KW: f64 = 1e-6;

/// Midnight on Monday 2025-06-02.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid start time")
}

/// Constant load at 5-minute cadence.
pub fn flat_load(load_kw: f64, hours: i64) -> Vec<LoadSample> {
    (0..hours * 12)
        .map(|i| LoadSample::new(start() + TimeDelta::minutes(5 * i), load_kw))
        .collect()
}

/// Reference site with the PV array removed.
pub fn no_pv_config() -> SiteConfig {
    let mut config = SiteConfig::penang();
    config.pv_system.capacity_kwp = 0.0;
    config
}

/// Runs `config` over `days` of seeded synthetic load.
pub fn demo_run(config: &SiteConfig, days: u32) -> SimulationOutput {
    run_simulation(config, demo_load(days, 42)).expect("simulation should run")
}

/// Asserts both per-interval balance identities hold for `r`.
pub fn assert_balanced(r: &TraceRecord) {
    let pv_split = r.pv_to_load_kw + r.pv_to_battery_kw + r.pv_curtailment_kw;
    assert!(
        (pv_split - r.pv_power_kw).abs() < BALANCE_TOLERANCE_KW,
        "pv split {pv_split} != {} at {}",
        r.pv_power_kw,
        r.timestamp
    );

    let sinks = r.load_kw + r.charge_kw() + r.grid_export_kw;
    let sources = r.pv_to_load_kw + r.pv_to_battery_kw + r.grid_import_kw + r.discharge_only_kw();
    assert!(
        (sinks - sources).abs() <= BALANCE_TOLERANCE_KW * sinks.abs().max(1.0),
        "power balance {sinks} != {sources} at {}",
        r.timestamp
    );
}
