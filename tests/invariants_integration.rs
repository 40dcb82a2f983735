//! Trace-wide invariants over multi-day runs of both policies.

mod common;

use bess_sim::SiteConfig;
use bess_sim::devices::BatteryHealth;
use bess_sim::runner::SimulationOutput;
use bess_sim::sim::time_of_control::TimeOfControl;

fn both_policies() -> Vec<(SiteConfig, SimulationOutput)> {
    [SiteConfig::penang(), SiteConfig::time_of_use()]
        .into_iter()
        .map(|config| {
            let output = common::demo_run(&config, 5);
            (config, output)
        })
        .collect()
}

fn soe_band(config: &SiteConfig) -> (f64, f64) {
    match config.ems.control_mode {
        bess_sim::config::ControlMode::TimeOfControl => {
            (TimeOfControl::SOE_MIN, TimeOfControl::SOE_MAX)
        }
        bess_sim::config::ControlMode::TimeOfUse => (
            config.ems.time_of_use.min_soe_pct,
            config.ems.time_of_use.max_soe_pct,
        ),
    }
}

#[test]
fn soe_stays_within_policy_band() {
    for (config, output) in both_policies() {
        let (min, max) = soe_band(&config);
        for r in output.data.all_records() {
            assert!(
                (min..=max).contains(&r.soe_pct),
                "{}: soe {} outside [{min}, {max}] at {}",
                config.ems.control_mode,
                r.soe_pct,
                r.timestamp
            );
        }
    }
}

#[test]
fn soh_is_non_increasing_and_floored() {
    for (_, output) in both_policies() {
        let mut previous = 100.0;
        for r in output.data.all_records() {
            assert!(r.soh_pct <= previous, "soh rose at {}", r.timestamp);
            assert!(r.soh_pct >= BatteryHealth::SOH_FLOOR);
            previous = r.soh_pct;
        }
        assert_eq!(output.analysis.final_soh, output.data.health.current_soh);
    }
}

#[test]
fn every_interval_balances() {
    for (_, output) in both_policies() {
        for r in output.data.all_records() {
            common::assert_balanced(r);
        }
    }
}

#[test]
fn primary_records_are_strictly_ordered() {
    for (_, output) in both_policies() {
        let records = &output.data.records;
        assert!(records.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        if let (Some(last), Some(first_ext)) = (records.last(), output.data.extension_records.first()) {
            assert!(first_ext.timestamp > last.timestamp);
        }
    }
}

#[test]
fn identical_inputs_give_identical_outputs() {
    for config in [SiteConfig::penang(), SiteConfig::time_of_use()] {
        let first = common::demo_run(&config, 3);
        let second = common::demo_run(&config, 3);
        assert_eq!(first, second);
    }
}

#[test]
fn discharge_never_exceeds_power_limit() {
    for (config, output) in both_policies() {
        let limit = config.ems.max_discharge_kw;
        for r in output.data.all_records() {
            assert!(r.discharge_kw.abs() <= limit + 1e-9, "{} kW at {}", r.discharge_kw, r.timestamp);
        }
    }
}

#[test]
fn peak_shaving_lowers_billed_demand() {
    let output = common::demo_run(&SiteConfig::penang(), 5);
    let a = &output.analysis;
    assert!(a.billing_window_applied);
    assert!(a.pv_contribution >= 0.0);
    assert!(a.ems_contribution > 0.0, "battery should shave the evening peak");
    assert!((a.total_reduction - (a.pv_contribution + a.ems_contribution)).abs() < 1e-9);
}
