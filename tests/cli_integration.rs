//! End-to-end runs of the compiled binary.

use std::process::Command;

use bess_sim::SiteConfig;
use bess_sim::io::export::read_json;

fn bess_sim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bess-sim"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn preset_demo_run_prints_report_and_writes_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trace = dir.path().join("trace.csv");
    let json = dir.path().join("run.json");

    let output = bess_sim()
        .args(["--preset", "penang", "--demo-days", "2"])
        .arg("--trace-out")
        .arg(&trace)
        .arg("--json-out")
        .arg(&json)
        .output()
        .expect("bess-sim process should run");

    assert!(
        output.status.success(),
        "run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    assert!(stdout.contains("MD with PV and EMS:"));
    assert!(stdout.contains("--- Recommendation ---"));

    let restored = read_json(&json).expect("json output");
    assert_eq!(restored.data.records.len(), 2 * 288);
    let csv = std::fs::read_to_string(&trace).expect("trace output");
    assert_eq!(csv.lines().count(), 1 + restored.data.len());
}

#[test]
fn bundled_scenarios_parse_and_run() {
    for path in [
        "scenarios/penang.toml",
        "scenarios/time_of_use.toml",
        "scenarios/clipped_inverter.toml",
    ] {
        let full = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
        let config = SiteConfig::from_toml_file(&full).expect("scenario should parse");
        assert!(config.validate().is_empty(), "{path} should validate");

        let output = bess_sim()
            .args(["--scenario", path, "--demo-days", "1"])
            .output()
            .expect("bess-sim process should run");
        assert!(
            output.status.success(),
            "scenario run failed for {path}: stderr={}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn penang_scenario_matches_preset() {
    let full = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/penang.toml");
    let config = SiteConfig::from_toml_file(&full).expect("scenario should parse");
    assert_eq!(config, SiteConfig::penang());
}

#[test]
fn load_csv_drives_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let load = dir.path().join("load.csv");
    let mut body = String::from("Timestamp,Load,meter\n");
    for i in 0..288 {
        body.push_str(&format!(
            "2025-06-02 {:02}:{:02}:00,{},A\n",
            i / 12,
            (i % 12) * 5,
            6000 + (i % 7) * 100
        ));
    }
    std::fs::write(&load, body).expect("write load");

    let output = bess_sim()
        .arg("--load")
        .arg(&load)
        .output()
        .expect("bess-sim process should run");
    assert!(
        output.status.success(),
        "run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn configuration_errors_exit_non_zero() {
    let output = bess_sim()
        .args(["--preset", "atlantis"])
        .output()
        .expect("bess-sim process should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown preset"));

    let dir = tempfile::tempdir().expect("tempdir");
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[ems.peak_window]\nstart_hour = 22\nend_hour = 18\n").expect("write");
    let output = bess_sim()
        .arg("--scenario")
        .arg(&bad)
        .output()
        .expect("bess-sim process should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ems.peak_window.end_hour"));
}

#[test]
fn missing_load_column_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let load = dir.path().join("load.csv");
    std::fs::write(&load, "timestamp,power\n2025-06-02 00:00:00,1\n").expect("write load");
    let output = bess_sim()
        .arg("--load")
        .arg(&load)
        .output()
        .expect("bess-sim process should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing `load`"));
}
