use std::path::PathBuf;

use clap::Parser;

use bess_sim::SiteConfig;
use bess_sim::error::Result;

/// Simulate a grid-connected PV + battery site and report MD reduction, savings and ROI.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Site configuration in TOML.
    #[arg(long, conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Built-in site configuration (penang, time_of_use, clipped_inverter).
    #[arg(long)]
    pub preset: Option<String>,

    /// Metered load CSV with `timestamp` and `load` columns.
    #[arg(long, conflicts_with = "demo_days")]
    pub load: Option<PathBuf>,

    /// Days of synthetic load to generate when no CSV is given.
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=366))]
    pub demo_days: u32,

    /// Seed for the synthetic load.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the per-interval trace as CSV.
    #[arg(long)]
    pub trace_out: Option<PathBuf>,

    /// Write trace, analysis and recommendations as JSON.
    #[arg(long)]
    pub json_out: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(long, short)]
    pub quiet: bool,
}

impl Args {
    /// Resolves the site configuration, defaulting to the `penang` preset.
    pub fn site_config(&self) -> Result<SiteConfig> {
        match (&self.scenario, &self.preset) {
            (Some(path), _) => SiteConfig::from_toml_file(path),
            (None, Some(name)) => SiteConfig::from_preset(name),
            (None, None) => Ok(SiteConfig::penang()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("bess-sim").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_demo_run_on_reference_site() {
        let args = parse(&[]).expect("parse should succeed");
        assert!(args.scenario.is_none());
        assert_eq!(args.demo_days, 7);
        assert_eq!(args.seed, 42);
        let config = args.site_config().expect("default config");
        assert_eq!(config, SiteConfig::penang());
    }

    #[test]
    fn supports_preset() {
        let args = parse(&["--preset", "time_of_use"]).expect("parse should succeed");
        let config = args.site_config().expect("preset config");
        assert_eq!(config, SiteConfig::time_of_use());
    }

    #[test]
    fn scenario_and_preset_are_mutually_exclusive() {
        assert!(parse(&["--scenario", "site.toml", "--preset", "penang"]).is_err());
    }

    #[test]
    fn load_and_demo_days_are_mutually_exclusive() {
        assert!(parse(&["--load", "load.csv", "--demo-days", "3"]).is_err());
    }

    #[test]
    fn demo_days_must_be_positive() {
        assert!(parse(&["--demo-days", "0"]).is_err());
    }

    #[test]
    fn unknown_preset_is_configuration_error() {
        let args = parse(&["--preset", "nowhere"]).expect("parse should succeed");
        let err = args.site_config().expect_err("unknown preset");
        assert!(err.is_configuration());
    }
}
