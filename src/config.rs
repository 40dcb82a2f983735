//! TOML-based site configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::sim::clock::ClockWindow;

/// Top-level site configuration parsed from TOML.
///
/// All sections have defaults matching the `penang` preset. Load from
/// TOML with [`SiteConfig::from_toml_file`] or use one of the presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Descriptive site location.
    #[serde(default)]
    pub location: LocationConfig,
    /// PV array and inverter parameters.
    #[serde(default)]
    pub pv_system: PvSystemConfig,
    /// Battery and dispatch policy parameters.
    #[serde(default)]
    pub ems: EmsConfig,
    /// Tariff and investment parameters.
    #[serde(default)]
    pub financial: FinancialConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    pub name: String,
    pub city: String,
    pub country: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: "Penang, Malaysia".to_string(),
            city: "Penang".to_string(),
            country: "Malaysia".to_string(),
        }
    }
}

/// PV array parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvSystemConfig {
    /// Nameplate DC capacity (kWp).
    pub capacity_kwp: f64,
    /// System losses as a fraction (0.14 = 14%).
    pub system_loss_frac: f64,
    /// AC inverter limit (kW). Defaults to the nameplate capacity.
    pub inverter_capacity_kw: Option<f64>,
}

impl PvSystemConfig {
    /// Effective inverter clipping limit in kW.
    pub fn inverter_limit_kw(&self) -> f64 {
        self.inverter_capacity_kw.unwrap_or(self.capacity_kwp)
    }
}

impl Default for PvSystemConfig {
    fn default() -> Self {
        Self {
            capacity_kwp: 9109.1,
            system_loss_frac: 0.14,
            inverter_capacity_kw: None,
        }
    }
}

/// Dispatch policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Adaptive peak shaving with post-window extended discharge.
    #[default]
    TimeOfControl,
    /// Fixed charge/discharge clock windows.
    TimeOfUse,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimeOfControl => write!(f, "time_of_control"),
            Self::TimeOfUse => write!(f, "time_of_use"),
        }
    }
}

/// Battery and energy-management parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmsConfig {
    /// Grid-side maximum demand target (kW).
    pub target_md_kw: f64,
    /// Maximum charge/discharge power (kW).
    pub max_discharge_kw: f64,
    /// Rated battery capacity (MWh).
    pub battery_capacity_mwh: f64,
    /// State of energy at the first timestep (%).
    pub initial_soe_pct: f64,
    pub control_mode: ControlMode,
    /// Core peak-shaving window; also used for billing attribution.
    pub peak_window: ClockWindow,
    pub time_of_use: TimeOfUseConfig,
}

impl Default for EmsConfig {
    fn default() -> Self {
        Self {
            target_md_kw: 6500.0,
            max_discharge_kw: 2000.0,
            battery_capacity_mwh: 7.5,
            initial_soe_pct: 60.0,
            control_mode: ControlMode::TimeOfControl,
            peak_window: ClockWindow::new(18.0, 22.0),
            time_of_use: TimeOfUseConfig::default(),
        }
    }
}

/// Schedule windows and SoE limits for the time-of-use policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeOfUseConfig {
    pub charge_window: ClockWindow,
    pub discharge_window: ClockWindow,
    pub min_soe_pct: f64,
    pub max_soe_pct: f64,
}

impl Default for TimeOfUseConfig {
    fn default() -> Self {
        Self {
            charge_window: ClockWindow::new(0.0, 6.0),
            discharge_window: ClockWindow::new(18.0, 22.0),
            min_soe_pct: 15.0,
            max_soe_pct: 90.0,
        }
    }
}

/// Tariff and investment parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinancialConfig {
    /// Total capital expenditure.
    pub capex: f64,
    /// Monthly demand charge per kW of maximum demand.
    pub md_charge_rate: f64,
    /// Energy rate inside the peak billing window (per kWh).
    pub peak_energy_rate: f64,
    /// Energy rate outside the peak billing window (per kWh).
    pub offpeak_energy_rate: f64,
    /// Whether PV self-consumption savings count towards ROI.
    pub include_pv_savings: bool,
}

impl Default for FinancialConfig {
    fn default() -> Self {
        Self {
            capex: 4_861_625.0,
            md_charge_rate: 97.0,
            peak_energy_rate: 0.31,
            offpeak_energy_rate: 0.27,
            include_pv_savings: true,
        }
    }
}

impl SiteConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["penang", "time_of_use", "clipped_inverter"];

    /// The reference site: 9.1 MWp PV, 7.5 MWh / 2 MW battery, peak shaving to 6.5 MW.
    pub fn penang() -> Self {
        Self {
            location: LocationConfig::default(),
            pv_system: PvSystemConfig::default(),
            ems: EmsConfig::default(),
            financial: FinancialConfig::default(),
        }
    }

    /// Same site driven by a fixed overnight-charge / evening-discharge schedule.
    pub fn time_of_use() -> Self {
        Self {
            ems: EmsConfig {
                control_mode: ControlMode::TimeOfUse,
                time_of_use: TimeOfUseConfig {
                    charge_window: ClockWindow::new(22.0, 6.0),
                    discharge_window: ClockWindow::new(18.0, 22.0),
                    ..TimeOfUseConfig::default()
                },
                ..EmsConfig::default()
            },
            ..Self::penang()
        }
    }

    /// Inverter sized at 75% of nameplate, so midday output clips.
    pub fn clipped_inverter() -> Self {
        let pv_system = PvSystemConfig {
            inverter_capacity_kw: Some(9109.1 * 0.75),
            ..PvSystemConfig::default()
        };
        Self {
            pv_system,
            ..Self::penang()
        }
    }

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self> {
        match name {
            "penang" => Ok(Self::penang()),
            "time_of_use" => Ok(Self::time_of_use()),
            "clipped_inverter" => Ok(Self::clipped_inverter()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )
            .into()),
        }
    }

    /// Parses a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Validates every field and returns all problems found.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let pv = &self.pv_system;
        non_negative(&mut errors, "pv_system.capacity_kwp", pv.capacity_kwp);
        if !(0.0..1.0).contains(&pv.system_loss_frac) {
            errors.push(ConfigError::new(
                "pv_system.system_loss_frac",
                "must be in [0.0, 1.0)",
            ));
        }
        if let Some(limit) = pv.inverter_capacity_kw {
            non_negative(&mut errors, "pv_system.inverter_capacity_kw", limit);
        }

        let ems = &self.ems;
        non_negative(&mut errors, "ems.target_md_kw", ems.target_md_kw);
        non_negative(&mut errors, "ems.max_discharge_kw", ems.max_discharge_kw);
        non_negative(&mut errors, "ems.battery_capacity_mwh", ems.battery_capacity_mwh);
        percentage(&mut errors, "ems.initial_soe_pct", ems.initial_soe_pct);

        clock_hours(&mut errors, "ems.peak_window", &ems.peak_window);
        if ems.peak_window.end_hour <= ems.peak_window.start_hour {
            errors.push(ConfigError::new(
                "ems.peak_window.end_hour",
                "peak shaving end time must be later than the start time",
            ));
        }

        let tou = &ems.time_of_use;
        clock_hours(&mut errors, "ems.time_of_use.charge_window", &tou.charge_window);
        clock_hours(
            &mut errors,
            "ems.time_of_use.discharge_window",
            &tou.discharge_window,
        );
        percentage(&mut errors, "ems.time_of_use.min_soe_pct", tou.min_soe_pct);
        percentage(&mut errors, "ems.time_of_use.max_soe_pct", tou.max_soe_pct);
        if tou.min_soe_pct > tou.max_soe_pct {
            errors.push(ConfigError::new(
                "ems.time_of_use.min_soe_pct",
                "must be <= ems.time_of_use.max_soe_pct",
            ));
        }

        let fin = &self.financial;
        non_negative(&mut errors, "financial.capex", fin.capex);
        non_negative(&mut errors, "financial.md_charge_rate", fin.md_charge_rate);
        non_negative(&mut errors, "financial.peak_energy_rate", fin.peak_energy_rate);
        non_negative(
            &mut errors,
            "financial.offpeak_energy_rate",
            fin.offpeak_energy_rate,
        );

        errors
    }

    /// Like [`SiteConfig::validate`], but folds the problems into an [`Error`].
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(errors))
        }
    }
}

fn non_negative(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.push(ConfigError::new(field, "must be a finite number >= 0"));
    }
}

fn percentage(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(ConfigError::new(field, "must be in [0, 100]"));
    }
}

fn clock_hours(errors: &mut Vec<ConfigError>, field: &str, window: &ClockWindow) {
    for (name, hour) in [("start_hour", window.start_hour), ("end_hour", window.end_hour)] {
        if !(0.0..=24.0).contains(&hour) {
            errors.push(ConfigError::new(
                format!("{field}.{name}"),
                "must be a clock hour in [0, 24]",
            ));
        }
    }
}
