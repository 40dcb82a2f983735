//! Target-MD suggestions from unused battery power.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::io::non_finite;

use super::analysis::AnalysisResult;

/// Unused power above which the battery counts as under-utilised (kW).
pub const LOW_UTILIZATION_KW: f64 = 200.0;
/// Unused power above which a softer target cut is still suggested (kW).
pub const GOOD_UTILIZATION_KW: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationLevel {
    Low,
    Good,
    High,
}

impl fmt::Display for UtilizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Good => write!(f, "good"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Projected gain from lowering the MD target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub additional_reduction_kw: f64,
    pub extra_monthly_savings: f64,
    pub extra_annual_savings: f64,
    pub new_annual_savings: f64,
    #[serde(with = "non_finite")]
    pub new_payback_years: f64,
    /// Extra annual savings relative to the current annual savings (%).
    pub savings_increase_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Battery power left unused at the billed MD (kW).
    pub remaining_capacity_kw: f64,
    pub utilization_rate: f64,
    pub utilization_level: UtilizationLevel,
    pub suggested_target_md_kw: Option<f64>,
    pub opportunity: Option<Opportunity>,
}

impl Recommendation {
    /// Suggests a lower MD target when the battery had power to spare.
    ///
    /// # Arguments
    ///
    /// * `analysis` - Result of the finished run
    /// * `config` - Configuration the run used
    pub fn from_analysis(analysis: &AnalysisResult, config: &SiteConfig) -> Self {
        let max_kw = config.ems.max_discharge_kw;
        let remaining = max_kw - analysis.ems_contribution;
        let utilization_rate = if max_kw > 0.0 {
            remaining / max_kw * 100.0
        } else {
            0.0
        };
        let md_final = analysis.md_with_pv_with_ems;

        if remaining > LOW_UTILIZATION_KW {
            let reduction = remaining * 0.8;
            let extra_monthly = reduction * config.financial.md_charge_rate;
            let extra_annual = extra_monthly * 12.0;
            let new_annual = analysis.annual_savings + extra_annual;
            let opportunity = Opportunity {
                additional_reduction_kw: reduction,
                extra_monthly_savings: extra_monthly,
                extra_annual_savings: extra_annual,
                new_annual_savings: new_annual,
                new_payback_years: if new_annual > 0.0 {
                    config.financial.capex / new_annual
                } else {
                    f64::INFINITY
                },
                savings_increase_pct: if analysis.annual_savings > 0.0 {
                    extra_annual / analysis.annual_savings * 100.0
                } else {
                    0.0
                },
            };
            Self {
                remaining_capacity_kw: remaining,
                utilization_rate,
                utilization_level: UtilizationLevel::Low,
                suggested_target_md_kw: Some(md_final - reduction),
                opportunity: Some(opportunity),
            }
        } else if remaining > GOOD_UTILIZATION_KW {
            Self {
                remaining_capacity_kw: remaining,
                utilization_rate,
                utilization_level: UtilizationLevel::Good,
                suggested_target_md_kw: Some(md_final - remaining * 0.5),
                opportunity: None,
            }
        } else {
            Self {
                remaining_capacity_kw: remaining,
                utilization_rate,
                utilization_level: UtilizationLevel::High,
                suggested_target_md_kw: None,
                opportunity: None,
            }
        }
    }

    pub fn has_opportunity(&self) -> bool {
        self.opportunity.is_some()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Recommendation ---")?;
        writeln!(
            f,
            "Unused battery power:  {:.1} kW ({:.1}%, {} utilization)",
            self.remaining_capacity_kw, self.utilization_rate, self.utilization_level
        )?;
        match self.suggested_target_md_kw {
            Some(target) => write!(f, "Suggested target MD:   {target:.1} kW")?,
            None => write!(f, "Target MD is well matched to the battery")?,
        }
        if let Some(o) = &self.opportunity {
            writeln!(f)?;
            write!(
                f,
                "Extra annual savings:  {:.2} (+{:.1}%), payback {:.2} years",
                o.extra_annual_savings, o.savings_increase_pct, o.new_payback_years
            )?;
        }
        Ok(())
    }
}
