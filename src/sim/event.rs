//! Structured milestones emitted by the simulation loop.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{ExtensionReport, LeftoverEvent};

/// A notable transition observed while stepping through time.
///
/// Policies stay pure; the engine derives these from state changes and
/// hands each one to [`SimEvent::log`] and to the caller's observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    /// Interval at which the policy's charging phases ended.
    ChargeWindowClosed {
        at: NaiveDateTime,
        soe_pct: f64,
        target_soe_pct: f64,
    },
    DischargeWindowOpened {
        at: NaiveDateTime,
        soe_pct: f64,
    },
    DischargeWindowClosed {
        at: NaiveDateTime,
        soe_pct: f64,
        /// Energy drawn from the battery while the window was open (MWh).
        discharged_mwh: f64,
    },
    /// SoE dropped to the policy floor.
    SoeFloorReached {
        at: NaiveDateTime,
        soe_pct: f64,
    },
    Leftover(LeftoverEvent),
    ExtensionStarted {
        initial_excess_pct: f64,
        candidate_intervals: usize,
    },
    ExtensionFinished(ExtensionReport),
}

impl SimEvent {
    /// Emits the event through `tracing` with structured fields.
    pub fn log(&self) {
        match self {
            Self::ChargeWindowClosed {
                at,
                soe_pct,
                target_soe_pct,
            } => {
                if soe_pct < target_soe_pct {
                    warn!(%at, soe_pct, target_soe_pct, "charging ended below target");
                } else {
                    info!(%at, soe_pct, target_soe_pct, "charging ended at target");
                }
            }
            Self::DischargeWindowOpened { at, soe_pct } => {
                info!(%at, soe_pct, "discharge window opened");
            }
            Self::DischargeWindowClosed {
                at,
                soe_pct,
                discharged_mwh,
            } => {
                info!(%at, soe_pct, discharged_mwh, "discharge window closed");
            }
            Self::SoeFloorReached { at, soe_pct } => {
                debug!(%at, soe_pct, "state of energy at floor");
            }
            Self::Leftover(event) => {
                warn!(
                    at = %event.timestamp,
                    excess_pct = event.excess_above_min_pct,
                    excess_kwh = event.excess_energy_kwh,
                    note = event.note.as_deref().unwrap_or(""),
                    "discharge window closed with energy left"
                );
            }
            Self::ExtensionStarted {
                initial_excess_pct,
                candidate_intervals,
            } => {
                info!(initial_excess_pct, candidate_intervals, "extended discharge started");
            }
            Self::ExtensionFinished(report) => {
                info!(
                    intervals = report.extension_intervals,
                    energy_kwh = report.extension_energy_kwh,
                    final_soe_pct = report.final_soe_pct,
                    completed = report.completed,
                    "extended discharge finished"
                );
            }
        }
    }
}
