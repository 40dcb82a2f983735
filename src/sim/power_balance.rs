//! Per-interval split of PV, battery, and grid power.

/// Where each kilowatt went during one interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerFlows {
    pub pv_to_load_kw: f64,
    pub pv_to_battery_kw: f64,
    pub pv_curtailment_kw: f64,
    pub grid_import_kw: f64,
    /// Battery discharge beyond what the load could absorb.
    pub grid_export_kw: f64,
}

/// Splits PV, load, and battery power for one interval.
///
/// PV always serves load first. When charging inside a PV-first phase the
/// battery takes PV ahead of the load and the grid covers the rest;
/// otherwise the grid supplies the charge and surplus PV is curtailed.
///
/// # Arguments
///
/// * `load_kw` - Site consumption
/// * `pv_kw` - PV output (>= 0)
/// * `battery_kw` - Battery power (positive=discharge, negative=charge)
/// * `pv_first_charge` - Whether the current phase charges from PV
///
/// # Returns
///
/// The flows satisfying `pv = pv_to_load + pv_to_battery + curtailment` and
/// `load + charge + export = pv_to_load + pv_to_battery + import + discharge`
/// for non-negative load.
pub fn split_flows(load_kw: f64, pv_kw: f64, battery_kw: f64, pv_first_charge: bool) -> PowerFlows {
    let demand_kw = load_kw.max(0.0);

    if battery_kw < 0.0 {
        let charge_kw = -battery_kw;
        if pv_first_charge {
            let pv_to_battery_kw = charge_kw.min(pv_kw);
            let pv_to_load_kw = (pv_kw - pv_to_battery_kw).min(demand_kw);
            PowerFlows {
                pv_to_load_kw,
                pv_to_battery_kw,
                pv_curtailment_kw: (pv_kw - pv_to_battery_kw - pv_to_load_kw).max(0.0),
                grid_import_kw: (demand_kw - pv_to_load_kw) + (charge_kw - pv_to_battery_kw),
                grid_export_kw: 0.0,
            }
        } else {
            let pv_to_load_kw = pv_kw.min(demand_kw);
            PowerFlows {
                pv_to_load_kw,
                pv_to_battery_kw: 0.0,
                pv_curtailment_kw: (pv_kw - pv_to_load_kw).max(0.0),
                grid_import_kw: (demand_kw - pv_to_load_kw) + charge_kw,
                grid_export_kw: 0.0,
            }
        }
    } else {
        let discharge_kw = battery_kw;
        let pv_to_load_kw = pv_kw.min(demand_kw);
        let residual_kw = (demand_kw - pv_to_load_kw).max(0.0);
        PowerFlows {
            pv_to_load_kw,
            pv_to_battery_kw: 0.0,
            pv_curtailment_kw: (pv_kw - pv_to_load_kw).max(0.0),
            grid_import_kw: (residual_kw - discharge_kw).max(0.0),
            grid_export_kw: (discharge_kw - residual_kw).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(load: f64, pv: f64, battery: f64, pv_first: bool) {
        let f = split_flows(load, pv, battery, pv_first);
        let charge = (-battery).max(0.0);
        let discharge = battery.max(0.0);
        let pv_sum = f.pv_to_load_kw + f.pv_to_battery_kw + f.pv_curtailment_kw;
        assert!((pv_sum - pv).abs() < 1e-9, "pv split {pv_sum} != {pv}");
        let lhs = load + charge + f.grid_export_kw;
        let rhs = f.pv_to_load_kw + f.pv_to_battery_kw + f.grid_import_kw + discharge;
        assert!((lhs - rhs).abs() < 1e-9, "{lhs} != {rhs}");
    }

    #[test]
    fn idle_pv_serves_load_first() {
        let f = split_flows(5000.0, 2000.0, 0.0, false);
        assert_eq!(f.pv_to_load_kw, 2000.0);
        assert_eq!(f.grid_import_kw, 3000.0);
        assert_eq!(f.pv_curtailment_kw, 0.0);
    }

    #[test]
    fn idle_surplus_is_curtailed() {
        let f = split_flows(1000.0, 3000.0, 0.0, false);
        assert_eq!(f.pv_to_load_kw, 1000.0);
        assert_eq!(f.pv_curtailment_kw, 2000.0);
        assert_eq!(f.grid_import_kw, 0.0);
    }

    #[test]
    fn pv_first_charge_takes_pv_before_load() {
        let f = split_flows(5000.0, 3000.0, -1000.0, true);
        assert_eq!(f.pv_to_battery_kw, 1000.0);
        assert_eq!(f.pv_to_load_kw, 2000.0);
        assert_eq!(f.grid_import_kw, 3000.0);
    }

    #[test]
    fn pv_first_charge_shortfall_from_grid() {
        let f = split_flows(5000.0, 400.0, -1000.0, true);
        assert_eq!(f.pv_to_battery_kw, 400.0);
        assert_eq!(f.pv_to_load_kw, 0.0);
        assert_eq!(f.grid_import_kw, 5000.0 + 600.0);
    }

    #[test]
    fn pv_first_charge_curtails_beyond_load() {
        let f = split_flows(1000.0, 5000.0, -2000.0, true);
        assert_eq!(f.pv_to_load_kw, 1000.0);
        assert_eq!(f.pv_curtailment_kw, 2000.0);
        assert_eq!(f.grid_import_kw, 0.0);
    }

    #[test]
    fn grid_charge_outside_pv_phase() {
        let f = split_flows(3000.0, 1000.0, -500.0, false);
        assert_eq!(f.pv_to_battery_kw, 0.0);
        assert_eq!(f.grid_import_kw, 2000.0 + 500.0);
    }

    #[test]
    fn discharge_reduces_import() {
        let f = split_flows(8000.0, 0.0, 1500.0, false);
        assert_eq!(f.grid_import_kw, 6500.0);
        assert_eq!(f.grid_export_kw, 0.0);
    }

    #[test]
    fn excess_discharge_is_exported() {
        let f = split_flows(500.0, 0.0, 2000.0, false);
        assert_eq!(f.grid_import_kw, 0.0);
        assert_eq!(f.grid_export_kw, 1500.0);
    }

    #[test]
    fn every_branch_balances() {
        for &(load, pv, bat, first) in &[
            (5000.0, 2000.0, 0.0, false),
            (1000.0, 3000.0, 0.0, true),
            (5000.0, 3000.0, -1000.0, true),
            (5000.0, 400.0, -1000.0, true),
            (1000.0, 5000.0, -2000.0, true),
            (3000.0, 1000.0, -500.0, false),
            (8000.0, 100.0, 1500.0, false),
            (500.0, 800.0, 2000.0, false),
        ] {
            assert_balanced(load, pv, bat, first);
        }
    }
}
