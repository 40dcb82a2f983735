use chrono::{Datelike, NaiveDateTime, TimeDelta, Weekday};
use rand::{SeedableRng, rngs::StdRng};

use crate::devices::types::{Device, DeviceContext, gaussian_noise};
use crate::sim::clock::decimal_hour;
use crate::sim::types::LoadSample;

/// A synthetic commercial load with a daytime hump and a lighter weekend.
///
/// Used to drive demonstration runs when no metered load file is supplied.
///
/// # Examples
///
/// ```
/// use bess_sim::devices::baseload::BaseLoad;
/// use chrono::NaiveDate;
///
/// let mut load = BaseLoad::new(
///     5000.0, // base_kw - overnight consumption
///     3000.0, // amp_kw - daytime swing
///     0.0,    // noise_std - deterministic
///     42,     // seed - for reproducible randomness
/// );
/// let start = NaiveDate::from_ymd_opt(2025, 1, 6)
///     .and_then(|d| d.and_hms_opt(0, 0, 0))
///     .expect("valid time");
/// let samples = load.series(start, 5, 288);
/// assert_eq!(samples.len(), 288);
/// ```
#[derive(Debug, Clone)]
pub struct BaseLoad {
    /// Overnight baseline consumption in kilowatts.
    pub base_kw: f64,

    /// Additional consumption at the daytime peak in kilowatts.
    pub amp_kw: f64,

    /// Standard deviation of the Gaussian noise in kilowatts.
    pub noise_std: f64,

    /// Random number generator for noise generation.
    rng: StdRng,
}

impl BaseLoad {
    /// Fraction of the daytime swing retained on Saturdays and Sundays.
    const WEEKEND_FACTOR: f64 = 0.6;

    /// Creates a new load generator.
    ///
    /// # Arguments
    ///
    /// * `base_kw` - Overnight baseline in kilowatts
    /// * `amp_kw` - Daytime swing in kilowatts
    /// * `noise_std` - Standard deviation of Gaussian noise in kilowatts
    /// * `seed` - Random seed for reproducible noise generation
    pub fn new(base_kw: f64, amp_kw: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            base_kw,
            amp_kw,
            noise_std,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Demand at `at`, never negative.
    ///
    /// The daytime shape is a raised cosine centred on 15:00 spanning
    /// 07:00 to 23:00, so the demand peak overlaps the evening tariff window.
    pub fn demand_kw(&mut self, at: NaiveDateTime) -> f64 {
        let hour = decimal_hour(at);
        let shape = if (7.0..23.0).contains(&hour) {
            0.5 * (1.0 + ((hour - 15.0) / 8.0 * std::f64::consts::PI).cos())
        } else {
            0.0
        };
        let weekday = match at.weekday() {
            Weekday::Sat | Weekday::Sun => Self::WEEKEND_FACTOR,
            _ => 1.0,
        };
        let noise = gaussian_noise(&mut self.rng, self.noise_std);
        (self.base_kw + self.amp_kw * shape * weekday + noise).max(0.0)
    }

    /// Generates `count` samples starting at `start`, spaced `interval_minutes` apart.
    pub fn series(
        &mut self,
        start: NaiveDateTime,
        interval_minutes: i64,
        count: usize,
    ) -> Vec<LoadSample> {
        let step = TimeDelta::minutes(interval_minutes.max(1));
        let mut at = start;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let load_kw = self.power_kw(&DeviceContext::new(at));
            samples.push(LoadSample::new(at, load_kw));
            at += step;
        }
        samples
    }
}

impl Device for BaseLoad {
    fn power_kw(&mut self, context: &DeviceContext) -> f64 {
        self.demand_kw(context.timestamp)
    }

    fn device_type(&self) -> &'static str {
        "BaseLoad"
    }
}
