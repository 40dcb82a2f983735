//! Fixed-length rolling average used for the 30-minute demand traces.

use std::collections::VecDeque;

/// Mean of the last `capacity` pushed samples, updated in O(1).
///
/// Before the window fills, the mean is taken over the samples seen so far,
/// so the first reading equals the first sample.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    capacity: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl RollingAverage {
    /// Creates an empty window holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
        }
    }

    /// Pushes a sample and returns the updated mean.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
        self.mean()
    }

    /// Current mean, or 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_window_reads_zero() {
        let w = RollingAverage::new(6);
        assert_eq!(w.mean(), 0.0);
        assert!(w.is_empty());
    }

    #[test]
    fn partial_window_averages_seen_samples() {
        let mut w = RollingAverage::new(6);
        assert_eq!(w.push(10.0), 10.0);
        assert_eq!(w.push(20.0), 15.0);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn full_window_evicts_oldest() {
        let mut w = RollingAverage::new(3);
        for v in [1.0, 2.0, 3.0] {
            w.push(v);
        }
        assert_relative_eq!(w.mean(), 2.0);
        assert_relative_eq!(w.push(10.0), 5.0);
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut w = RollingAverage::new(0);
        assert_eq!(w.capacity(), 1);
        w.push(4.0);
        assert_eq!(w.push(8.0), 8.0);
    }

    #[test]
    fn running_sum_matches_direct_mean() {
        let mut w = RollingAverage::new(6);
        let values: Vec<f64> = (0..50).map(|i| (i as f64 * 37.3) % 911.0).collect();
        for (i, &v) in values.iter().enumerate() {
            let got = w.push(v);
            let start = i.saturating_sub(5);
            let slice = &values[start..=i];
            let expected = slice.iter().sum::<f64>() / slice.len() as f64;
            assert_relative_eq!(got, expected, epsilon = 1e-9);
        }
    }
}
