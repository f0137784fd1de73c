//! Median Smoother - Noise Suppression over Accepted Speeds
//!
//! Raw per-frame speed estimates jitter with detection noise; reporting the
//! median of the last few accepted values suppresses outliers without the lag
//! of an averaging filter.

use std::collections::VecDeque;

/// Bounded window of accepted raw speeds that reports the window median.
#[derive(Debug, Clone)]
pub struct MedianSmoother {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MedianSmoother {
    /// Create a smoother holding at most `capacity` accepted values.
    ///
    /// A zero capacity is clamped to 1 so the smoother always retains the
    /// latest accepted value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an accepted raw value, evicting the oldest once the window is
    /// full, and return the median of the current window contents.
    pub fn push(&mut self, raw: f64) -> f64 {
        self.window.push_back(raw);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.median()
    }

    /// Median of the current window: the central value for odd lengths, the
    /// mean of the two central values for even lengths, zero when empty.
    pub fn median(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_median_of_odd_window() {
        let mut smoother = MedianSmoother::new(5);
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            smoother.push(v);
        }
        assert_relative_eq!(smoother.median(), 30.0);
    }

    #[test]
    fn test_median_of_even_window() {
        let mut smoother = MedianSmoother::new(4);
        for v in [10.0, 20.0, 30.0, 40.0] {
            smoother.push(v);
        }
        assert_relative_eq!(smoother.median(), 25.0);
    }

    #[test]
    fn test_oldest_value_is_evicted() {
        let mut smoother = MedianSmoother::new(3);
        for v in [100.0, 1.0, 2.0] {
            smoother.push(v);
        }
        // Pushing a fourth value drops the 100.0 outlier.
        let median = smoother.push(3.0);
        assert_eq!(smoother.len(), 3);
        assert_relative_eq!(median, 2.0);
    }

    #[test]
    fn test_empty_window_yields_zero() {
        let smoother = MedianSmoother::new(5);
        assert_relative_eq!(smoother.median(), 0.0);
    }

    #[test]
    fn test_zero_capacity_still_tracks_latest() {
        let mut smoother = MedianSmoother::new(0);
        assert_relative_eq!(smoother.push(42.0), 42.0);
        assert_relative_eq!(smoother.push(7.0), 7.0);
        assert_eq!(smoother.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_capacity(
            capacity in 1usize..16,
            values in prop::collection::vec(-1000.0f64..1000.0, 0..64),
        ) {
            let mut smoother = MedianSmoother::new(capacity);
            for v in values {
                smoother.push(v);
                prop_assert!(smoother.len() <= capacity);
            }
        }

        #[test]
        fn prop_median_is_bounded_by_window_extremes(
            values in prop::collection::vec(0.0f64..500.0, 1..32),
        ) {
            let mut smoother = MedianSmoother::new(5);
            for v in &values {
                let median = smoother.push(*v);
                prop_assert!(median >= 0.0);
                prop_assert!(median <= 500.0);
            }
        }
    }
}
