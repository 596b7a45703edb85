//! Exact integer accumulators for means and sample standard deviations.
//!
//! Sums are kept as integers so that merging partial results from parallel
//! workers in any order gives bit-identical statistics.

/// Running count, sum and sum of squares of integer observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Moments {
    count: u64,
    sum: u64,
    sum_sq: u64,
}

impl Moments {
    pub fn push(&mut self, value: u64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn merge(&mut self, other: &Moments) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }

    /// Sample (n - 1) standard deviation, `None` below two observations
    pub fn sample_std(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as u128;
        let sum = self.sum as u128;
        // n * Σx² - (Σx)² is never negative for exact integers
        let numerator = n * self.sum_sq as u128 - sum * sum;
        let variance = numerator as f64 / (n * (n - 1)) as f64;
        Some(variance.sqrt())
    }
}

impl FromIterator<u64> for Moments {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut moments = Moments::default();
        for value in iter {
            moments.push(value);
        }
        moments
    }
}
