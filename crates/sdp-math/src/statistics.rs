//! Sample statistics accumulator used to summarize forward simulations.

use sdp_core::Real;

/// Running sums of a sample: mean, variance and Monte-Carlo error of the
/// mean.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    count: usize,
    sum: Real,
    sum_sq: Real,
}

impl Statistics {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator over a whole sample.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Real>) -> Self {
        let mut s = Self::new();
        for &x in samples {
            s.add(x);
        }
        s
    }

    /// Add a single sample.
    pub fn add(&mut self, x: Real) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Sample mean, `None` when empty.
    pub fn mean(&self) -> Option<Real> {
        (self.count > 0).then(|| self.sum / self.count as Real)
    }

    /// Unbiased variance, `None` for fewer than 2 samples.
    pub fn variance(&self) -> Option<Real> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as Real;
        let m = self.sum / n;
        Some(((self.sum_sq / n - m * m) * n / (n - 1.0)).max(0.0))
    }

    /// Standard error of the mean, `None` for fewer than 2 samples.
    pub fn error_estimate(&self) -> Option<Real> {
        self.variance().map(|v| (v / self.count as Real).sqrt())
    }
}
