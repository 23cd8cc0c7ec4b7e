//! Random number generators.
//!
//! Thin wrappers around `rand_mt` so that every simulator draws from the same
//! reproducible Mersenne-Twister stream for a given seed.

use sdp_core::Real;
use rand_mt::Mt19937GenRand64;

/// Uniform generator on `[0, 1)` based on MT19937-64.
#[derive(Debug, Clone)]
pub struct MersenneTwisterUniformRng {
    rng: Mt19937GenRand64,
}

impl MersenneTwisterUniformRng {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Next uniform deviate in `[0, 1)`.
    pub fn next_real(&mut self) -> Real {
        let u: u64 = self.rng.next_u64();
        u as f64 / (u64::MAX as f64 + 1.0)
    }

    /// Next uniform deviate in the open interval `(0, 1)`.
    pub fn next_open_real(&mut self) -> Real {
        loop {
            let u = self.next_real();
            if u > 0.0 {
                return u;
            }
        }
    }
}

/// Standard normal generator: MT19937-64 uniforms through the inverse
/// cumulative normal.
pub struct InverseCumulativeNormalRng {
    inner: MersenneTwisterUniformRng,
}

impl InverseCumulativeNormalRng {
    /// Create a new generator backed by a Mersenne Twister with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: MersenneTwisterUniformRng::new(seed),
        }
    }

    /// Next standard-normal deviate.
    pub fn next_real(&mut self) -> Real {
        // exact 0 would map to -inf
        let u = self.inner.next_open_real();
        crate::normal::normal_cdf_inverse(u)
    }

    /// Fill `out` with independent standard-normal deviates.
    pub fn fill(&mut self, out: &mut [Real]) {
        for x in out.iter_mut() {
            *x = self.next_real();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mt_range() {
        let mut rng = MersenneTwisterUniformRng::new(42);
        for _ in 0..1_000 {
            let x = rng.next_real();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = InverseCumulativeNormalRng::new(7);
        let mut b = InverseCumulativeNormalRng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_real(), b.next_real());
        }
    }

    #[test]
    fn normal_moments() {
        let mut rng = InverseCumulativeNormalRng::new(42);
        let mut samples = vec![0.0; 20_000];
        rng.fill(&mut samples);
        let n = samples.len() as Real;
        let mean = samples.iter().sum::<Real>() / n;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<Real>() / n;
        assert!(mean.abs() < 0.03, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }
}
