//! Independent geometric Brownian motions.
//!
//! `S_d(t) = S_d(0) exp((mu_d - sigma_d^2 / 2) t + sigma_d W_d(t))`. The
//! Brownian paths of every particle are drawn once from the seed, so walking
//! backward and forward visits the same particles.

use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_math::InverseCumulativeNormalRng;

use super::Simulator;

/// Black-Scholes particles with a constant short rate for discounting.
#[derive(Debug, Clone)]
pub struct BlackScholesSimulator {
    initial: Vec<Real>,
    mu: Vec<Real>,
    sigma: Vec<Real>,
    rate: Real,
    dt: Real,
    nb_step: usize,
    nb_simul: usize,
    step: usize,
    /// Brownian values per date (`dimension x nb_simul`).
    brownian: Vec<DMatrix<Real>>,
}

impl BlackScholesSimulator {
    /// Build the simulator. In backward mode the current date is the
    /// maturity, in forward mode it is 0.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial: Vec<Real>,
        mu: Vec<Real>,
        sigma: Vec<Real>,
        rate: Real,
        maturity: Real,
        nb_step: usize,
        nb_simul: usize,
        forward: bool,
        seed: u64,
    ) -> Result<Self> {
        let dim = initial.len();
        ensure!(dim >= 1, "at least one asset is needed");
        ensure!(
            mu.len() == dim && sigma.len() == dim,
            "{dim} assets with {} drifts and {} volatilities",
            mu.len(),
            sigma.len()
        );
        ensure!(nb_step >= 1 && nb_simul >= 1, "need at least one step and one particle");
        ensure!(maturity > 0.0, "maturity must be positive, got {maturity}");
        let dt = maturity / nb_step as Real;
        let sq = dt.sqrt();
        let mut rng = InverseCumulativeNormalRng::new(seed);
        let mut brownian = Vec::with_capacity(nb_step + 1);
        brownian.push(DMatrix::zeros(dim, nb_simul));
        for k in 1..=nb_step {
            let mut next = brownian[k - 1].clone();
            for w in next.iter_mut() {
                *w += sq * rng.next_real();
            }
            brownian.push(next);
        }
        Ok(Self {
            initial,
            mu,
            sigma,
            rate,
            dt,
            nb_step,
            nb_simul,
            step: if forward { 0 } else { nb_step },
            brownian,
        })
    }

    /// Length of a time step.
    pub fn dt(&self) -> Real {
        self.dt
    }

    fn particles_at(&self, step: usize) -> DMatrix<Real> {
        let t = step as Real * self.dt;
        DMatrix::from_fn(self.initial.len(), self.nb_simul, |d, s| {
            let sig = self.sigma[d];
            self.initial[d]
                * ((self.mu[d] - 0.5 * sig * sig) * t + sig * self.brownian[step][(d, s)]).exp()
        })
    }
}

impl Simulator for BlackScholesSimulator {
    fn nb_step(&self) -> usize {
        self.nb_step
    }

    fn nb_simul(&self) -> usize {
        self.nb_simul
    }

    fn dimension(&self) -> usize {
        self.initial.len()
    }

    fn current_step(&self) -> usize {
        self.step
    }

    fn particles(&self) -> DMatrix<Real> {
        self.particles_at(self.step)
    }

    fn step_backward_and_get_particles(&mut self) -> DMatrix<Real> {
        self.step = self.step.saturating_sub(1);
        self.particles()
    }

    fn step_forward_and_get_particles(&mut self) -> DMatrix<Real> {
        self.step = (self.step + 1).min(self.nb_step);
        self.particles()
    }

    fn actu_step(&self) -> Real {
        (-self.rate * self.dt).exp()
    }

    fn actu(&self) -> Real {
        (-self.rate * self.step as Real * self.dt).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sdp_math::Statistics;

    #[test]
    fn martingale_under_zero_drift() {
        let sim = BlackScholesSimulator::new(vec![1.0], vec![0.0], vec![0.3], 0.0, 1.0, 4, 20_000, false, 7).unwrap();
        let p = sim.particles();
        let stats = Statistics::from_samples(p.iter());
        assert_abs_diff_eq!(stats.mean().unwrap(), 1.0, epsilon = 0.02);
    }

    #[test]
    fn backward_and_forward_visit_the_same_particles() {
        let mut back = BlackScholesSimulator::new(vec![1.0, 2.0], vec![0.01, 0.0], vec![0.2, 0.1], 0.0, 1.0, 3, 50, false, 11).unwrap();
        let mut fwd = BlackScholesSimulator::new(vec![1.0, 2.0], vec![0.01, 0.0], vec![0.2, 0.1], 0.0, 1.0, 3, 50, true, 11).unwrap();
        let b1 = back.step_backward_and_get_particles();
        let b0 = {
            back.step_backward_and_get_particles();
            back.step_backward_and_get_particles()
        };
        assert_eq!(back.current_step(), 0);
        assert!(b0.column(3).iter().zip([1.0, 2.0]).all(|(a, b)| (a - b).abs() < 1e-15));
        fwd.step_forward_and_get_particles();
        let f2 = fwd.step_forward_and_get_particles();
        assert_eq!(b1, f2);
    }

    #[test]
    fn discounting() {
        let sim = BlackScholesSimulator::new(vec![1.0], vec![0.0], vec![0.2], 0.05, 2.0, 4, 1, false, 1).unwrap();
        assert_abs_diff_eq!(sim.actu_step(), (-0.025_f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(sim.actu(), (-0.1_f64).exp(), epsilon = 1e-15);
    }
}
