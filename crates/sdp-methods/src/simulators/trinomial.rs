//! Trinomial tree of a mean-reverting Ornstein-Uhlenbeck process.
//!
//! `dX = -a X dt + sigma dW`, `X(0) = 0`, on the lattice `x = j dx` with
//! `dx = sigma sqrt(3 dt)`. The tree widens by one node per side and date
//! until `|j| = j_max = ceil(0.184 / (a dt))`; nodes on the edge branch
//! inward so that the width stays constant afterwards.

use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_math::MersenneTwisterUniformRng;

use super::TreeSimulator;

/// Branching from one date to the next.
#[derive(Debug, Clone)]
struct Branching {
    /// Centre of the three descendants of every node, as a lattice offset.
    k: Vec<i64>,
    /// Probabilities per branch (0 = down, 1 = middle, 2 = up) per node.
    probs: [Vec<Real>; 3],
    /// Lattice offset of node 0 of the next date.
    j_min_next: i64,
}

impl Branching {
    fn descendant(&self, node: usize, branch: usize) -> usize {
        (self.k[node] + branch as i64 - 1 - self.j_min_next) as usize
    }
}

/// Truncated trinomial tree.
#[derive(Debug, Clone)]
pub struct TrinomialTreeSimulator {
    dx: Real,
    dt: Real,
    rate: Real,
    j_max: i64,
    branchings: Vec<Branching>,
    nb_simul: usize,
    step: usize,
    sim_nodes: Vec<usize>,
    rng: MersenneTwisterUniformRng,
}

impl TrinomialTreeSimulator {
    /// Build the tree over `nb_step` steps up to `maturity`. In backward
    /// mode the current date is the maturity; in forward mode it is 0 with
    /// every path at the root.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mean_reversion: Real,
        sigma: Real,
        rate: Real,
        maturity: Real,
        nb_step: usize,
        nb_simul: usize,
        forward: bool,
        seed: u64,
    ) -> Result<Self> {
        ensure!(mean_reversion >= 0.0, "mean reversion must be non-negative");
        ensure!(sigma > 0.0, "volatility must be positive, got {sigma}");
        ensure!(maturity > 0.0 && nb_step >= 1, "need a positive maturity and one step");
        let dt = maturity / nb_step as Real;
        let dx = sigma * (3.0 * dt).sqrt();
        let adt = mean_reversion * dt;
        let j_max = if adt > 0.0 {
            ((0.184 / adt).ceil() as i64).max(1)
        } else {
            nb_step as i64 + 1
        };
        let mut branchings = Vec::with_capacity(nb_step);
        for i in 0..nb_step {
            let width = (i as i64).min(j_max);
            let mut b = Branching {
                k: Vec::new(),
                probs: [Vec::new(), Vec::new(), Vec::new()],
                j_min_next: -((i as i64 + 1).min(j_max)),
            };
            for j in -width..=width {
                let m = adt * j as Real;
                let m2 = m * m;
                let (k, down, mid, up) = if j == j_max {
                    (j - 1, 1.0 / 6.0 + 0.5 * (m2 - m), -1.0 / 3.0 - m2 + 2.0 * m, 7.0 / 6.0 + 0.5 * (m2 - 3.0 * m))
                } else if j == -j_max {
                    (j + 1, 7.0 / 6.0 + 0.5 * (m2 + 3.0 * m), -1.0 / 3.0 - m2 - 2.0 * m, 1.0 / 6.0 + 0.5 * (m2 + m))
                } else {
                    (j, 1.0 / 6.0 + 0.5 * (m2 + m), 2.0 / 3.0 - m2, 1.0 / 6.0 + 0.5 * (m2 - m))
                };
                b.k.push(k);
                b.probs[0].push(down);
                b.probs[1].push(mid);
                b.probs[2].push(up);
            }
            branchings.push(b);
        }
        Ok(Self {
            dx,
            dt,
            rate,
            j_max,
            branchings,
            nb_simul,
            step: if forward { 0 } else { nb_step },
            sim_nodes: vec![0; nb_simul],
            rng: MersenneTwisterUniformRng::new(seed),
        })
    }

    /// Lattice spacing.
    pub fn dx(&self) -> Real {
        self.dx
    }

    fn width(&self, step: usize) -> i64 {
        (step as i64).min(self.j_max)
    }
}

impl TreeSimulator for TrinomialTreeSimulator {
    fn nb_step(&self) -> usize {
        self.branchings.len()
    }

    fn nb_simul(&self) -> usize {
        self.nb_simul
    }

    fn dimension(&self) -> usize {
        1
    }

    fn current_step(&self) -> usize {
        self.step
    }

    fn nb_nodes(&self) -> usize {
        (2 * self.width(self.step) + 1) as usize
    }

    fn nodes(&self) -> DMatrix<Real> {
        DMatrix::from_fn(1, self.nb_nodes(), |_, n| self.value_of_node(n)[0])
    }

    fn value_of_node(&self, node: usize) -> Vec<Real> {
        vec![(node as i64 - self.width(self.step)) as Real * self.dx]
    }

    fn proba(&self) -> Vec<Real> {
        let Some(b) = self.branchings.get(self.step) else {
            return Vec::new();
        };
        (0..b.k.len())
            .flat_map(|n| (0..3).map(move |branch| b.probs[branch][n]))
            .collect()
    }

    fn connected(&self) -> Vec<Vec<(usize, usize)>> {
        let Some(b) = self.branchings.get(self.step) else {
            return Vec::new();
        };
        (0..b.k.len())
            .map(|n| (0..3).map(|branch| (b.descendant(n, branch), 3 * n + branch)).collect())
            .collect()
    }

    fn step_backward(&mut self) {
        self.step = self.step.saturating_sub(1);
    }

    fn step_forward_and_get_nodes(&mut self) -> Vec<usize> {
        if let Some(b) = self.branchings.get(self.step) {
            for node in self.sim_nodes.iter_mut() {
                let u = self.rng.next_real();
                let branch = if u < b.probs[0][*node] {
                    0
                } else if u < b.probs[0][*node] + b.probs[1][*node] {
                    1
                } else {
                    2
                };
                *node = b.descendant(*node, branch);
            }
            self.step += 1;
        }
        self.sim_nodes.clone()
    }

    fn simulation_nodes(&self) -> &[usize] {
        &self.sim_nodes
    }

    fn actu_step(&self) -> Real {
        (-self.rate * self.dt).exp()
    }

    fn actu(&self) -> Real {
        (-self.rate * self.step as Real * self.dt).exp()
    }
}
