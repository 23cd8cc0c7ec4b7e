//! Gauss-Lobatto-Legendre nodes on `[-1, 1]` and barycentric Lagrange
//! interpolation weights.
//!
//! The nodes of degree `N` are `-1`, `1` and the `N - 1` roots of `P'_N`.
//! They are computed by Newton iteration on `x P_N(x) - P_{N-1}(x)` starting
//! from the Chebyshev-Gauss-Lobatto points.

use sdp_core::{ensure, errors::Result, Real};
use std::f64::consts::PI;

const MAX_ITERATIONS: usize = 100;

/// Gauss-Lobatto-Legendre nodes of a given degree, sorted increasingly, with
/// their quadrature and barycentric weights.
#[derive(Debug, Clone, PartialEq)]
pub struct LobattoNodes {
    nodes: Vec<Real>,
    weights: Vec<Real>,
    barycentric: Vec<Real>,
}

impl LobattoNodes {
    /// Build the `degree + 1` nodes. `degree` must be at least 1.
    pub fn new(degree: usize) -> Result<Self> {
        ensure!(degree >= 1, "Lobatto degree must be at least 1, got {degree}");
        let n = degree;
        let nf = n as Real;
        let mut x: Vec<Real> = (0..=n).map(|j| (PI * j as Real / nf).cos()).collect();
        let mut p_n = vec![0.0; n + 1];

        for _ in 0..MAX_ITERATIONS {
            let mut delta_max: Real = 0.0;
            for (xi, pn) in x.iter_mut().zip(p_n.iter_mut()) {
                let (p_last, p_prev) = legendre_pair(n, *xi);
                *pn = p_last;
                let delta = (*xi * p_last - p_prev) / ((nf + 1.0) * p_last);
                *xi -= delta;
                delta_max = delta_max.max(delta.abs());
            }
            if delta_max < f64::EPSILON {
                break;
            }
        }
        // recompute P_N at the converged nodes for the quadrature weights
        for (xi, pn) in x.iter().zip(p_n.iter_mut()) {
            *pn = legendre_pair(n, *xi).0;
        }

        let mut pairs: Vec<(Real, Real)> = x
            .iter()
            .zip(p_n.iter())
            .map(|(&xi, &pn)| (xi, 2.0 / (nf * (nf + 1.0) * pn * pn)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nodes: Vec<Real> = pairs.iter().map(|p| p.0).collect();
        let weights: Vec<Real> = pairs.iter().map(|p| p.1).collect();
        let barycentric = barycentric_weights(&nodes);
        Ok(Self {
            nodes,
            weights,
            barycentric,
        })
    }

    /// Polynomial degree `N` (number of nodes minus one).
    pub fn degree(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Node abscissae on `[-1, 1]`, increasing.
    pub fn nodes(&self) -> &[Real] {
        &self.nodes
    }

    /// Gauss-Lobatto quadrature weights.
    pub fn weights(&self) -> &[Real] {
        &self.weights
    }

    /// Barycentric weights `1 / prod_{k != j} (x_j - x_k)`.
    pub fn barycentric(&self) -> &[Real] {
        &self.barycentric
    }

    /// Lagrange basis values of every node at `x` (reference coordinate).
    pub fn lagrange_weights(&self, x: Real) -> Vec<Real> {
        lagrange_weights(&self.nodes, &self.barycentric, x)
    }
}

/// `(P_n(x), P_{n-1}(x))` by the three-term recurrence.
fn legendre_pair(n: usize, x: Real) -> (Real, Real) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let kf = k as Real;
        let next = ((2.0 * kf - 1.0) * x * p - (kf - 1.0) * p_prev) / kf;
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}

fn barycentric_weights(nodes: &[Real]) -> Vec<Real> {
    nodes
        .iter()
        .enumerate()
        .map(|(j, &xj)| {
            let prod: Real = nodes
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .map(|(_, &xk)| xj - xk)
                .product();
            1.0 / prod
        })
        .collect()
}

/// Lagrange basis values `l_j(x)` of the polynomial interpolating on
/// `nodes`, evaluated with the second barycentric formula. At a node the
/// result is the corresponding unit vector; away from `[x_0, x_N]` the
/// polynomial is extrapolated.
pub fn lagrange_weights(nodes: &[Real], barycentric: &[Real], x: Real) -> Vec<Real> {
    debug_assert_eq!(nodes.len(), barycentric.len());
    if let Some(hit) = nodes.iter().position(|&xj| x == xj) {
        let mut out = vec![0.0; nodes.len()];
        out[hit] = 1.0;
        return out;
    }
    let terms: Vec<Real> = nodes
        .iter()
        .zip(barycentric)
        .map(|(&xj, &wj)| wj / (x - xj))
        .collect();
    let denom: Real = terms.iter().sum();
    terms.into_iter().map(|t| t / denom).collect()
}
