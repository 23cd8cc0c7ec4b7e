//! Uniform meshes carrying Gauss-Lobatto-Legendre nodes.
//!
//! Along dimension `d` the domain is cut into `nb_step[d]` meshes of width
//! `step[d]`; each mesh holds the `degree[d] + 1` Lobatto nodes mapped from
//! `[-1, 1]`, consecutive meshes sharing their common endpoint. Values stored
//! at the nodes are interpolated with the tensor product of the barycentric
//! Lagrange polynomials of the enclosing mesh.

use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::{Error, Result}, Real};
use sdp_math::LobattoNodes;

use crate::full::{multi_index, tensor_support};
use crate::grid::{Cell, DomainPolicy, Grid, GridKind};

/// Persisted description of a [`RegularLegendreGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendreParams {
    /// Lower corner.
    pub low: Vec<Real>,
    /// Mesh width per dimension.
    pub step: Vec<Real>,
    /// Number of meshes per dimension.
    pub nb_step: Vec<usize>,
    /// Polynomial degree per dimension.
    pub degree: Vec<usize>,
    /// Out-of-domain policy.
    #[serde(default)]
    pub policy: DomainPolicy,
}

/// Regular grid with Gauss-Lobatto-Legendre nodes in each mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LegendreParams", into = "LegendreParams")]
pub struct RegularLegendreGrid {
    params: LegendreParams,
    lobatto: Vec<LobattoNodes>,
}

impl RegularLegendreGrid {
    /// Build the grid. Every dimension needs at least one mesh and a degree of
    /// at least 1.
    pub fn new(
        low: Vec<Real>,
        step: Vec<Real>,
        nb_step: Vec<usize>,
        degree: Vec<usize>,
    ) -> Result<Self> {
        Self::try_from(LegendreParams {
            low,
            step,
            nb_step,
            degree,
            policy: DomainPolicy::default(),
        })
    }

    /// Copy with another out-of-domain policy.
    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.params.policy = policy;
        self
    }

    /// Construction parameters.
    pub fn params(&self) -> &LegendreParams {
        &self.params
    }

    /// Points per dimension.
    pub fn sizes(&self) -> Vec<usize> {
        self.params
            .nb_step
            .iter()
            .zip(&self.params.degree)
            .map(|(n, p)| n * p + 1)
            .collect()
    }

    /// Coordinates of the points along dimension `d`.
    pub fn axis_coordinates(&self, d: usize) -> Vec<Real> {
        (0..self.sizes()[d]).map(|g| self.axis_coordinate(d, g)).collect()
    }

    fn axis_coordinate(&self, d: usize, g: usize) -> Real {
        let p = &self.params;
        let deg = p.degree[d];
        let (mut m, mut k) = (g / deg, g % deg);
        if m == p.nb_step[d] {
            m -= 1;
            k = deg;
        }
        let xi = self.lobatto[d].nodes()[k];
        p.low[d] + p.step[d] * (m as Real + 0.5 * (xi + 1.0))
    }
}

impl TryFrom<LegendreParams> for RegularLegendreGrid {
    type Error = Error;

    fn try_from(params: LegendreParams) -> Result<Self> {
        let dim = params.low.len();
        ensure!(dim > 0, "a grid needs at least one dimension");
        ensure!(
            params.step.len() == dim && params.nb_step.len() == dim && params.degree.len() == dim,
            "inconsistent Legendre grid dimensions"
        );
        ensure!(
            params.step.iter().all(|&h| h > 0.0 && h.is_finite()),
            "mesh widths must be positive, got {:?}",
            params.step
        );
        ensure!(
            params.nb_step.iter().all(|&n| n >= 1),
            "every dimension needs at least one mesh"
        );
        let lobatto = params
            .degree
            .iter()
            .map(|&p| LobattoNodes::new(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { params, lobatto })
    }
}

impl From<RegularLegendreGrid> for LegendreParams {
    fn from(g: RegularLegendreGrid) -> Self {
        g.params
    }
}

impl Grid for RegularLegendreGrid {
    fn kind(&self) -> GridKind {
        GridKind::RegularLegendre
    }

    fn dimension(&self) -> usize {
        self.params.low.len()
    }

    fn nb_points(&self) -> usize {
        self.sizes().iter().product()
    }

    fn coordinates(&self, index: usize) -> Vec<Real> {
        multi_index(&self.sizes(), index)
            .iter()
            .enumerate()
            .map(|(d, &g)| self.axis_coordinate(d, g))
            .collect()
    }

    fn extreme_values(&self) -> Vec<[Real; 2]> {
        let p = &self.params;
        (0..self.dimension())
            .map(|d| [p.low[d], p.low[d] + p.nb_step[d] as Real * p.step[d]])
            .collect()
    }

    fn domain_policy(&self) -> DomainPolicy {
        self.params.policy
    }

    fn locate(&self, x: &[Real]) -> Cell {
        let p = &self.params;
        let dim = self.dimension();
        let mut lower = Vec::with_capacity(dim);
        let mut upper = Vec::with_capacity(dim);
        let mut factors = Vec::with_capacity(dim);
        for d in 0..dim {
            let nb = p.nb_step[d];
            let hi = p.low[d] + nb as Real * p.step[d];
            let xd = p.policy.apply(x[d], p.low[d], hi);
            let r = (xd - p.low[d]) / p.step[d];
            let m = (r.floor().max(0.0) as usize).min(nb - 1);
            let xi = 2.0 * (r - m as Real) - 1.0;
            let deg = p.degree[d];
            let weights = self.lobatto[d].lagrange_weights(xi);
            lower.push(p.low[d] + m as Real * p.step[d]);
            upper.push(p.low[d] + (m + 1) as Real * p.step[d]);
            factors.push(
                weights
                    .into_iter()
                    .enumerate()
                    .map(|(k, w)| (m * deg + k, w))
                    .collect(),
            );
        }
        Cell {
            lower,
            upper,
            support: tensor_support(&self.sizes(), &factors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn shared_mesh_endpoints() {
        let g = RegularLegendreGrid::new(vec![0.0], vec![1.0], vec![3], vec![2]).unwrap();
        assert_eq!(g.nb_points(), 7);
        let xs = g.axis_coordinates(0);
        assert_abs_diff_eq!(xs[0], 0.0);
        assert_abs_diff_eq!(xs[1], 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(xs[2], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(xs[6], 3.0, epsilon = 1e-14);
    }

    #[test]
    fn reproduces_polynomials_of_the_degree() {
        let g = RegularLegendreGrid::new(vec![-1.0, 0.0], vec![0.5, 2.0], vec![4, 1], vec![3, 2])
            .unwrap();
        let f = |x: &[Real]| x[0].powi(3) - x[0] * x[1] + 0.25 * x[1] * x[1];
        let values: Vec<Real> = (0..g.nb_points()).map(|i| f(&g.coordinates(i))).collect();
        for x in [[0.13, 1.7], [-0.9, 0.2], [0.99, 1.0]] {
            let v: Real = g
                .create_interpolator(&x)
                .support()
                .iter()
                .map(|&(i, w)| w * values[i])
                .sum();
            assert_abs_diff_eq!(v, f(&x), epsilon = 1e-10);
        }
    }

    #[test]
    fn serde_rebuilds_nodes() {
        let g = RegularLegendreGrid::new(vec![0.0], vec![1.0], vec![2], vec![4]).unwrap();
        let bytes = bincode::serialize(&g).unwrap();
        let back: RegularLegendreGrid = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn rejects_zero_meshes() {
        assert!(RegularLegendreGrid::new(vec![0.0], vec![1.0], vec![0], vec![2]).is_err());
    }
}
