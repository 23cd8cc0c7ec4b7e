//! Uniform tensor grid.

use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::Result, Real};

use crate::full::{linear_factor, multi_index, tensor_support, IndexBox};
use crate::grid::{Cell, DomainPolicy, Grid, GridKind};

/// Tensor grid with `nb_step[d] + 1` equally spaced points from `low[d]` with
/// spacing `step[d]` in each dimension. Cell lookup is O(1) per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularSpaceGrid {
    low: Vec<Real>,
    step: Vec<Real>,
    nb_step: Vec<usize>,
    #[serde(default)]
    policy: DomainPolicy,
}

impl RegularSpaceGrid {
    /// Build the grid. `step` must be positive in every dimension.
    pub fn new(low: Vec<Real>, step: Vec<Real>, nb_step: Vec<usize>) -> Result<Self> {
        ensure!(!low.is_empty(), "a grid needs at least one dimension");
        ensure!(
            low.len() == step.len() && low.len() == nb_step.len(),
            "inconsistent grid dimensions: {} lows, {} steps, {} step counts",
            low.len(),
            step.len(),
            nb_step.len()
        );
        ensure!(
            step.iter().all(|&h| h > 0.0 && h.is_finite()),
            "grid steps must be positive, got {step:?}"
        );
        Ok(Self {
            low,
            step,
            nb_step,
            policy: DomainPolicy::default(),
        })
    }

    /// Copy with another out-of-domain policy.
    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lower corner.
    pub fn low(&self) -> &[Real] {
        &self.low
    }

    /// Mesh size per dimension.
    pub fn step(&self) -> &[Real] {
        &self.step
    }

    /// Number of meshes per dimension.
    pub fn nb_step(&self) -> &[usize] {
        &self.nb_step
    }

    /// Points per dimension.
    pub fn sizes(&self) -> Vec<usize> {
        self.nb_step.iter().map(|n| n + 1).collect()
    }

    /// Coordinates of the points along dimension `d`.
    pub fn axis_coordinates(&self, d: usize) -> Vec<Real> {
        (0..=self.nb_step[d])
            .map(|i| self.low[d] + i as Real * self.step[d])
            .collect()
    }

    /// Multi-index of point `linear`.
    pub fn multi_index(&self, linear: usize) -> Vec<usize> {
        multi_index(&self.sizes(), linear)
    }

    /// Linear index of a multi-index.
    pub fn linear_index(&self, multi: &[usize]) -> usize {
        crate::full::linear_index(&self.sizes(), multi)
    }

    /// The grid spanned by the points of `index_box`.
    pub fn sub_grid(&self, index_box: &IndexBox) -> Result<Self> {
        let sizes = self.sizes();
        ensure!(
            index_box.dimension() == sizes.len(),
            "index box of dimension {} on a grid of dimension {}",
            index_box.dimension(),
            sizes.len()
        );
        ensure!(!index_box.is_empty(), "empty index box");
        ensure!(
            index_box.upper().iter().zip(&sizes).all(|(u, n)| u <= n),
            "index box {index_box:?} exceeds grid sizes {sizes:?}"
        );
        let low = self
            .low
            .iter()
            .zip(&self.step)
            .zip(index_box.lower())
            .map(|((lo, h), &i)| lo + i as Real * h)
            .collect();
        let nb_step = index_box.sizes().iter().map(|n| n - 1).collect();
        Ok(Self {
            low,
            step: self.step.clone(),
            nb_step,
            policy: self.policy,
        })
    }
}

impl Grid for RegularSpaceGrid {
    fn kind(&self) -> GridKind {
        GridKind::Regular
    }

    fn dimension(&self) -> usize {
        self.low.len()
    }

    fn nb_points(&self) -> usize {
        self.nb_step.iter().map(|n| n + 1).product()
    }

    fn coordinates(&self, index: usize) -> Vec<Real> {
        self.multi_index(index)
            .iter()
            .enumerate()
            .map(|(d, &i)| self.low[d] + i as Real * self.step[d])
            .collect()
    }

    fn extreme_values(&self) -> Vec<[Real; 2]> {
        (0..self.dimension())
            .map(|d| {
                [
                    self.low[d],
                    self.low[d] + self.nb_step[d] as Real * self.step[d],
                ]
            })
            .collect()
    }

    fn domain_policy(&self) -> DomainPolicy {
        self.policy
    }

    fn locate(&self, x: &[Real]) -> Cell {
        let dim = self.dimension();
        let mut lower = Vec::with_capacity(dim);
        let mut upper = Vec::with_capacity(dim);
        let mut factors = Vec::with_capacity(dim);
        for d in 0..dim {
            let n = self.nb_step[d];
            let hi = self.low[d] + n as Real * self.step[d];
            let xi = self.policy.apply(x[d], self.low[d], hi);
            if n == 0 {
                lower.push(self.low[d]);
                upper.push(self.low[d]);
                factors.push(linear_factor(1, 0, 0.0));
                continue;
            }
            let r = (xi - self.low[d]) / self.step[d];
            let k = (r.floor().max(0.0) as usize).min(n - 1);
            let t = r - k as Real;
            lower.push(self.low[d] + k as Real * self.step[d]);
            upper.push(self.low[d] + (k + 1) as Real * self.step[d]);
            factors.push(linear_factor(n + 1, k, t));
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

    fn grid_2d() -> RegularSpaceGrid {
        RegularSpaceGrid::new(vec![0.0, -1.0], vec![0.5, 1.0], vec![4, 2]).unwrap()
    }

    #[test]
    fn sizes_and_coordinates() {
        let g = grid_2d();
        assert_eq!(g.nb_points(), 15);
        assert_eq!(g.coordinates(0), vec![0.0, -1.0]);
        assert_eq!(g.coordinates(6), vec![0.5, 0.0]);
        assert_eq!(g.extreme_values(), vec![[0.0, 2.0], [-1.0, 1.0]]);
    }

    #[test]
    fn locate_inside() {
        let g = grid_2d();
        let cell = g.locate(&[0.75, 0.5]);
        assert_eq!(cell.lower, vec![0.5, 0.0]);
        assert_eq!(cell.upper, vec![1.0, 1.0]);
        let total: Real = cell.support.iter().map(|s| s.1).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-14);
        assert_eq!(cell.support.len(), 4);
    }

    #[test]
    fn locate_at_node_has_single_support() {
        let g = grid_2d();
        let cell = g.locate(&g.coordinates(7));
        assert_eq!(cell.support, vec![(7, 1.0)]);
    }

    #[test]
    fn clamp_policy_stays_in_domain() {
        let g = grid_2d().with_domain_policy(DomainPolicy::Clamp);
        let cell = g.locate(&[5.0, -3.0]);
        assert_eq!(cell.support, vec![(4, 1.0)]);
    }

    #[test]
    fn sub_grid_shifts_origin() {
        let g = grid_2d();
        let b = IndexBox::new(vec![1, 1], vec![4, 3]).unwrap();
        let s = g.sub_grid(&b).unwrap();
        assert_eq!(s.low(), &[0.5, 0.0]);
        assert_eq!(s.nb_step(), &[2, 1]);
        assert_eq!(s.nb_points(), 6);
    }

    #[test]
    fn degenerate_dimension() {
        let g = RegularSpaceGrid::new(vec![1.0, 0.0], vec![1.0, 1.0], vec![0, 3]).unwrap();
        assert_eq!(g.nb_points(), 4);
        let cell = g.locate(&[7.0, 1.5]);
        assert_eq!(cell.support.len(), 2);
        let clamped = g.with_domain_policy(DomainPolicy::Clamp).locate(&[7.0, 1.5]);
        assert_eq!(clamped.support, cell.support);
        assert_eq!(clamped.lower[0], 1.0);
    }

    #[test]
    fn rejects_bad_steps() {
        assert!(RegularSpaceGrid::new(vec![0.0], vec![0.0], vec![3]).is_err());
        assert!(RegularSpaceGrid::new(vec![0.0], vec![1.0, 1.0], vec![3]).is_err());
    }
}
