//! Tensor grid with arbitrary breakpoints.

use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::Result, Real};

use crate::full::{linear_factor, locate_axis, multi_index, tensor_support, IndexBox};
use crate::grid::{Cell, DomainPolicy, Grid, GridKind};

/// Tensor grid whose points along each dimension are given by a strictly
/// increasing list of breakpoints. Cell lookup is a binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSpaceGrid {
    meshes: Vec<Vec<Real>>,
    #[serde(default)]
    policy: DomainPolicy,
}

impl GeneralSpaceGrid {
    /// Build the grid from the breakpoints of every dimension.
    pub fn new(meshes: Vec<Vec<Real>>) -> Result<Self> {
        ensure!(!meshes.is_empty(), "a grid needs at least one dimension");
        for (d, mesh) in meshes.iter().enumerate() {
            ensure!(!mesh.is_empty(), "no breakpoint in dimension {d}");
            ensure!(
                mesh.windows(2).all(|w| w[1] > w[0]),
                "breakpoints of dimension {d} are not strictly increasing"
            );
        }
        Ok(Self {
            meshes,
            policy: DomainPolicy::default(),
        })
    }

    /// Copy with another out-of-domain policy.
    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Breakpoints of every dimension.
    pub fn meshes(&self) -> &[Vec<Real>] {
        &self.meshes
    }

    /// Points per dimension.
    pub fn sizes(&self) -> Vec<usize> {
        self.meshes.iter().map(Vec::len).collect()
    }

    /// Coordinates of the points along dimension `d`.
    pub fn axis_coordinates(&self, d: usize) -> Vec<Real> {
        self.meshes[d].clone()
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
        let meshes = self
            .meshes
            .iter()
            .zip(index_box.lower().iter().zip(index_box.upper()))
            .map(|(m, (&l, &u))| m[l..u].to_vec())
            .collect();
        Ok(Self {
            meshes,
            policy: self.policy,
        })
    }
}

impl Grid for GeneralSpaceGrid {
    fn kind(&self) -> GridKind {
        GridKind::General
    }

    fn dimension(&self) -> usize {
        self.meshes.len()
    }

    fn nb_points(&self) -> usize {
        self.meshes.iter().map(Vec::len).product()
    }

    fn coordinates(&self, index: usize) -> Vec<Real> {
        self.multi_index(index)
            .iter()
            .zip(&self.meshes)
            .map(|(&i, m)| m[i])
            .collect()
    }

    fn extreme_values(&self) -> Vec<[Real; 2]> {
        self.meshes
            .iter()
            .map(|m| [m[0], m[m.len() - 1]])
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
        for (mesh, &xd) in self.meshes.iter().zip(x) {
            let n = mesh.len();
            let xi = self.policy.apply(xd, mesh[0], mesh[n - 1]);
            if n < 2 {
                // a lone breakpoint carries a constant basis function
                lower.push(mesh[0]);
                upper.push(mesh[0]);
                factors.push(linear_factor(n, 0, 0.0));
                continue;
            }
            let k = locate_axis(mesh, xi);
            let t = (xi - mesh[k]) / (mesh[k + 1] - mesh[k]);
            lower.push(mesh[k]);
            upper.push(mesh[k + 1]);
            factors.push(linear_factor(n, k, t));
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

    fn grid() -> GeneralSpaceGrid {
        GeneralSpaceGrid::new(vec![vec![0.0, 1.0, 3.0, 7.0], vec![-2.0, 2.0]]).unwrap()
    }

    #[test]
    fn coordinates_follow_breakpoints() {
        let g = grid();
        assert_eq!(g.nb_points(), 8);
        assert_eq!(g.coordinates(5), vec![1.0, 2.0]);
        assert_eq!(g.extreme_values(), vec![[0.0, 7.0], [-2.0, 2.0]]);
    }

    #[test]
    fn affine_reproduction_with_extrapolation() {
        let g = grid();
        let f = |x: &[Real]| 2.0 - x[0] + 0.5 * x[1];
        let values: Vec<Real> = (0..g.nb_points()).map(|i| f(&g.coordinates(i))).collect();
        for x in [[2.0, 0.3], [6.5, -1.9], [-1.0, 3.0], [9.0, 0.0]] {
            let interp: Real = g
                .locate(&x)
                .support
                .iter()
                .map(|&(i, w)| w * values[i])
                .sum();
            assert_abs_diff_eq!(interp, f(&x), epsilon = 1e-12);
        }
    }

    #[test]
    fn lone_breakpoint_under_both_policies() {
        let values = [1.0, 4.0];
        for policy in [DomainPolicy::Extrapolate, DomainPolicy::Clamp] {
            let g = GeneralSpaceGrid::new(vec![vec![2.0], vec![0.0, 1.0]])
                .unwrap()
                .with_domain_policy(policy);
            assert_eq!(g.nb_points(), 2);
            for x in [[2.0, 0.25], [-5.0, 0.25], [9.0, 0.25]] {
                let cell = g.locate(&x);
                assert_eq!(cell.lower[0], 2.0);
                assert_eq!(cell.upper[0], 2.0);
                let interp: Real = cell.support.iter().map(|&(i, w)| w * values[i]).sum();
                assert_abs_diff_eq!(interp, 1.75, epsilon = 1e-12);
            }
        }
        let clamped = GeneralSpaceGrid::new(vec![vec![2.0], vec![0.0, 1.0]])
            .unwrap()
            .with_domain_policy(DomainPolicy::Clamp)
            .locate(&[9.0, 3.0]);
        assert_eq!(clamped.support, vec![(1, 1.0)]);
    }

    #[test]
    fn rejects_unsorted_breakpoints() {
        assert!(GeneralSpaceGrid::new(vec![vec![0.0, 2.0, 1.0]]).is_err());
        assert!(GeneralSpaceGrid::new(vec![vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn sub_grid_slices_breakpoints() {
        let g = grid();
        let b = IndexBox::new(vec![1, 0], vec![3, 2]).unwrap();
        let s = g.sub_grid(&b).unwrap();
        assert_eq!(s.meshes(), &[vec![1.0, 3.0], vec![-2.0, 2.0]]);
    }
}
