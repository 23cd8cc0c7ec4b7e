//! Anisotropic sparse grids.
//!
//! A sparse grid of level `L` with weights `w` keeps the multi-levels `l`
//! satisfying `sum_d (max(l_d, 1) - 1) * w_d <= L - 1`. The bound variant adds
//! a level 0 holding the two domain boundaries in every dimension; the
//! no-bound variant starts at level 1 (the domain centre) and extrapolates
//! linearly towards the boundary.
//!
//! Values on a sparse grid are interpolated from hierarchical coefficients:
//! see [`hierarchization`].

/// One-dimensional hierarchical bases.
pub mod basis;

/// Hierarchization and dehierarchization of nodal values.
pub mod hierarchization;

use std::collections::HashMap;

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{
    constants::TINY,
    ensure,
    errors::{Error, Result},
    Real,
};

use crate::grid::{Cell, DomainPolicy, Grid, GridKind};

/// Deepest 1-D level a sparse grid may use.
pub const MAX_LEVEL_1D: u8 = 30;

/// Hierarchical label of a sparse grid point: `(level, position)` per
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseKey {
    /// 1-D level per dimension.
    pub levels: Vec<u8>,
    /// 1-D position per dimension.
    pub positions: Vec<u32>,
}

/// Persisted description of a [`SparseSpaceGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseParams {
    /// Lower corner of the domain.
    pub low: Vec<Real>,
    /// Domain width per dimension.
    pub size_domain: Vec<Real>,
    /// Sparse level `L >= 1`.
    pub level: usize,
    /// Anisotropy weight per dimension (positive).
    pub weight: Vec<Real>,
    /// Whether boundary points (level 0) are included.
    pub with_boundary: bool,
    /// Out-of-domain policy.
    #[serde(default)]
    pub policy: DomainPolicy,
}

/// Sparse grid with or without boundary points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SparseParams", into = "SparseParams")]
pub struct SparseSpaceGrid {
    params: SparseParams,
    multi_levels: Vec<Vec<u8>>,
    points: Vec<SparseKey>,
    lookup: HashMap<SparseKey, usize>,
    max_level: Vec<u8>,
}

impl PartialEq for SparseSpaceGrid {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.points == other.points
    }
}

impl SparseSpaceGrid {
    /// Build a sparse grid on `[low, low + size_domain]`.
    pub fn new(
        low: Vec<Real>,
        size_domain: Vec<Real>,
        level: usize,
        weight: Vec<Real>,
        with_boundary: bool,
    ) -> Result<Self> {
        Self::try_from(SparseParams {
            low,
            size_domain,
            level,
            weight,
            with_boundary,
            policy: DomainPolicy::default(),
        })
    }

    /// Copy with another out-of-domain policy.
    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.params.policy = policy;
        self
    }

    /// Construction parameters.
    pub fn params(&self) -> &SparseParams {
        &self.params
    }

    /// Whether boundary points are present.
    pub fn with_boundary(&self) -> bool {
        self.params.with_boundary
    }

    /// Sparse level.
    pub fn level(&self) -> usize {
        self.params.level
    }

    /// Hierarchical labels of the points, indexed like the values.
    pub fn points(&self) -> &[SparseKey] {
        &self.points
    }

    /// Index of the point with the given label.
    pub fn index_of(&self, key: &SparseKey) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// Admissible multi-levels.
    pub fn multi_levels(&self) -> &[Vec<u8>] {
        &self.multi_levels
    }

    /// Coordinates of `x` mapped onto the unit cube after applying the
    /// domain policy.
    fn to_unit(&self, x: &[Real]) -> Vec<Real> {
        let p = &self.params;
        x.iter()
            .zip(p.low.iter().zip(&p.size_domain))
            .map(|(&xi, (&lo, &size))| (p.policy.apply(xi, lo, lo + size) - lo) / size)
            .collect()
    }

    /// Nodal values from hierarchical coefficients.
    pub fn dehierarchize(&self, coefficients: &DVector<Real>) -> Result<DVector<Real>> {
        hierarchization::dehierarchize(self, coefficients)
    }

    #[cfg(test)]
    pub(crate) fn remove_point(&mut self, index: usize) {
        self.points.remove(index);
        self.lookup = self
            .points
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
    }
}

fn admissible_levels(params: &SparseParams) -> Vec<Vec<u8>> {
    let budget = params.level as Real - 1.0 + TINY;
    let first: u8 = if params.with_boundary { 0 } else { 1 };
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(params.weight.len());
    fn recurse(
        weight: &[Real],
        first: u8,
        budget: Real,
        current: &mut Vec<u8>,
        out: &mut Vec<Vec<u8>>,
    ) {
        let d = current.len();
        if d == weight.len() {
            out.push(current.clone());
            return;
        }
        let mut l = first;
        loop {
            let cost = (l.max(1) - 1) as Real * weight[d];
            if cost > budget || l > MAX_LEVEL_1D {
                break;
            }
            current.push(l);
            recurse(weight, first, budget - cost, current, out);
            current.pop();
            l += 1;
        }
    }
    recurse(&params.weight, first, budget, &mut current, &mut out);
    out
}

fn positions_1d(level: u8) -> Vec<u32> {
    if level == 0 {
        vec![0, 1]
    } else {
        (1..(1u32 << level)).step_by(2).collect()
    }
}

impl TryFrom<SparseParams> for SparseSpaceGrid {
    type Error = Error;

    fn try_from(params: SparseParams) -> Result<Self> {
        let dim = params.low.len();
        ensure!(dim > 0, "a grid needs at least one dimension");
        ensure!(
            params.size_domain.len() == dim && params.weight.len() == dim,
            "inconsistent sparse grid dimensions"
        );
        ensure!(params.level >= 1, "sparse level must be at least 1");
        ensure!(
            params.size_domain.iter().all(|&s| s > 0.0 && s.is_finite()),
            "domain sizes must be positive, got {:?}",
            params.size_domain
        );
        ensure!(
            params.weight.iter().all(|&w| w > 0.0 && w.is_finite()),
            "anisotropy weights must be positive, got {:?}",
            params.weight
        );
        ensure!(
            params
                .weight
                .iter()
                .all(|&w| (params.level as Real - 1.0) / w < MAX_LEVEL_1D as Real),
            "sparse level {} too deep for weights {:?}",
            params.level,
            params.weight
        );

        let multi_levels = admissible_levels(&params);
        let mut points = Vec::new();
        for levels in &multi_levels {
            let per_dim: Vec<Vec<u32>> = levels.iter().map(|&l| positions_1d(l)).collect();
            let count: usize = per_dim.iter().map(Vec::len).product();
            for k in 0..count {
                let mut rest = k;
                let positions = per_dim
                    .iter()
                    .map(|p| {
                        let i = p[rest % p.len()];
                        rest /= p.len();
                        i
                    })
                    .collect();
                points.push(SparseKey {
                    levels: levels.clone(),
                    positions,
                });
            }
        }
        let lookup = points
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        let max_level = (0..dim)
            .map(|d| multi_levels.iter().map(|l| l[d]).max().unwrap_or(1).max(1))
            .collect();
        debug!(
            "sparse grid: dimension {dim}, level {}, {} multi-levels, {} points",
            params.level,
            multi_levels.len(),
            points.len()
        );
        Ok(Self {
            params,
            multi_levels,
            points,
            lookup,
            max_level,
        })
    }
}

impl From<SparseSpaceGrid> for SparseParams {
    fn from(g: SparseSpaceGrid) -> Self {
        g.params
    }
}

impl Grid for SparseSpaceGrid {
    fn kind(&self) -> GridKind {
        if self.params.with_boundary {
            GridKind::SparseBound
        } else {
            GridKind::SparseNoBound
        }
    }

    fn dimension(&self) -> usize {
        self.params.low.len()
    }

    fn nb_points(&self) -> usize {
        self.points.len()
    }

    fn coordinates(&self, index: usize) -> Vec<Real> {
        let key = &self.points[index];
        let p = &self.params;
        key.levels
            .iter()
            .zip(&key.positions)
            .enumerate()
            .map(|(d, (&l, &i))| p.low[d] + p.size_domain[d] * basis::node(l, i))
            .collect()
    }

    fn extreme_values(&self) -> Vec<[Real; 2]> {
        let p = &self.params;
        p.low
            .iter()
            .zip(&p.size_domain)
            .map(|(&lo, &s)| [lo, lo + s])
            .collect()
    }

    fn domain_policy(&self) -> DomainPolicy {
        self.params.policy
    }

    fn locate(&self, x: &[Real]) -> Cell {
        let p = &self.params;
        let wb = p.with_boundary;
        let u = self.to_unit(x);
        let dim = self.dimension();

        let mut support = Vec::new();
        for levels in &self.multi_levels {
            // per dimension, the 1-D functions of this level not vanishing at u
            let mut combos: Vec<(Vec<u32>, Real)> = vec![(Vec::with_capacity(dim), 1.0)];
            for (&l, &ud) in levels.iter().zip(&u) {
                let candidates: Vec<(u32, Real)> = if l == 0 {
                    vec![(0, basis::phi(0, 0, ud, wb)), (1, basis::phi(0, 1, ud, wb))]
                } else {
                    let i = basis::containing_position(l, ud);
                    vec![(i, basis::phi(l, i, ud, wb))]
                };
                let mut next = Vec::with_capacity(combos.len() * candidates.len());
                for (pos, w) in &combos {
                    for &(i, wi) in &candidates {
                        if wi == 0.0 {
                            continue;
                        }
                        let mut q = pos.clone();
                        q.push(i);
                        next.push((q, w * wi));
                    }
                }
                combos = next;
            }
            for (positions, w) in combos {
                let key = SparseKey {
                    levels: levels.clone(),
                    positions,
                };
                if let Some(&idx) = self.lookup.get(&key) {
                    support.push((idx, w));
                }
            }
        }

        let mut lower = Vec::with_capacity(dim);
        let mut upper = Vec::with_capacity(dim);
        for d in 0..dim {
            let h = 1.0 / (1u64 << self.max_level[d]) as Real;
            let k = (u[d] / h).floor().clamp(0.0, 1.0 / h - 1.0);
            lower.push(p.low[d] + p.size_domain[d] * k * h);
            upper.push(p.low[d] + p.size_domain[d] * (k + 1.0) * h);
        }
        Cell {
            lower,
            upper,
            support,
        }
    }

    fn to_hierarchize(&self, values: &DVector<Real>) -> Result<DVector<Real>> {
        hierarchization::hierarchize(self, values)
    }

    fn to_hierarchize_vec(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        hierarchization::hierarchize_matrix(self, values)
    }
}
