//! Multi-index scheme of tensor-product grids.
//!
//! Points are numbered with the first dimension varying fastest:
//! `linear = i_0 + n_0 * (i_1 + n_1 * (i_2 + ...))`.

use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::Result, Real};

/// Multi-index of a linear point index.
pub fn multi_index(sizes: &[usize], linear: usize) -> Vec<usize> {
    let mut rest = linear;
    sizes
        .iter()
        .map(|&n| {
            let i = rest % n;
            rest /= n;
            i
        })
        .collect()
}

/// Linear point index of a multi-index.
pub fn linear_index(sizes: &[usize], multi: &[usize]) -> usize {
    debug_assert_eq!(sizes.len(), multi.len());
    sizes
        .iter()
        .zip(multi)
        .rev()
        .fold(0, |acc, (&n, &i)| acc * n + i)
}

/// Half-open box of multi-indices `[lower, upper)` in a tensor grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    lower: Vec<usize>,
    upper: Vec<usize>,
}

impl IndexBox {
    /// Box `[lower, upper)`. Empty along a dimension when `upper <= lower`.
    pub fn new(lower: Vec<usize>, upper: Vec<usize>) -> Result<Self> {
        ensure!(
            lower.len() == upper.len(),
            "index box bounds of different dimensions ({} and {})",
            lower.len(),
            upper.len()
        );
        let upper = upper
            .into_iter()
            .zip(&lower)
            .map(|(u, &l)| u.max(l))
            .collect();
        Ok(Self { lower, upper })
    }

    /// The box covering a whole grid with `sizes` points per dimension.
    pub fn full(sizes: &[usize]) -> Self {
        Self {
            lower: vec![0; sizes.len()],
            upper: sizes.to_vec(),
        }
    }

    /// An empty box.
    pub fn empty(dimension: usize) -> Self {
        Self {
            lower: vec![0; dimension],
            upper: vec![0; dimension],
        }
    }

    /// Inclusive lower multi-index.
    pub fn lower(&self) -> &[usize] {
        &self.lower
    }

    /// Exclusive upper multi-index.
    pub fn upper(&self) -> &[usize] {
        &self.upper
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Number of indices per dimension.
    pub fn sizes(&self) -> Vec<usize> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(l, u)| u - l)
            .collect()
    }

    /// Number of points in the box.
    pub fn nb_points(&self) -> usize {
        self.sizes().iter().product()
    }

    /// Whether the box holds no point.
    pub fn is_empty(&self) -> bool {
        self.nb_points() == 0
    }

    /// Whether `multi` lies in the box.
    pub fn contains(&self, multi: &[usize]) -> bool {
        multi
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&i, (&l, &u))| i >= l && i < u)
    }

    /// Intersection with another box of the same dimension.
    pub fn intersect(&self, other: &IndexBox) -> IndexBox {
        let lower: Vec<usize> = self
            .lower
            .iter()
            .zip(&other.lower)
            .map(|(a, b)| *a.max(b))
            .collect();
        let upper = self
            .upper
            .iter()
            .zip(&other.upper)
            .zip(&lower)
            .map(|((a, b), l)| (*a.min(b)).max(*l))
            .collect();
        IndexBox { lower, upper }
    }

    /// Grid-global linear indices (in a grid of `grid_sizes`) of the box
    /// points, in box order (first dimension fastest).
    pub fn global_indices(&self, grid_sizes: &[usize]) -> Vec<usize> {
        let local = self.sizes();
        let n = self.nb_points();
        let mut out = Vec::with_capacity(n);
        let mut multi = vec![0; self.dimension()];
        for k in 0..n {
            let m = multi_index(&local, k);
            for ((g, l), lo) in multi.iter_mut().zip(&m).zip(&self.lower) {
                *g = l + lo;
            }
            out.push(linear_index(grid_sizes, &multi));
        }
        out
    }
}

/// Per-dimension interval search on increasing breakpoints: `k` such that
/// `xs[k] <= x < xs[k + 1]`, clamped to `[0, n - 2]`.
pub(crate) fn locate_axis(xs: &[Real], x: Real) -> usize {
    let n = xs.len();
    if n < 2 || x <= xs[0] {
        return 0;
    }
    if x >= xs[n - 1] {
        return n - 2;
    }
    let mut lo = 0;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if xs[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Tensor product of per-dimension `(axis index, weight)` factors, with zero
/// weights dropped.
pub(crate) fn tensor_support(sizes: &[usize], factors: &[Vec<(usize, Real)>]) -> Vec<(usize, Real)> {
    let mut support: Vec<(Vec<usize>, Real)> = vec![(Vec::with_capacity(sizes.len()), 1.0)];
    for factor in factors {
        let mut next = Vec::with_capacity(support.len() * factor.len());
        for (multi, w) in &support {
            for &(i, wi) in factor {
                if wi == 0.0 {
                    continue;
                }
                let mut m = multi.clone();
                m.push(i);
                next.push((m, w * wi));
            }
        }
        support = next;
    }
    support
        .into_iter()
        .map(|(m, w)| (linear_index(sizes, &m), w))
        .collect()
}

/// Linear factor of one dimension: indices `k`, `k + 1` with weights
/// `1 - t`, `t`. A single-point axis yields the point itself.
pub(crate) fn linear_factor(nb_axis: usize, k: usize, t: Real) -> Vec<(usize, Real)> {
    if nb_axis < 2 {
        vec![(0, 1.0)]
    } else {
        vec![(k, 1.0 - t), (k + 1, t)]
    }
}
