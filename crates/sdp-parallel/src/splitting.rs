//! Splitting of a grid into per-rank index boxes.
//!
//! The rank count is factored into primes; each factor, largest first, is
//! given to the splittable dimension whose slices are currently the widest,
//! provided every slice keeps at least one point. The product of the factors
//! placed is the number of active ranks; ranks beyond it own an empty box.
//!
//! Grids without a tensor structure (Legendre, sparse) are seen as a single
//! axis of `nb_points` indices that is never split, so that rank 0 owns the
//! whole grid.

use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{
    full::{linear_index, multi_index},
    Grid, IndexBox, SpaceGrid,
};

/// Assignment of index boxes to ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSplitting {
    sizes: Vec<usize>,
    splits: Vec<usize>,
    nb_ranks: usize,
    tensor: bool,
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            out.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        out.push(n);
    }
    out.reverse();
    out
}

impl GridSplitting {
    /// Split a tensor index space of `points_per_dim` among `nb_ranks` ranks,
    /// along the dimensions flagged in `splittable` only.
    pub fn new(points_per_dim: &[usize], splittable: &[bool], nb_ranks: usize) -> Result<Self> {
        ensure!(nb_ranks >= 1, "at least one rank is needed");
        ensure!(
            points_per_dim.len() == splittable.len(),
            "{} splittable flags for {} dimensions",
            splittable.len(),
            points_per_dim.len()
        );
        let mut splits = vec![1; points_per_dim.len()];
        for p in prime_factors(nb_ranks) {
            let best = (0..points_per_dim.len())
                .filter(|&d| splittable[d] && splits[d] * p <= points_per_dim[d])
                .max_by(|&a, &b| {
                    let wa = points_per_dim[a] as Real / splits[a] as Real;
                    let wb = points_per_dim[b] as Real / splits[b] as Real;
                    wa.total_cmp(&wb)
                });
            if let Some(d) = best {
                splits[d] *= p;
            }
        }
        Ok(Self {
            sizes: points_per_dim.to_vec(),
            splits,
            nb_ranks,
            tensor: true,
        })
    }

    /// Splitting of `grid`. Grids that cannot be split are owned by rank 0.
    pub fn for_grid(grid: &SpaceGrid, splittable: &[bool], nb_ranks: usize) -> Result<Self> {
        match grid.sizes() {
            Some(sizes) if grid.is_splittable() => Self::new(&sizes, splittable, nb_ranks),
            _ => Ok(Self {
                tensor: false,
                ..Self::new(&[grid.nb_points()], &[false], nb_ranks)?
            }),
        }
    }

    /// Extent of the index space per dimension.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of slices per dimension.
    pub fn splits(&self) -> &[usize] {
        &self.splits
    }

    /// Ranks in the group.
    pub fn nb_ranks(&self) -> usize {
        self.nb_ranks
    }

    /// Ranks owning a non-empty box.
    pub fn nb_active(&self) -> usize {
        self.splits.iter().product()
    }

    /// Whether the boxes index a tensor grid.
    pub fn is_tensor(&self) -> bool {
        self.tensor
    }

    /// The box of the whole index space.
    pub fn full_box(&self) -> IndexBox {
        IndexBox::full(&self.sizes)
    }

    /// Box owned by `rank`.
    pub fn local_box(&self, rank: usize) -> IndexBox {
        if rank >= self.nb_active() {
            return IndexBox::empty(self.sizes.len());
        }
        let slice = multi_index(&self.splits, rank);
        let (lower, upper) = slice
            .iter()
            .zip(self.sizes.iter().zip(&self.splits))
            .map(|(&k, (&n, &s))| (k * n / s, (k + 1) * n / s))
            .unzip();
        IndexBox::new(lower, upper).unwrap_or_else(|_| IndexBox::empty(self.sizes.len()))
    }

    /// Boxes of every rank.
    pub fn boxes(&self) -> Vec<IndexBox> {
        (0..self.nb_ranks).map(|r| self.local_box(r)).collect()
    }

    /// Grid-global linear indices of the points of `index_box`, in box order.
    pub fn point_indices(&self, index_box: &IndexBox) -> Vec<usize> {
        index_box.global_indices(&self.sizes)
    }

    /// Coordinate bounds of the points of `index_box`; `None` for an empty
    /// box.
    pub fn region(&self, grid: &SpaceGrid, index_box: &IndexBox) -> Option<Vec<[Real; 2]>> {
        if index_box.is_empty() {
            return None;
        }
        if !self.tensor {
            return Some(grid.extreme_values());
        }
        let lower = grid.coordinates(linear_index(&self.sizes, index_box.lower()));
        let last: Vec<usize> = index_box.upper().iter().map(|u| u - 1).collect();
        let upper = grid.coordinates(linear_index(&self.sizes, &last));
        Some(lower.into_iter().zip(upper).map(|(l, u)| [l, u]).collect())
    }

    /// Smallest box of `grid` whose cells enclose `cone`, with at least two
    /// points per dimension when the grid has them. Grids that are not split
    /// are needed as a whole.
    pub fn cone_box(&self, grid: &SpaceGrid, cone: &[[Real; 2]]) -> Result<IndexBox> {
        if !self.tensor {
            return Ok(self.full_box());
        }
        ensure!(
            cone.len() == self.sizes.len(),
            "cone of dimension {} on a grid of dimension {}",
            cone.len(),
            self.sizes.len()
        );
        let mut lower = Vec::with_capacity(cone.len());
        let mut upper = Vec::with_capacity(cone.len());
        for (d, &[lo, hi]) in cone.iter().enumerate() {
            let coords = grid.axis_coordinates(d).unwrap_or_default();
            let n = coords.len();
            let mut first = coords.partition_point(|&c| c <= lo).saturating_sub(1);
            let mut end = (coords.partition_point(|&c| c < hi) + 1).min(n);
            if end < first + 2 {
                end = (first + 2).min(n);
                first = end.saturating_sub(2);
            }
            lower.push(first);
            upper.push(end);
        }
        IndexBox::new(lower, upper)
    }

    /// Sub-grid of `grid` spanned by `index_box`; the grid itself when it is
    /// not split.
    pub fn sub_grid(&self, grid: &SpaceGrid, index_box: &IndexBox) -> Result<SpaceGrid> {
        if self.tensor && *index_box != self.full_box() {
            grid.sub_grid(index_box)
        } else {
            Ok(grid.clone())
        }
    }
}

/// Positions, in the order of `outer`, of the points of `inner`.
pub fn positions_in(inner: &IndexBox, outer: &IndexBox) -> Vec<usize> {
    let inner_sizes = inner.sizes();
    let outer_sizes = outer.sizes();
    (0..inner.nb_points())
        .map(|k| {
            let shifted: Vec<usize> = multi_index(&inner_sizes, k)
                .iter()
                .zip(inner.lower().iter().zip(outer.lower()))
                .map(|(m, (il, ol))| m + il - ol)
                .collect();
            linear_index(&outer_sizes, &shifted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdp_grids::{RegularSpaceGrid, SparseSpaceGrid};

    #[test]
    fn factors() {
        assert_eq!(prime_factors(12), vec![3, 2, 2]);
        assert_eq!(prime_factors(7), vec![7]);
        assert!(prime_factors(1).is_empty());
    }

    #[test]
    fn boxes_tile_the_grid() {
        let s = GridSplitting::new(&[11, 5], &[true, true], 6).unwrap();
        assert_eq!(s.nb_active(), 6);
        let mut seen = vec![0; 55];
        for b in s.boxes() {
            for i in s.point_indices(&b) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn unsplittable_dimensions_stay_whole() {
        let s = GridSplitting::new(&[11, 5], &[false, true], 4).unwrap();
        assert_eq!(s.splits()[0], 1);
        assert_eq!(s.splits()[1], 4);
        let s = GridSplitting::new(&[3], &[true], 5).unwrap();
        assert_eq!(s.nb_active(), 1);
        assert!(s.local_box(1).is_empty());
        assert_eq!(s.local_box(0).nb_points(), 3);
    }

    #[test]
    fn sparse_grids_go_to_rank_zero() {
        let g: SpaceGrid = SparseSpaceGrid::new(vec![0.0; 2], vec![1.0; 2], 3, vec![1.0; 2], false)
            .unwrap()
            .into();
        let s = GridSplitting::for_grid(&g, &[true, true], 3).unwrap();
        assert!(!s.is_tensor());
        assert_eq!(s.local_box(0).nb_points(), g.nb_points());
        assert!(s.local_box(2).is_empty());
        assert_eq!(s.cone_box(&g, &[[0.2, 0.3]; 2]).unwrap(), s.full_box());
    }

    #[test]
    fn cone_encloses_cells() {
        let g: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![10]).unwrap().into();
        let s = GridSplitting::for_grid(&g, &[true], 2).unwrap();
        let b = s.cone_box(&g, &[[2.5, 5.5]]).unwrap();
        assert_eq!((b.lower()[0], b.upper()[0]), (2, 7));
        let b = s.cone_box(&g, &[[3.0, 5.0]]).unwrap();
        assert_eq!((b.lower()[0], b.upper()[0]), (3, 6));
        let b = s.cone_box(&g, &[[-5.0, -3.0]]).unwrap();
        assert_eq!((b.lower()[0], b.upper()[0]), (0, 2));
        let b = s.cone_box(&g, &[[-5.0, 50.0]]).unwrap();
        assert_eq!(b, s.full_box());
        assert_eq!(s.region(&g, &s.local_box(1)), Some(vec![[5.0, 10.0]]));
    }

    #[test]
    fn positions_follow_outer_order() {
        let outer = IndexBox::new(vec![1, 1], vec![4, 3]).unwrap();
        let inner = IndexBox::new(vec![2, 2], vec![4, 3]).unwrap();
        assert_eq!(positions_in(&inner, &outer), vec![4, 5]);
    }
}
