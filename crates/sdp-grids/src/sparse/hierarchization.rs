//! Hierarchization of sparse grid values.
//!
//! The transform is a tensor product of 1-D transforms, applied as one
//! unidirectional pass per dimension. Along dimension `d`, every point `p` is
//! linked to the points obtained by replacing its `(level, position)` in `d`
//! with each of its 1-D ancestors; the link weight is the ancestor's basis
//! function evaluated at `p`'s node.
//!
//! * hierarchize: for `d = 0, 1, ...`, visit points by increasing level in
//!   `d` and subtract the weighted ancestor coefficients;
//! * dehierarchize: for `d = ..., 1, 0`, visit points by decreasing level in
//!   `d` and add them back.

use nalgebra::{DMatrix, DVector};

use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

use super::{basis, SparseKey, SparseSpaceGrid};
use crate::grid::Grid;

/// Point index with its weighted ancestors along one dimension.
type Links = Vec<(usize, Vec<(usize, Real)>)>;

/// Links of every point along dimension `d`, sorted by increasing level in
/// `d`.
fn pass_links(grid: &SparseSpaceGrid, d: usize) -> Result<Links> {
    let wb = grid.with_boundary();
    let mut links = Vec::with_capacity(grid.nb_points());
    for (idx, key) in grid.points().iter().enumerate() {
        let (l, i) = (key.levels[d], key.positions[d]);
        let x = basis::node(l, i);
        let mut anc = Vec::new();
        for (la, ia) in basis::ancestors(l, i, wb) {
            let w = basis::phi(la, ia, x, wb);
            if w == 0.0 {
                continue;
            }
            let mut parent: SparseKey = key.clone();
            parent.levels[d] = la;
            parent.positions[d] = ia;
            let a = grid.index_of(&parent).ok_or_else(|| {
                Error::GridInconsistency(format!(
                    "point {idx} {key:?} has no ancestor ({la}, {ia}) in dimension {d}"
                ))
            })?;
            anc.push((a, w));
        }
        links.push((idx, anc));
    }
    links.sort_by_key(|(idx, _)| grid.points()[*idx].levels[d]);
    Ok(links)
}

/// Hierarchical coefficients of several functions; `values` has one row per
/// function and one column per grid point.
pub fn hierarchize_matrix(grid: &SparseSpaceGrid, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
    ensure!(
        values.ncols() == grid.nb_points(),
        "{} columns of values for {} sparse grid points",
        values.ncols(),
        grid.nb_points()
    );
    let mut out = values.clone();
    for d in 0..grid.dimension() {
        for (p, anc) in pass_links(grid, d)? {
            for (a, w) in anc {
                for r in 0..out.nrows() {
                    out[(r, p)] -= w * out[(r, a)];
                }
            }
        }
    }
    Ok(out)
}

/// Nodal values of several functions from their hierarchical coefficients.
pub fn dehierarchize_matrix(
    grid: &SparseSpaceGrid,
    coefficients: &DMatrix<Real>,
) -> Result<DMatrix<Real>> {
    ensure!(
        coefficients.ncols() == grid.nb_points(),
        "{} columns of coefficients for {} sparse grid points",
        coefficients.ncols(),
        grid.nb_points()
    );
    let mut out = coefficients.clone();
    for d in (0..grid.dimension()).rev() {
        for (p, anc) in pass_links(grid, d)?.into_iter().rev() {
            for (a, w) in anc {
                for r in 0..out.nrows() {
                    out[(r, p)] += w * out[(r, a)];
                }
            }
        }
    }
    Ok(out)
}

/// Hierarchical coefficients of a single function.
pub fn hierarchize(grid: &SparseSpaceGrid, nodal: &DVector<Real>) -> Result<DVector<Real>> {
    let row = DMatrix::from_row_slice(1, nodal.len(), nodal.as_slice());
    let h = hierarchize_matrix(grid, &row)?;
    Ok(DVector::from_iterator(h.ncols(), h.row(0).iter().copied()))
}

/// Nodal values of a single function.
pub fn dehierarchize(grid: &SparseSpaceGrid, coefficients: &DVector<Real>) -> Result<DVector<Real>> {
    let row = DMatrix::from_row_slice(1, coefficients.len(), coefficients.as_slice());
    let n = dehierarchize_matrix(grid, &row)?;
    Ok(DVector::from_iterator(n.ncols(), n.row(0).iter().copied()))
}

/// Label of the root point: the lower corner (level 0, position 0) with
/// boundary points, the domain centre (level 1, position 1) without.
pub fn root(grid: &SparseSpaceGrid) -> (Vec<u8>, Vec<u32>) {
    let dim = grid.dimension();
    if grid.with_boundary() {
        (vec![0; dim], vec![0; dim])
    } else {
        (vec![1; dim], vec![1; dim])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn nodal(grid: &SparseSpaceGrid, f: impl Fn(&[Real]) -> Real) -> DVector<Real> {
        DVector::from_iterator(
            grid.nb_points(),
            (0..grid.nb_points()).map(|i| f(&grid.coordinates(i))),
        )
    }

    #[test]
    fn one_dimensional_surpluses() {
        let g = SparseSpaceGrid::new(vec![0.0], vec![1.0], 2, vec![1.0], true).unwrap();
        let v = nodal(&g, |x| x[0] * x[0]);
        let h = hierarchize(&g, &v).unwrap();
        // level-0 coefficients are the boundary values
        let at = |l: u8, i: u32| {
            g.index_of(&SparseKey {
                levels: vec![l],
                positions: vec![i],
            })
            .unwrap()
        };
        assert_abs_diff_eq!(h[at(0, 0)], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(h[at(0, 1)], 1.0, epsilon = 1e-14);
        // x^2 at 0.5 minus the linear part 0.5
        assert_abs_diff_eq!(h[at(1, 1)], -0.25, epsilon = 1e-14);
        assert_abs_diff_eq!(h[at(2, 1)], -1.0 / 16.0, epsilon = 1e-14);
    }

    #[test]
    fn round_trip_both_variants() {
        for wb in [true, false] {
            let g = SparseSpaceGrid::new(vec![0.0; 3], vec![1.0; 3], 4, vec![1.0; 3], wb).unwrap();
            let v = nodal(&g, |x| (x[0] * 3.0).sin() + x[1] * x[2]);
            let back = dehierarchize(&g, &hierarchize(&g, &v).unwrap()).unwrap();
            for (a, b) in v.iter().zip(back.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn constant_has_single_root_coefficient_without_boundary() {
        let g = SparseSpaceGrid::new(vec![0.0; 2], vec![1.0; 2], 3, vec![1.0; 2], false).unwrap();
        let v = DVector::from_element(g.nb_points(), 2.5);
        let h = hierarchize(&g, &v).unwrap();
        let (levels, positions) = root(&g);
        let r = g.index_of(&SparseKey { levels, positions }).unwrap();
        for (i, c) in h.iter().enumerate() {
            let expected = if i == r { 2.5 } else { 0.0 };
            assert_abs_diff_eq!(*c, expected, epsilon = 1e-14);
        }
    }

    #[test]
    fn missing_ancestor_is_reported() {
        let mut g = SparseSpaceGrid::new(vec![0.0], vec![1.0], 3, vec![1.0], false).unwrap();
        let centre = g
            .index_of(&SparseKey {
                levels: vec![1],
                positions: vec![1],
            })
            .unwrap();
        g.remove_point(centre);
        let v = DVector::from_element(g.nb_points(), 1.0);
        assert!(matches!(
            hierarchize(&g, &v),
            Err(Error::GridInconsistency(_))
        ));
    }

    #[test]
    fn root_labels() {
        let b = SparseSpaceGrid::new(vec![0.0; 2], vec![1.0; 2], 2, vec![1.0; 2], true).unwrap();
        assert_eq!(root(&b), (vec![0, 0], vec![0, 0]));
        let nb = SparseSpaceGrid::new(vec![0.0; 2], vec![1.0; 2], 2, vec![1.0; 2], false).unwrap();
        assert_eq!(root(&nb), (vec![1, 1], vec![1, 1]));
    }
}
