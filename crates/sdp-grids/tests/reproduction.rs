//! Reproduction properties of the grid interpolators.

use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

use sdp_core::Real;
use sdp_grids::sparse::hierarchization::{dehierarchize, hierarchize};
use sdp_grids::{
    DomainPolicy, GeneralSpaceGrid, Grid, RegularLegendreGrid, RegularSpaceGrid, SpaceGrid,
    SparseSpaceGrid, SpectralInterpolator,
};

fn all_grids() -> Vec<SpaceGrid> {
    vec![
        RegularSpaceGrid::new(vec![0.0, -1.0], vec![0.25, 0.5], vec![8, 4])
            .unwrap()
            .into(),
        GeneralSpaceGrid::new(vec![vec![0.0, 0.1, 0.5, 1.2, 2.0], vec![-1.0, 0.0, 1.0]])
            .unwrap()
            .into(),
        RegularLegendreGrid::new(vec![0.0, -1.0], vec![0.5, 1.0], vec![4, 2], vec![3, 2])
            .unwrap()
            .into(),
        SparseSpaceGrid::new(vec![0.0, -1.0], vec![2.0, 2.0], 4, vec![1.0, 1.0], true)
            .unwrap()
            .into(),
        SparseSpaceGrid::new(vec![0.0, -1.0], vec![2.0, 2.0], 4, vec![1.0, 1.0], false)
            .unwrap()
            .into(),
    ]
}

fn nodal(grid: &SpaceGrid, f: impl Fn(&[Real]) -> Real) -> DMatrix<Real> {
    DMatrix::from_fn(1, grid.nb_points(), |_, j| f(&grid.coordinates(j)))
}

#[test]
fn exact_at_nodes() {
    let f = |x: &[Real]| (x[0] * 1.3).cos() + x[0] * x[1] * x[1];
    for grid in all_grids() {
        let values = nodal(&grid, f);
        let spectral = SpectralInterpolator::new(&grid, &values).unwrap();
        let bound = spectral.bind(&grid).unwrap();
        for j in 0..grid.nb_points() {
            assert_abs_diff_eq!(
                bound.value(0, &grid.coordinates(j)),
                values[(0, j)],
                epsilon = 1e-11
            );
        }
    }
}

#[test]
fn affine_functions_reproduced_inside_and_outside() {
    let f = |x: &[Real]| 1.5 - 2.0 * x[0] + 0.75 * x[1];
    for grid in all_grids() {
        let values = nodal(&grid, f);
        let spectral = SpectralInterpolator::new(&grid, &values).unwrap();
        let bound = spectral.bind(&grid).unwrap();
        for x in [[0.37, 0.11], [1.9, -0.8], [-0.3, 1.2], [2.4, -1.5]] {
            assert_abs_diff_eq!(bound.value(0, &x), f(&x), epsilon = 1e-10);
        }
    }
}

#[test]
fn clamp_policy_returns_boundary_values() {
    let grid: SpaceGrid = SparseSpaceGrid::new(vec![0.0], vec![1.0], 3, vec![1.0], true)
        .unwrap()
        .into();
    let grid = grid.with_domain_policy(DomainPolicy::Clamp);
    let values = nodal(&grid, |x| 3.0 * x[0]);
    let spectral = SpectralInterpolator::new(&grid, &values).unwrap();
    let bound = spectral.bind(&grid).unwrap();
    assert_abs_diff_eq!(bound.value(0, &[5.0]), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(bound.value(0, &[-5.0]), 0.0, epsilon = 1e-12);
}

proptest! {
    #[test]
    fn hierarchization_round_trip(
        seed in prop::collection::vec(-10.0f64..10.0, 1..200),
        with_boundary in any::<bool>(),
        level in 1usize..5,
    ) {
        let grid = SparseSpaceGrid::new(vec![0.0; 3], vec![1.0; 3], level, vec![1.0, 1.0, 2.0], with_boundary)
            .unwrap();
        let n = grid.nb_points();
        let values = DVector::from_iterator(n, (0..n).map(|i| seed[i % seed.len()] + i as Real * 0.01));
        let back = dehierarchize(&grid, &hierarchize(&grid, &values).unwrap()).unwrap();
        for (a, b) in values.iter().zip(back.iter()) {
            prop_assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn regular_weights_form_a_partition_of_unity(x in -1.0f64..3.0, y in -2.0f64..2.0) {
        let grid = RegularSpaceGrid::new(vec![0.0, -1.0], vec![0.25, 0.5], vec![8, 4]).unwrap();
        let total: Real = grid.locate(&[x, y]).support.iter().map(|s| s.1).sum();
        prop_assert!((total - 1.0).abs() < 1e-12);
    }
}
