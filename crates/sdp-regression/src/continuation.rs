//! Continuation values estimated by regression.
//!
//! For values `V(x_j, X^s)` known at every grid point `x_j` and particle
//! `X^s` of the following date, the continuation value is the function
//! `(x, X) -> E[V(x, .) | X]`. It is stored as regression coefficients per
//! grid point, hierarchized along the grid so that any stock level `x` can be
//! interpolated first and regressed next.

use nalgebra::{DMatrix, DVector};

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{Grid, SpaceGrid, SpectralInterpolator};

use crate::regression::Regression;
use crate::regressor::Regressor;

/// Continuation value during the backward pass: borrows the grid and the
/// regressor of the current step.
#[derive(Debug, Clone)]
pub struct ContinuationValue<'a> {
    grid: &'a SpaceGrid,
    regressor: &'a Regressor,
    /// `nb_basis x nb_points`, hierarchized along the points.
    coefficients: DMatrix<Real>,
}

impl<'a> ContinuationValue<'a> {
    /// Regress `values` (`nb_simul x nb_points`) on the current particles.
    pub fn new(grid: &'a SpaceGrid, regressor: &'a Regressor, values: &DMatrix<Real>) -> Result<Self> {
        ensure!(
            values.ncols() == grid.nb_points(),
            "{} columns of values for {} grid points",
            values.ncols(),
            grid.nb_points()
        );
        let regressed = regressor.coordinates_basis_function_multiple(values)?;
        let coefficients = grid.to_hierarchize_vec(&regressed)?;
        Ok(Self {
            grid,
            regressor,
            coefficients,
        })
    }

    /// Wrap coefficients already regressed and hierarchized on `grid`.
    pub fn from_coefficients(
        grid: &'a SpaceGrid,
        regressor: &'a Regressor,
        coefficients: DMatrix<Real>,
    ) -> Result<Self> {
        ensure!(
            coefficients.ncols() == grid.nb_points() && coefficients.nrows() == regressor.nb_basis(),
            "coefficients of shape {:?} for {} basis functions on {} points",
            coefficients.shape(),
            regressor.nb_basis(),
            grid.nb_points()
        );
        Ok(Self {
            grid,
            regressor,
            coefficients,
        })
    }

    /// Release the coefficients.
    pub fn into_coefficients(self) -> DMatrix<Real> {
        self.coefficients
    }

    /// The grid of the following step.
    pub fn grid(&self) -> &'a SpaceGrid {
        self.grid
    }

    /// The regressor.
    pub fn regressor(&self) -> &'a Regressor {
        self.regressor
    }

    /// Hierarchized regression coefficients (`nb_basis x nb_points`).
    pub fn coefficients(&self) -> &DMatrix<Real> {
        &self.coefficients
    }

    /// Continuation value at stock `stock` for every particle of the batch.
    pub fn all_simulations(&self, stock: &[Real]) -> Result<DVector<Real>> {
        let basis = self.grid.create_interpolator(stock).apply_vec(&self.coefficients);
        self.regressor.all_simulations(&basis)
    }

    /// Continuation value at stock `stock` for simulation `simul`.
    pub fn value_for_simulation(&self, stock: &[Real], simul: usize) -> Result<Real> {
        let all = self.all_simulations(stock)?;
        ensure!(simul < all.len(), "simulation {simul} out of {}", all.len());
        Ok(all[simul])
    }

    /// Continuation value at stock `stock` and an arbitrary particle.
    pub fn value(&self, stock: &[Real], particle: &[Real]) -> Real {
        let basis = self.grid.create_interpolator(stock).apply_vec(&self.coefficients);
        self.regressor.value_at(particle, &basis)
    }
}

/// Owned continuation value, as read back from an archive: the grid, the
/// regressor basis and the coefficients bound to the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAndRegressedValue {
    grid: SpaceGrid,
    regressor: Regressor,
    spectral: SpectralInterpolator,
}

impl GridAndRegressedValue {
    /// Assemble the parts, checking that the coefficients belong to `grid`.
    pub fn new(grid: SpaceGrid, regressor: Regressor, spectral: SpectralInterpolator) -> Result<Self> {
        spectral.bind(&grid)?;
        ensure!(
            spectral.nb_functions() == regressor.nb_basis(),
            "{} coefficient rows for a regressor with {} basis functions",
            spectral.nb_functions(),
            regressor.nb_basis()
        );
        Ok(Self {
            grid,
            regressor,
            spectral,
        })
    }

    /// Owned copy of a backward-pass continuation value.
    pub fn from_continuation(cont: &ContinuationValue<'_>) -> Result<Self> {
        let spectral = SpectralInterpolator::from_coefficients(cont.grid(), cont.coefficients().clone())?;
        Self::new(cont.grid().clone(), cont.regressor().clone(), spectral)
    }

    /// The grid.
    pub fn grid(&self) -> &SpaceGrid {
        &self.grid
    }

    /// The regressor basis.
    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    /// The coefficients.
    pub fn spectral(&self) -> &SpectralInterpolator {
        &self.spectral
    }

    /// Split into its parts.
    pub fn into_parts(self) -> (SpaceGrid, Regressor, SpectralInterpolator) {
        (self.grid, self.regressor, self.spectral)
    }

    /// Value at stock `stock` and particle `particle`.
    pub fn value(&self, stock: &[Real], particle: &[Real]) -> Real {
        let basis = self
            .grid
            .create_interpolator(stock)
            .apply_vec(self.spectral.coefficients());
        self.regressor.value_at(particle, &basis)
    }

    /// Regression coefficients interpolated at `stock` (`nb_basis`).
    pub fn basis_coefficients(&self, stock: &[Real]) -> DVector<Real> {
        self.grid
            .create_interpolator(stock)
            .apply_vec(self.spectral.coefficients())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalConstRegression;
    use approx::assert_abs_diff_eq;
    use sdp_grids::RegularSpaceGrid;

    fn setup() -> (SpaceGrid, Regressor, DMatrix<Real>) {
        let grid: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![10])
            .unwrap()
            .into();
        let particles = DMatrix::from_fn(1, 200, |_, j| (j % 20) as Real);
        let mut reg: Regressor = LocalConstRegression::new(vec![2]).unwrap().into();
        reg.update_simulations(false, &particles).unwrap();
        // V(x, X) = x + X
        let values = DMatrix::from_fn(200, 11, |s, j| j as Real + (s % 20) as Real);
        (grid, reg, values)
    }

    #[test]
    fn regressed_then_interpolated() {
        let (grid, reg, values) = setup();
        let cont = ContinuationValue::new(&grid, &reg, &values).unwrap();
        // cells: X in [0, 10) mean 4.5, X in [10, 20) mean 14.5
        assert_abs_diff_eq!(cont.value(&[2.5], &[3.0]), 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cont.value(&[2.5], &[13.0]), 17.0, epsilon = 1e-12);
        let all = cont.all_simulations(&[1.0]).unwrap();
        assert_abs_diff_eq!(all[0], 5.5, epsilon = 1e-12);
        assert_abs_diff_eq!(all[15], 15.5, epsilon = 1e-12);
    }

    #[test]
    fn coefficients_can_be_rewrapped() {
        let (grid, reg, values) = setup();
        let c = ContinuationValue::new(&grid, &reg, &values).unwrap().into_coefficients();
        let back = ContinuationValue::from_coefficients(&grid, &reg, c.clone()).unwrap();
        assert_eq!(back.coefficients(), &c);
        assert!(ContinuationValue::from_coefficients(&grid, &reg, DMatrix::zeros(3, 11)).is_err());
    }

    #[test]
    fn owned_copy_agrees() {
        let (grid, reg, values) = setup();
        let cont = ContinuationValue::new(&grid, &reg, &values).unwrap();
        let owned = GridAndRegressedValue::from_continuation(&cont).unwrap();
        for x in [0.0, 3.3, 9.9] {
            assert_abs_diff_eq!(owned.value(&[x], &[12.0]), cont.value(&[x], &[12.0]), epsilon = 1e-14);
        }
    }
}
