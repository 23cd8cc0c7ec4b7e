//! Regression-based conditional expectation.
//!
//! Shapes used throughout:
//!
//! * particles: `dimension x nb_simul`, one column per simulation;
//! * values at particles: `nb_simul x nb_functions`;
//! * coefficients: `nb_basis x nb_functions`.
//!
//! On a space grid, the "functions" are the grid points, so coefficient
//! matrices have one column per point and can be hierarchized row-wise like
//! any other grid function.

use nalgebra::{DMatrix, DVector};

use sdp_core::{errors::Result, Real};

/// Estimation of `E[f(X_{t+1}) | X_t]` from a batch of particles `X_t`.
pub trait Regression: std::fmt::Debug + Send + Sync {
    /// Replace the particle batch and rebuild the basis. With `zero_date` the
    /// particles are all equal (initial date) and the estimate reduces to a
    /// plain mean.
    fn update_simulations(&mut self, zero_date: bool, particles: &DMatrix<Real>) -> Result<()>;

    /// Operator of another date: the basis parameters of `self` fitted on
    /// `particles`. `self` keeps its batch, so coefficients estimated at its
    /// date can still be evaluated at the new particles.
    fn handoff(&self, zero_date: bool, particles: &DMatrix<Real>) -> Result<Self>
    where
        Self: Sized;

    /// Number of simulations of the current batch.
    fn nb_simul(&self) -> usize;

    /// Number of basis functions.
    fn nb_basis(&self) -> usize;

    /// Current particles (`dimension x nb_simul`).
    fn particles(&self) -> Option<&DMatrix<Real>>;

    /// Regression coefficients of one function given at every particle.
    fn coordinates_basis_function(&self, values: &DVector<Real>) -> Result<DVector<Real>> {
        let m = DMatrix::from_column_slice(values.len(), 1, values.as_slice());
        let c = self.coordinates_basis_function_multiple(&m)?;
        Ok(c.column(0).into_owned())
    }

    /// Regression coefficients of several functions (`nb_simul x k`),
    /// returned as `nb_basis x k`.
    fn coordinates_basis_function_multiple(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>>;

    /// Regressed value at every particle of the current batch.
    fn all_simulations(&self, coefficients: &DVector<Real>) -> Result<DVector<Real>> {
        let m = DMatrix::from_column_slice(coefficients.len(), 1, coefficients.as_slice());
        let v = self.all_simulations_multiple(&m)?;
        Ok(v.column(0).into_owned())
    }

    /// Regressed values of several functions at every particle
    /// (`nb_simul x k`).
    fn all_simulations_multiple(&self, coefficients: &DMatrix<Real>) -> Result<DMatrix<Real>>;

    /// Regressed value of one function at an arbitrary particle.
    fn value_at(&self, particle: &[Real], coefficients: &DVector<Real>) -> Real;

    /// Regressed values of several functions (columns of `coefficients`) at an
    /// arbitrary particle.
    fn values_from_coordinates(
        &self,
        particle: &[Real],
        coefficients: &DMatrix<Real>,
    ) -> DVector<Real> {
        DVector::from_iterator(
            coefficients.ncols(),
            coefficients
                .column_iter()
                .map(|c| self.value_at(particle, &c.into_owned())),
        )
    }

    /// Conditional expectation of several functions at every particle.
    fn conditional_expectation(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        let c = self.coordinates_basis_function_multiple(values)?;
        self.all_simulations_multiple(&c)
    }
}
