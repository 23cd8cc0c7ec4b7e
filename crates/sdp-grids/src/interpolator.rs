//! Interpolators.
//!
//! An [`Interpolator`] is attached to one query point: it holds the grid
//! points and weights contributing to the value at that point, so that many
//! functions (one per simulation, say) can be interpolated with a single
//! location step.
//!
//! A [`SpectralInterpolator`] is attached to a set of functions instead: it
//! holds their native coefficients (nodal values on full grids, hierarchical
//! surpluses on sparse grids) and is bound to a grid borrow to be evaluated.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{ensure, errors::Result, Real};

use crate::grid::{Grid, GridKind};

/// Interpolation weights of one query point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interpolator {
    support: Vec<(usize, Real)>,
}

impl Interpolator {
    /// Wrap a `(point index, weight)` support.
    pub fn new(support: Vec<(usize, Real)>) -> Self {
        Self { support }
    }

    /// The `(point index, weight)` pairs.
    pub fn support(&self) -> &[(usize, Real)] {
        &self.support
    }

    /// Interpolated value of a function given by its native coefficients.
    pub fn apply(&self, values: &DVector<Real>) -> Real {
        self.apply_slice(values.as_slice())
    }

    /// Same as [`Interpolator::apply`] on a plain slice.
    pub fn apply_slice(&self, values: &[Real]) -> Real {
        self.support.iter().map(|&(i, w)| w * values[i]).sum()
    }

    /// Interpolated values of every row of `values` (rows = functions,
    /// columns = grid points).
    pub fn apply_vec(&self, values: &DMatrix<Real>) -> DVector<Real> {
        let mut out = DVector::zeros(values.nrows());
        for &(i, w) in &self.support {
            out.axpy(w, &values.column(i), 1.0);
        }
        out
    }
}

/// Native coefficients of several functions on a grid of a given kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralInterpolator {
    kind: GridKind,
    coefficients: DMatrix<Real>,
}

impl SpectralInterpolator {
    /// Coefficients of the functions whose nodal values are the rows of
    /// `values`.
    pub fn new(grid: &dyn Grid, values: &DMatrix<Real>) -> Result<Self> {
        ensure!(
            values.ncols() == grid.nb_points(),
            "{} columns of values for a grid of {} points",
            values.ncols(),
            grid.nb_points()
        );
        Ok(Self {
            kind: grid.kind(),
            coefficients: grid.to_hierarchize_vec(values)?,
        })
    }

    /// Wrap coefficients that are already in the grid's native form.
    pub fn from_coefficients(grid: &dyn Grid, coefficients: DMatrix<Real>) -> Result<Self> {
        ensure!(
            coefficients.ncols() == grid.nb_points(),
            "{} columns of coefficients for a grid of {} points",
            coefficients.ncols(),
            grid.nb_points()
        );
        Ok(Self {
            kind: grid.kind(),
            coefficients,
        })
    }

    /// Grid kind the coefficients were computed for.
    pub fn kind(&self) -> GridKind {
        self.kind
    }

    /// Number of functions.
    pub fn nb_functions(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Native coefficients (rows = functions, columns = points).
    pub fn coefficients(&self) -> &DMatrix<Real> {
        &self.coefficients
    }

    /// Attach the coefficients to the grid they were computed on. Fails when
    /// the kind or the number of points disagree.
    pub fn bind<'g>(&'g self, grid: &'g dyn Grid) -> Result<BoundSpectral<'g>> {
        ensure!(
            grid.kind() == self.kind,
            "spectral coefficients for {:?} bound to a {:?} grid",
            self.kind,
            grid.kind()
        );
        ensure!(
            grid.nb_points() == self.coefficients.ncols(),
            "spectral coefficients for {} points bound to a grid of {} points",
            self.coefficients.ncols(),
            grid.nb_points()
        );
        Ok(BoundSpectral {
            grid,
            coefficients: &self.coefficients,
        })
    }
}

/// Spectral coefficients bound to their grid.
#[derive(Debug, Clone, Copy)]
pub struct BoundSpectral<'g> {
    grid: &'g dyn Grid,
    coefficients: &'g DMatrix<Real>,
}

impl<'g> BoundSpectral<'g> {
    /// The grid.
    pub fn grid(&self) -> &'g dyn Grid {
        self.grid
    }

    /// Values of every function at `x`.
    pub fn values(&self, x: &[Real]) -> DVector<Real> {
        self.grid.create_interpolator(x).apply_vec(self.coefficients)
    }

    /// Value of function `function` at `x`.
    pub fn value(&self, function: usize, x: &[Real]) -> Real {
        self.grid
            .locate(x)
            .support
            .iter()
            .map(|&(i, w)| w * self.coefficients[(function, i)])
            .sum()
    }
}
