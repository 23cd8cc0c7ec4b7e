//! Continuation values estimated on a tree.

use nalgebra::{DMatrix, DVector};

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{Grid, SpaceGrid, SpectralInterpolator};

use crate::tree::Tree;

/// Continuation value during the backward pass: for every node of the
/// current date, the tree expectation of the following values, hierarchized
/// along the grid.
#[derive(Debug, Clone)]
pub struct ContinuationValueTree<'a> {
    grid: &'a SpaceGrid,
    /// `nb_nodes x nb_points`.
    coefficients: DMatrix<Real>,
}

impl<'a> ContinuationValueTree<'a> {
    /// Expectation of `values` (`nb_nodes_next x nb_points`) through `tree`.
    pub fn new(grid: &'a SpaceGrid, tree: &Tree, values: &DMatrix<Real>) -> Result<Self> {
        ensure!(
            values.ncols() == grid.nb_points(),
            "{} columns of values for {} grid points",
            values.ncols(),
            grid.nb_points()
        );
        let expected = tree.expected_value_multiple(values)?;
        Ok(Self {
            grid,
            coefficients: grid.to_hierarchize_vec(&expected)?,
        })
    }

    /// Wrap expectations already hierarchized on `grid`.
    pub fn from_coefficients(grid: &'a SpaceGrid, coefficients: DMatrix<Real>) -> Result<Self> {
        ensure!(
            coefficients.ncols() == grid.nb_points(),
            "{} columns of coefficients for {} grid points",
            coefficients.ncols(),
            grid.nb_points()
        );
        Ok(Self { grid, coefficients })
    }

    /// Release the coefficients.
    pub fn into_coefficients(self) -> DMatrix<Real> {
        self.coefficients
    }

    /// The grid of the following step.
    pub fn grid(&self) -> &'a SpaceGrid {
        self.grid
    }

    /// Hierarchized expectations (`nb_nodes x nb_points`).
    pub fn coefficients(&self) -> &DMatrix<Real> {
        &self.coefficients
    }

    /// Number of nodes of the current date.
    pub fn nb_nodes(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Continuation value at `stock` for every node.
    pub fn values_at_nodes(&self, stock: &[Real]) -> DVector<Real> {
        self.grid.create_interpolator(stock).apply_vec(&self.coefficients)
    }

    /// Continuation value at `stock` for node `node`.
    pub fn value_at_node(&self, node: usize, stock: &[Real]) -> Real {
        self.grid
            .locate(stock)
            .support
            .iter()
            .map(|&(i, w)| w * self.coefficients[(node, i)])
            .sum()
    }
}

/// Owned function of (stock, node), as read back from an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTreeValue {
    grid: SpaceGrid,
    spectral: SpectralInterpolator,
}

impl GridTreeValue {
    /// Assemble the parts, checking that the coefficients belong to `grid`.
    pub fn new(grid: SpaceGrid, spectral: SpectralInterpolator) -> Result<Self> {
        spectral.bind(&grid)?;
        Ok(Self { grid, spectral })
    }

    /// Nodal values (`nb_nodes x nb_points`) of a function on `grid`.
    pub fn from_values(grid: SpaceGrid, values: &DMatrix<Real>) -> Result<Self> {
        let spectral = SpectralInterpolator::new(&grid, values)?;
        Ok(Self { grid, spectral })
    }

    /// Owned copy of a backward-pass continuation value.
    pub fn from_continuation(cont: &ContinuationValueTree<'_>) -> Result<Self> {
        let spectral = SpectralInterpolator::from_coefficients(cont.grid(), cont.coefficients().clone())?;
        Self::new(cont.grid().clone(), spectral)
    }

    /// The grid.
    pub fn grid(&self) -> &SpaceGrid {
        &self.grid
    }

    /// The coefficients.
    pub fn spectral(&self) -> &SpectralInterpolator {
        &self.spectral
    }

    /// Split into its parts.
    pub fn into_parts(self) -> (SpaceGrid, SpectralInterpolator) {
        (self.grid, self.spectral)
    }

    /// Value at `stock` and node `node`.
    pub fn value(&self, stock: &[Real], node: usize) -> Real {
        self.grid
            .locate(stock)
            .support
            .iter()
            .map(|&(i, w)| w * self.spectral.coefficients()[(node, i)])
            .sum()
    }

    /// Values at `stock` for every node.
    pub fn values(&self, stock: &[Real]) -> DVector<Real> {
        self.grid
            .create_interpolator(stock)
            .apply_vec(self.spectral.coefficients())
    }
}
