//! Piecewise constant regression.
//!
//! The particle cloud is cut along every dimension into `nb_mesh[d]`
//! equiprobable slices (empirical quantiles); the tensor product of the
//! slices forms the cells. The conditional expectation in a cell is the mean
//! of the function over the particles of the cell. A cell without particle
//! uses the mean over all particles instead.

use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

use crate::regression::Regression;

/// Per-batch data, rebuilt by `update_simulations` and never persisted.
#[derive(Debug, Clone)]
struct Batch {
    particles: DMatrix<Real>,
    cell_of_simul: Vec<usize>,
    count: Vec<usize>,
}

/// Local constant regression on equiprobable meshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConstRegression {
    nb_mesh: Vec<usize>,
    zero_date: bool,
    /// Breakpoints per dimension (`nb_mesh[d] + 1` values, min to max).
    meshes: Vec<Vec<Real>>,
    #[serde(skip)]
    batch: Option<Batch>,
}

impl PartialEq for LocalConstRegression {
    fn eq(&self, other: &Self) -> bool {
        self.nb_mesh == other.nb_mesh
            && self.zero_date == other.zero_date
            && self.meshes == other.meshes
    }
}

impl LocalConstRegression {
    /// Regression with `nb_mesh[d]` slices in dimension `d`.
    pub fn new(nb_mesh: Vec<usize>) -> Result<Self> {
        ensure!(!nb_mesh.is_empty(), "no dimension given for the regression");
        ensure!(
            nb_mesh.iter().all(|&n| n >= 1),
            "every dimension needs at least one mesh, got {nb_mesh:?}"
        );
        Ok(Self {
            nb_mesh,
            zero_date: false,
            meshes: Vec::new(),
            batch: None,
        })
    }

    /// Regression built directly on a particle batch.
    pub fn with_particles(nb_mesh: Vec<usize>, zero_date: bool, particles: &DMatrix<Real>) -> Result<Self> {
        let mut r = Self::new(nb_mesh)?;
        r.update_simulations(zero_date, particles)?;
        Ok(r)
    }

    /// Slices per dimension.
    pub fn nb_mesh(&self) -> &[usize] {
        &self.nb_mesh
    }

    /// Breakpoints of every dimension of the current basis.
    pub fn meshes(&self) -> &[Vec<Real>] {
        &self.meshes
    }

    /// Number of particles per cell in the current batch.
    pub fn cell_counts(&self) -> Option<&[usize]> {
        self.batch.as_ref().map(|b| b.count.as_slice())
    }

    /// Cell containing `x`; points outside the cloud belong to the boundary
    /// cells.
    pub fn cell_of(&self, x: &[Real]) -> usize {
        if self.zero_date {
            return 0;
        }
        let mut cell = 0;
        let mut stride = 1;
        for ((mesh, &n), &xd) in self.meshes.iter().zip(&self.nb_mesh).zip(x) {
            let k = mesh[1..n].partition_point(|&b| b <= xd);
            cell += k * stride;
            stride *= n;
        }
        cell
    }

    fn batch(&self) -> Result<&Batch> {
        self.batch.as_ref().ok_or_else(|| {
            Error::Precondition("local regression used before update_simulations".into())
        })
    }
}

fn quantile_breakpoints(row: impl Iterator<Item = Real>, nb_mesh: usize) -> Vec<Real> {
    let mut sorted: Vec<Real> = row.collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let mut out = Vec::with_capacity(nb_mesh + 1);
    out.push(sorted[0]);
    for j in 1..nb_mesh {
        out.push(sorted[(j * n) / nb_mesh]);
    }
    out.push(sorted[n - 1]);
    out
}

impl Regression for LocalConstRegression {
    fn handoff(&self, zero_date: bool, particles: &DMatrix<Real>) -> Result<Self> {
        Self::with_particles(self.nb_mesh.clone(), zero_date, particles)
    }

    fn update_simulations(&mut self, zero_date: bool, particles: &DMatrix<Real>) -> Result<()> {
        ensure!(
            particles.nrows() == self.nb_mesh.len(),
            "particles of dimension {} for a regression of dimension {}",
            particles.nrows(),
            self.nb_mesh.len()
        );
        ensure!(particles.ncols() > 0, "empty particle batch");
        self.zero_date = zero_date;
        self.meshes = if zero_date {
            Vec::new()
        } else {
            particles
                .row_iter()
                .zip(&self.nb_mesh)
                .map(|(row, &n)| quantile_breakpoints(row.iter().copied(), n))
                .collect()
        };
        let nb_cells = if zero_date {
            1
        } else {
            self.nb_mesh.iter().product()
        };
        let cell_of_simul: Vec<usize> = particles
            .column_iter()
            .map(|c| {
                let x: Vec<Real> = c.iter().copied().collect();
                self.cell_of(&x)
            })
            .collect();
        let mut count = vec![0; nb_cells];
        for &c in &cell_of_simul {
            count[c] += 1;
        }
        let empty = count.iter().filter(|&&c| c == 0).count();
        if empty > 0 {
            warn!("local regression: {empty} of {nb_cells} cells without particle, using the global mean there");
        }
        self.batch = Some(Batch {
            particles: particles.clone(),
            cell_of_simul,
            count,
        });
        Ok(())
    }

    fn nb_simul(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.particles.ncols())
    }

    fn nb_basis(&self) -> usize {
        if self.zero_date {
            1
        } else {
            self.nb_mesh.iter().product()
        }
    }

    fn particles(&self) -> Option<&DMatrix<Real>> {
        self.batch.as_ref().map(|b| &b.particles)
    }

    fn coordinates_basis_function_multiple(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        let batch = self.batch()?;
        let nb_simul = batch.cell_of_simul.len();
        ensure!(
            values.nrows() == nb_simul,
            "{} rows of values for {} simulations",
            values.nrows(),
            nb_simul
        );
        let nb_cells = batch.count.len();
        let mut sums: DMatrix<Real> = DMatrix::zeros(nb_cells, values.ncols());
        for (s, &c) in batch.cell_of_simul.iter().enumerate() {
            let mut row = sums.row_mut(c);
            row += values.row(s);
        }
        let global: Vec<Real> = values
            .column_iter()
            .map(|c| c.sum() / nb_simul as Real)
            .collect();
        for (c, &n) in batch.count.iter().enumerate() {
            if n == 0 {
                for (j, &g) in global.iter().enumerate() {
                    sums[(c, j)] = g;
                }
            } else {
                let mut row = sums.row_mut(c);
                row /= n as Real;
            }
        }
        Ok(sums)
    }

    fn all_simulations_multiple(&self, coefficients: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        let batch = self.batch()?;
        ensure!(
            coefficients.nrows() == batch.count.len(),
            "{} coefficient rows for {} cells",
            coefficients.nrows(),
            batch.count.len()
        );
        Ok(DMatrix::from_fn(
            batch.cell_of_simul.len(),
            coefficients.ncols(),
            |s, j| coefficients[(batch.cell_of_simul[s], j)],
        ))
    }

    fn value_at(&self, particle: &[Real], coefficients: &DVector<Real>) -> Real {
        coefficients[self.cell_of(particle).min(coefficients.len().saturating_sub(1))]
    }
}
