//! Least squares with several right-hand sides.
//!
//! The design matrix is decomposed once by SVD; each call to
//! [`LeastSquares::solve`] then projects a block of right-hand sides onto the
//! pseudo-inverse. Singular values below `max(n, m) * eps * s_max` are
//! discarded, which gives the minimum-norm solution for rank-deficient
//! designs (for instance a regression basis on identical particles).

use nalgebra::{DMatrix, DVector, SVD};
use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

/// SVD-factored design matrix `A` (`n` observations by `m` basis functions).
#[derive(Debug, Clone)]
pub struct LeastSquares {
    nb_obs: usize,
    /// `V diag(1/s) U^T`, the thresholded pseudo-inverse (`m x n`).
    pseudo_inverse: DMatrix<Real>,
    rank: usize,
}

impl LeastSquares {
    /// Factor the design matrix.
    pub fn new(design: &DMatrix<Real>) -> Result<Self> {
        let (n, m) = design.shape();
        ensure!(n > 0 && m > 0, "empty design matrix ({n} x {m})");

        let svd = SVD::new(design.clone(), true, true);
        let u = svd
            .u
            .as_ref()
            .ok_or_else(|| Error::Runtime("SVD did not produce U".into()))?;
        let v_t = svd
            .v_t
            .as_ref()
            .ok_or_else(|| Error::Runtime("SVD did not produce V^T".into()))?;
        let sv = &svd.singular_values;

        let sv_max = sv.iter().copied().fold(0.0_f64, f64::max);
        let threshold = n.max(m) as Real * f64::EPSILON * sv_max;

        let mut pseudo_inverse = DMatrix::zeros(m, n);
        let mut rank = 0;
        for k in 0..sv.len() {
            let s = sv[k];
            if s > threshold {
                rank += 1;
                // rank-one update v_k (u_k^T / s_k)
                let v_k = v_t.row(k).transpose();
                let u_k = u.column(k) / s;
                pseudo_inverse += v_k * u_k.transpose();
            }
        }
        Ok(Self {
            nb_obs: n,
            pseudo_inverse,
            rank,
        })
    }

    /// Numerical rank of the design matrix.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of basis functions `m`.
    pub fn nb_basis(&self) -> usize {
        self.pseudo_inverse.nrows()
    }

    /// Coefficients for each column of `rhs` (`n x k`), returned as `m x k`.
    pub fn solve(&self, rhs: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        ensure!(
            rhs.nrows() == self.nb_obs,
            "right-hand side has {} rows, design has {}",
            rhs.nrows(),
            self.nb_obs
        );
        Ok(&self.pseudo_inverse * rhs)
    }

    /// Coefficients for a single right-hand side.
    pub fn solve_vec(&self, rhs: &DVector<Real>) -> Result<DVector<Real>> {
        ensure!(
            rhs.len() == self.nb_obs,
            "right-hand side has {} rows, design has {}",
            rhs.len(),
            self.nb_obs
        );
        Ok(&self.pseudo_inverse * rhs)
    }
}
