//! Global polynomial regression.
//!
//! Particles are standardized per dimension (`z = (x - mean) / std`) and the
//! basis is made of the monomials of total degree at most `degree` in `z`.
//! The least-squares problem is factored once per particle batch and solved
//! for every function by SVD.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};
use sdp_math::LeastSquares;

use crate::regression::Regression;

#[derive(Debug, Clone)]
struct Batch {
    particles: DMatrix<Real>,
    design: DMatrix<Real>,
    solver: LeastSquares,
}

/// Regression on the monomials of total degree `<= degree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalRegression {
    degree: u32,
    dimension: usize,
    zero_date: bool,
    mean: Vec<Real>,
    scale: Vec<Real>,
    exponents: Vec<Vec<u32>>,
    #[serde(skip)]
    batch: Option<Batch>,
}

impl PartialEq for GlobalRegression {
    fn eq(&self, other: &Self) -> bool {
        self.degree == other.degree
            && self.dimension == other.dimension
            && self.zero_date == other.zero_date
            && self.mean == other.mean
            && self.scale == other.scale
            && self.exponents == other.exponents
    }
}

/// Exponents of every monomial of total degree `<= degree` in `dimension`
/// variables, the constant first.
fn monomials(dimension: usize, degree: u32) -> Vec<Vec<u32>> {
    let mut out = Vec::new();
    for total in 0..=degree {
        let mut current = Vec::with_capacity(dimension);
        fill(dimension, total, &mut current, &mut out);
    }
    out
}

fn fill(dimension: usize, remaining: u32, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
    if current.len() + 1 == dimension {
        current.push(remaining);
        out.push(current.clone());
        current.pop();
        return;
    }
    for e in (0..=remaining).rev() {
        current.push(e);
        fill(dimension, remaining - e, current, out);
        current.pop();
    }
}

impl GlobalRegression {
    /// Regression of total degree `degree` in `dimension` variables.
    pub fn new(degree: u32, dimension: usize) -> Result<Self> {
        ensure!(dimension >= 1, "regression dimension must be at least 1");
        Ok(Self {
            degree,
            dimension,
            zero_date: false,
            mean: vec![0.0; dimension],
            scale: vec![1.0; dimension],
            exponents: monomials(dimension, degree),
            batch: None,
        })
    }

    /// Polynomial degree.
    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Monomial exponents of the current basis.
    pub fn exponents(&self) -> &[Vec<u32>] {
        &self.exponents
    }

    fn basis_values(&self, x: &[Real]) -> Vec<Real> {
        let z: Vec<Real> = x
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&xi, (&m, &s))| (xi - m) / s)
            .collect();
        self.exponents
            .iter()
            .map(|e| e.iter().zip(&z).map(|(&k, &zi)| zi.powi(k as i32)).product())
            .collect()
    }

    fn batch(&self) -> Result<&Batch> {
        self.batch.as_ref().ok_or_else(|| {
            Error::Precondition("global regression used before update_simulations".into())
        })
    }
}

impl Regression for GlobalRegression {
    fn handoff(&self, zero_date: bool, particles: &DMatrix<Real>) -> Result<Self> {
        let mut next = Self::new(self.degree, self.dimension)?;
        next.update_simulations(zero_date, particles)?;
        Ok(next)
    }

    fn update_simulations(&mut self, zero_date: bool, particles: &DMatrix<Real>) -> Result<()> {
        ensure!(
            particles.nrows() == self.dimension,
            "particles of dimension {} for a regression of dimension {}",
            particles.nrows(),
            self.dimension
        );
        let n = particles.ncols();
        ensure!(n > 0, "empty particle batch");
        self.zero_date = zero_date;
        if zero_date {
            self.exponents = vec![vec![0; self.dimension]];
        } else {
            self.exponents = monomials(self.dimension, self.degree);
            ensure!(
                n >= self.exponents.len(),
                "{} simulations for {} basis functions",
                n,
                self.exponents.len()
            );
            for (d, row) in particles.row_iter().enumerate() {
                let m = row.sum() / n as Real;
                let var = row.iter().map(|x| (x - m) * (x - m)).sum::<Real>() / n as Real;
                self.mean[d] = m;
                self.scale[d] = if var > 0.0 { var.sqrt() } else { 1.0 };
            }
        }
        let nb_basis = self.exponents.len();
        let mut design = DMatrix::zeros(n, nb_basis);
        for (s, col) in particles.column_iter().enumerate() {
            let x: Vec<Real> = col.iter().copied().collect();
            for (k, v) in self.basis_values(&x).into_iter().enumerate() {
                design[(s, k)] = v;
            }
        }
        let solver = LeastSquares::new(&design)?;
        self.batch = Some(Batch {
            particles: particles.clone(),
            design,
            solver,
        });
        Ok(())
    }

    fn nb_simul(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.particles.ncols())
    }

    fn nb_basis(&self) -> usize {
        self.exponents.len()
    }

    fn particles(&self) -> Option<&DMatrix<Real>> {
        self.batch.as_ref().map(|b| &b.particles)
    }

    fn coordinates_basis_function_multiple(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        self.batch()?.solver.solve(values)
    }

    fn all_simulations_multiple(&self, coefficients: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        let batch = self.batch()?;
        ensure!(
            coefficients.nrows() == batch.design.ncols(),
            "{} coefficient rows for {} basis functions",
            coefficients.nrows(),
            batch.design.ncols()
        );
        Ok(&batch.design * coefficients)
    }

    fn value_at(&self, particle: &[Real], coefficients: &DVector<Real>) -> Real {
        self.basis_values(particle)
            .iter()
            .zip(coefficients.iter())
            .map(|(b, c)| b * c)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn monomial_count() {
        assert_eq!(monomials(1, 3).len(), 4);
        assert_eq!(monomials(2, 2).len(), 6);
        assert_eq!(monomials(3, 2).len(), 10);
        assert_eq!(monomials(2, 2)[0], vec![0, 0]);
    }

    #[test]
    fn exact_on_polynomials() {
        let p = DMatrix::from_fn(2, 50, |d, j| {
            if d == 0 {
                j as Real * 0.1
            } else {
                ((j * 7) % 13) as Real
            }
        });
        let mut r = GlobalRegression::new(2, 2).unwrap();
        r.update_simulations(false, &p).unwrap();
        let f = |x: &[Real]| 1.0 + 2.0 * x[0] - x[1] + 0.5 * x[0] * x[1];
        let values = DVector::from_iterator(50, p.column_iter().map(|c| f(&[c[0], c[1]])));
        let c = r.coordinates_basis_function(&values).unwrap();
        let back = r.all_simulations(&c).unwrap();
        for (a, b) in back.iter().zip(values.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(r.value_at(&[10.0, -3.0], &c), f(&[10.0, -3.0]), epsilon = 1e-8);
    }

    #[test]
    fn zero_date_keeps_the_constant() {
        let p = DMatrix::from_element(1, 20, 3.0);
        let mut r = GlobalRegression::new(3, 1).unwrap();
        r.update_simulations(true, &p).unwrap();
        assert_eq!(r.nb_basis(), 1);
        let v = DVector::from_fn(20, |i, _| i as Real);
        let c = r.coordinates_basis_function(&v).unwrap();
        assert_abs_diff_eq!(c[0], 9.5, epsilon = 1e-10);
    }
}
