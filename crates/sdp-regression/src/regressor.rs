//! Closed set of regressors.
//!
//! [`Regressor`] is what continuation objects store and what the archive
//! persists. Serializing it keeps the basis description (meshes or monomial
//! scaling) so that regressed values can be evaluated at new particles
//! during forward simulation; particle batches are never written.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{errors::Result, Real};

use crate::global::GlobalRegression;
use crate::local_const::LocalConstRegression;
use crate::regression::Regression;

/// A regression operator of one of the supported families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Regressor {
    /// Piecewise constant on equiprobable meshes.
    LocalConst(LocalConstRegression),
    /// Global polynomial.
    Global(GlobalRegression),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            Regressor::LocalConst($r) => $body,
            Regressor::Global($r) => $body,
        }
    };
}

impl Regression for Regressor {
    fn update_simulations(&mut self, zero_date: bool, particles: &DMatrix<Real>) -> Result<()> {
        dispatch!(self, r => r.update_simulations(zero_date, particles))
    }

    fn handoff(&self, zero_date: bool, particles: &DMatrix<Real>) -> Result<Self> {
        dispatch!(self, r => r.handoff(zero_date, particles).map(Regressor::from))
    }

    fn nb_simul(&self) -> usize {
        dispatch!(self, r => r.nb_simul())
    }

    fn nb_basis(&self) -> usize {
        dispatch!(self, r => r.nb_basis())
    }

    fn particles(&self) -> Option<&DMatrix<Real>> {
        dispatch!(self, r => r.particles())
    }

    fn coordinates_basis_function_multiple(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        dispatch!(self, r => r.coordinates_basis_function_multiple(values))
    }

    fn all_simulations_multiple(&self, coefficients: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        dispatch!(self, r => r.all_simulations_multiple(coefficients))
    }

    fn value_at(&self, particle: &[Real], coefficients: &DVector<Real>) -> Real {
        dispatch!(self, r => r.value_at(particle, coefficients))
    }
}

impl From<LocalConstRegression> for Regressor {
    fn from(r: LocalConstRegression) -> Self {
        Self::LocalConst(r)
    }
}

impl From<GlobalRegression> for Regressor {
    fn from(r: GlobalRegression) -> Self {
        Self::Global(r)
    }
}
