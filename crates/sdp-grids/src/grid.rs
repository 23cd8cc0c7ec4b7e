//! Grid capability trait and the closed set of grid variants.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{
    constants::TINY,
    errors::{Error, Result},
    Real,
};

use crate::full::IndexBox;
use crate::general::GeneralSpaceGrid;
use crate::interpolator::Interpolator;
use crate::legendre::RegularLegendreGrid;
use crate::regular::RegularSpaceGrid;
use crate::sparse::SparseSpaceGrid;

/// Stable tag of each grid variant, stored in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GridKind {
    /// [`RegularSpaceGrid`].
    Regular = 1,
    /// [`GeneralSpaceGrid`].
    General = 2,
    /// [`RegularLegendreGrid`].
    RegularLegendre = 3,
    /// [`SparseSpaceGrid`] with boundary points.
    SparseBound = 4,
    /// [`SparseSpaceGrid`] without boundary points.
    SparseNoBound = 5,
}

impl GridKind {
    /// Numeric tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`GridKind::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::Regular),
            2 => Ok(Self::General),
            3 => Ok(Self::RegularLegendre),
            4 => Ok(Self::SparseBound),
            5 => Ok(Self::SparseNoBound),
            other => Err(Error::UnknownGridTag(other)),
        }
    }
}

/// Behavior of interpolation outside the grid domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DomainPolicy {
    /// Extend the boundary cell's basis functions.
    #[default]
    Extrapolate,
    /// Project the query point onto the domain first.
    Clamp,
}

impl DomainPolicy {
    /// Apply the policy to one coordinate of a domain `[lo, hi]`.
    pub fn apply(self, x: Real, lo: Real, hi: Real) -> Real {
        match self {
            Self::Extrapolate => x,
            Self::Clamp => x.clamp(lo, hi),
        }
    }
}

/// Result of a point location: the enclosing cell and the interpolation
/// support of the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Lower corner of the cell.
    pub lower: Vec<Real>,
    /// Upper corner of the cell.
    pub upper: Vec<Real>,
    /// `(point index, weight)` pairs; the interpolated value is the weighted
    /// sum of the grid's native coefficients.
    pub support: Vec<(usize, Real)>,
}

/// Capabilities shared by every grid variant.
pub trait Grid: std::fmt::Debug + Send + Sync {
    /// Variant tag.
    fn kind(&self) -> GridKind;

    /// Number of space dimensions.
    fn dimension(&self) -> usize;

    /// Number of grid points.
    fn nb_points(&self) -> usize;

    /// Physical coordinates of point `index`.
    fn coordinates(&self, index: usize) -> Vec<Real>;

    /// `[min, max]` of the domain per dimension.
    fn extreme_values(&self) -> Vec<[Real; 2]>;

    /// Out-of-domain behavior.
    fn domain_policy(&self) -> DomainPolicy;

    /// Nearest cell and interpolation support of `x`. Never fails: outside the
    /// domain the support follows [`Grid::domain_policy`].
    fn locate(&self, x: &[Real]) -> Cell;

    /// Whether `x` lies in the domain, with a `TINY` tolerance.
    fn is_inside(&self, x: &[Real]) -> bool {
        x.len() == self.dimension()
            && self
                .extreme_values()
                .iter()
                .zip(x)
                .all(|(b, &xi)| xi >= b[0] - TINY && xi <= b[1] + TINY)
    }

    /// Interpolator at `x`.
    fn create_interpolator(&self, x: &[Real]) -> Interpolator {
        Interpolator::new(self.locate(x).support)
    }

    /// Native coefficients of nodal values (one per point).
    fn to_hierarchize(&self, values: &DVector<Real>) -> Result<DVector<Real>> {
        Ok(values.clone())
    }

    /// Native coefficients of several functions (rows) given by nodal values
    /// (columns = points).
    fn to_hierarchize_vec(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        Ok(values.clone())
    }
}

/// The closed set of grid variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpaceGrid {
    /// Uniform tensor grid.
    Regular(RegularSpaceGrid),
    /// Tensor grid with arbitrary breakpoints.
    General(GeneralSpaceGrid),
    /// Uniform meshes with Gauss-Lobatto-Legendre nodes.
    RegularLegendre(RegularLegendreGrid),
    /// Sparse grid, with or without boundary points.
    Sparse(SparseSpaceGrid),
}

macro_rules! dispatch {
    ($self:expr, $g:ident => $body:expr) => {
        match $self {
            SpaceGrid::Regular($g) => $body,
            SpaceGrid::General($g) => $body,
            SpaceGrid::RegularLegendre($g) => $body,
            SpaceGrid::Sparse($g) => $body,
        }
    };
}

impl SpaceGrid {
    /// Points per dimension for tensor grids, `None` for sparse grids.
    pub fn sizes(&self) -> Option<Vec<usize>> {
        match self {
            Self::Regular(g) => Some(g.sizes()),
            Self::General(g) => Some(g.sizes()),
            Self::RegularLegendre(g) => Some(g.sizes()),
            Self::Sparse(_) => None,
        }
    }

    /// Point coordinates along dimension `d` for tensor grids.
    pub fn axis_coordinates(&self, d: usize) -> Option<Vec<Real>> {
        match self {
            Self::Regular(g) => Some(g.axis_coordinates(d)),
            Self::General(g) => Some(g.axis_coordinates(d)),
            Self::RegularLegendre(g) => Some(g.axis_coordinates(d)),
            Self::Sparse(_) => None,
        }
    }

    /// Whether [`SpaceGrid::sub_grid`] is available. Legendre and sparse
    /// grids are processed as a whole by a single rank.
    pub fn is_splittable(&self) -> bool {
        matches!(self, Self::Regular(_) | Self::General(_))
    }

    /// The tensor sub-grid spanned by the points of `index_box`.
    pub fn sub_grid(&self, index_box: &IndexBox) -> Result<SpaceGrid> {
        match self {
            Self::Regular(g) => Ok(Self::Regular(g.sub_grid(index_box)?)),
            Self::General(g) => Ok(Self::General(g.sub_grid(index_box)?)),
            _ => Err(Error::InvalidArgument(format!(
                "{:?} grids cannot be split",
                self.kind()
            ))),
        }
    }

    /// Copy of the grid with another out-of-domain policy.
    pub fn with_domain_policy(self, policy: DomainPolicy) -> Self {
        match self {
            Self::Regular(g) => Self::Regular(g.with_domain_policy(policy)),
            Self::General(g) => Self::General(g.with_domain_policy(policy)),
            Self::RegularLegendre(g) => Self::RegularLegendre(g.with_domain_policy(policy)),
            Self::Sparse(g) => Self::Sparse(g.with_domain_policy(policy)),
        }
    }
}

impl Grid for SpaceGrid {
    fn kind(&self) -> GridKind {
        dispatch!(self, g => g.kind())
    }

    fn dimension(&self) -> usize {
        dispatch!(self, g => g.dimension())
    }

    fn nb_points(&self) -> usize {
        dispatch!(self, g => g.nb_points())
    }

    fn coordinates(&self, index: usize) -> Vec<Real> {
        dispatch!(self, g => g.coordinates(index))
    }

    fn extreme_values(&self) -> Vec<[Real; 2]> {
        dispatch!(self, g => g.extreme_values())
    }

    fn domain_policy(&self) -> DomainPolicy {
        dispatch!(self, g => g.domain_policy())
    }

    fn locate(&self, x: &[Real]) -> Cell {
        dispatch!(self, g => g.locate(x))
    }

    fn to_hierarchize(&self, values: &DVector<Real>) -> Result<DVector<Real>> {
        dispatch!(self, g => g.to_hierarchize(values))
    }

    fn to_hierarchize_vec(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        dispatch!(self, g => g.to_hierarchize_vec(values))
    }
}

impl From<RegularSpaceGrid> for SpaceGrid {
    fn from(g: RegularSpaceGrid) -> Self {
        Self::Regular(g)
    }
}

impl From<GeneralSpaceGrid> for SpaceGrid {
    fn from(g: GeneralSpaceGrid) -> Self {
        Self::General(g)
    }
}

impl From<RegularLegendreGrid> for SpaceGrid {
    fn from(g: RegularLegendreGrid) -> Self {
        Self::RegularLegendre(g)
    }
}

impl From<SparseSpaceGrid> for SpaceGrid {
    fn from(g: SparseSpaceGrid) -> Self {
        Self::Sparse(g)
    }
}
