//! # sdp-grids
//!
//! Space grids on which the value functions of a stochastic control problem
//! are stored, together with the interpolators used to evaluate them between
//! grid points.
//!
//! Four grid variants are available through [`SpaceGrid`]:
//!
//! * [`RegularSpaceGrid`]: uniform mesh per dimension.
//! * [`GeneralSpaceGrid`]: arbitrary increasing breakpoints per dimension.
//! * [`RegularLegendreGrid`]: uniform meshes carrying Gauss-Lobatto-Legendre
//!   nodes for high-order interpolation.
//! * [`SparseSpaceGrid`]: anisotropic sparse grids, with or without boundary
//!   points, interpolating from hierarchical coefficients.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// The `Grid` capability trait and the closed `SpaceGrid` enum.
pub mod grid;

/// Multi-index helpers shared by tensor-product grids.
pub mod full;

/// Uniform tensor grids.
pub mod regular;

/// Tensor grids with arbitrary breakpoints.
pub mod general;

/// Uniform grids with Gauss-Lobatto-Legendre nodes per mesh.
pub mod legendre;

/// Sparse grids and hierarchization.
pub mod sparse;

/// Interpolators bound to a query point or to stored coefficients.
pub mod interpolator;

/// Binary grid snapshots with a closed tag set.
pub mod snapshot;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use full::IndexBox;
pub use general::GeneralSpaceGrid;
pub use grid::{Cell, DomainPolicy, Grid, GridKind, SpaceGrid};
pub use interpolator::{BoundSpectral, Interpolator, SpectralInterpolator};
pub use legendre::RegularLegendreGrid;
pub use regular::RegularSpaceGrid;
pub use sparse::SparseSpaceGrid;
