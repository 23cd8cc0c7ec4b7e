//! # stochdp
//!
//! Stochastic control problems solved by dynamic programming: the
//! deterministic state (stock levels) lives on full or sparse grids, the
//! uncertainty is simulated by Monte-Carlo particles or a recombining tree,
//! conditional expectations are taken by regression or on the tree, and the
//! grid points can be distributed across ranks.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on it rather than on the individual
//! `sdp-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use stochdp::grids::{Grid, RegularSpaceGrid, SpaceGrid};
//!
//! let grid: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![100])
//!     .unwrap()
//!     .into();
//! assert_eq!(grid.nb_points(), 101);
//! ```
//!
//! A backward pass is run with
//! [`methods::dynamic_programming_by_regression`] (or
//! [`methods::dynamic_programming_by_tree`]) and replayed with the
//! `simulate_*` drivers of [`methods`]. Problems whose grids change over
//! time or whose time steps hold several deterministic periods have their
//! own drivers there.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, configuration and error definitions.
pub use sdp_core as core;

/// Numerical helpers: random numbers, least squares, statistics.
pub use sdp_math as math;

/// Full and sparse space grids, interpolators and grid snapshots.
pub use sdp_grids as grids;

/// Regressions, trees and continuation values.
pub use sdp_regression as regression;

/// Keyed binary archives.
pub use sdp_archive as archive;

/// Communicators and grid domain decomposition.
pub use sdp_parallel as parallel;

/// Simulators, transition steps and drivers.
pub use sdp_methods as methods;
