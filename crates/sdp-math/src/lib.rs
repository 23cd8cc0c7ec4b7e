//! # sdp-math
//!
//! Mathematical utilities used by the grids, regressions and simulators:
//! normal distribution helpers, Mersenne-Twister based random numbers, a
//! statistics accumulator, Gauss-Lobatto-Legendre nodes with barycentric
//! Lagrange weights, and SVD-based least squares.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Normal distribution: cumulative and inverse cumulative.
pub mod normal;

/// Gauss-Lobatto-Legendre nodes and Lagrange interpolation weights.
pub mod legendre;

/// Least squares with several right-hand sides, solved by SVD.
pub mod least_squares;

/// Random number generators.
pub mod random_numbers;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use least_squares::LeastSquares;
pub use legendre::{lagrange_weights, LobattoNodes};
pub use normal::{normal_cdf, normal_cdf_inverse};
pub use random_numbers::{InverseCumulativeNormalRng, MersenneTwisterUniformRng};
pub use statistics::Statistics;
