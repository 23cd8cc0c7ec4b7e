//! # sdp-regression
//!
//! Conditional expectation operators used by backward induction:
//!
//! * [`LocalConstRegression`] and [`GlobalRegression`], estimating
//!   `E[f | X]` from Monte-Carlo particles;
//! * [`Tree`], weighting the values of the following step by transition
//!   probabilities.
//!
//! Continuation objects pair a space grid with one of these operators:
//! [`ContinuationValue`] and [`ContinuationValueTree`] during the backward
//! pass, [`GridAndRegressedValue`] and [`GridTreeValue`] as the owned form
//! read back for forward simulation.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// The `Regression` capability trait.
pub mod regression;

/// Piecewise constant regression on equiprobable meshes.
pub mod local_const;

/// Global polynomial regression.
pub mod global;

/// Closed set of regressors.
pub mod regressor;

/// Discrete transition trees.
pub mod tree;

/// Continuation values built from a regression.
pub mod continuation;

/// Continuation values built from a tree.
pub mod continuation_tree;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use continuation::{ContinuationValue, GridAndRegressedValue};
pub use continuation_tree::{ContinuationValueTree, GridTreeValue};
pub use global::GlobalRegression;
pub use local_const::LocalConstRegression;
pub use regression::Regression;
pub use regressor::Regressor;
pub use tree::Tree;
