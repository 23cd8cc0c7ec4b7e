//! # sdp-core
//!
//! Core types, error definitions and process configuration for stochdp.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace – type aliases, the error hierarchy with its
//! `ensure!` / `fail!` macros, numerical constants and the explicit
//! [`ProcessConfig`] passed to the distributed components.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Process configuration (archive layout, loop parallelism, failure policy).
pub mod config;

/// Numerical constants shared by grids, regressions and optimizers.
pub mod constants;

/// Error types and the `ensure!` / `fail!` / `ensure_post!` macros.
pub mod errors;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// A time measurement in years.
pub type Time = Real;

/// Discrete mode of the controlled system (operational state).
pub type Regime = usize;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use config::{FailurePolicy, ProcessConfig};
pub use errors::{Error, Result};
