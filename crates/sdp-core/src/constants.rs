//! Numerical constants.

use crate::Real;

/// Tolerance used for probability sums and coordinate equality.
pub const TINY: Real = 1e-9;
