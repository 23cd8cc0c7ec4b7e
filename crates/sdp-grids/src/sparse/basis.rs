//! One-dimensional hierarchical bases of sparse grids on `[0, 1]`.
//!
//! A 1-D point is a pair `(level, position)`. At level `l >= 1` positions are
//! odd, `1 <= i < 2^l`, with node `i / 2^l`. Level 0 exists only with
//! boundary points and holds positions 0 and 1 (nodes 0 and 1).
//!
//! Bases are evaluated outside `[0, 1]` by extending the boundary functions
//! linearly, which makes extrapolation exact for affine functions.

use sdp_core::Real;

/// Node abscissa on `[0, 1]`.
pub fn node(level: u8, position: u32) -> Real {
    if level == 0 {
        position as Real
    } else {
        position as Real / (1u64 << level) as Real
    }
}

/// Basis function of `(level, position)` evaluated at `x`.
pub fn phi(level: u8, position: u32, x: Real, with_boundary: bool) -> Real {
    if level == 0 {
        return if position == 0 { 1.0 - x } else { x };
    }
    let n = (1u64 << level) as Real;
    let i = position as Real;
    if with_boundary {
        return hat(n * x - i);
    }
    if level == 1 {
        return 1.0;
    }
    if position == 1 {
        (2.0 - n * x).max(0.0)
    } else if position as u64 == (1u64 << level) - 1 {
        (n * x - i + 1.0).max(0.0)
    } else {
        hat(n * x - i)
    }
}

fn hat(t: Real) -> Real {
    (1.0 - t.abs()).max(0.0)
}

/// The level-`level` position whose support contains `x` (`level >= 1`),
/// clamped to the domain so that boundary functions extend outside.
pub fn containing_position(level: u8, x: Real) -> u32 {
    let half = (1u64 << (level - 1)) as Real;
    let k = (x * half).floor().clamp(0.0, half - 1.0);
    2 * k as u32 + 1
}

/// Hierarchical ancestors of `(level, position)`: every coarser 1-D point
/// whose basis function does not vanish at this point's node.
pub fn ancestors(level: u8, position: u32, with_boundary: bool) -> Vec<(u8, u32)> {
    let mut out = Vec::with_capacity(level as usize + 2);
    if level == 0 {
        return out;
    }
    if with_boundary {
        out.push((0, 0));
        out.push((0, 1));
    }
    for k in 1..level {
        let j = 2 * (position >> (level - k + 1)) + 1;
        out.push((k, j));
    }
    out
}
