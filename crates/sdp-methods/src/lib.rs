//! # sdp-methods
//!
//! Backward induction and forward simulation of stochastic control problems.
//!
//! * [`simulators`]: Monte-Carlo particles ([`BlackScholesSimulator`]) and
//!   discrete trees ([`TrinomialTreeSimulator`]) driving the uncertainty.
//! * [`dp`]: the optimizer interfaces, the final step, the transition steps
//!   of one backward time step, the forward simulation steps and the drivers
//!   chaining them over all dates, with multi-stage, varying-grid and
//!   regime-switching variants.
//!
//! A backward pass writes one record per time step to a checkpoint archive;
//! a forward pass replays the optimal policy from those records.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Particle and tree simulators.
pub mod simulators;

/// Dynamic programming: transition steps, simulation steps, drivers.
pub mod dp;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use dp::drivers::{
    deterministic_record, dynamic_programming_by_regression,
    dynamic_programming_by_regression_multi_stage, dynamic_programming_by_regression_varying_grids,
    dynamic_programming_by_tree, simulate_multi_stage_regression, simulate_regression,
    simulate_regression_control, simulate_regression_switch, simulate_tree, simulate_tree_control,
    SwitchingPaths, CONTINUATION, CONTINUATION_DET,
};
pub use dp::{
    ExecutionContext, FinalStepDp, GridSchedule, OptimizerDp, OptimizerDpTree,
    OptimizerMultiStageDp, StateTreeStocks, StateWithStocks,
};
pub use simulators::{BlackScholesSimulator, Simulator, TreeSimulator, TrinomialTreeSimulator};
