//! Dynamic programming by backward induction.
//!
//! # Overview
//!
//! * [`FinalStepDp`]: value arrays at the last date.
//! * [`transition`]: one backward time step, as a typestate
//!   `Uninitialized -> ContinuationBuilt -> Optimized -> Dumped`, and the
//!   multi-stage step chaining one of them per deterministic period.
//! * [`simulate`]: one forward time step replaying the stored policy.
//! * [`drivers`]: the loops over all dates.
//!
//! Every value array has one row per simulation (or tree node) and one
//! column per grid point of the rank's box.

/// Explicit distributed execution context.
pub mod context;

/// Pluggable optimizers.
pub mod optimizer;

/// Simulation states.
pub mod state;

/// Terminal values.
pub mod final_step;

/// Stock grids changing with the date.
pub mod schedule;

/// Archive records of a time step.
pub mod record;

/// Backward time steps.
pub mod transition;

/// Forward time steps.
pub mod simulate;

/// Backward and forward passes.
pub mod drivers;

pub use context::ExecutionContext;
pub use final_step::FinalStepDp;
pub use optimizer::{AtPeriod, OptimizerDp, OptimizerDpTree, OptimizerMultiStageDp};
pub use record::{ArchiveSink, ArchiveSource, StepRecord, TreeShape};
pub use schedule::GridSchedule;
pub use simulate::{
    SimulateStepMultiStageRegression, SimulateStepRegression, SimulateStepRegressionControl,
    SimulateStepTree, SimulateStepTreeControl,
};
pub use state::{StateTreeStocks, StateWithStocks};
pub use transition::{
    TransitionDumped, TransitionStepMultiStageRegression, TransitionStepRegression,
    TransitionStepTree,
};

