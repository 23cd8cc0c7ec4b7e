use log::debug;
use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::SpaceGrid;
use sdp_regression::Regressor;

use super::{TransitionDumped, TransitionStepRegression};
use crate::dp::context::ExecutionContext;
use crate::dp::optimizer::{AtPeriod, OptimizerMultiStageDp};
use crate::dp::record::ArchiveSink;
use crate::simulators::Simulator;

/// Backward step made of several deterministic periods sharing one
/// regressor.
///
/// Periods are solved from the last to the first. The last one maps the
/// following grid to the current grid against the regressed values of the
/// following date and is written under `(name, step)`. Every earlier period
/// `p` stays on the current grid, uses the values of period `p + 1` as its
/// continuation and is written under `(name_det, p)`.
#[derive(Debug)]
pub struct TransitionStepMultiStageRegression<'a, S, O> {
    grid_current: &'a SpaceGrid,
    grid_following: &'a SpaceGrid,
    optimizer: &'a O,
    simulator: &'a S,
    ctx: ExecutionContext<'a>,
    step: usize,
}

impl<'a, S, O> TransitionStepMultiStageRegression<'a, S, O>
where
    S: Simulator + Sync,
    O: OptimizerMultiStageDp<S>,
{
    /// Step number `step` of the backward pass. The simulator must be at the
    /// current date.
    pub fn new(
        grid_current: &'a SpaceGrid,
        grid_following: &'a SpaceGrid,
        optimizer: &'a O,
        simulator: &'a S,
        ctx: ExecutionContext<'a>,
        step: usize,
    ) -> Self {
        Self {
            grid_current,
            grid_following,
            optimizer,
            simulator,
            ctx,
            step,
        }
    }

    /// Number of periods of the step.
    pub fn nb_periods(&self) -> usize {
        self.optimizer.nb_periods_in_transition(self.simulator)
    }

    /// Solve every period and write their records. `regressor` must already
    /// hold the particles of the current date. Collective.
    pub fn one_step(
        self,
        values_next: Vec<DMatrix<Real>>,
        regressor: &Regressor,
        sink: &mut ArchiveSink,
        name: &str,
        name_det: &str,
    ) -> Result<TransitionDumped> {
        let nb_periods = self.nb_periods();
        ensure!(nb_periods >= 1, "step {} holds no period", self.step);
        let last = nb_periods - 1;

        let at = AtPeriod::new(self.optimizer, last);
        let mut dumped = TransitionStepRegression::new(
            self.grid_current,
            self.grid_following,
            &at,
            self.simulator,
            self.ctx,
            self.step,
        )?
        .build_continuation(values_next, regressor)?
        .optimize()?
        .dump(sink, name)?;

        for period in (0..last).rev() {
            let at = AtPeriod::new(self.optimizer, period);
            dumped = TransitionStepRegression::new(
                self.grid_current,
                self.grid_current,
                &at,
                self.simulator,
                self.ctx,
                self.step,
            )?
            .build_continuation(dumped.into_values(), regressor)?
            .optimize()?
            .dump_at(sink, name_det, period)?;
        }
        debug!("step {}: {nb_periods} periods solved", self.step);
        Ok(dumped)
    }
}
