use log::debug;
use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::SpaceGrid;
use sdp_regression::{ContinuationValue, Regression, Regressor};

use super::{gather_on_root, optimize_points, Frame, StepLayout, TransitionDumped};
use crate::dp::context::ExecutionContext;
use crate::dp::optimizer::OptimizerDp;
use crate::dp::record::{ArchiveSink, StepRecord};
use crate::simulators::Simulator;

/// Regression coefficients of every array, column by column.
fn regress_all(regressor: &Regressor, arrays: &[DMatrix<Real>]) -> Result<Vec<DMatrix<Real>>> {
    arrays
        .iter()
        .map(|a| {
            if a.ncols() == 0 {
                Ok(DMatrix::zeros(regressor.nb_basis(), 0))
            } else {
                regressor.coordinates_basis_function_multiple(a)
            }
        })
        .collect()
}

/// Backward step from the grid of the following date to the grid of the
/// current date, with conditional expectations by regression.
#[derive(Debug)]
pub struct TransitionStepRegression<'a, S, O> {
    frame: Frame<'a, S, O>,
}

impl<'a, S, O> TransitionStepRegression<'a, S, O>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
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
    ) -> Result<Self> {
        let layout = StepLayout::new(grid_current, grid_following, &optimizer.dimension_to_split(), &ctx)?;
        Ok(Self {
            frame: Frame {
                grid_current,
                grid_following,
                optimizer,
                simulator,
                ctx,
                step,
                layout,
            },
        })
    }

    /// Points of the current grid processed by this rank.
    pub fn owned_points(&self) -> &[usize] {
        &self.frame.layout.points
    }

    /// Regress `values_next` (one array per regime over the following points
    /// owned by this rank) with `regressor`, already updated with the
    /// particles of the current date. Collective.
    pub fn build_continuation(
        self,
        values_next: Vec<DMatrix<Real>>,
        regressor: &'a Regressor,
    ) -> Result<RegressionContinuationBuilt<'a, S, O>> {
        let f = &self.frame;
        ensure!(
            values_next.len() == f.optimizer.nb_regime(),
            "{} value arrays for {} regimes",
            values_next.len(),
            f.optimizer.nb_regime()
        );
        let (local_grid, local_values) = f.layout.fetch_cone(
            &f.ctx,
            f.grid_current,
            f.grid_following,
            |region| f.optimizer.cone(region),
            &values_next,
        )?;
        let coefficients = match &local_grid {
            Some(grid) => local_values
                .iter()
                .map(|v| ContinuationValue::new(grid, regressor, v).map(ContinuationValue::into_coefficients))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(RegressionContinuationBuilt {
            frame: self.frame,
            regressor,
            values_next,
            local_grid,
            coefficients,
        })
    }

    /// The three phases in a row.
    pub fn one_step(
        self,
        values_next: Vec<DMatrix<Real>>,
        regressor: &'a Regressor,
        sink: &mut ArchiveSink,
        name: &str,
    ) -> Result<TransitionDumped> {
        self.build_continuation(values_next, regressor)?
            .optimize()?
            .dump(sink, name)
    }
}

/// Continuation values are available on the local following grid.
#[derive(Debug)]
pub struct RegressionContinuationBuilt<'a, S, O> {
    frame: Frame<'a, S, O>,
    regressor: &'a Regressor,
    values_next: Vec<DMatrix<Real>>,
    local_grid: Option<SpaceGrid>,
    coefficients: Vec<DMatrix<Real>>,
}

impl<'a, S, O> RegressionContinuationBuilt<'a, S, O>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
{
    /// Part of the following grid reachable from this rank's points.
    pub fn local_grid(&self) -> Option<&SpaceGrid> {
        self.local_grid.as_ref()
    }

    /// Continuation value per regime; empty when this rank owns no point.
    pub fn continuation(&self) -> Result<Vec<ContinuationValue<'_>>> {
        match &self.local_grid {
            Some(grid) => self
                .coefficients
                .iter()
                .map(|c| ContinuationValue::from_coefficients(grid, self.regressor, c.clone()))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Optimize at every owned point of the current grid.
    pub fn optimize(self) -> Result<RegressionOptimized<'a, S, O>> {
        let Self {
            frame,
            regressor,
            values_next,
            local_grid,
            coefficients,
        } = self;
        let optimizer = frame.optimizer;
        let simulator = frame.simulator;
        let shape = (regressor.nb_simul(), optimizer.nb_regime(), optimizer.nb_control());
        let (values, controls) = match &local_grid {
            Some(grid) => {
                let continuation = coefficients
                    .into_iter()
                    .map(|c| ContinuationValue::from_coefficients(grid, regressor, c))
                    .collect::<Result<Vec<_>>>()?;
                let following = frame.grid_following;
                optimize_points(
                    frame.grid_current,
                    &frame.layout.points,
                    frame.ctx.config(),
                    frame.step,
                    shape,
                    |stock| optimizer.step_optimize(simulator, following, stock, &continuation),
                )?
            }
            None => (
                vec![DMatrix::zeros(shape.0, 0); shape.1],
                vec![DMatrix::zeros(shape.0, 0); shape.2],
            ),
        };
        debug!(
            "step {}: rank {} optimized {} points",
            frame.step,
            frame.ctx.rank(),
            frame.layout.points.len()
        );
        Ok(RegressionOptimized {
            frame,
            regressor,
            values_next,
            values,
            controls,
        })
    }
}

/// Values and controls are known on the owned current points.
#[derive(Debug)]
pub struct RegressionOptimized<'a, S, O> {
    frame: Frame<'a, S, O>,
    regressor: &'a Regressor,
    values_next: Vec<DMatrix<Real>>,
    values: Vec<DMatrix<Real>>,
    controls: Vec<DMatrix<Real>>,
}

impl<'a, S, O> RegressionOptimized<'a, S, O>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
{
    /// Value per regime (`nb_simul x owned points`).
    pub fn values(&self) -> &[DMatrix<Real>] {
        &self.values
    }

    /// Control per control (`nb_simul x owned points`).
    pub fn controls(&self) -> &[DMatrix<Real>] {
        &self.controls
    }

    /// Write the step record under `(name, step)`. Collective in one-file
    /// mode.
    pub fn dump(self, sink: &mut ArchiveSink, name: &str) -> Result<TransitionDumped> {
        let step = self.frame.step;
        self.dump_at(sink, name, step)
    }

    /// Write the step record under `(name, key)`.
    pub fn dump_at(self, sink: &mut ArchiveSink, name: &str, key: usize) -> Result<TransitionDumped> {
        let f = &self.frame;
        let record = if f.ctx.config().one_file {
            let next = gather_on_root(&f.ctx, &f.layout.following, &self.values_next)?;
            let controls = gather_on_root(&f.ctx, &f.layout.current, &self.controls)?;
            match (next, controls) {
                (Some(next), Some(controls)) => Some(StepRecord {
                    following_grid: None,
                    current_grid: None,
                    following_region: f.layout.following.full_box(),
                    current_region: f.layout.current.full_box(),
                    operator: self.regressor.clone(),
                    continuation: regress_all(self.regressor, &next)?,
                    controls: regress_all(self.regressor, &controls)?,
                }),
                _ => None,
            }
        } else {
            Some(StepRecord {
                following_grid: None,
                current_grid: None,
                following_region: f.layout.owned_following.clone(),
                current_region: f.layout.owned.clone(),
                operator: self.regressor.clone(),
                continuation: regress_all(self.regressor, &self.values_next)?,
                controls: regress_all(self.regressor, &self.controls)?,
            })
        };
        if let Some(record) = record {
            sink.write_step(name, key, f.grid_following, f.grid_current, record)?;
        }
        Ok(TransitionDumped {
            values: self.values,
            controls: self.controls,
        })
    }
}
