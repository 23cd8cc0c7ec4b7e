//! One backward time step.
//!
//! A transition step links the grid of the current date to the grid of the
//! following date. Its phases are types:
//!
//! 1. `TransitionStep*` (uninitialized): splittings of both grids are known.
//! 2. `*ContinuationBuilt`: the following values reachable from this rank
//!    (the optimizer's cone) were fetched from their owners and turned into
//!    one continuation value per regime.
//! 3. `*Optimized`: the optimizer ran at every grid point owned by this
//!    rank.
//! 4. [`TransitionDumped`]: the step record was written.
//!
//! The regression and tree variants differ only in how the continuation is
//! built. A multi-stage step chains one regression step per deterministic
//! period.

use log::warn;
use nalgebra::DMatrix;
use rayon::prelude::*;

use sdp_core::{
    ensure,
    errors::{Error, Result},
    FailurePolicy, ProcessConfig, Real,
};
use sdp_grids::{Grid, IndexBox, SpaceGrid};
use sdp_parallel::{exchange_values, reconstruct_on_proc0, GridSplitting};

use super::context::ExecutionContext;

/// Transition step with a regression operator.
pub mod regression;

/// Transition step with a tree operator.
pub mod tree;

/// Transition step made of deterministic periods.
pub mod multistage;

pub use regression::{
    RegressionContinuationBuilt, RegressionOptimized, TransitionStepRegression,
};
pub use multistage::TransitionStepMultiStageRegression;
pub use tree::{TransitionStepTree, TreeContinuationBuilt, TreeOptimized};

// ─── Layout ───────────────────────────────────────────────────────────────────

/// What every phase of a step refers to.
#[derive(Debug)]
pub(crate) struct Frame<'a, S, O> {
    pub grid_current: &'a SpaceGrid,
    pub grid_following: &'a SpaceGrid,
    pub optimizer: &'a O,
    pub simulator: &'a S,
    pub ctx: ExecutionContext<'a>,
    pub step: usize,
    pub layout: StepLayout,
}

/// Splittings of the two grids of a step and the points owned by this rank.
#[derive(Debug, Clone)]
pub(crate) struct StepLayout {
    pub current: GridSplitting,
    pub following: GridSplitting,
    /// Box of the current grid owned by this rank.
    pub owned: IndexBox,
    /// Box of the following grid owned by this rank.
    pub owned_following: IndexBox,
    /// Grid indices of the owned current points, in box order.
    pub points: Vec<usize>,
}

impl StepLayout {
    pub fn new(
        grid_current: &SpaceGrid,
        grid_following: &SpaceGrid,
        splittable: &[bool],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let current = GridSplitting::for_grid(grid_current, splittable, ctx.size())?;
        let following = GridSplitting::for_grid(grid_following, splittable, ctx.size())?;
        let owned = current.local_box(ctx.rank());
        let owned_following = following.local_box(ctx.rank());
        let points = current.point_indices(&owned);
        Ok(Self {
            current,
            following,
            owned,
            owned_following,
            points,
        })
    }

    /// The following grid restricted to the cone of the owned current
    /// points, with the values of `values_next` there. Collective: every
    /// rank calls it, ranks without points get `None`.
    pub fn fetch_cone(
        &self,
        ctx: &ExecutionContext<'_>,
        grid_current: &SpaceGrid,
        grid_following: &SpaceGrid,
        cone: impl Fn(&[[Real; 2]]) -> Vec<[Real; 2]>,
        values_next: &[DMatrix<Real>],
    ) -> Result<(Option<SpaceGrid>, Vec<DMatrix<Real>>)> {
        let wanted = match self.current.region(grid_current, &self.owned) {
            Some(region) => self.following.cone_box(grid_following, &cone(&region))?,
            None => IndexBox::empty(self.following.sizes().len()),
        };
        let values = exchange_values(ctx.comm(), &self.following, values_next, &wanted)?;
        let grid = if wanted.is_empty() {
            None
        } else {
            Some(self.following.sub_grid(grid_following, &wanted)?)
        };
        Ok((grid, values))
    }
}

// ─── Point loop ───────────────────────────────────────────────────────────────

/// Run `solve` at every point of `points` and scatter the solutions into one
/// `nb_rows x points` array per regime and per control. Failed points are
/// handled by the configured [`FailurePolicy`].
pub(crate) fn optimize_points<F>(
    grid: &SpaceGrid,
    points: &[usize],
    config: &ProcessConfig,
    step: usize,
    (nb_rows, nb_regime, nb_control): (usize, usize, usize),
    solve: F,
) -> Result<(Vec<DMatrix<Real>>, Vec<DMatrix<Real>>)>
where
    F: Fn(&[Real]) -> Result<(DMatrix<Real>, DMatrix<Real>)> + Sync,
{
    let run = |&point: &usize| -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        let (v, c) = solve(&grid.coordinates(point))?;
        ensure!(
            v.shape() == (nb_rows, nb_regime) && c.shape() == (nb_rows, nb_control),
            "optimizer returned values {:?} and controls {:?}, expected ({nb_rows}, {nb_regime}) and ({nb_rows}, {nb_control})",
            v.shape(),
            c.shape()
        );
        Ok((v, c))
    };
    let solutions: Vec<Result<(DMatrix<Real>, DMatrix<Real>)>> = if config.parallel {
        points.par_iter().map(run).collect()
    } else {
        points.iter().map(run).collect()
    };

    let mut values = vec![DMatrix::<Real>::zeros(nb_rows, points.len()); nb_regime];
    let mut controls = vec![DMatrix::<Real>::zeros(nb_rows, points.len()); nb_control];
    for (j, (solution, &point)) in solutions.into_iter().zip(points).enumerate() {
        match solution {
            Ok((v, c)) => {
                for (r, m) in values.iter_mut().enumerate() {
                    m.set_column(j, &v.column(r));
                }
                for (k, m) in controls.iter_mut().enumerate() {
                    m.set_column(j, &c.column(k));
                }
            }
            Err(e) => {
                let fill = match config.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(Error::PointOptimization {
                            step,
                            point,
                            reason: e.to_string(),
                        })
                    }
                    FailurePolicy::PropagateNan => Real::NAN,
                    FailurePolicy::Fill(v) => v,
                };
                warn!("step {step}: optimization failed at point {point} ({e}), storing {fill}");
                for m in values.iter_mut().chain(controls.iter_mut()) {
                    m.column_mut(j).fill(fill);
                }
            }
        }
    }
    Ok((values, controls))
}

/// Full arrays on rank 0 from the owned parts. Collective.
pub(crate) fn gather_on_root(
    ctx: &ExecutionContext<'_>,
    splitting: &GridSplitting,
    arrays: &[DMatrix<Real>],
) -> Result<Option<Vec<DMatrix<Real>>>> {
    let mut out = Vec::with_capacity(arrays.len());
    for a in arrays {
        if let Some(full) = reconstruct_on_proc0(ctx.comm(), splitting, a)? {
            out.push(full);
        }
    }
    Ok(ctx.is_root().then_some(out))
}

// ─── Result ───────────────────────────────────────────────────────────────────

/// A completed time step: values and controls on the owned current points.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDumped {
    values: Vec<DMatrix<Real>>,
    controls: Vec<DMatrix<Real>>,
}

impl TransitionDumped {
    /// Value per regime.
    pub fn values(&self) -> &[DMatrix<Real>] {
        &self.values
    }

    /// Control per control.
    pub fn controls(&self) -> &[DMatrix<Real>] {
        &self.controls
    }

    /// The values, input of the previous date's step.
    pub fn into_values(self) -> Vec<DMatrix<Real>> {
        self.values
    }
}
