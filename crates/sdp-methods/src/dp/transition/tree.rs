use log::debug;
use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::SpaceGrid;
use sdp_regression::{ContinuationValueTree, Tree};

use super::{gather_on_root, optimize_points, Frame, StepLayout, TransitionDumped};
use crate::dp::context::ExecutionContext;
use crate::dp::optimizer::OptimizerDpTree;
use crate::dp::record::{ArchiveSink, StepRecord, TreeShape};
use crate::simulators::TreeSimulator;

/// Backward step with conditional expectations through a tree: rows of
/// every array are the tree nodes of the date.
#[derive(Debug)]
pub struct TransitionStepTree<'a, S, O> {
    frame: Frame<'a, S, O>,
}

impl<'a, S, O> TransitionStepTree<'a, S, O>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
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

    /// Expectations through `tree` of `values_next` (one
    /// `nb_nodes_next x owned points` array per regime). Collective.
    pub fn build_continuation(
        self,
        values_next: Vec<DMatrix<Real>>,
        tree: &'a Tree,
    ) -> Result<TreeContinuationBuilt<'a, S, O>> {
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
                .map(|v| ContinuationValueTree::new(grid, tree, v).map(ContinuationValueTree::into_coefficients))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(TreeContinuationBuilt {
            frame: self.frame,
            tree,
            values_next,
            local_grid,
            coefficients,
        })
    }

    /// The three phases in a row.
    pub fn one_step(
        self,
        values_next: Vec<DMatrix<Real>>,
        tree: &'a Tree,
        sink: &mut ArchiveSink,
        name: &str,
    ) -> Result<TransitionDumped> {
        self.build_continuation(values_next, tree)?
            .optimize()?
            .dump(sink, name)
    }
}

/// Tree expectations are available on the local following grid.
#[derive(Debug)]
pub struct TreeContinuationBuilt<'a, S, O> {
    frame: Frame<'a, S, O>,
    tree: &'a Tree,
    values_next: Vec<DMatrix<Real>>,
    local_grid: Option<SpaceGrid>,
    coefficients: Vec<DMatrix<Real>>,
}

impl<'a, S, O> TreeContinuationBuilt<'a, S, O>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
{
    /// Part of the following grid reachable from this rank's points.
    pub fn local_grid(&self) -> Option<&SpaceGrid> {
        self.local_grid.as_ref()
    }

    /// Continuation value per regime; empty when this rank owns no point.
    pub fn continuation(&self) -> Result<Vec<ContinuationValueTree<'_>>> {
        match &self.local_grid {
            Some(grid) => self
                .coefficients
                .iter()
                .map(|c| ContinuationValueTree::from_coefficients(grid, c.clone()))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Optimize at every owned point of the current grid.
    pub fn optimize(self) -> Result<TreeOptimized<'a, S, O>> {
        let Self {
            frame,
            tree,
            values_next,
            local_grid,
            coefficients,
        } = self;
        let optimizer = frame.optimizer;
        let simulator = frame.simulator;
        let shape = (tree.nb_nodes(), optimizer.nb_regime(), optimizer.nb_control());
        let (values, controls) = match &local_grid {
            Some(grid) => {
                let continuation = coefficients
                    .into_iter()
                    .map(|c| ContinuationValueTree::from_coefficients(grid, c))
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
            "step {}: rank {} optimized {} points on {} nodes",
            frame.step,
            frame.ctx.rank(),
            frame.layout.points.len(),
            shape.0
        );
        Ok(TreeOptimized {
            frame,
            tree,
            values_next,
            values,
            controls,
        })
    }
}

/// Values and controls are known on the owned current points.
#[derive(Debug)]
pub struct TreeOptimized<'a, S, O> {
    frame: Frame<'a, S, O>,
    tree: &'a Tree,
    values_next: Vec<DMatrix<Real>>,
    values: Vec<DMatrix<Real>>,
    controls: Vec<DMatrix<Real>>,
}

impl<'a, S, O> TreeOptimized<'a, S, O>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
{
    /// Value per regime (`nb_nodes x owned points`).
    pub fn values(&self) -> &[DMatrix<Real>] {
        &self.values
    }

    /// Control per control (`nb_nodes x owned points`).
    pub fn controls(&self) -> &[DMatrix<Real>] {
        &self.controls
    }

    /// Write the step record under `(name, step)`. Collective in one-file
    /// mode.
    pub fn dump(self, sink: &mut ArchiveSink, name: &str) -> Result<TransitionDumped> {
        let f = &self.frame;
        let expect = |arrays: &[DMatrix<Real>]| -> Result<Vec<DMatrix<Real>>> {
            arrays.iter().map(|a| self.tree.expected_value_multiple(a)).collect()
        };
        let operator = TreeShape {
            nb_nodes: self.tree.nb_nodes(),
        };
        let record = if f.ctx.config().one_file {
            let next = gather_on_root(&f.ctx, &f.layout.following, &self.values_next)?;
            let controls = gather_on_root(&f.ctx, &f.layout.current, &self.controls)?;
            match (next, controls) {
                (Some(next), Some(controls)) => Some(StepRecord {
                    following_grid: None,
                    current_grid: None,
                    following_region: f.layout.following.full_box(),
                    current_region: f.layout.current.full_box(),
                    operator,
                    continuation: expect(&next)?,
                    controls,
                }),
                _ => None,
            }
        } else {
            Some(StepRecord {
                following_grid: None,
                current_grid: None,
                following_region: f.layout.owned_following.clone(),
                current_region: f.layout.owned.clone(),
                operator,
                continuation: expect(&self.values_next)?,
                controls: self.controls.clone(),
            })
        };
        if let Some(record) = record {
            sink.write_step(name, f.step, f.grid_following, f.grid_current, record)?;
        }
        Ok(TransitionDumped {
            values: self.values,
            controls: self.controls,
        })
    }
}
