//! One forward time step.
//!
//! A simulate step reads the record a backward step wrote for the same date
//! and moves every path one date forward, either re-optimizing against the
//! stored continuation values or applying the stored controls. Every rank
//! simulates all paths; only reading the record is collective.
//!
//! `phi` holds the followed functions of every path, one column per path
//! (`simu_func_size x nb_simul`).
//!
//! A multi-stage step reads one record per deterministic period and runs
//! the periods in order on every path.

use nalgebra::DMatrix;
use rayon::prelude::*;

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{SpaceGrid, SpectralInterpolator};
use sdp_regression::{GridAndRegressedValue, GridTreeValue, Regressor};

use super::context::ExecutionContext;
use super::optimizer::{OptimizerDp, OptimizerDpTree, OptimizerMultiStageDp};
use super::record::{ArchiveSource, TreeShape};
use super::state::{StateTreeStocks, StateWithStocks};
use crate::simulators::{Simulator, TreeSimulator};

fn check_paths(nb_states: usize, phi: &DMatrix<Real>, simu_func_size: usize) -> Result<()> {
    ensure!(simu_func_size >= 1, "at least one function must be followed");
    ensure!(
        phi.shape() == (simu_func_size, nb_states),
        "phi of shape {:?} for {nb_states} paths and {simu_func_size} functions",
        phi.shape()
    );
    Ok(())
}

/// Run `advance` on every path, in parallel when asked.
fn for_each_path<T, F>(parallel: bool, states: &mut [T], phi: &mut DMatrix<Real>, advance: F) -> Result<()>
where
    T: Send,
    F: Fn(usize, &mut T, &mut [Real]) -> Result<()> + Sync,
{
    let n = phi.nrows();
    if parallel {
        states
            .par_iter_mut()
            .zip(phi.as_mut_slice().par_chunks_mut(n))
            .enumerate()
            .map(|(is, (state, column))| advance(is, state, column))
            .collect()
    } else {
        states
            .iter_mut()
            .zip(phi.as_mut_slice().chunks_mut(n))
            .enumerate()
            .try_for_each(|(is, (state, column))| advance(is, state, column))
    }
}

fn regressed(grid: &SpaceGrid, regressor: &Regressor, arrays: &[DMatrix<Real>]) -> Result<Vec<GridAndRegressedValue>> {
    arrays
        .iter()
        .map(|a| {
            let spectral = SpectralInterpolator::new(grid, a)?;
            GridAndRegressedValue::new(grid.clone(), regressor.clone(), spectral)
        })
        .collect()
}

fn on_tree(grid: &SpaceGrid, nb_nodes: usize, arrays: &[DMatrix<Real>]) -> Result<Vec<GridTreeValue>> {
    arrays
        .iter()
        .map(|a| {
            ensure!(
                a.nrows() == nb_nodes,
                "{} rows stored for a tree of {nb_nodes} nodes",
                a.nrows()
            );
            GridTreeValue::from_values(grid.clone(), a)
        })
        .collect()
}

// ─── Regression ───────────────────────────────────────────────────────────────

/// Forward step re-optimizing against stored continuation values.
#[derive(Debug)]
pub struct SimulateStepRegression<'a, O> {
    optimizer: &'a O,
    parallel: bool,
    grid: SpaceGrid,
    continuation: Vec<GridAndRegressedValue>,
}

impl<'a, O> SimulateStepRegression<'a, O> {
    /// Read record `(name, step)`. Collective in per-rank mode.
    pub fn new(
        source: &ArchiveSource,
        name: &str,
        step: usize,
        optimizer: &'a O,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let loaded = source.load_step::<Regressor>(ctx, name, step)?;
        let continuation = regressed(&loaded.following_grid, &loaded.operator, &loaded.continuation)?;
        Ok(Self {
            optimizer,
            parallel: ctx.config().parallel,
            grid: loaded.following_grid,
            continuation,
        })
    }

    /// Stored continuation value per regime.
    pub fn continuation(&self) -> &[GridAndRegressedValue] {
        &self.continuation
    }

    /// Advance every path from the simulator's current date.
    pub fn one_step<S>(&self, simulator: &S, states: &mut [StateWithStocks], phi: &mut DMatrix<Real>) -> Result<()>
    where
        S: Simulator + Sync,
        O: OptimizerDp<S>,
    {
        check_paths(states.len(), phi, self.optimizer.simu_func_size())?;
        let particles = simulator.particles();
        for_each_path(self.parallel, states, phi, |is, state, column| {
            state.realization = particles.column(is).iter().copied().collect();
            self.optimizer
                .step_simulate(simulator, &self.grid, &self.continuation, state, column)
        })
    }
}

/// Forward step applying stored controls.
#[derive(Debug)]
pub struct SimulateStepRegressionControl<'a, O> {
    optimizer: &'a O,
    parallel: bool,
    grid: SpaceGrid,
    control: Vec<GridAndRegressedValue>,
}

impl<'a, O> SimulateStepRegressionControl<'a, O> {
    /// Read record `(name, step)`. Collective in per-rank mode.
    pub fn new(
        source: &ArchiveSource,
        name: &str,
        step: usize,
        optimizer: &'a O,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let loaded = source.load_step::<Regressor>(ctx, name, step)?;
        let control = regressed(&loaded.current_grid, &loaded.operator, &loaded.controls)?;
        Ok(Self {
            optimizer,
            parallel: ctx.config().parallel,
            grid: loaded.following_grid,
            control,
        })
    }

    /// Stored control per control.
    pub fn control(&self) -> &[GridAndRegressedValue] {
        &self.control
    }

    /// Advance every path from the simulator's current date.
    pub fn one_step<S>(&self, simulator: &S, states: &mut [StateWithStocks], phi: &mut DMatrix<Real>) -> Result<()>
    where
        S: Simulator + Sync,
        O: OptimizerDp<S>,
    {
        check_paths(states.len(), phi, self.optimizer.simu_func_size())?;
        let particles = simulator.particles();
        for_each_path(self.parallel, states, phi, |is, state, column| {
            state.realization = particles.column(is).iter().copied().collect();
            self.optimizer
                .step_simulate_control(simulator, &self.grid, &self.control, state, column)
        })
    }
}

/// Forward step of a multi-stage problem.
#[derive(Debug)]
pub struct SimulateStepMultiStageRegression<'a, O> {
    optimizer: &'a O,
    parallel: bool,
    /// Grid at the end of every period and the continuation there.
    periods: Vec<(SpaceGrid, Vec<GridAndRegressedValue>)>,
}

impl<'a, O> SimulateStepMultiStageRegression<'a, O> {
    /// Read the `nb_periods` records of `step`: `(name_det, p)` for every
    /// period but the last, `(name, step)` for the last one. Collective in
    /// per-rank mode.
    pub fn new(
        source: &ArchiveSource,
        (name, name_det): (&str, &str),
        step: usize,
        nb_periods: usize,
        optimizer: &'a O,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        ensure!(nb_periods >= 1, "step {step} holds no period");
        let periods = (0..nb_periods)
            .map(|p| {
                let loaded = if p + 1 == nb_periods {
                    source.load_step::<Regressor>(ctx, name, step)?
                } else {
                    source.load_step::<Regressor>(ctx, name_det, p)?
                };
                let continuation = regressed(&loaded.following_grid, &loaded.operator, &loaded.continuation)?;
                Ok((loaded.following_grid, continuation))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            optimizer,
            parallel: ctx.config().parallel,
            periods,
        })
    }

    /// Number of periods of the step.
    pub fn nb_periods(&self) -> usize {
        self.periods.len()
    }

    /// Run every period on every path from the simulator's current date.
    pub fn one_step<S>(&self, simulator: &S, states: &mut [StateWithStocks], phi: &mut DMatrix<Real>) -> Result<()>
    where
        S: Simulator + Sync,
        O: OptimizerMultiStageDp<S>,
    {
        check_paths(states.len(), phi, self.optimizer.simu_func_size())?;
        let particles = simulator.particles();
        for_each_path(self.parallel, states, phi, |is, state, column| {
            state.realization = particles.column(is).iter().copied().collect();
            self.periods
                .iter()
                .enumerate()
                .try_for_each(|(period, (grid, continuation))| {
                    self.optimizer
                        .step_simulate_period(simulator, grid, period, continuation, &mut *state, &mut *column)
                })
        })
    }
}

// ─── Tree ─────────────────────────────────────────────────────────────────────

/// Forward step on a tree re-optimizing against stored expectations.
#[derive(Debug)]
pub struct SimulateStepTree<'a, O> {
    optimizer: &'a O,
    parallel: bool,
    grid: SpaceGrid,
    continuation: Vec<GridTreeValue>,
}

impl<'a, O> SimulateStepTree<'a, O> {
    /// Read record `(name, step)`. Collective in per-rank mode.
    pub fn new(
        source: &ArchiveSource,
        name: &str,
        step: usize,
        optimizer: &'a O,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let loaded = source.load_step::<TreeShape>(ctx, name, step)?;
        let continuation = on_tree(&loaded.following_grid, loaded.operator.nb_nodes, &loaded.continuation)?;
        Ok(Self {
            optimizer,
            parallel: ctx.config().parallel,
            grid: loaded.following_grid,
            continuation,
        })
    }

    /// Advance every path from the simulator's current date.
    pub fn one_step<S>(&self, simulator: &S, states: &mut [StateTreeStocks], phi: &mut DMatrix<Real>) -> Result<()>
    where
        S: TreeSimulator + Sync,
        O: OptimizerDpTree<S>,
    {
        check_paths(states.len(), phi, self.optimizer.simu_func_size())?;
        let nodes = simulator.simulation_nodes();
        ensure!(nodes.len() == states.len(), "{} tree paths for {} states", nodes.len(), states.len());
        for_each_path(self.parallel, states, phi, |is, state, column| {
            state.node = nodes[is];
            self.optimizer
                .step_simulate(simulator, &self.grid, &self.continuation, state, column)
        })
    }
}

/// Forward step on a tree applying stored controls.
#[derive(Debug)]
pub struct SimulateStepTreeControl<'a, O> {
    optimizer: &'a O,
    parallel: bool,
    grid: SpaceGrid,
    control: Vec<GridTreeValue>,
}

impl<'a, O> SimulateStepTreeControl<'a, O> {
    /// Read record `(name, step)`. Collective in per-rank mode.
    pub fn new(
        source: &ArchiveSource,
        name: &str,
        step: usize,
        optimizer: &'a O,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let loaded = source.load_step::<TreeShape>(ctx, name, step)?;
        let control = on_tree(&loaded.current_grid, loaded.operator.nb_nodes, &loaded.controls)?;
        Ok(Self {
            optimizer,
            parallel: ctx.config().parallel,
            grid: loaded.following_grid,
            control,
        })
    }

    /// Advance every path from the simulator's current date.
    pub fn one_step<S>(&self, simulator: &S, states: &mut [StateTreeStocks], phi: &mut DMatrix<Real>) -> Result<()>
    where
        S: TreeSimulator + Sync,
        O: OptimizerDpTree<S>,
    {
        check_paths(states.len(), phi, self.optimizer.simu_func_size())?;
        let nodes = simulator.simulation_nodes();
        ensure!(nodes.len() == states.len(), "{} tree paths for {} states", nodes.len(), states.len());
        for_each_path(self.parallel, states, phi, |is, state, column| {
            state.node = nodes[is];
            self.optimizer
                .step_simulate_control(simulator, &self.grid, &self.control, state, column)
        })
    }
}
