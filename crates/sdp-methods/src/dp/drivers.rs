//! Backward and forward passes.
//!
//! The backward pass starts from the terminal values, walks the simulator's
//! dates down to 0 and writes one record per step under [`CONTINUATION`]:
//! step `k` of the backward pass covers the date `nb_step - 1 - k`. The
//! forward pass walks the dates up, reading the record of each date.
//!
//! Multi-stage passes also write, for step `k`, the records of the
//! deterministic periods under [`deterministic_record`]`(k)`. Stock grids
//! may change with the date through a [`GridSchedule`].
//!
//! Drivers log one `info!` line per pass and one `debug!` line per step. A
//! fatal error is logged with the step and the record key before it is
//! returned.

use std::path::Path;

use log::{debug, error, info};
use nalgebra::DMatrix;

use sdp_core::{
    errors::{Error, Result},
    Real, Regime,
};
use sdp_grids::{Grid, SpaceGrid};
use sdp_math::Statistics;
use sdp_parallel::{all_reconstruct, GridSplitting};
use sdp_regression::{Regression, Regressor, Tree};

use super::context::ExecutionContext;
use super::final_step::FinalStepDp;
use super::optimizer::{OptimizerDp, OptimizerDpTree, OptimizerMultiStageDp};
use super::record::{ArchiveSink, ArchiveSource};
use super::schedule::GridSchedule;
use super::simulate::{
    SimulateStepMultiStageRegression, SimulateStepRegression, SimulateStepRegressionControl,
    SimulateStepTree, SimulateStepTreeControl,
};
use super::state::{StateTreeStocks, StateWithStocks};
use super::transition::{
    TransitionDumped, TransitionStepMultiStageRegression, TransitionStepRegression,
    TransitionStepTree,
};
use crate::simulators::{Simulator, TreeSimulator};

/// Record name of the backward steps.
pub const CONTINUATION: &str = "Continuation";

/// Prefix of the record names of deterministic periods.
pub const CONTINUATION_DET: &str = "ContinuationDet";

/// Record name of the deterministic periods of backward step `step`.
pub fn deterministic_record(step: usize) -> String {
    format!("{CONTINUATION_DET}{step}")
}

fn check_regime(regime: usize, nb_regime: usize) -> Result<()> {
    if regime < nb_regime {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange {
            index: regime,
            size: nb_regime,
        })
    }
}

fn logged<T>(pass: &str, step: usize, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!("{pass} pass failed at step {step}, record ({CONTINUATION}, {step}): {e}");
        e
    })
}

/// Values at `point_stock` of every row of a distributed array, on every
/// rank.
fn values_at_stock(
    ctx: &ExecutionContext<'_>,
    splitting: &GridSplitting,
    grid: &SpaceGrid,
    local: &DMatrix<Real>,
    point_stock: &[Real],
) -> Result<Vec<Real>> {
    let full = all_reconstruct(ctx.comm(), splitting, local)?;
    let native = grid.to_hierarchize_vec(&full)?;
    Ok(grid
        .create_interpolator(point_stock)
        .apply_vec(&native)
        .iter()
        .copied()
        .collect())
}

fn mean_gain(phi: &DMatrix<Real>) -> Result<Real> {
    let stats = Statistics::from_samples(phi.row(0).iter());
    let mean = stats
        .mean()
        .ok_or_else(|| Error::Runtime("no simulated path".into()))?;
    if let Some(error) = stats.error_estimate() {
        debug!("{} paths, standard error of the mean gain {error}", stats.samples());
    }
    Ok(mean)
}

// ─── Backward ─────────────────────────────────────────────────────────────────

/// Backward loop of the regression drivers. The operator of each date is
/// handed off from the one of the following date, starting from
/// `regressor`; `transition` runs one step from the values on the following
/// grid to the current grid.
#[allow(clippy::too_many_arguments)]
fn backward_by_regression<S, F, T>(
    schedule: &GridSchedule,
    (nb_regime, splittable): (usize, &[bool]),
    regressor: &Regressor,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
    mut transition: T,
) -> Result<Real>
where
    S: Simulator + Sync,
    F: Fn(usize, &[Real], &[Real]) -> Real,
    T: FnMut(&SpaceGrid, &SpaceGrid, &S, usize, Vec<DMatrix<Real>>, &Regressor, &mut ArchiveSink) -> Result<TransitionDumped>,
{
    check_regime(initial_regime, nb_regime)?;
    let nb_step = simulator.nb_step();
    let mut grid_following = schedule.at(simulator.current_step());
    info!(
        "backward pass by regression: {nb_step} steps, {} particles, {} grids, {} ranks",
        simulator.nb_simul(),
        schedule.len(),
        ctx.size()
    );
    let mut sink = ArchiveSink::create(archive, &ctx)?;
    let splitting = GridSplitting::for_grid(grid_following, splittable, ctx.size())?;
    let mut values = FinalStepDp::new(grid_following, nb_regime).values_on_box(
        &splitting,
        ctx.rank(),
        &final_cost,
        &simulator.particles(),
    )?;
    let mut previous: Option<Regressor> = None;
    for step in 0..nb_step {
        let particles = simulator.step_backward_and_get_particles();
        let grid_current = schedule.at(simulator.current_step());
        let operator = logged(
            "backward",
            step,
            previous
                .as_ref()
                .unwrap_or(regressor)
                .handoff(step + 1 == nb_step, &particles),
        )?;
        values = logged(
            "backward",
            step,
            transition(grid_current, grid_following, &*simulator, step, values, &operator, &mut sink),
        )?
        .into_values();
        previous = Some(operator);
        grid_following = grid_current;
        debug!(
            "backward step {step} done, date {}, {} grid points",
            simulator.current_step(),
            grid_current.nb_points()
        );
    }
    sink.finish()?;
    let splitting = GridSplitting::for_grid(grid_following, splittable, ctx.size())?;
    let value = values_at_stock(&ctx, &splitting, grid_following, &values[initial_regime], point_stock)?;
    let mean = Statistics::from_samples(value.iter())
        .mean()
        .ok_or_else(|| Error::Runtime("no particle at date 0".into()))?;
    ctx.comm().barrier()?;
    info!("backward pass done, value {mean}");
    Ok(mean)
}

/// Backward pass with regressions on the simulator's particles. Returns the
/// mean over particles of the value at `point_stock` in `initial_regime` at
/// date 0, on every rank. `regressor` gives the basis; it is fitted anew at
/// every date.
#[allow(clippy::too_many_arguments)]
pub fn dynamic_programming_by_regression<S, O, F>(
    grid: &SpaceGrid,
    optimizer: &O,
    regressor: &Regressor,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    dynamic_programming_by_regression_varying_grids(
        &GridSchedule::constant(grid.clone()),
        optimizer,
        regressor,
        final_cost,
        point_stock,
        initial_regime,
        simulator,
        archive,
        ctx,
    )
}

/// [`dynamic_programming_by_regression`] with a stock grid depending on the
/// date. Records carry the grids, so the forward drivers replay them
/// unchanged.
#[allow(clippy::too_many_arguments)]
pub fn dynamic_programming_by_regression_varying_grids<S, O, F>(
    schedule: &GridSchedule,
    optimizer: &O,
    regressor: &Regressor,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    backward_by_regression(
        schedule,
        (optimizer.nb_regime(), &optimizer.dimension_to_split()),
        regressor,
        final_cost,
        point_stock,
        initial_regime,
        simulator,
        archive,
        ctx,
        |grid_current, grid_following, sim, step, values, operator, sink| {
            TransitionStepRegression::new(grid_current, grid_following, optimizer, sim, ctx, step)?
                .one_step(values, operator, sink, CONTINUATION)
        },
    )
}

/// Backward pass of a problem with deterministic periods inside every time
/// step. Besides `(CONTINUATION, step)`, step `k` writes the records
/// `(deterministic_record(k), p)` of its earlier periods. Use
/// [`GridSchedule::constant`] for a fixed grid.
#[allow(clippy::too_many_arguments)]
pub fn dynamic_programming_by_regression_multi_stage<S, O, F>(
    schedule: &GridSchedule,
    optimizer: &O,
    regressor: &Regressor,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerMultiStageDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    backward_by_regression(
        schedule,
        (optimizer.nb_regime(), &optimizer.dimension_to_split()),
        regressor,
        final_cost,
        point_stock,
        initial_regime,
        simulator,
        archive,
        ctx,
        |grid_current, grid_following, sim, step, values, operator, sink| {
            TransitionStepMultiStageRegression::new(grid_current, grid_following, optimizer, sim, ctx, step)
                .one_step(values, operator, sink, CONTINUATION, &deterministic_record(step))
        },
    )
}

/// Backward pass on a tree. Returns the value at `point_stock` in
/// `initial_regime` at the root node, on every rank.
#[allow(clippy::too_many_arguments)]
pub fn dynamic_programming_by_tree<S, O, F>(
    grid: &SpaceGrid,
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    check_regime(initial_regime, optimizer.nb_regime())?;
    let nb_step = simulator.nb_step();
    info!(
        "backward pass on a tree: {nb_step} steps, {} final nodes, {} grid points, {} ranks",
        simulator.nb_nodes(),
        grid.nb_points(),
        ctx.size()
    );
    let mut sink = ArchiveSink::create(archive, &ctx)?;
    let splitting = GridSplitting::for_grid(grid, &optimizer.dimension_to_split(), ctx.size())?;
    let mut values = FinalStepDp::new(grid, optimizer.nb_regime()).values_on_box(
        &splitting,
        ctx.rank(),
        &final_cost,
        &simulator.nodes(),
    )?;
    for step in 0..nb_step {
        simulator.step_backward();
        values = logged("backward", step, {
            Tree::new(simulator.proba(), simulator.connected()).and_then(|tree| {
                TransitionStepTree::new(grid, grid, optimizer, &*simulator, ctx, step)?
                    .one_step(values, &tree, &mut sink, CONTINUATION)
            })
        })?
        .into_values();
        debug!("backward step {step} done, {} nodes", simulator.nb_nodes());
    }
    sink.finish()?;
    let value = values_at_stock(&ctx, &splitting, grid, &values[initial_regime], point_stock)?;
    ctx.comm().barrier()?;
    let root = value
        .first()
        .copied()
        .ok_or_else(|| Error::Runtime("tree without root node".into()))?;
    info!("backward pass done, value {root}");
    Ok(root)
}

// ─── Forward ──────────────────────────────────────────────────────────────────

fn simulate_particles<S, F>(
    simulator: &mut S,
    final_cost: F,
    states: &mut [StateWithStocks],
    phi: &mut DMatrix<Real>,
    mut stage: impl FnMut(usize, &S, &mut [StateWithStocks], &mut DMatrix<Real>) -> Result<()>,
) -> Result<Real>
where
    S: Simulator,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    let nb_step = simulator.nb_step();
    for step in 0..nb_step {
        let record = nb_step - 1 - step;
        logged("forward", record, stage(record, &*simulator, &mut *states, &mut *phi))?;
        simulator.step_forward_and_get_particles();
        debug!("forward step to date {} done", simulator.current_step());
    }
    let particles = simulator.particles();
    let actu = simulator.actu();
    for (is, state) in states.iter().enumerate() {
        let x: Vec<Real> = particles.column(is).iter().copied().collect();
        phi[(0, is)] += final_cost(state.regime, &state.stock, &x) * actu;
    }
    let mean = mean_gain(phi)?;
    info!("forward pass done, mean gain {mean}");
    Ok(mean)
}

fn simulate_nodes<S, F>(
    simulator: &mut S,
    final_cost: F,
    states: &mut [StateTreeStocks],
    phi: &mut DMatrix<Real>,
    mut stage: impl FnMut(usize, &S, &mut [StateTreeStocks], &mut DMatrix<Real>) -> Result<()>,
) -> Result<Real>
where
    S: TreeSimulator,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    let nb_step = simulator.nb_step();
    for step in 0..nb_step {
        let record = nb_step - 1 - step;
        logged("forward", record, stage(record, &*simulator, &mut *states, &mut *phi))?;
        simulator.step_forward_and_get_nodes();
        debug!("forward step to date {} done", simulator.current_step());
    }
    let actu = simulator.actu();
    for (is, (state, &node)) in states.iter_mut().zip(simulator.simulation_nodes()).enumerate() {
        state.node = node;
        phi[(0, is)] += final_cost(state.regime, &state.stock, &simulator.value_of_node(node)) * actu;
    }
    let mean = mean_gain(phi)?;
    info!("forward pass done, mean gain {mean}");
    Ok(mean)
}

/// Forward pass re-optimizing at every date against the stored
/// continuation values. Returns the mean discounted gain.
pub fn simulate_regression<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "forward pass by regression: {} steps, {} paths",
        simulator.nb_step(),
        simulator.nb_simul()
    );
    check_regime(initial_regime, optimizer.nb_regime())?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateWithStocks::new(initial_regime, point_stock.to_vec(), Vec::new()); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    simulate_particles(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        SimulateStepRegression::new(&source, CONTINUATION, record, optimizer, &ctx)?.one_step(sim, states, phi)
    })
}

/// Forward pass applying the stored controls. Returns the mean discounted
/// gain.
pub fn simulate_regression_control<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "forward pass with stored controls: {} steps, {} paths",
        simulator.nb_step(),
        simulator.nb_simul()
    );
    check_regime(initial_regime, optimizer.nb_regime())?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateWithStocks::new(initial_regime, point_stock.to_vec(), Vec::new()); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    simulate_particles(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        SimulateStepRegressionControl::new(&source, CONTINUATION, record, optimizer, &ctx)?.one_step(sim, states, phi)
    })
}

/// Forward pass on a tree re-optimizing against the stored expectations.
pub fn simulate_tree<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "forward pass on a tree: {} steps, {} paths",
        simulator.nb_step(),
        simulator.nb_simul()
    );
    check_regime(initial_regime, optimizer.nb_regime())?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateTreeStocks::new(initial_regime, point_stock.to_vec(), 0); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    simulate_nodes(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        SimulateStepTree::new(&source, CONTINUATION, record, optimizer, &ctx)?.one_step(sim, states, phi)
    })
}

/// Forward pass on a tree applying the stored controls.
pub fn simulate_tree_control<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: TreeSimulator + Sync,
    O: OptimizerDpTree<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "forward pass on a tree with stored controls: {} steps, {} paths",
        simulator.nb_step(),
        simulator.nb_simul()
    );
    check_regime(initial_regime, optimizer.nb_regime())?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateTreeStocks::new(initial_regime, point_stock.to_vec(), 0); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    simulate_nodes(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        SimulateStepTreeControl::new(&source, CONTINUATION, record, optimizer, &ctx)?.one_step(sim, states, phi)
    })
}

// ─── Multi-stage and switching ────────────────────────────────────────────────

/// Forward pass of a problem with deterministic periods, re-optimizing
/// every period against the stored values. Returns the mean discounted
/// gain.
pub fn simulate_multi_stage_regression<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<Real>
where
    S: Simulator + Sync,
    O: OptimizerMultiStageDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "multi-stage forward pass: {} steps, {} paths",
        simulator.nb_step(),
        simulator.nb_simul()
    );
    check_regime(initial_regime, optimizer.nb_regime())?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateWithStocks::new(initial_regime, point_stock.to_vec(), Vec::new()); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    simulate_particles(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        let nb_periods = optimizer.nb_periods_in_transition(sim);
        SimulateStepMultiStageRegression::new(
            &source,
            (CONTINUATION, &deterministic_record(record)),
            record,
            nb_periods,
            optimizer,
            &ctx,
        )?
        .one_step(sim, states, phi)
    })
}

/// Forward pass of a switching problem.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchingPaths {
    /// Mean discounted gain.
    pub value: Real,
    /// Regime of every path at every date, date 0 first.
    pub regimes: Vec<Vec<Regime>>,
}

impl SwitchingPaths {
    /// For every regime, the shortest stay in it, in dates, among the stays
    /// ended by a switch. `None` when no path ever left the regime.
    pub fn min_stay(&self, nb_regime: usize) -> Vec<Option<usize>> {
        let mut out = vec![None; nb_regime];
        let Some(first) = self.regimes.first() else {
            return out;
        };
        let mut length = vec![1_usize; first.len()];
        for dates in self.regimes.windows(2) {
            for (is, (&before, &after)) in dates[0].iter().zip(&dates[1]).enumerate() {
                if before == after {
                    length[is] += 1;
                    continue;
                }
                if let Some(shortest) = out.get_mut(before) {
                    *shortest = Some(shortest.map_or(length[is], |m: usize| m.min(length[is])));
                }
                length[is] = 1;
            }
        }
        out
    }

    /// Number of regime changes over all paths and dates.
    pub fn nb_switches(&self) -> usize {
        self.regimes
            .windows(2)
            .map(|d| d[0].iter().zip(&d[1]).filter(|(a, b)| a != b).count())
            .sum()
    }
}

/// Forward pass letting the optimizer switch the regime of every path
/// against the stored continuation of each regime. Returns the mean gain
/// with the regime trajectories.
pub fn simulate_regression_switch<S, O, F>(
    optimizer: &O,
    final_cost: F,
    point_stock: &[Real],
    initial_regime: usize,
    simulator: &mut S,
    archive: impl AsRef<Path>,
    ctx: ExecutionContext<'_>,
) -> Result<SwitchingPaths>
where
    S: Simulator + Sync,
    O: OptimizerDp<S>,
    F: Fn(usize, &[Real], &[Real]) -> Real,
{
    info!(
        "forward pass with regime switching: {} steps, {} paths, {} regimes",
        simulator.nb_step(),
        simulator.nb_simul(),
        optimizer.nb_regime()
    );
    let nb_regime = optimizer.nb_regime();
    check_regime(initial_regime, nb_regime)?;
    let source = ArchiveSource::open(archive, &ctx)?;
    let nb_simul = simulator.nb_simul();
    let mut states = vec![StateWithStocks::new(initial_regime, point_stock.to_vec(), Vec::new()); nb_simul];
    let mut phi = DMatrix::zeros(optimizer.simu_func_size(), nb_simul);
    let mut regimes = vec![vec![initial_regime; nb_simul]];
    let value = simulate_particles(simulator, final_cost, &mut states, &mut phi, |record, sim, states, phi| {
        SimulateStepRegression::new(&source, CONTINUATION, record, optimizer, &ctx)?.one_step(sim, states, phi)?;
        let now: Vec<Regime> = states.iter().map(|s| s.regime).collect();
        for &r in &now {
            check_regime(r, nb_regime)?;
        }
        regimes.push(now);
        Ok(())
    })?;
    let paths = SwitchingPaths { value, regimes };
    debug!("{} regime switches", paths.nb_switches());
    Ok(paths)
}
