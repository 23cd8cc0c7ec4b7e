//! Optimizer interfaces.
//!
//! An optimizer describes the controlled problem: how many regimes and
//! controls there are, which stock dimensions may be split between ranks,
//! which part of the following grid a region of the current grid can reach
//! (the cone), and how to pick the optimal control at one stock point. The
//! numerical optimization itself is left to the implementor.
//!
//! The same optimizer is used by the backward pass (`step_optimize`) and by
//! the forward pass (`step_simulate`, `step_simulate_control`).
//!
//! [`OptimizerMultiStageDp`] describes problems whose stochastic time steps
//! hold several deterministic periods. [`AtPeriod`] views one period of such
//! a problem as an ordinary [`OptimizerDp`].

use nalgebra::DMatrix;

use sdp_core::{
    errors::{Error, Result},
    Real,
};
use sdp_grids::SpaceGrid;
use sdp_regression::{ContinuationValue, ContinuationValueTree, GridAndRegressedValue, GridTreeValue};

use super::state::{StateTreeStocks, StateWithStocks};
use crate::simulators::{Simulator, TreeSimulator};

/// Problem driven by Monte-Carlo particles, solved by regression.
pub trait OptimizerDp<S: Simulator>: Sync {
    /// Number of regimes.
    fn nb_regime(&self) -> usize;

    /// Number of controls stored per point.
    fn nb_control(&self) -> usize;

    /// Number of functions followed along forward paths (gain first).
    fn simu_func_size(&self) -> usize;

    /// Stock dimensions that may be split between ranks.
    fn dimension_to_split(&self) -> Vec<bool>;

    /// Region of the following grid reachable from `region` of the current
    /// grid (`[min, max]` per dimension).
    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]>;

    /// Value per regime (`nb_simul x nb_regime`) and control per control
    /// (`nb_simul x nb_control`) at `stock`, for every particle of the
    /// regressor. `grid` is the grid of the following date, `continuation`
    /// holds one value per regime on the part of it reachable from this
    /// rank.
    fn step_optimize(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)>;

    /// Move `state` one date forward with the control that is optimal for
    /// the stored continuation values, adding the discounted gains to `phi`.
    /// `grid` is the grid of the following date.
    fn step_simulate(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()>;

    /// Move `state` one date forward with the stored controls, adding the
    /// discounted gains to `phi`.
    fn step_simulate_control(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        control: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()>;
}

/// Problem driven by a recombining tree. Rows of the value and control
/// matrices are the nodes of the current date.
pub trait OptimizerDpTree<S: TreeSimulator>: Sync {
    /// Number of regimes.
    fn nb_regime(&self) -> usize;

    /// Number of controls stored per point.
    fn nb_control(&self) -> usize;

    /// Number of functions followed along forward paths.
    fn simu_func_size(&self) -> usize;

    /// Stock dimensions that may be split between ranks.
    fn dimension_to_split(&self) -> Vec<bool>;

    /// Region of the following grid reachable from `region`.
    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]>;

    /// Value per regime (`nb_nodes x nb_regime`) and control per control
    /// (`nb_nodes x nb_control`) at `stock`.
    fn step_optimize(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValueTree<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)>;

    /// Forward step optimal for the stored continuation values.
    fn step_simulate(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        continuation: &[GridTreeValue],
        state: &mut StateTreeStocks,
        phi: &mut [Real],
    ) -> Result<()>;

    /// Forward step with the stored controls.
    fn step_simulate_control(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        control: &[GridTreeValue],
        state: &mut StateTreeStocks,
        phi: &mut [Real],
    ) -> Result<()>;
}

/// Problem whose stochastic time steps hold several deterministic periods:
/// the uncertainty is revealed once per step, the stock moves once per
/// period.
pub trait OptimizerMultiStageDp<S: Simulator>: Sync {
    /// Number of regimes.
    fn nb_regime(&self) -> usize;

    /// Number of controls stored per point and period.
    fn nb_control(&self) -> usize;

    /// Number of functions followed along forward paths (gain first).
    fn simu_func_size(&self) -> usize;

    /// Stock dimensions that may be split between ranks.
    fn dimension_to_split(&self) -> Vec<bool>;

    /// Region reachable within one period from `region`.
    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]>;

    /// Number of periods of the step starting at the simulator's current
    /// date.
    fn nb_periods_in_transition(&self, simulator: &S) -> usize;

    /// [`OptimizerDp::step_optimize`] for one period. `continuation` is the
    /// value at the end of the period: the regressed value of the following
    /// date for the last period, the value of the next period otherwise.
    /// `grid` is the grid at the end of the period.
    fn step_optimize_period(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        stock: &[Real],
        period: usize,
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)>;

    /// [`OptimizerDp::step_simulate`] for one period.
    fn step_simulate_period(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        period: usize,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()>;
}

/// One period of a multi-stage problem.
#[derive(Debug, Clone, Copy)]
pub struct AtPeriod<'o, O> {
    optimizer: &'o O,
    period: usize,
}

impl<'o, O> AtPeriod<'o, O> {
    /// Period `period` of `optimizer`.
    pub fn new(optimizer: &'o O, period: usize) -> Self {
        Self { optimizer, period }
    }

    /// Index of the period.
    pub fn period(&self) -> usize {
        self.period
    }
}

impl<S, O> OptimizerDp<S> for AtPeriod<'_, O>
where
    S: Simulator,
    O: OptimizerMultiStageDp<S>,
{
    fn nb_regime(&self) -> usize {
        self.optimizer.nb_regime()
    }

    fn nb_control(&self) -> usize {
        self.optimizer.nb_control()
    }

    fn simu_func_size(&self) -> usize {
        self.optimizer.simu_func_size()
    }

    fn dimension_to_split(&self) -> Vec<bool> {
        self.optimizer.dimension_to_split()
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        self.optimizer.cone(region)
    }

    fn step_optimize(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        self.optimizer
            .step_optimize_period(simulator, grid, stock, self.period, continuation)
    }

    fn step_simulate(
        &self,
        simulator: &S,
        grid: &SpaceGrid,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        self.optimizer
            .step_simulate_period(simulator, grid, self.period, continuation, state, phi)
    }

    fn step_simulate_control(
        &self,
        _: &S,
        _: &SpaceGrid,
        _: &[GridAndRegressedValue],
        _: &mut StateWithStocks,
        _: &mut [Real],
    ) -> Result<()> {
        Err(Error::NotImplemented(
            "stored controls of a multi-stage problem are not replayed".into(),
        ))
    }
}
