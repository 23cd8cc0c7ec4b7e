//! Forward passes switching between regimes.

mod common;

use approx::assert_relative_eq;
use nalgebra::DMatrix;

use sdp_core::{errors::Error, errors::Result, ProcessConfig, Real, Regime};
use sdp_grids::{RegularSpaceGrid, SpaceGrid};
use sdp_methods::{
    dynamic_programming_by_regression, simulate_regression_switch, BlackScholesSimulator, ExecutionContext,
    OptimizerDp, Simulator, StateWithStocks, SwitchingPaths,
};
use sdp_regression::{ContinuationValue, GridAndRegressedValue, LocalConstRegression, Regression, Regressor};

use common::temp_path;

const NB_STEP: usize = 6;

/// A plant earning `X - 1` per date when running (regime 1) and nothing
/// when stopped (regime 0). Every start or stop costs `switch_cost`.
struct Plant {
    switch_cost: Real,
}

impl Plant {
    fn gain(regime: Regime, x: Real) -> Real {
        if regime == 1 {
            x - 1.0
        } else {
            0.0
        }
    }

    /// Best regime from `from` and its value.
    fn choose(&self, from: Regime, x: Real, actu: Real, cont: impl Fn(Regime) -> Real) -> (Real, Regime) {
        let mut best = (Real::NEG_INFINITY, from);
        for to in 0..2 {
            let cost = if to == from { 0.0 } else { self.switch_cost };
            let v = Self::gain(to, x) - cost + actu * cont(to);
            if v > best.0 {
                best = (v, to);
            }
        }
        best
    }

    fn run(&self, simulator: &BlackScholesSimulator, state: &mut StateWithStocks, to: Regime, phi: &mut [Real]) {
        let cost = if to == state.regime { 0.0 } else { self.switch_cost };
        phi[0] += (Self::gain(to, state.realization[0]) - cost) * simulator.actu();
        state.regime = to;
    }
}

impl OptimizerDp<BlackScholesSimulator> for Plant {
    fn nb_regime(&self) -> usize {
        2
    }

    fn nb_control(&self) -> usize {
        2
    }

    fn simu_func_size(&self) -> usize {
        1
    }

    fn dimension_to_split(&self) -> Vec<bool> {
        vec![false]
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        region.to_vec()
    }

    fn step_optimize(
        &self,
        simulator: &BlackScholesSimulator,
        _: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        let particles = continuation[0]
            .regressor()
            .particles()
            .ok_or_else(|| Error::Runtime("regressor without particles".into()))?;
        let cont = [continuation[0].all_simulations(stock)?, continuation[1].all_simulations(stock)?];
        let n = particles.ncols();
        let mut values = DMatrix::zeros(n, 2);
        let mut controls = DMatrix::zeros(n, 2);
        for s in 0..n {
            for from in 0..2 {
                let (v, to) = self.choose(from, particles[(0, s)], simulator.actu_step(), |r| cont[r][s]);
                values[(s, from)] = v;
                controls[(s, from)] = to as Real;
            }
        }
        Ok((values, controls))
    }

    fn step_simulate(
        &self,
        simulator: &BlackScholesSimulator,
        _: &SpaceGrid,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let (_, to) = self.choose(state.regime, state.realization[0], simulator.actu_step(), |r| {
            continuation[r].value(&state.stock, &state.realization)
        });
        self.run(simulator, state, to, phi);
        Ok(())
    }

    fn step_simulate_control(
        &self,
        simulator: &BlackScholesSimulator,
        _: &SpaceGrid,
        control: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let to = control[state.regime].value(&state.stock, &state.realization).round() as Regime;
        self.run(simulator, state, to.min(1), phi);
        Ok(())
    }
}

fn particles(forward: bool) -> BlackScholesSimulator {
    BlackScholesSimulator::new(vec![1.0], vec![0.0], vec![0.3], 0.0, 1.0, NB_STEP, 5000, forward, 13).unwrap()
}

/// Backward then forward pass from the stopped regime.
fn plant_paths(switch_cost: Real) -> (Real, SwitchingPaths) {
    let grid: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![1]).unwrap().into();
    let plant = Plant { switch_cost };
    let regressor: Regressor = LocalConstRegression::new(vec![8]).unwrap().into();
    let config = ProcessConfig::default();
    let ctx = ExecutionContext::serial(&config);
    let path = temp_path("plant");
    let no_cost = |_: usize, _: &[Real], _: &[Real]| 0.0;
    let backward =
        dynamic_programming_by_regression(&grid, &plant, &regressor, no_cost, &[0.0], 0, &mut particles(false), &path, ctx)
            .unwrap();
    let paths = simulate_regression_switch(&plant, no_cost, &[0.0], 0, &mut particles(true), &path, ctx).unwrap();
    (backward, paths)
}

#[test]
fn free_switching_runs_whenever_the_price_is_above_one() {
    let (_, paths) = plant_paths(0.0);
    assert_eq!(paths.regimes.len(), NB_STEP + 1);
    assert!(paths.regimes[0].iter().all(|&r| r == 0));

    let mut sim = particles(true);
    let mut total = vec![0.0; sim.nb_simul()];
    for t in 0..NB_STEP {
        let x = sim.particles();
        for (s, sum) in total.iter_mut().enumerate() {
            assert_eq!(paths.regimes[t + 1][s], Regime::from(x[(0, s)] > 1.0), "date {t}, path {s}");
            *sum += (x[(0, s)] - 1.0).max(0.0);
        }
        sim.step_forward_and_get_particles();
    }
    let expected = total.iter().sum::<Real>() / total.len() as Real;
    assert_relative_eq!(paths.value, expected, max_relative = 1e-12);
    assert!(paths.nb_switches() > 0);
}

#[test]
fn expensive_switching_keeps_the_plant_stopped() {
    let (backward, paths) = plant_paths(100.0);
    assert_eq!(paths.nb_switches(), 0);
    assert_eq!(paths.value, 0.0);
    assert_eq!(backward, 0.0);
    assert_eq!(paths.min_stay(2), vec![None, None]);
}

#[test]
fn costly_switching_agrees_with_the_backward_value() {
    let (backward, paths) = plant_paths(0.05);
    assert!(backward > 0.0);
    assert!(paths.nb_switches() > 0);
    assert_relative_eq!(paths.value, backward, max_relative = 0.1);
    let stays = paths.min_stay(2);
    assert!(stays[0].is_some_and(|d| d >= 1), "{stays:?}");

    let (free, _) = plant_paths(0.0);
    assert!(backward <= free + 1e-9, "{backward} > {free}");
}

#[test]
fn stays_end_at_switches() {
    let paths = SwitchingPaths {
        value: 0.0,
        regimes: vec![vec![0, 1], vec![0, 1], vec![1, 1], vec![1, 0], vec![0, 0]],
    };
    assert_eq!(paths.nb_switches(), 3);
    assert_eq!(paths.min_stay(3), vec![Some(2), Some(2), None]);
    let still = SwitchingPaths {
        value: 0.0,
        regimes: vec![vec![1]; 4],
    };
    assert_eq!(still.min_stay(2), vec![None, None]);
}
