//! A storage facility used by the integration tests.
//!
//! The first stock dimension is the level of a storage that can inject
//! `injection` or withdraw `withdrawal` units per date, buying or selling at
//! the price `shift + X[0]` of the uncertainty. Other stock dimensions never
//! move. Injecting costs the price, withdrawing earns it. With `periods`
//! above one the storage moves that many times per date, at the price of
//! the date.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use nalgebra::DMatrix;

use sdp_core::{errors::Error, errors::Result, Real};
use sdp_grids::{Grid, SpaceGrid};
use sdp_methods::{
    BlackScholesSimulator, OptimizerDp, OptimizerDpTree, OptimizerMultiStageDp, Simulator, StateTreeStocks,
    StateWithStocks, TreeSimulator, TrinomialTreeSimulator,
};
use sdp_parallel::ThreadComm;
use sdp_regression::{
    ContinuationValue, ContinuationValueTree, GridAndRegressedValue, GridTreeValue, Regression,
};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn temp_path(stem: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("sdp-methods-{stem}-{}-{n}", std::process::id()))
}

/// Run `f` on every rank of a thread group.
pub fn run<T: Send + 'static>(n: usize, f: impl Fn(ThreadComm) -> T + Send + Sync + Clone + 'static) -> Vec<T> {
    let handles: Vec<_> = ThreadComm::world(n)
        .into_iter()
        .map(|c| {
            let f = f.clone();
            thread::spawn(move || f(c))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Terminal value: the stock valued at the terminal price.
pub fn stock_at_price(_: usize, stock: &[Real], x: &[Real]) -> Real {
    stock[0] * x[0]
}

#[derive(Debug, Clone)]
pub struct Storage {
    pub dimension: usize,
    pub injection: Real,
    pub withdrawal: Real,
    pub shift: Real,
    /// Fail at every stock level above this one.
    pub fail_above: Option<Real>,
    /// Moves per date.
    pub periods: usize,
}

impl Storage {
    pub fn new(injection: Real, withdrawal: Real) -> Self {
        Self {
            dimension: 1,
            injection,
            withdrawal,
            shift: 0.0,
            fail_above: None,
            periods: 1,
        }
    }

    /// A storage that cannot move.
    pub fn frozen(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::new(0.0, 0.0)
        }
    }

    pub fn with_shift(mut self, shift: Real) -> Self {
        self.shift = shift;
        self
    }

    pub fn failing_above(mut self, level: Real) -> Self {
        self.fail_above = Some(level);
        self
    }

    pub fn with_periods(mut self, periods: usize) -> Self {
        self.periods = periods;
        self
    }

    fn moves(&self) -> Vec<Real> {
        let mut out = vec![self.injection, 0.0, -self.withdrawal];
        out.dedup();
        out
    }

    fn check(&self, stock: &[Real]) -> Result<()> {
        match self.fail_above {
            Some(level) if stock[0] > level => Err(Error::Runtime(format!("no admissible control at {}", stock[0]))),
            _ => Ok(()),
        }
    }

    fn price(&self, x: &[Real]) -> Real {
        self.shift + x[0]
    }

    fn moved(stock: &[Real], u: Real) -> Vec<Real> {
        let mut next = stock.to_vec();
        next[0] += u;
        next
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        let mut out = region.to_vec();
        out[0] = [region[0][0] - self.withdrawal, region[0][1] + self.injection];
        out
    }

    /// Best admissible move at `stock` given the continuation of each move.
    fn best(&self, grid: &SpaceGrid, stock: &[Real], price: Real, actu: Real, cont: impl Fn(&[Real]) -> Real) -> (Real, Real) {
        let mut best = (Real::NEG_INFINITY, 0.0);
        for u in self.moves() {
            let next = Self::moved(stock, u);
            if !grid.is_inside(&next) {
                continue;
            }
            let v = -u * price + actu * cont(&next);
            if v > best.0 {
                best = (v, u);
            }
        }
        best
    }

    /// Values and moves at `stock` for every particle of the regressor,
    /// discounting the continuation by `actu`.
    fn optimize(
        &self,
        grid: &SpaceGrid,
        stock: &[Real],
        actu: Real,
        continuation: &ContinuationValue<'_>,
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        self.check(stock)?;
        let particles = continuation
            .regressor()
            .particles()
            .ok_or_else(|| Error::Runtime("regressor without particles".into()))?;
        let n = particles.ncols();
        let mut values = DMatrix::from_element(n, 1, Real::NEG_INFINITY);
        let mut controls = DMatrix::zeros(n, 1);
        for u in self.moves() {
            let next = Self::moved(stock, u);
            if !grid.is_inside(&next) {
                continue;
            }
            let cont = continuation.all_simulations(&next)?;
            for s in 0..n {
                let v = -u * self.price(&[particles[(0, s)]]) + actu * cont[s];
                if v > values[(s, 0)] {
                    values[(s, 0)] = v;
                    controls[(s, 0)] = u;
                }
            }
        }
        Ok((values, controls))
    }

    /// Apply `u`, kept inside the grid, and book its discounted gain.
    fn apply(&self, grid: &SpaceGrid, stock: &mut [Real], u: Real, price: Real, actu: Real, phi: &mut [Real]) {
        let [lo, hi] = grid.extreme_values()[0];
        let next = (stock[0] + u).clamp(lo, hi);
        phi[0] -= (next - stock[0]) * price * actu;
        stock[0] = next;
    }
}

impl OptimizerDp<BlackScholesSimulator> for Storage {
    fn nb_regime(&self) -> usize {
        1
    }

    fn nb_control(&self) -> usize {
        1
    }

    fn simu_func_size(&self) -> usize {
        1
    }

    fn dimension_to_split(&self) -> Vec<bool> {
        vec![true; self.dimension]
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        Storage::cone(self, region)
    }

    fn step_optimize(
        &self,
        simulator: &BlackScholesSimulator,
        grid: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        self.optimize(grid, stock, simulator.actu_step(), &continuation[0])
    }

    fn step_simulate(
        &self,
        simulator: &BlackScholesSimulator,
        grid: &SpaceGrid,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let price = self.price(&state.realization);
        let (_, u) = self.best(grid, &state.stock, price, simulator.actu_step(), |next| {
            continuation[0].value(next, &state.realization)
        });
        self.apply(grid, &mut state.stock, u, price, simulator.actu(), phi);
        Ok(())
    }

    fn step_simulate_control(
        &self,
        simulator: &BlackScholesSimulator,
        grid: &SpaceGrid,
        control: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let price = self.price(&state.realization);
        let u = control[0].value(&state.stock, &state.realization);
        self.apply(grid, &mut state.stock, u, price, simulator.actu(), phi);
        Ok(())
    }
}

impl OptimizerMultiStageDp<BlackScholesSimulator> for Storage {
    fn nb_regime(&self) -> usize {
        1
    }

    fn nb_control(&self) -> usize {
        1
    }

    fn simu_func_size(&self) -> usize {
        1
    }

    fn dimension_to_split(&self) -> Vec<bool> {
        vec![true; self.dimension]
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        Storage::cone(self, region)
    }

    fn nb_periods_in_transition(&self, _: &BlackScholesSimulator) -> usize {
        self.periods
    }

    fn step_optimize_period(
        &self,
        simulator: &BlackScholesSimulator,
        grid: &SpaceGrid,
        stock: &[Real],
        period: usize,
        continuation: &[ContinuationValue<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        // only the last period reaches the following date
        let actu = if period + 1 == self.periods { simulator.actu_step() } else { 1.0 };
        self.optimize(grid, stock, actu, &continuation[0])
    }

    fn step_simulate_period(
        &self,
        simulator: &BlackScholesSimulator,
        grid: &SpaceGrid,
        period: usize,
        continuation: &[GridAndRegressedValue],
        state: &mut StateWithStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let price = self.price(&state.realization);
        let actu = if period + 1 == self.periods { simulator.actu_step() } else { 1.0 };
        let (_, u) = self.best(grid, &state.stock, price, actu, |next| {
            continuation[0].value(next, &state.realization)
        });
        self.apply(grid, &mut state.stock, u, price, simulator.actu(), phi);
        Ok(())
    }
}

impl OptimizerDpTree<TrinomialTreeSimulator> for Storage {
    fn nb_regime(&self) -> usize {
        1
    }

    fn nb_control(&self) -> usize {
        1
    }

    fn simu_func_size(&self) -> usize {
        1
    }

    fn dimension_to_split(&self) -> Vec<bool> {
        vec![true; self.dimension]
    }

    fn cone(&self, region: &[[Real; 2]]) -> Vec<[Real; 2]> {
        Storage::cone(self, region)
    }

    fn step_optimize(
        &self,
        simulator: &TrinomialTreeSimulator,
        grid: &SpaceGrid,
        stock: &[Real],
        continuation: &[ContinuationValueTree<'_>],
    ) -> Result<(DMatrix<Real>, DMatrix<Real>)> {
        self.check(stock)?;
        let nodes = simulator.nodes();
        let n = nodes.ncols();
        let mut values = DMatrix::from_element(n, 1, Real::NEG_INFINITY);
        let mut controls = DMatrix::zeros(n, 1);
        for u in self.moves() {
            let next = Self::moved(stock, u);
            if !grid.is_inside(&next) {
                continue;
            }
            let cont = continuation[0].values_at_nodes(&next);
            for node in 0..n {
                let v = -u * self.price(&[nodes[(0, node)]]) + simulator.actu_step() * cont[node];
                if v > values[(node, 0)] {
                    values[(node, 0)] = v;
                    controls[(node, 0)] = u;
                }
            }
        }
        Ok((values, controls))
    }

    fn step_simulate(
        &self,
        simulator: &TrinomialTreeSimulator,
        grid: &SpaceGrid,
        continuation: &[GridTreeValue],
        state: &mut StateTreeStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let price = self.price(&simulator.value_of_node(state.node));
        let node = state.node;
        let (_, u) = self.best(grid, &state.stock, price, simulator.actu_step(), |next| {
            continuation[0].value(next, node)
        });
        self.apply(grid, &mut state.stock, u, price, simulator.actu(), phi);
        Ok(())
    }

    fn step_simulate_control(
        &self,
        simulator: &TrinomialTreeSimulator,
        grid: &SpaceGrid,
        control: &[GridTreeValue],
        state: &mut StateTreeStocks,
        phi: &mut [Real],
    ) -> Result<()> {
        let price = self.price(&simulator.value_of_node(state.node));
        let u = control[0].value(&state.stock, state.node);
        self.apply(grid, &mut state.stock, u, price, simulator.actu(), phi);
        Ok(())
    }
}
