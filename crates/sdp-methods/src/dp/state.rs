use serde::{Deserialize, Serialize};

use sdp_core::{Real, Regime};

/// State of one Monte-Carlo path during a forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateWithStocks {
    /// Current regime.
    pub regime: Regime,
    /// Deterministic state (stock levels).
    pub stock: Vec<Real>,
    /// Current uncertainty.
    pub realization: Vec<Real>,
}

impl StateWithStocks {
    /// New state.
    pub fn new(regime: Regime, stock: Vec<Real>, realization: Vec<Real>) -> Self {
        Self {
            regime,
            stock,
            realization,
        }
    }
}

/// State of one tree path during a forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTreeStocks {
    /// Current regime.
    pub regime: Regime,
    /// Deterministic state (stock levels).
    pub stock: Vec<Real>,
    /// Current node.
    pub node: usize,
}

impl StateTreeStocks {
    /// New state.
    pub fn new(regime: Regime, stock: Vec<Real>, node: usize) -> Self {
        Self {
            regime,
            stock,
            node,
        }
    }
}
