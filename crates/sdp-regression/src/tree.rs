//! Discrete transition trees.
//!
//! Between two dates, node `i` of the current date reaches the nodes
//! `connected[i][k].0` of the following date with probabilities
//! `proba[connected[i][k].1]`. Probabilities out of a node sum to 1, or to
//! less when absorption is modeled.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use sdp_core::{constants::TINY, ensure, errors::Result, Real};

/// Transition probabilities and connectivity between two dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    proba: Vec<Real>,
    connected: Vec<Vec<(usize, usize)>>,
}

impl Tree {
    /// Validate and build the tree: probabilities in `[0, 1]`, indices in
    /// range, and outgoing sums at most `1 + 1e-9`.
    pub fn new(proba: Vec<Real>, connected: Vec<Vec<(usize, usize)>>) -> Result<Self> {
        ensure!(
            proba.iter().all(|&p| (0.0..=1.0 + TINY).contains(&p)),
            "transition probabilities must lie in [0, 1]"
        );
        for (node, links) in connected.iter().enumerate() {
            let mut sum = 0.0;
            for &(_, ip) in links {
                ensure!(
                    ip < proba.len(),
                    "node {node} refers to probability {ip} of {}",
                    proba.len()
                );
                sum += proba[ip];
            }
            ensure!(
                sum <= 1.0 + TINY,
                "probabilities out of node {node} sum to {sum}"
            );
        }
        Ok(Self { proba, connected })
    }

    /// Number of nodes at the current date.
    pub fn nb_nodes(&self) -> usize {
        self.connected.len()
    }

    /// Number of nodes reached at the following date.
    pub fn nb_nodes_next(&self) -> usize {
        self.connected
            .iter()
            .flatten()
            .map(|&(n, _)| n + 1)
            .max()
            .unwrap_or(0)
    }

    /// Probability table.
    pub fn proba(&self) -> &[Real] {
        &self.proba
    }

    /// Connectivity table.
    pub fn connected(&self) -> &[Vec<(usize, usize)>] {
        &self.connected
    }

    /// Sum of the probabilities out of `node`.
    pub fn outgoing_sum(&self, node: usize) -> Real {
        self.connected[node]
            .iter()
            .map(|&(_, ip)| self.proba[ip])
            .sum()
    }

    /// Whether every node's outgoing probabilities sum to 1 within `1e-9`.
    pub fn is_conservative(&self) -> bool {
        (0..self.nb_nodes()).all(|n| (self.outgoing_sum(n) - 1.0).abs() <= TINY)
    }

    /// Expectation at every current node of a function given at the
    /// following nodes.
    pub fn expected_value(&self, values: &DVector<Real>) -> Result<DVector<Real>> {
        ensure!(
            values.len() >= self.nb_nodes_next(),
            "{} values for {} following nodes",
            values.len(),
            self.nb_nodes_next()
        );
        Ok(DVector::from_iterator(
            self.nb_nodes(),
            self.connected.iter().map(|links| {
                links
                    .iter()
                    .map(|&(n, ip)| self.proba[ip] * values[n])
                    .sum()
            }),
        ))
    }

    /// Expectation of several functions (`nb_nodes_next x k`), returned as
    /// `nb_nodes x k`.
    pub fn expected_value_multiple(&self, values: &DMatrix<Real>) -> Result<DMatrix<Real>> {
        ensure!(
            values.nrows() >= self.nb_nodes_next(),
            "{} rows of values for {} following nodes",
            values.nrows(),
            self.nb_nodes_next()
        );
        let mut out = DMatrix::zeros(self.nb_nodes(), values.ncols());
        for (node, links) in self.connected.iter().enumerate() {
            for &(n, ip) in links {
                let p = self.proba[ip];
                for j in 0..values.ncols() {
                    out[(node, j)] += p * values[(n, j)];
                }
            }
        }
        Ok(out)
    }
}
