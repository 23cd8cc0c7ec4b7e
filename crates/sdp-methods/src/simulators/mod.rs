//! Simulators of the uncertainty.
//!
//! A backward pass starts at the last date and walks the dates down to 0; a
//! forward pass starts at date 0. Particles are returned as a
//! `dimension x nb_simul` matrix, tree nodes as a `dimension x nb_nodes`
//! matrix.

use nalgebra::DMatrix;

use sdp_core::Real;

/// Black-Scholes particles.
pub mod black_scholes;

/// Truncated trinomial tree of an Ornstein-Uhlenbeck process.
pub mod trinomial;

pub use black_scholes::BlackScholesSimulator;
pub use trinomial::TrinomialTreeSimulator;

/// Monte-Carlo particles indexed by date.
pub trait Simulator {
    /// Number of time steps.
    fn nb_step(&self) -> usize;

    /// Number of particles.
    fn nb_simul(&self) -> usize;

    /// Dimension of a particle.
    fn dimension(&self) -> usize;

    /// Index of the current date.
    fn current_step(&self) -> usize;

    /// Particles at the current date.
    fn particles(&self) -> DMatrix<Real>;

    /// Move one date back and return the particles there.
    fn step_backward_and_get_particles(&mut self) -> DMatrix<Real>;

    /// Move one date forward and return the particles there.
    fn step_forward_and_get_particles(&mut self) -> DMatrix<Real>;

    /// Discount factor over one time step.
    fn actu_step(&self) -> Real;

    /// Discount factor from the current date to date 0.
    fn actu(&self) -> Real;
}

/// Recombining tree indexed by date.
pub trait TreeSimulator {
    /// Number of time steps.
    fn nb_step(&self) -> usize;

    /// Number of simulated paths in forward mode.
    fn nb_simul(&self) -> usize;

    /// Dimension of a node value.
    fn dimension(&self) -> usize;

    /// Index of the current date.
    fn current_step(&self) -> usize;

    /// Number of nodes at the current date.
    fn nb_nodes(&self) -> usize;

    /// Node values at the current date.
    fn nodes(&self) -> DMatrix<Real>;

    /// Value of one node of the current date.
    fn value_of_node(&self, node: usize) -> Vec<Real>;

    /// Transition probabilities from the current date to the next one.
    fn proba(&self) -> Vec<Real>;

    /// For every node of the current date, the `(next node, probability
    /// index)` pairs it reaches.
    fn connected(&self) -> Vec<Vec<(usize, usize)>>;

    /// Move one date back.
    fn step_backward(&mut self);

    /// Move one date forward, drawing a transition for every path, and
    /// return the node of every path.
    fn step_forward_and_get_nodes(&mut self) -> Vec<usize>;

    /// Node of every path at the current date.
    fn simulation_nodes(&self) -> &[usize];

    /// Discount factor over one time step.
    fn actu_step(&self) -> Real;

    /// Discount factor from the current date to date 0.
    fn actu(&self) -> Real;
}
