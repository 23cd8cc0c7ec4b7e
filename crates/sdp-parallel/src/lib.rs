//! # sdp-parallel
//!
//! Domain decomposition of space grids across ranks.
//!
//! Ranks talk through a [`Communicator`]: [`NoComm`] for a single process,
//! [`ThreadComm`] for ranks living as threads of one process (used by the
//! tests), and `MpiComm` behind the `mpi` feature. On top of the point to
//! point layer sit byte-buffer collectives, the [`GridSplitting`] of a grid
//! into per-rank index boxes, the halo exchange of following-step values on a
//! reachability cone, and the reconstruction of distributed arrays on rank 0.
//!
//! Every collective must be entered by all ranks of the communicator in the
//! same order.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// The `Communicator` trait and the in-process implementations.
pub mod communicator;

/// MPI communicator.
#[cfg(feature = "mpi")]
pub mod mpi_comm;

/// Byte-buffer collectives and their typed helpers.
pub mod collectives;

/// Splitting of a grid into per-rank index boxes.
pub mod splitting;

/// Halo exchange of distributed values.
pub mod exchange;

/// Gathering of distributed arrays.
pub mod reconstruct;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use communicator::{Communicator, NoComm, ThreadComm};
pub use exchange::exchange_values;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;
pub use reconstruct::{all_reconstruct, reconstruct_at_point_on_proc0, reconstruct_on_proc0};
pub use splitting::GridSplitting;
