//! Process configuration.
//!
//! Unlike a process-wide settings singleton, a [`ProcessConfig`] is a plain
//! value: drivers build one (or deserialize it) and hand it, together with a
//! communicator, to every component that writes archives or loops over grid
//! points.

use serde::{Deserialize, Serialize};

use crate::Real;

/// What to do when the optimizer fails at a single grid point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Store `NaN` for every simulation of the failed point.
    #[default]
    PropagateNan,
    /// Store the given value instead.
    Fill(Real),
    /// Abort the whole time step with `Error::PointOptimization`.
    Abort,
}

/// Configuration inputs of a backward or forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Write one shared archive (from rank 0) instead of one file per rank.
    pub one_file: bool,
    /// Evaluate the grid points of a time step with rayon.
    pub parallel: bool,
    /// Per-point optimization failure handling.
    pub failure_policy: FailurePolicy,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            one_file: true,
            parallel: false,
            failure_policy: FailurePolicy::PropagateNan,
        }
    }
}

impl ProcessConfig {
    /// Select between one shared archive and one archive per rank.
    pub fn with_one_file(mut self, one_file: bool) -> Self {
        self.one_file = one_file;
        self
    }

    /// Switch intra-process loop parallelism on or off.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replace the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Archive file name used by `rank`: the base name in one-file mode,
    /// `base_<rank>` otherwise.
    pub fn archive_file_name(&self, base: &str, rank: usize) -> String {
        if self.one_file {
            base.to_string()
        } else {
            format!("{base}_{rank}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ProcessConfig::default();
        assert!(c.one_file);
        assert!(!c.parallel);
        assert_eq!(c.failure_policy, FailurePolicy::PropagateNan);
    }

    #[test]
    fn per_rank_file_names() {
        let c = ProcessConfig::default().with_one_file(false);
        assert_eq!(c.archive_file_name("dump", 3), "dump_3");
        let c = c.with_one_file(true);
        assert_eq!(c.archive_file_name("dump", 3), "dump");
    }
}
