//! The communicator is never global state: backward and forward steps receive
//! an [`ExecutionContext`] holding the communicator and the process
//! configuration.

use sdp_core::ProcessConfig;
use sdp_parallel::{Communicator, NoComm};

static SERIAL: NoComm = NoComm;

/// Communicator and configuration of a pass.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'c> {
    comm: &'c dyn Communicator,
    config: &'c ProcessConfig,
}

impl<'c> ExecutionContext<'c> {
    /// Context over `comm`.
    pub fn new(comm: &'c dyn Communicator, config: &'c ProcessConfig) -> Self {
        Self { comm, config }
    }

    /// Single process context.
    pub fn serial(config: &'c ProcessConfig) -> Self {
        Self {
            comm: &SERIAL,
            config,
        }
    }

    /// The communicator.
    pub fn comm(&self) -> &'c dyn Communicator {
        self.comm
    }

    /// The configuration.
    pub fn config(&self) -> &'c ProcessConfig {
        self.config
    }

    /// Rank of this process.
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Number of processes.
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Whether this process is rank 0.
    pub fn is_root(&self) -> bool {
        self.comm.is_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdp_parallel::ThreadComm;

    #[test]
    fn serial_context() {
        let config = ProcessConfig::default();
        let ctx = ExecutionContext::serial(&config);
        assert_eq!((ctx.rank(), ctx.size()), (0, 1));
        assert!(ctx.is_root());
        assert!(ctx.config().one_file);
    }

    #[test]
    fn threaded_context() {
        let config = ProcessConfig::default().with_one_file(false);
        let world = ThreadComm::world(3);
        let ctx = ExecutionContext::new(&world[2], &config);
        assert_eq!((ctx.rank(), ctx.size()), (2, 3));
        assert!(!ctx.is_root());
    }
}
