//! MPI communicator.

use std::fmt;

use bytes::Bytes;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as _, Destination as _, Source as _};

use sdp_core::errors::{Error, Result};

use crate::communicator::Communicator;

/// Ranks of an MPI communicator. The MPI environment is initialized by the
/// caller, which hands over its world communicator.
pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    /// Wrap an MPI communicator.
    pub fn from_world(world: SimpleCommunicator) -> Self {
        Self { world }
    }

    fn peer(&self, rank: usize) -> Result<i32> {
        if rank >= self.size() {
            return Err(Error::Communication(format!(
                "rank {rank} outside a group of {} ranks",
                self.size()
            )));
        }
        i32::try_from(rank).map_err(|e| Error::Communication(e.to_string()))
    }
}

impl fmt::Debug for MpiComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpiComm")
            .field("rank", &self.world.rank())
            .field("size", &self.world.size())
            .finish()
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, dest: usize, tag: u16, data: &[u8]) -> Result<()> {
        let dest = self.peer(dest)?;
        self.world
            .process_at_rank(dest)
            .send_with_tag(data, i32::from(tag));
        Ok(())
    }

    fn recv(&self, source: usize, tag: u16) -> Result<Bytes> {
        let source = self.peer(source)?;
        let (msg, _status) = self
            .world
            .process_at_rank(source)
            .receive_vec_with_tag::<u8>(i32::from(tag));
        Ok(Bytes::from(msg))
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }
}
