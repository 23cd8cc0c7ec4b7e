//! Point-to-point message passing between ranks.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use sdp_core::errors::{Error, Result};

/// Blocking message passing between the ranks of a group.
///
/// Messages between two ranks with the same tag are delivered in the order
/// they were sent.
pub trait Communicator: fmt::Debug {
    /// Rank of this process in the group.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Send `data` to rank `dest`.
    fn send(&self, dest: usize, tag: u16, data: &[u8]) -> Result<()>;

    /// Receive the next message with tag `tag` from rank `source`.
    fn recv(&self, source: usize, tag: u16) -> Result<Bytes>;

    /// Block until every rank has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Whether this is rank 0.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// The single-rank communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, _tag: u16, _data: &[u8]) -> Result<()> {
        Err(Error::Communication(format!(
            "single-rank communicator cannot send to rank {dest}"
        )))
    }

    fn recv(&self, source: usize, _tag: u16) -> Result<Bytes> {
        Err(Error::Communication(format!(
            "single-rank communicator cannot receive from rank {source}"
        )))
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MailState {
    /// Pending messages keyed by `(source, dest, tag)`.
    messages: HashMap<(usize, usize, u16), VecDeque<Bytes>>,
    waiting: usize,
    generation: u64,
}

#[derive(Debug, Default)]
struct Mailbox {
    state: Mutex<MailState>,
    changed: Condvar,
}

/// One rank of a group of threads sharing a mailbox.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl ThreadComm {
    /// Communicators of every rank of a group of `size` ranks, to be moved
    /// into one thread each.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                timeout: Duration::from_secs(120),
            })
            .collect()
    }

    /// Replace the delay after which a blocked receive or barrier fails.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.size {
            return Err(Error::Communication(format!(
                "rank {peer} outside a group of {} ranks",
                self.size
            )));
        }
        Ok(())
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: u16, data: &[u8]) -> Result<()> {
        self.check_peer(dest)?;
        let mut state = self.mailbox.state.lock();
        state
            .messages
            .entry((self.rank, dest, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(data));
        self.mailbox.changed.notify_all();
        Ok(())
    }

    fn recv(&self, source: usize, tag: u16) -> Result<Bytes> {
        self.check_peer(source)?;
        let key = (source, self.rank, tag);
        let deadline = Instant::now() + self.timeout;
        let mut state = self.mailbox.state.lock();
        loop {
            if let Some(msg) = state.messages.get_mut(&key).and_then(VecDeque::pop_front) {
                return Ok(msg);
            }
            if self.mailbox.changed.wait_until(&mut state, deadline).timed_out() {
                return state
                    .messages
                    .get_mut(&key)
                    .and_then(VecDeque::pop_front)
                    .ok_or_else(|| {
                        Error::Communication(format!(
                            "rank {} timed out waiting for rank {source} (tag {tag})",
                            self.rank
                        ))
                    });
            }
        }
    }

    fn barrier(&self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut state = self.mailbox.state.lock();
        let generation = state.generation;
        state.waiting += 1;
        if state.waiting == self.size {
            state.waiting = 0;
            state.generation += 1;
            self.mailbox.changed.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            if self.mailbox.changed.wait_until(&mut state, deadline).timed_out()
                && state.generation == generation
            {
                return Err(Error::Communication(format!(
                    "rank {} timed out in barrier",
                    self.rank
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn messages_keep_their_order() {
        let mut world = ThreadComm::world(2);
        let c1 = world.pop().unwrap();
        let c0 = world.pop().unwrap();
        let h = thread::spawn(move || {
            c1.send(0, 7, b"first").unwrap();
            c1.send(0, 7, b"second").unwrap();
            c1.recv(0, 3).unwrap()
        });
        assert_eq!(&c0.recv(1, 7).unwrap()[..], b"first");
        assert_eq!(&c0.recv(1, 7).unwrap()[..], b"second");
        c0.send(1, 3, b"ack").unwrap();
        assert_eq!(&h.join().unwrap()[..], b"ack");
    }

    #[test]
    fn barrier_releases_everyone() {
        let handles: Vec<_> = ThreadComm::world(4)
            .into_iter()
            .map(|c| thread::spawn(move || (0..3).try_for_each(|_| c.barrier())))
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
    }

    #[test]
    fn missing_message_times_out() {
        let c = ThreadComm::world(2)
            .remove(0)
            .with_timeout(Duration::from_millis(20));
        assert!(matches!(c.recv(1, 0), Err(Error::Communication(_))));
    }

    #[test]
    fn single_rank_has_no_peer() {
        assert_eq!(NoComm.size(), 1);
        assert!(NoComm.is_root());
        assert!(NoComm.barrier().is_ok());
        assert!(NoComm.send(0, 0, &[]).is_err());
    }
}
