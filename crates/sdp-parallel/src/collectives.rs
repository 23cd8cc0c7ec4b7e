//! Collectives over byte buffers.
//!
//! Rooted collectives use rank 0. `all_gather` is a gather followed by a
//! broadcast; `all_to_all` exchanges one buffer per pair of ranks, visiting
//! the pairs in the same global order on every rank so that blocking sends
//! cannot deadlock.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use nalgebra::DMatrix;
use serde::{de::DeserializeOwned, Serialize};

use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

use crate::communicator::Communicator;

const TAG_GATHER: u16 = 1;
const TAG_BROADCAST: u16 = 2;
const TAG_ALL_TO_ALL: u16 = 3;

/// Buffers of every rank on rank 0, `None` elsewhere.
pub fn gather_to_root(comm: &dyn Communicator, data: &[u8]) -> Result<Option<Vec<Bytes>>> {
    if !comm.is_root() {
        comm.send(0, TAG_GATHER, data)?;
        return Ok(None);
    }
    let mut out = Vec::with_capacity(comm.size());
    out.push(Bytes::copy_from_slice(data));
    for source in 1..comm.size() {
        out.push(comm.recv(source, TAG_GATHER)?);
    }
    Ok(Some(out))
}

/// Rank 0's `data` on every rank; the argument is ignored on other ranks.
pub fn broadcast(comm: &dyn Communicator, data: &[u8]) -> Result<Bytes> {
    if comm.is_root() {
        for dest in 1..comm.size() {
            comm.send(dest, TAG_BROADCAST, data)?;
        }
        Ok(Bytes::copy_from_slice(data))
    } else {
        comm.recv(0, TAG_BROADCAST)
    }
}

/// Buffers of every rank, on every rank.
pub fn all_gather(comm: &dyn Communicator, data: &[u8]) -> Result<Vec<Bytes>> {
    let packed = match gather_to_root(comm, data)? {
        Some(parts) => pack(&parts),
        None => Bytes::new(),
    };
    let all = broadcast(comm, &packed)?;
    unpack(all, comm.size())
}

/// Send `outgoing[r]` to every rank `r` and return what every rank sent to
/// this one. `outgoing[rank]` is kept locally.
pub fn all_to_all(comm: &dyn Communicator, outgoing: &[Bytes]) -> Result<Vec<Bytes>> {
    let size = comm.size();
    let rank = comm.rank();
    ensure!(
        outgoing.len() == size,
        "{} outgoing buffers for {size} ranks",
        outgoing.len()
    );
    let mut incoming = vec![Bytes::new(); size];
    incoming[rank] = outgoing[rank].clone();
    for a in 0..size {
        for b in a + 1..size {
            if rank == a {
                comm.send(b, TAG_ALL_TO_ALL, &outgoing[b])?;
                incoming[b] = comm.recv(b, TAG_ALL_TO_ALL)?;
            } else if rank == b {
                incoming[a] = comm.recv(a, TAG_ALL_TO_ALL)?;
                comm.send(a, TAG_ALL_TO_ALL, &outgoing[a])?;
            }
        }
    }
    Ok(incoming)
}

fn pack(parts: &[Bytes]) -> Bytes {
    let total: usize = parts.iter().map(|p| p.len() + 8).sum();
    let mut out = BytesMut::with_capacity(total);
    for p in parts {
        out.put_u64_le(p.len() as u64);
        out.put_slice(p);
    }
    out.freeze()
}

fn unpack(mut data: Bytes, count: usize) -> Result<Vec<Bytes>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        if data.remaining() < 8 {
            return Err(Error::Communication("truncated gathered buffer".into()));
        }
        let len = data.get_u64_le() as usize;
        if data.remaining() < len {
            return Err(Error::Communication("truncated gathered buffer".into()));
        }
        out.push(data.split_to(len));
    }
    Ok(out)
}

// ── Typed helpers ─────────────────────────────────────────────────────────────

/// Little-endian encoding of a slice of reals.
pub fn encode_reals(values: &[Real]) -> Bytes {
    let mut out = BytesMut::with_capacity(values.len() * 8);
    for &v in values {
        out.put_f64_le(v);
    }
    out.freeze()
}

/// Inverse of [`encode_reals`].
pub fn decode_reals(mut data: Bytes) -> Result<Vec<Real>> {
    if data.len() % 8 != 0 {
        return Err(Error::Communication(format!(
            "buffer of {} bytes does not hold reals",
            data.len()
        )));
    }
    let mut out = Vec::with_capacity(data.len() / 8);
    while data.has_remaining() {
        out.push(data.get_f64_le());
    }
    Ok(out)
}

/// Encoding of a matrix: row and column counts, then the entries column by
/// column.
pub fn encode_matrix(m: &DMatrix<Real>) -> Bytes {
    let mut out = BytesMut::with_capacity(16 + m.len() * 8);
    out.put_u64_le(m.nrows() as u64);
    out.put_u64_le(m.ncols() as u64);
    for &v in m.iter() {
        out.put_f64_le(v);
    }
    out.freeze()
}

/// Inverse of [`encode_matrix`]; returns the matrix and the unread tail.
pub fn decode_matrix(mut data: Bytes) -> Result<(DMatrix<Real>, Bytes)> {
    if data.remaining() < 16 {
        return Err(Error::Communication("truncated matrix header".into()));
    }
    let nrows = data.get_u64_le() as usize;
    let ncols = data.get_u64_le() as usize;
    let n = nrows * ncols;
    if data.remaining() < n * 8 {
        return Err(Error::Communication(format!(
            "truncated {nrows}x{ncols} matrix"
        )));
    }
    let body = data.split_to(n * 8);
    let values = decode_reals(body)?;
    Ok((DMatrix::from_vec(nrows, ncols, values), data))
}

/// Reals of every rank, on every rank.
pub fn all_gather_reals(comm: &dyn Communicator, values: &[Real]) -> Result<Vec<Vec<Real>>> {
    all_gather(comm, &encode_reals(values))?
        .into_iter()
        .map(decode_reals)
        .collect()
}

/// Rank 0's reals on every rank.
pub fn broadcast_reals(comm: &dyn Communicator, values: &[Real]) -> Result<Vec<Real>> {
    decode_reals(broadcast(comm, &encode_reals(values))?)
}

/// Bincode-encoded values of every rank, on every rank.
pub fn all_gather_serde<T: Serialize + DeserializeOwned>(comm: &dyn Communicator, value: &T) -> Result<Vec<T>> {
    let bytes = bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))?;
    all_gather(comm, &bytes)?
        .iter()
        .map(|b| bincode::deserialize(b).map_err(|e| Error::Codec(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::{NoComm, ThreadComm};
    use std::thread;

    fn on_ranks<T: Send + 'static>(
        n: usize,
        f: impl Fn(ThreadComm) -> T + Send + Sync + Clone + 'static,
    ) -> Vec<T> {
        let handles: Vec<_> = ThreadComm::world(n)
            .into_iter()
            .map(|c| {
                let f = f.clone();
                thread::spawn(move || f(c))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn gather_and_broadcast() {
        let out = on_ranks(3, |c| {
            let mine = vec![c.rank() as u8; c.rank() + 1];
            let gathered = gather_to_root(&c, &mine).unwrap();
            let b = broadcast(&c, b"root").unwrap();
            (gathered, b)
        });
        let root = out[0].0.as_ref().unwrap();
        assert_eq!(&root[2][..], &[2, 2, 2]);
        assert!(out[1].0.is_none());
        assert!(out.iter().all(|(_, b)| &b[..] == b"root"));
    }

    #[test]
    fn all_gather_on_every_rank() {
        let out = on_ranks(4, |c| all_gather_reals(&c, &[c.rank() as Real, 0.5]).unwrap());
        for all in out {
            assert_eq!(all.len(), 4);
            assert_eq!(all[3], vec![3.0, 0.5]);
        }
    }

    #[test]
    fn all_to_all_pairs() {
        let out = on_ranks(3, |c| {
            let outgoing: Vec<Bytes> = (0..3)
                .map(|dest| Bytes::from(vec![(10 * c.rank() + dest) as u8]))
                .collect();
            all_to_all(&c, &outgoing).unwrap()
        });
        for (rank, incoming) in out.iter().enumerate() {
            for (source, b) in incoming.iter().enumerate() {
                assert_eq!(b[0] as usize, 10 * source + rank);
            }
        }
    }

    #[test]
    fn single_rank_collectives() {
        assert_eq!(all_gather(&NoComm, b"x").unwrap().len(), 1);
        assert_eq!(&broadcast(&NoComm, b"y").unwrap()[..], b"y");
        let m = DMatrix::from_fn(2, 3, |i, j| (i * 3 + j) as Real);
        let (back, tail) = decode_matrix(encode_matrix(&m)).unwrap();
        assert_eq!(back, m);
        assert!(tail.is_empty());
    }
}
