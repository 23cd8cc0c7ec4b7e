//! Halo exchange.
//!
//! Every rank owns the values of the following step on its box of the
//! following grid, and needs them on the box enclosing the cone its own
//! points can reach. Ranks first share the boxes they need, then each rank
//! sends to every other the part of its own box that the other needs.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::debug;
use nalgebra::DMatrix;

use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};
use sdp_grids::IndexBox;

use crate::collectives::{all_gather_serde, all_to_all, decode_matrix, encode_matrix};
use crate::communicator::Communicator;
use crate::splitting::{positions_in, GridSplitting};

/// Values on `wanted` of every matrix of `local`.
///
/// `local[k]` holds one row per simulation (or tree node) and one column
/// per point of this rank's box of `splitting`, in box order. The result
/// has the same rows and one column per point of `wanted`.
pub fn exchange_values(
    comm: &dyn Communicator,
    splitting: &GridSplitting,
    local: &[DMatrix<Real>],
    wanted: &IndexBox,
) -> Result<Vec<DMatrix<Real>>> {
    let rank = comm.rank();
    let owned = splitting.local_box(rank);
    for m in local {
        ensure!(
            m.ncols() == owned.nb_points(),
            "{} columns of local values for a box of {} points",
            m.ncols(),
            owned.nb_points()
        );
    }
    let wanted_by: Vec<IndexBox> = all_gather_serde(comm, wanted)?;

    let outgoing: Vec<Bytes> = wanted_by
        .iter()
        .map(|w| {
            let cols = positions_in(&owned.intersect(w), &owned);
            let mut out = BytesMut::new();
            out.put_u64_le(local.len() as u64);
            for m in local {
                let part = DMatrix::from_fn(m.nrows(), cols.len(), |i, j| m[(i, cols[j])]);
                out.put_slice(&encode_matrix(&part));
            }
            out.freeze()
        })
        .collect();
    let incoming = all_to_all(comm, &outgoing)?;

    let nrows: Vec<usize> = local.iter().map(|m| m.nrows()).collect();
    let mut out: Vec<DMatrix<Real>> = nrows
        .iter()
        .map(|&r| DMatrix::zeros(r, wanted.nb_points()))
        .collect();
    let mut filled = vec![false; wanted.nb_points()];
    for (source, mut data) in incoming.into_iter().enumerate() {
        let theirs = splitting.local_box(source).intersect(wanted);
        let cols = positions_in(&theirs, wanted);
        if data.len() < 8 {
            return Err(Error::Communication(format!(
                "truncated halo from rank {source}"
            )));
        }
        let count = data.get_u64_le() as usize;
        ensure!(
            count == out.len(),
            "rank {source} sent {count} arrays, {} expected",
            out.len()
        );
        for target in out.iter_mut() {
            let (part, rest) = decode_matrix(data)?;
            data = rest;
            ensure!(
                part.ncols() == cols.len() && part.nrows() == target.nrows(),
                "halo of shape {:?} from rank {source}, expected {}x{}",
                part.shape(),
                target.nrows(),
                cols.len()
            );
            for (j, &c) in cols.iter().enumerate() {
                target.set_column(c, &part.column(j));
            }
        }
        for &c in &cols {
            filled[c] = true;
        }
    }
    if let Some(hole) = filled.iter().position(|f| !f) {
        return Err(Error::Communication(format!(
            "point {hole} of box {wanted:?} is owned by no rank"
        )));
    }
    debug!(
        "rank {rank}: halo exchange filled {} points from a box of {}",
        wanted.nb_points(),
        owned.nb_points()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::{NoComm, ThreadComm};
    use std::thread;

    #[test]
    fn serial_exchange_is_a_restriction() {
        let s = GridSplitting::new(&[6], &[true], 1).unwrap();
        let local = vec![DMatrix::from_fn(2, 6, |i, j| (10 * i + j) as Real)];
        let wanted = IndexBox::new(vec![2], vec![5]).unwrap();
        let out = exchange_values(&NoComm, &s, &local, &wanted).unwrap();
        assert_eq!(out[0], DMatrix::from_fn(2, 3, |i, j| (10 * i + j + 2) as Real));
    }

    #[test]
    fn three_ranks_share_their_halos() {
        let handles: Vec<_> = ThreadComm::world(3)
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    let s = GridSplitting::new(&[9, 2], &[true, false], 3).unwrap();
                    let owned = s.local_box(c.rank());
                    let idx = s.point_indices(&owned);
                    let local = vec![DMatrix::from_fn(1, idx.len(), |_, j| idx[j] as Real)];
                    let lo = owned.lower()[0].saturating_sub(1);
                    let hi = (owned.upper()[0] + 1).min(9);
                    let wanted = IndexBox::new(vec![lo, 0], vec![hi, 2]).unwrap();
                    let got = exchange_values(&c, &s, &local, &wanted).unwrap();
                    (s.point_indices(&wanted), got)
                })
            })
            .collect();
        for h in handles {
            let (indices, got) = h.join().unwrap();
            let expected: Vec<Real> = indices.iter().map(|&i| i as Real).collect();
            assert_eq!(got[0].row(0).iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
