//! Reconstruction of distributed arrays.

use nalgebra::{DMatrix, DVector};

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{Grid, SpaceGrid};

use crate::collectives::{broadcast, decode_matrix, encode_matrix, gather_to_root};
use crate::communicator::Communicator;
use crate::splitting::{positions_in, GridSplitting};

/// The full array on rank 0 (`None` on other ranks) from the per-rank parts.
/// `local` has one column per point of this rank's box.
pub fn reconstruct_on_proc0(
    comm: &dyn Communicator,
    splitting: &GridSplitting,
    local: &DMatrix<Real>,
) -> Result<Option<DMatrix<Real>>> {
    let owned = splitting.local_box(comm.rank());
    ensure!(
        local.ncols() == owned.nb_points(),
        "{} columns of local values for a box of {} points",
        local.ncols(),
        owned.nb_points()
    );
    let parts = match gather_to_root(comm, &encode_matrix(local))? {
        Some(parts) => parts,
        None => return Ok(None),
    };
    let full_box = splitting.full_box();
    let mut full = DMatrix::zeros(local.nrows(), full_box.nb_points());
    for (source, data) in parts.into_iter().enumerate() {
        let (part, _) = decode_matrix(data)?;
        let cols = positions_in(&splitting.local_box(source), &full_box);
        ensure!(
            part.ncols() == cols.len(),
            "rank {source} sent {} columns for a box of {} points",
            part.ncols(),
            cols.len()
        );
        for (j, &c) in cols.iter().enumerate() {
            full.set_column(c, &part.column(j));
        }
    }
    Ok(Some(full))
}

/// The full array on every rank.
pub fn all_reconstruct(
    comm: &dyn Communicator,
    splitting: &GridSplitting,
    local: &DMatrix<Real>,
) -> Result<DMatrix<Real>> {
    let root = reconstruct_on_proc0(comm, splitting, local)?;
    let payload = root.as_ref().map(encode_matrix).unwrap_or_default();
    let (full, _) = decode_matrix(broadcast(comm, &payload)?)?;
    Ok(full)
}

/// Interpolation at `point` of every row of the distributed array, on rank 0.
pub fn reconstruct_at_point_on_proc0(
    comm: &dyn Communicator,
    splitting: &GridSplitting,
    grid: &SpaceGrid,
    local: &DMatrix<Real>,
    point: &[Real],
) -> Result<Option<DVector<Real>>> {
    match reconstruct_on_proc0(comm, splitting, local)? {
        Some(full) => {
            let native = grid.to_hierarchize_vec(&full)?;
            Ok(Some(grid.create_interpolator(point).apply_vec(&native)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::NoComm;
    use approx::assert_abs_diff_eq;
    use sdp_grids::RegularSpaceGrid;

    #[test]
    fn serial_reconstruction_is_the_identity() {
        let s = GridSplitting::new(&[4, 3], &[true, true], 1).unwrap();
        let m = DMatrix::from_fn(2, 12, |i, j| (i * 12 + j) as Real);
        assert_eq!(reconstruct_on_proc0(&NoComm, &s, &m).unwrap(), Some(m.clone()));
        assert_eq!(all_reconstruct(&NoComm, &s, &m).unwrap(), m);
    }

    #[test]
    fn interpolation_on_root() {
        let g: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![4]).unwrap().into();
        let s = GridSplitting::for_grid(&g, &[true], 1).unwrap();
        let m = DMatrix::from_fn(1, 5, |_, j| 2.0 * j as Real);
        let v = reconstruct_at_point_on_proc0(&NoComm, &s, &g, &m, &[1.5])
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(v[0], 3.0, epsilon = 1e-14);
    }
}
