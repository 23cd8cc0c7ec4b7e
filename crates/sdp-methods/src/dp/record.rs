//! Archive records of a backward time step.
//!
//! One record per `(name, step)` holds, for every regime, the continuation
//! value on the following grid and, for every control, the optimal control
//! on the current grid. Regression records store the regressed coefficients
//! (`nb_basis x points`) with the regressor basis; tree records store the
//! nodal expectations (`nb_nodes x points`). Arrays are stored at the grid
//! points, before hierarchization.
//!
//! Grid snapshots are written only when they differ from the previous record
//! of the same name in the same file; a reader resolves an omitted grid from
//! the most recent earlier record carrying one.
//!
//! In one-file mode the arrays are gathered on rank 0, which alone writes;
//! every region is the full grid. Otherwise every rank writes the part it
//! owns to its own file, and readers reassemble the parts collectively.

use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::DMatrix;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use sdp_archive::{ArchiveReader, ArchiveWriter, Versioned};
use sdp_core::{
    ensure,
    errors::{Error, Result},
    Real,
};
use sdp_grids::{snapshot, Grid, IndexBox, SpaceGrid};
use sdp_parallel::{collectives::all_gather_serde, splitting::positions_in, GridSplitting};
use sdp_regression::Regressor;

use super::context::ExecutionContext;

/// Shape of the tree a tree record was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeShape {
    /// Number of nodes at the date of the record.
    pub nb_nodes: usize,
}

/// One backward time step as persisted in the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord<Op> {
    /// Snapshot of the grid of the continuation values, when it changed.
    pub following_grid: Option<Vec<u8>>,
    /// Snapshot of the grid of the controls, when it changed.
    pub current_grid: Option<Vec<u8>>,
    /// Points of the following grid covered by `continuation`.
    pub following_region: IndexBox,
    /// Points of the current grid covered by `controls`.
    pub current_region: IndexBox,
    /// Conditional expectation operator.
    pub operator: Op,
    /// Continuation value per regime.
    pub continuation: Vec<DMatrix<Real>>,
    /// Optimal control per control.
    pub controls: Vec<DMatrix<Real>>,
}

impl Versioned for StepRecord<Regressor> {
    const TAG: &'static str = "RegressionStep";
    const VERSION: u32 = 1;
}

impl Versioned for StepRecord<TreeShape> {
    const TAG: &'static str = "TreeStep";
    const VERSION: u32 = 1;
}

fn archive_path(base: &Path, ctx: &ExecutionContext<'_>) -> PathBuf {
    PathBuf::from(
        ctx.config()
            .archive_file_name(&base.to_string_lossy(), ctx.rank()),
    )
}

// ─── Writing ──────────────────────────────────────────────────────────────────

/// Where a backward pass writes its records: nothing on ranks other than 0
/// in one-file mode, the rank's own file otherwise.
#[derive(Debug)]
pub struct ArchiveSink {
    writer: Option<ArchiveWriter>,
}

impl ArchiveSink {
    /// Open the archive of this rank under `base`.
    pub fn create(base: impl AsRef<Path>, ctx: &ExecutionContext<'_>) -> Result<Self> {
        let writer = if ctx.config().one_file && !ctx.is_root() {
            None
        } else {
            Some(ArchiveWriter::create(archive_path(base.as_ref(), ctx))?)
        };
        Ok(Self { writer })
    }

    /// Sink that discards every record.
    pub fn discard() -> Self {
        Self { writer: None }
    }

    /// Whether this rank writes records.
    pub fn is_writing(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the file written by this rank.
    pub fn path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.path())
    }

    /// Write `record` under `(name, step)`, attaching the grid snapshots
    /// that changed since the previous record of the same name. A failed
    /// write leaves the snapshots of `name` as they were.
    pub(crate) fn write_step<Op>(
        &mut self,
        name: &str,
        step: usize,
        following: &SpaceGrid,
        current: &SpaceGrid,
        mut record: StepRecord<Op>,
    ) -> Result<()>
    where
        StepRecord<Op>: Versioned + Serialize,
    {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let following_key = format!("{name}/following");
        let current_key = format!("{name}/current");
        let bytes = snapshot::encode(following)?;
        if writer.snapshot_changed(&following_key, &bytes) {
            record.following_grid = Some(bytes);
        }
        let bytes = snapshot::encode(current)?;
        if writer.snapshot_changed(&current_key, &bytes) {
            record.current_grid = Some(bytes);
        }
        writer.write(name, step as u64, &record)?;
        if let Some(bytes) = record.following_grid.take() {
            writer.commit_snapshot(&following_key, bytes);
        }
        if let Some(bytes) = record.current_grid.take() {
            writer.commit_snapshot(&current_key, bytes);
        }
        Ok(())
    }

    /// Flush and close the file.
    pub fn finish(self) -> Result<()> {
        match self.writer {
            Some(w) => w.finish(),
            None => Ok(()),
        }
    }
}

// ─── Reading ──────────────────────────────────────────────────────────────────

/// A backward step read back with grids resolved and arrays covering the
/// whole grids.
#[derive(Debug, Clone)]
pub(crate) struct LoadedStep<Op> {
    pub following_grid: SpaceGrid,
    pub current_grid: SpaceGrid,
    pub operator: Op,
    pub continuation: Vec<DMatrix<Real>>,
    pub controls: Vec<DMatrix<Real>>,
}

/// The archive a forward pass reads: the shared file in one-file mode, the
/// rank's own file otherwise.
#[derive(Debug)]
pub struct ArchiveSource {
    reader: ArchiveReader,
}

impl ArchiveSource {
    /// Open the archive of this rank under `base`.
    pub fn open(base: impl AsRef<Path>, ctx: &ExecutionContext<'_>) -> Result<Self> {
        Ok(Self {
            reader: ArchiveReader::open(archive_path(base.as_ref(), ctx))?,
        })
    }

    /// The underlying reader.
    pub fn reader(&self) -> &ArchiveReader {
        &self.reader
    }

    /// Read `(name, step)`. Collective in per-rank mode.
    pub(crate) fn load_step<Op>(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        step: usize,
    ) -> Result<LoadedStep<Op>>
    where
        Op: Serialize + DeserializeOwned,
        StepRecord<Op>: Versioned,
    {
        let record: StepRecord<Op> = self.reader.read(name, step as u64)?;
        let following_grid = match record.following_grid {
            Some(ref bytes) => snapshot::decode(bytes)?,
            None => self.resolve_grid::<Op>(name, step, |r| r.following_grid)?,
        };
        let current_grid = match record.current_grid {
            Some(ref bytes) => snapshot::decode(bytes)?,
            None => self.resolve_grid::<Op>(name, step, |r| r.current_grid)?,
        };
        let following_full = full_box(&following_grid)?;
        let current_full = full_box(&current_grid)?;
        let (continuation, controls) = if ctx.config().one_file {
            (
                assemble(&[(record.following_region, record.continuation)], &following_full)?,
                assemble(&[(record.current_region, record.controls)], &current_full)?,
            )
        } else {
            let parts = all_gather_serde(
                ctx.comm(),
                &(
                    (record.following_region, record.continuation),
                    (record.current_region, record.controls),
                ),
            )?;
            let (following, current): (Vec<_>, Vec<_>) = parts.into_iter().unzip();
            (
                assemble(&following, &following_full)?,
                assemble(&current, &current_full)?,
            )
        };
        debug!("({name}, {step}) loaded: {} continuation and {} control arrays", continuation.len(), controls.len());
        Ok(LoadedStep {
            following_grid,
            current_grid,
            operator: record.operator,
            continuation,
            controls,
        })
    }

    fn resolve_grid<Op>(
        &self,
        name: &str,
        step: usize,
        pick: impl Fn(StepRecord<Op>) -> Option<Vec<u8>>,
    ) -> Result<SpaceGrid>
    where
        Op: DeserializeOwned,
        StepRecord<Op>: Versioned,
    {
        for earlier in self.reader.written_before(name, step as u64)? {
            if let Some(bytes) = pick(self.reader.read::<StepRecord<Op>>(name, earlier)?) {
                return snapshot::decode(&bytes);
            }
        }
        Err(Error::RecordNotFound {
            key: format!("{name}/grid"),
            step: step as u64,
        })
    }
}

/// Index box of every point of `grid`, in the index space used by
/// [`GridSplitting`].
fn full_box(grid: &SpaceGrid) -> Result<IndexBox> {
    Ok(GridSplitting::for_grid(grid, &vec![false; grid.dimension()], 1)?.full_box())
}

/// Arrays over `full` from arrays over the regions of `parts`.
fn assemble(parts: &[(IndexBox, Vec<DMatrix<Real>>)], full: &IndexBox) -> Result<Vec<DMatrix<Real>>> {
    let count = parts.first().map_or(0, |(_, arrays)| arrays.len());
    let mut out = Vec::with_capacity(count);
    for k in 0..count {
        let mut nrows = None;
        let mut columns = Vec::new();
        for (region, arrays) in parts {
            ensure!(
                arrays.len() == count,
                "parts of a record hold {} and {count} arrays",
                arrays.len()
            );
            let cols = positions_in(region, full);
            ensure!(
                arrays[k].ncols() == cols.len(),
                "{} columns stored for a region of {} points",
                arrays[k].ncols(),
                cols.len()
            );
            ensure!(
                *nrows.get_or_insert(arrays[k].nrows()) == arrays[k].nrows(),
                "parts of a record disagree on the number of rows"
            );
            columns.push(cols);
        }
        let mut m = DMatrix::zeros(nrows.unwrap_or(0), full.nb_points());
        let mut filled = 0;
        for ((_, arrays), cols) in parts.iter().zip(&columns) {
            for (j, &c) in cols.iter().enumerate() {
                m.set_column(c, &arrays[k].column(j));
            }
            filled += cols.len();
        }
        ensure!(
            filled == full.nb_points(),
            "record parts cover {filled} of {} points",
            full.nb_points()
        );
        out.push(m);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdp_grids::RegularSpaceGrid;

    #[test]
    fn parts_are_reassembled() {
        let full = IndexBox::full(&[4, 2]);
        let left = IndexBox::new(vec![0, 0], vec![2, 2]).unwrap();
        let right = IndexBox::new(vec![2, 0], vec![4, 2]).unwrap();
        let whole = DMatrix::from_fn(3, 8, |i, j| (10 * i + j) as Real);
        let take = |b: &IndexBox| {
            let cols = positions_in(b, &full);
            DMatrix::from_fn(3, cols.len(), |i, j| whole[(i, cols[j])])
        };
        let parts = vec![
            (right.clone(), vec![take(&right)]),
            (IndexBox::empty(2), vec![DMatrix::zeros(3, 0)]),
            (left.clone(), vec![take(&left)]),
        ];
        assert_eq!(assemble(&parts, &full).unwrap(), vec![whole]);
    }

    #[test]
    fn missing_points_are_an_error() {
        let full = IndexBox::full(&[4]);
        let left = IndexBox::new(vec![0], vec![2]).unwrap();
        assert!(assemble(&[(left, vec![DMatrix::zeros(1, 2)])], &full).is_err());
    }

    fn tree_record(grid: &SpaceGrid) -> StepRecord<TreeShape> {
        let n = grid.nb_points();
        StepRecord {
            following_grid: None,
            current_grid: None,
            following_region: full_box(grid).unwrap(),
            current_region: full_box(grid).unwrap(),
            operator: TreeShape { nb_nodes: 1 },
            continuation: vec![DMatrix::zeros(1, n)],
            controls: vec![DMatrix::zeros(1, n)],
        }
    }

    #[test]
    fn rejected_record_does_not_hide_a_grid_change() {
        let config = sdp_core::ProcessConfig::default();
        let ctx = ExecutionContext::serial(&config);
        let path = std::env::temp_dir().join(format!("sdp-methods-record-{}", std::process::id()));
        let coarse: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![2]).unwrap().into();
        let fine: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![0.5], vec![4]).unwrap().into();

        let mut sink = ArchiveSink::create(&path, &ctx).unwrap();
        sink.write_step("C", 0, &coarse, &coarse, tree_record(&coarse)).unwrap();
        let duplicate = sink.write_step("C", 0, &fine, &fine, tree_record(&fine));
        assert!(matches!(duplicate, Err(Error::DuplicateRecord { step: 0, .. })));
        sink.write_step("C", 1, &fine, &fine, tree_record(&fine)).unwrap();
        sink.write_step("C", 2, &fine, &fine, tree_record(&fine)).unwrap();
        sink.finish().unwrap();

        let source = ArchiveSource::open(&path, &ctx).unwrap();
        let raw: StepRecord<TreeShape> = source.reader().read("C", 1).unwrap();
        assert!(raw.following_grid.is_some() && raw.current_grid.is_some());
        let raw: StepRecord<TreeShape> = source.reader().read("C", 2).unwrap();
        assert!(raw.following_grid.is_none());
        let loaded = source.load_step::<TreeShape>(&ctx, "C", 2).unwrap();
        assert_eq!(loaded.following_grid, fine);
        assert_eq!(loaded.continuation[0].shape(), (1, 5));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn tensor_grids_use_their_sizes() {
        let g: SpaceGrid = RegularSpaceGrid::new(vec![0.0, 0.0], vec![1.0, 1.0], vec![3, 2])
            .unwrap()
            .into();
        assert_eq!(full_box(&g).unwrap().sizes(), vec![4, 3]);
    }
}
