use sdp_core::{ensure, errors::Result};
use sdp_grids::SpaceGrid;

/// Stock grids changing over time: `grids[i]` is used from date `dates[i]`
/// until the next change.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSchedule {
    dates: Vec<usize>,
    grids: Vec<SpaceGrid>,
}

impl GridSchedule {
    /// Schedule switching to `grids[i]` at date `dates[i]`. Dates must
    /// increase strictly and start at 0.
    pub fn new(dates: Vec<usize>, grids: Vec<SpaceGrid>) -> Result<Self> {
        ensure!(!grids.is_empty(), "a grid schedule needs at least one grid");
        ensure!(
            dates.len() == grids.len(),
            "{} change dates for {} grids",
            dates.len(),
            grids.len()
        );
        ensure!(dates[0] == 0, "the first grid must start at date 0, not {}", dates[0]);
        ensure!(
            dates.windows(2).all(|w| w[0] < w[1]),
            "change dates must increase strictly: {dates:?}"
        );
        Ok(Self { dates, grids })
    }

    /// The same grid at every date.
    pub fn constant(grid: SpaceGrid) -> Self {
        Self {
            dates: vec![0],
            grids: vec![grid],
        }
    }

    /// Grid in use at `date`.
    pub fn at(&self, date: usize) -> &SpaceGrid {
        let i = self.dates.partition_point(|&d| d <= date);
        &self.grids[i.saturating_sub(1)]
    }

    /// Number of distinct grids.
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Always false: a schedule holds at least one grid.
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

impl From<SpaceGrid> for GridSchedule {
    fn from(grid: SpaceGrid) -> Self {
        Self::constant(grid)
    }
}
