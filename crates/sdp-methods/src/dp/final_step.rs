//! Values at the last date.

use nalgebra::DMatrix;

use sdp_core::{ensure, errors::Result, Real};
use sdp_grids::{Grid, SpaceGrid};
use sdp_parallel::GridSplitting;

/// Terminal value arrays of every regime on a grid.
#[derive(Debug, Clone, Copy)]
pub struct FinalStepDp<'g> {
    grid: &'g SpaceGrid,
    nb_regime: usize,
}

impl<'g> FinalStepDp<'g> {
    /// Final step on `grid` with `nb_regime` regimes.
    pub fn new(grid: &'g SpaceGrid, nb_regime: usize) -> Self {
        Self { grid, nb_regime }
    }

    /// `cost(regime, stock, uncertainty)` for every column of `uncertainty`
    /// (`dimension x nb_simul`) and every grid point; one
    /// `nb_simul x nb_points` array per regime.
    pub fn values<F>(&self, cost: F, uncertainty: &DMatrix<Real>) -> Vec<DMatrix<Real>>
    where
        F: Fn(usize, &[Real], &[Real]) -> Real,
    {
        let points: Vec<usize> = (0..self.grid.nb_points()).collect();
        self.values_at(&cost, uncertainty, &points)
    }

    /// Same as [`FinalStepDp::values`] on the box owned by `rank`.
    pub fn values_on_box<F>(
        &self,
        splitting: &GridSplitting,
        rank: usize,
        cost: F,
        uncertainty: &DMatrix<Real>,
    ) -> Result<Vec<DMatrix<Real>>>
    where
        F: Fn(usize, &[Real], &[Real]) -> Real,
    {
        let full = splitting.full_box();
        ensure!(
            full.nb_points() == self.grid.nb_points(),
            "splitting of {} points for a grid of {} points",
            full.nb_points(),
            self.grid.nb_points()
        );
        let points = splitting.point_indices(&splitting.local_box(rank));
        Ok(self.values_at(&cost, uncertainty, &points))
    }

    fn values_at<F>(&self, cost: &F, uncertainty: &DMatrix<Real>, points: &[usize]) -> Vec<DMatrix<Real>>
    where
        F: Fn(usize, &[Real], &[Real]) -> Real,
    {
        let samples: Vec<Vec<Real>> = uncertainty
            .column_iter()
            .map(|c| c.iter().copied().collect())
            .collect();
        let stocks: Vec<Vec<Real>> = points.iter().map(|&p| self.grid.coordinates(p)).collect();
        (0..self.nb_regime)
            .map(|regime| {
                DMatrix::from_fn(samples.len(), stocks.len(), |s, j| {
                    cost(regime, &stocks[j], &samples[s])
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdp_grids::RegularSpaceGrid;

    fn call(_: usize, stock: &[Real], x: &[Real]) -> Real {
        (x[0] - 1.0).max(0.0) * stock[0]
    }

    #[test]
    fn rows_are_simulations() {
        let g: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![2]).unwrap().into();
        let x = DMatrix::from_row_slice(1, 3, &[0.5, 1.5, 3.0]);
        let v = FinalStepDp::new(&g, 2).values(call, &x);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].shape(), (3, 3));
        assert_eq!(v[1][(2, 1)], 2.0);
        assert_eq!(v[0][(0, 2)], 0.0);
    }

    #[test]
    fn boxes_cover_the_grid() {
        let g: SpaceGrid = RegularSpaceGrid::new(vec![0.0], vec![1.0], vec![5]).unwrap().into();
        let x = DMatrix::from_row_slice(1, 2, &[2.0, 3.0]);
        let full = FinalStepDp::new(&g, 1).values(call, &x);
        let s = GridSplitting::for_grid(&g, &[true], 2).unwrap();
        let mut seen = 0;
        for rank in 0..2 {
            let part = FinalStepDp::new(&g, 1).values_on_box(&s, rank, call, &x).unwrap();
            let points = s.point_indices(&s.local_box(rank));
            for (j, &p) in points.iter().enumerate() {
                assert_eq!(part[0].column(j), full[0].column(p));
            }
            seen += points.len();
        }
        assert_eq!(seen, 6);
    }
}
