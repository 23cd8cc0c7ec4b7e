//! Backward and forward passes on a trinomial tree.

mod common;

use approx::assert_relative_eq;

use sdp_archive::ArchiveReader;
use sdp_core::{ProcessConfig, Real};
use sdp_grids::{RegularSpaceGrid, SpaceGrid};
use sdp_methods::dp::{StepRecord, TreeShape};
use sdp_methods::{
    dynamic_programming_by_tree, simulate_tree, simulate_tree_control, ExecutionContext,
    TrinomialTreeSimulator, CONTINUATION,
};

use common::{temp_path, Storage};

const SHIFT: Real = 10.0;
const RATE: Real = 0.02;

fn storage_grid() -> SpaceGrid {
    RegularSpaceGrid::new(vec![0.0], vec![10.0], vec![10]).unwrap().into()
}

fn tree(forward: bool) -> TrinomialTreeSimulator {
    TrinomialTreeSimulator::new(1.0, 0.3, RATE, 1.0, 10, 5000, forward, 11).unwrap()
}

fn payoff(_: usize, stock: &[Real], x: &[Real]) -> Real {
    stock[0] * (SHIFT + x[0])
}

#[test]
fn frozen_storage_on_a_symmetric_tree() {
    let config = ProcessConfig::default();
    let ctx = ExecutionContext::serial(&config);
    let path = temp_path("tree-frozen");
    let storage = Storage::frozen(1).with_shift(SHIFT);
    let value =
        dynamic_programming_by_tree(&storage_grid(), &storage, payoff, &[50.0], 0, &mut tree(false), &path, ctx)
            .unwrap();
    // the centered process has zero mean at every date
    let expected = 50.0 * SHIFT * (-RATE).exp();
    assert_relative_eq!(value, expected, max_relative = 1e-9);

    let replayed = simulate_tree_control(&storage, payoff, &[50.0], 0, &mut tree(true), &path, ctx).unwrap();
    assert_relative_eq!(replayed, expected, max_relative = 0.01);

    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.steps(CONTINUATION).len(), 10);
    let root: StepRecord<TreeShape> = reader.read(CONTINUATION, 9).unwrap();
    assert_eq!(root.operator.nb_nodes, 1);
    assert_eq!(root.continuation[0].shape(), (1, 11));
}

#[test]
fn trading_adds_value_on_a_tree() {
    let config = ProcessConfig::default();
    let ctx = ExecutionContext::serial(&config);
    let grid = storage_grid();
    let frozen = dynamic_programming_by_tree(
        &grid,
        &Storage::frozen(1).with_shift(SHIFT),
        payoff,
        &[50.0],
        0,
        &mut tree(false),
        temp_path("tree-hold"),
        ctx,
    )
    .unwrap();

    let path = temp_path("tree-trade");
    let storage = Storage::new(10.0, 10.0).with_shift(SHIFT);
    let backward =
        dynamic_programming_by_tree(&grid, &storage, payoff, &[50.0], 0, &mut tree(false), &path, ctx).unwrap();
    assert!(backward >= frozen - 1e-9, "{backward} < {frozen}");

    let optimal = simulate_tree(&storage, payoff, &[50.0], 0, &mut tree(true), &path, ctx).unwrap();
    let stored = simulate_tree_control(&storage, payoff, &[50.0], 0, &mut tree(true), &path, ctx).unwrap();
    assert_relative_eq!(optimal, backward, max_relative = 0.03);
    assert_relative_eq!(stored, backward, max_relative = 0.03);
}
