//! Writing, reopening and reading archives.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use sdp_archive::{ArchiveReader, ArchiveWriter, Versioned};
use sdp_core::errors::Error;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_path(stem: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("sdp-archive-{stem}-{}-{n}", std::process::id()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Values {
    bounds: Vec<[f64; 2]>,
    values: DMatrix<f64>,
}

impl Versioned for Values {
    const TAG: &'static str = "Values";
    const VERSION: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ValuesV2 {
    values: DMatrix<f64>,
}

impl Versioned for ValuesV2 {
    const TAG: &'static str = "Values";
    const VERSION: u32 = 2;
}

fn sample(scale: f64) -> Values {
    Values {
        bounds: vec![[0.0, 100.0]],
        values: DMatrix::from_fn(3, 4, |i, j| scale * (i as f64 + 0.1 * j as f64)),
    }
}

#[test]
fn bit_for_bit_round_trip() {
    let path = temp_path("round-trip");
    let mut w = ArchiveWriter::create(&path).unwrap();
    for step in 0..5 {
        w.write("Continuation", step, &sample(step as f64 + 0.5)).unwrap();
    }
    w.finish().unwrap();

    let r = ArchiveReader::open(&path).unwrap();
    assert_eq!(r.len(), 5);
    assert_eq!(r.steps("Continuation"), vec![0, 1, 2, 3, 4]);
    let back: Values = r.read("Continuation", 3).unwrap();
    let original = sample(3.5);
    assert_eq!(back.bounds, original.bounds);
    for (a, b) in back.values.iter().zip(original.values.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn schema_mismatch_is_fatal() {
    let path = temp_path("schema");
    let mut w = ArchiveWriter::create(&path).unwrap();
    w.write("Continuation", 3, &sample(1.0)).unwrap();
    w.finish().unwrap();

    let r = ArchiveReader::open(&path).unwrap();
    match r.read::<ValuesV2>("Continuation", 3) {
        Err(Error::SchemaMismatch {
            key,
            step,
            expected,
            found,
        }) => {
            assert_eq!(key, "Continuation");
            assert_eq!(step, 3);
            assert_eq!(expected, "Values@2");
            assert_eq!(found, "Values@1");
        }
        other => panic!("expected a schema mismatch, got {other:?}"),
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn duplicates_and_missing_records() {
    let path = temp_path("duplicates");
    let mut w = ArchiveWriter::create(&path).unwrap();
    w.write("Continuation", 0, &sample(1.0)).unwrap();
    assert!(matches!(
        w.write("Continuation", 0, &sample(2.0)),
        Err(Error::DuplicateRecord { .. })
    ));
    w.write("Other", 0, &sample(2.0)).unwrap();
    w.finish().unwrap();

    let r = ArchiveReader::open(&path).unwrap();
    assert!(r.contains("Other", 0));
    assert!(matches!(
        r.read::<Values>("Continuation", 7),
        Err(Error::RecordNotFound { step: 7, .. })
    ));
    std::fs::remove_file(&path).ok();
}

#[test]
fn write_order_is_kept() {
    let path = temp_path("order");
    let mut w = ArchiveWriter::create(&path).unwrap();
    assert!(w.snapshot_changed("Continuation", &[1, 2]));
    assert!(w.snapshot_changed("Continuation", &[1, 2]));
    w.commit_snapshot("Continuation", vec![1, 2]);
    assert!(!w.snapshot_changed("Continuation", &[1, 2]));
    assert!(w.snapshot_changed("Continuation", &[3]));
    assert!(w.snapshot_changed("Other", &[1, 2]));
    for step in [4, 2, 9] {
        w.write("Continuation", step, &sample(1.0)).unwrap();
    }
    w.finish().unwrap();
    let r = ArchiveReader::open(&path).unwrap();
    assert_eq!(r.written_before("Continuation", 9).unwrap(), vec![2, 4]);
    assert!(r.written_before("Continuation", 4).unwrap().is_empty());
    std::fs::remove_file(&path).ok();
}

#[test]
fn rejects_foreign_files() {
    let path = temp_path("foreign");
    std::fs::write(&path, b"definitely not an archive").unwrap();
    assert!(ArchiveReader::open(&path).is_err());
    std::fs::remove_file(&path).ok();
}
