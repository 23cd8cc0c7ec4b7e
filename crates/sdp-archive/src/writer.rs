//! Archive writer.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use sdp_core::errors::{Error, Result};

use crate::format::{FrameHeader, Versioned, FORMAT_VERSION, MAGIC};

/// Append-only writer. Every `(name, step)` key can be written once.
#[derive(Debug)]
pub struct ArchiveWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: HashSet<(String, u64)>,
    last_snapshot: HashMap<String, Vec<u8>>,
}

impl ArchiveWriter {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(MAGIC)?;
        out.write_all(&FORMAT_VERSION.to_le_bytes())?;
        debug!("archive {} created", path.display());
        Ok(Self {
            path,
            out,
            written: HashSet::new(),
            last_snapshot: HashMap::new(),
        })
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `(name, step)` was already written.
    pub fn contains(&self, name: &str, step: u64) -> bool {
        self.written.contains(&(name.to_string(), step))
    }

    /// Append one record.
    pub fn write<T: Versioned + Serialize>(&mut self, name: &str, step: u64, value: &T) -> Result<()> {
        let key = (name.to_string(), step);
        if self.written.contains(&key) {
            return Err(Error::DuplicateRecord {
                key: name.to_string(),
                step,
            });
        }
        let payload = bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))?;
        let header = FrameHeader {
            name: name.to_string(),
            step,
            tag: T::TAG.to_string(),
            version: T::VERSION,
        };
        self.out.write_all(&header.encode(&payload))?;
        self.written.insert(key);
        debug!(
            "archive {}: wrote ({name}, {step}) as {}, {} bytes",
            self.path.display(),
            T::schema(),
            payload.len()
        );
        Ok(())
    }

    /// Whether `snapshot` differs from the last grid committed for records
    /// named `name`. Records whose grid did not change omit it.
    pub fn snapshot_changed(&self, name: &str, snapshot: &[u8]) -> bool {
        self.last_snapshot
            .get(name)
            .map_or(true, |prev| prev.as_slice() != snapshot)
    }

    /// Remember `snapshot` as the last grid of `name`. Call it once the
    /// record carrying the snapshot is written.
    pub fn commit_snapshot(&mut self, name: &str, snapshot: Vec<u8>) {
        self.last_snapshot.insert(name.to_string(), snapshot);
    }

    /// Flush buffered frames to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and close.
    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }
}
