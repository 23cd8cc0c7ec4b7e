//! Archive reader.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;

use sdp_core::errors::{Error, Result};

use crate::format::{Cursor, Versioned, FORMAT_VERSION, MAGIC};

#[derive(Debug, Clone)]
struct Entry {
    tag: String,
    version: u32,
    offset: usize,
    len: usize,
    /// Position of the frame in write order.
    sequence: usize,
}

/// Random-access reader over a complete archive image.
#[derive(Debug)]
pub struct ArchiveReader {
    path: PathBuf,
    data: Vec<u8>,
    index: HashMap<(String, u64), Entry>,
}

impl ArchiveReader {
    /// Load the archive at `path` and index its frames.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)?;
        let index = Self::scan(&data)?;
        debug!("archive {} opened, {} records", path.display(), index.len());
        Ok(Self { path, data, index })
    }

    fn scan(data: &[u8]) -> Result<HashMap<(String, u64), Entry>> {
        let mut cursor = Cursor::new(data, 0);
        if cursor.take(MAGIC.len())? != MAGIC {
            return Err(Error::Codec("not a stochdp archive".into()));
        }
        let version = cursor.u16()?;
        if version != FORMAT_VERSION {
            return Err(Error::Codec(format!(
                "archive format {version}, expected {FORMAT_VERSION}"
            )));
        }
        let mut index = HashMap::new();
        let mut sequence = 0;
        while !cursor.at_end() {
            let (header, offset, len) = cursor.frame()?;
            let key = (header.name, header.step);
            if index.contains_key(&key) {
                return Err(Error::DuplicateRecord {
                    key: key.0,
                    step: key.1,
                });
            }
            index.insert(
                key,
                Entry {
                    tag: header.tag,
                    version: header.version,
                    offset,
                    len,
                    sequence,
                },
            );
            sequence += 1;
        }
        Ok(index)
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the archive holds no record.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `(name, step)` exists.
    pub fn contains(&self, name: &str, step: u64) -> bool {
        self.index.contains_key(&(name.to_string(), step))
    }

    /// Steps stored under `name`, increasing.
    pub fn steps(&self, name: &str) -> Vec<u64> {
        let mut s: Vec<u64> = self
            .index
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, step)| *step)
            .collect();
        s.sort_unstable();
        s
    }

    /// Steps of the records named `name` written before `(name, step)`, most
    /// recent first.
    pub fn written_before(&self, name: &str, step: u64) -> Result<Vec<u64>> {
        let pivot = self.entry(name, step)?.sequence;
        let mut before: Vec<(usize, u64)> = self
            .index
            .iter()
            .filter(|((n, _), e)| n == name && e.sequence < pivot)
            .map(|((_, s), e)| (e.sequence, *s))
            .collect();
        before.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Ok(before.into_iter().map(|(_, s)| s).collect())
    }

    /// `(tag, version)` of a record.
    pub fn schema_of(&self, name: &str, step: u64) -> Result<(String, u32)> {
        let e = self.entry(name, step)?;
        Ok((e.tag.clone(), e.version))
    }

    fn entry(&self, name: &str, step: u64) -> Result<&Entry> {
        self.index
            .get(&(name.to_string(), step))
            .ok_or_else(|| Error::RecordNotFound {
                key: name.to_string(),
                step,
            })
    }

    /// Decode a record, checking its tag and version first.
    pub fn read<T: Versioned + DeserializeOwned>(&self, name: &str, step: u64) -> Result<T> {
        let e = self.entry(name, step)?;
        if e.tag != T::TAG || e.version != T::VERSION {
            return Err(Error::SchemaMismatch {
                key: name.to_string(),
                step,
                expected: T::schema(),
                found: format!("{}@{}", e.tag, e.version),
            });
        }
        bincode::deserialize(&self.data[e.offset..e.offset + e.len])
            .map_err(|err| Error::Codec(format!("record ({name}, {step}): {err}")))
    }
}
