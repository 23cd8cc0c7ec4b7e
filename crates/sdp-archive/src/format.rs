//! On-disk layout.

use sdp_core::errors::{Error, Result};

/// File magic.
pub const MAGIC: &[u8; 8] = b"SDPARCH\0";

/// File format version.
pub const FORMAT_VERSION: u16 = 1;

/// Type tag and schema version of an archived payload.
pub trait Versioned {
    /// Stable type name.
    const TAG: &'static str;
    /// Schema version, bumped whenever the encoded layout changes.
    const VERSION: u32;

    /// `TAG@VERSION`, as shown in schema mismatch errors.
    fn schema() -> String {
        format!("{}@{}", Self::TAG, Self::VERSION)
    }
}

/// Header of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Record name.
    pub name: String,
    /// Time-step index.
    pub step: u64,
    /// Payload type tag.
    pub tag: String,
    /// Payload schema version.
    pub version: u32,
}

impl FrameHeader {
    /// Encoded frame: header fields then the payload.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.name.len() + self.tag.len() + payload.len());
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.step.to_le_bytes());
        out.extend_from_slice(&(self.tag.len() as u16).to_le_bytes());
        out.extend_from_slice(self.tag.as_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }
}

/// Cursor over an archive image.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let s = &self.data[self.pos..end];
                self.pos = end;
                Ok(s)
            }
            None => Err(Error::Codec(format!(
                "truncated archive: {n} bytes wanted at offset {}",
                self.pos
            ))),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.take(N)?);
        Ok(a)
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn string(&mut self, n: usize) -> Result<String> {
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec()).map_err(|e| Error::Codec(e.to_string()))
    }

    /// Next frame header and the `(offset, length)` of its payload.
    pub(crate) fn frame(&mut self) -> Result<(FrameHeader, usize, usize)> {
        let name_len = self.u32()? as usize;
        let name = self.string(name_len)?;
        let step = self.u64()?;
        let tag_len = self.u16()? as usize;
        let tag = self.string(tag_len)?;
        let version = self.u32()?;
        let len = usize::try_from(self.u64()?)
            .map_err(|_| Error::Codec("payload length overflows".into()))?;
        let offset = self.position();
        self.take(len)?;
        Ok((
            FrameHeader {
                name,
                step,
                tag,
                version,
            },
            offset,
            len,
        ))
    }
}
