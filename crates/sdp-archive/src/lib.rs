//! # sdp-archive
//!
//! Append-only checkpoint archive keyed by `(name, step)`.
//!
//! A file starts with a magic header and a format version, followed by one
//! frame per record:
//!
//! ```text
//! u32 name length | name | u64 step | u16 tag length | tag | u32 version | u64 payload length | payload
//! ```
//!
//! integers little-endian, payloads bincode-encoded. Records are written once
//! and never modified; a reader scans the frames once and then serves any
//! record by key. Each payload type declares a tag and a version through
//! [`Versioned`]; reading a record with another tag or version fails with
//! `Error::SchemaMismatch`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Frame layout and the `Versioned` trait.
pub mod format;

/// Archive writer.
pub mod writer;

/// Archive reader.
pub mod reader;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use format::Versioned;
pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;
