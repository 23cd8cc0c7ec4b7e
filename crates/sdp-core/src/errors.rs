//! Error types for stochdp.
//!
//! A single `thiserror`-derived enum covers every crate of the workspace.
//! Fatal conditions (schema mismatch, broken sparse grid, communication
//! failure) are distinct variants so that drivers can report the step and the
//! archive key involved. Recoverable conditions (extrapolation, empty
//! regression cells) never surface here.
//!
//! Preconditions use the `ensure!` macro, postconditions `ensure_post!`, and
//! unconditional failures `fail!`.

use thiserror::Error;

/// The top-level error type used throughout stochdp.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated.
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),

    /// Index out of range.
    #[error("index ({index}) out of range [0, {size})")]
    IndexOutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The size of the container.
        size: usize,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A stored record does not carry the type tag or version the reader expects.
    #[error("schema mismatch for record ({key}, {step}): expected {expected}, found {found}")]
    SchemaMismatch {
        /// Archive name of the record.
        key: String,
        /// Time-step index of the record.
        step: u64,
        /// `tag@version` expected by the reader.
        expected: String,
        /// `tag@version` stored in the archive.
        found: String,
    },

    /// No record stored under the requested key.
    #[error("no record ({key}, {step}) in archive")]
    RecordNotFound {
        /// Archive name.
        key: String,
        /// Time-step index.
        step: u64,
    },

    /// A record was already written under this key.
    #[error("record ({key}, {step}) already written")]
    DuplicateRecord {
        /// Archive name.
        key: String,
        /// Time-step index.
        step: u64,
    },

    /// A sparse grid misses a hierarchical ancestor.
    #[error("inconsistent sparse grid: {0}")]
    GridInconsistency(String),

    /// A grid snapshot carries a tag outside the known set.
    #[error("unknown grid tag {0}")]
    UnknownGridTag(u8),

    /// Point-to-point or collective communication failed.
    #[error("communication failure: {0}")]
    Communication(String),

    /// Optimization failed at one grid point and the policy asked to abort.
    #[error("optimization failed at step {step}, point {point}: {reason}")]
    PointOptimization {
        /// Time-step index.
        step: usize,
        /// Linear index of the grid point.
        point: usize,
        /// Optimizer diagnostic.
        reason: String,
    },

    /// Encoding or decoding of a payload failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Underlying I/O error.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Shorthand `Result` type used throughout stochdp.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use sdp_core::{ensure, errors::Error};
/// fn positive(x: f64) -> sdp_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use sdp_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> sdp_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use sdp_core::{fail, errors::Error};
/// fn always_err() -> sdp_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_names_both_tags() {
        let e = Error::SchemaMismatch {
            key: "Continuation".into(),
            step: 3,
            expected: "RegressionStep@1".into(),
            found: "TreeStep@1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("RegressionStep@1"));
        assert!(msg.contains("TreeStep@1"));
        assert!(msg.contains("Continuation"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
