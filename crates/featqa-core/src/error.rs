//! Error taxonomy for featqa-core.
//!
//! Only fatal construction errors live here — the failures that make the
//! whole validation run meaningless (no directory, no design spec, a spec
//! whose declared counts are not backed by actual keys). Recoverable
//! per-check failures are modeled separately: volume loads return
//! [`crate::volume::VolumeError`] and checks convert those into warnings.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that abort validation before any checks run.
#[derive(Debug, Error)]
pub enum QaError {
    /// A required file or directory is absent.
    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    /// The design specification is missing or mistypes a key that its
    /// declared parameters require.
    #[error("malformed design spec: {0}")]
    MalformedSpec(String),

    /// The design matrix file does not match its declared dimensions.
    #[error("malformed design matrix: {0}")]
    MalformedMatrix(String),

    /// VIF analysis needs at least two regressor columns.
    #[error("design matrix has {0} column(s); VIF analysis requires at least 2")]
    TooFewColumns(usize),

    /// Filesystem error while enumerating or reading directory contents.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for featqa-core operations.
pub type Result<T> = std::result::Result<T, QaError>;
