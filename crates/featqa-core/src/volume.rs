//! Numeric volume values and the loader seam.
//!
//! Image decoding is backend-agnostic: the core consumes an opaque
//! [`VolumeSource`] that yields n-dimensional numeric arrays (3-D for
//! masks and stat maps, 4-D for functional time series). An in-memory
//! fake is provided for testing via the `fakes` module; a NIfTI-backed
//! implementation lives in the CLI crate.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Recoverable volume-load failures.
///
/// Checks map these to warnings explicitly; they never abort a run.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The volume file does not exist.
    #[error("volume not found: {0}")]
    Missing(PathBuf),

    /// The file exists but could not be decoded.
    #[error("volume {path} could not be read: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// Declared dimensions disagree with the amount of data.
    #[error("volume dimensions {dims:?} do not match {len} data value(s)")]
    ShapeMismatch { dims: Vec<usize>, len: usize },
}

/// A loaded n-dimensional numeric volume.
///
/// Dimensions and data are immutable after construction; the data layout
/// is opaque (summaries computed here do not depend on axis order).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl Volume {
    /// Build a volume, validating that `dims` accounts for every data value.
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Result<Self, VolumeError> {
        let expected: usize = dims.iter().product();
        if dims.is_empty() || expected != data.len() {
            return Err(VolumeError::ShapeMismatch {
                dims,
                len: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Extent of each dimension.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Fourth-dimension extent for 4-D time series; `None` for 3-D volumes.
    pub fn timepoints(&self) -> Option<usize> {
        if self.dims.len() >= 4 {
            Some(self.dims[3])
        } else {
            None
        }
    }

    /// Minimum and maximum value, or `None` for an empty volume.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let first = *self.data.first()?;
        Some(self.data.iter().skip(1).fold((first, first), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        }))
    }

    /// Count of strictly positive values (in-mask voxels for a brain mask).
    pub fn positive_voxels(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0.0).count()
    }
}

/// Opaque volume decoder seam.
///
/// Implementations load the file at `path` and return its numeric contents,
/// or a typed failure reason the caller converts into a warning.
pub trait VolumeSource {
    fn load(&self, path: &Path) -> Result<Volume, VolumeError>;
}
