//! In-memory fakes for the volume loader seam (testing only).
//!
//! Provides `MemoryVolumeSource`, which satisfies the [`VolumeSource`]
//! contract without touching the filesystem or any image decoder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::volume::{Volume, VolumeError, VolumeSource};

/// In-memory volume store keyed by full path.
///
/// Paths not inserted report [`VolumeError::Missing`], matching how a
/// filesystem-backed source treats an absent file.
#[derive(Debug, Default)]
pub struct MemoryVolumeSource {
    volumes: HashMap<PathBuf, Volume>,
}

impl MemoryVolumeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a volume under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, volume: Volume) {
        self.volumes.insert(path.into(), volume);
    }
}

impl VolumeSource for MemoryVolumeSource {
    fn load(&self, path: &Path) -> Result<Volume, VolumeError> {
        self.volumes
            .get(path)
            .cloned()
            .ok_or_else(|| VolumeError::Missing(path.to_path_buf()))
    }
}

/// Constant-valued volume of the given shape, for test fixtures.
pub fn constant_volume(dims: &[usize], value: f64) -> Volume {
    let len = dims.iter().product();
    Volume::new(dims.to_vec(), vec![value; len]).expect("constant volume dims are consistent")
}
