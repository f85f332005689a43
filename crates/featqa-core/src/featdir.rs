//! Feat-style analysis directory model.
//!
//! [`FeatDir`] captures one directory's file and subdirectory listings at
//! construction time; the listings are immutable afterwards. [`Analysis`]
//! bundles the directory with everything parsed from it — design spec,
//! and for first-level runs the typed model and design matrix. Each
//! instance owns its state exclusively; nothing is shared across runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::design_matrix::DesignMatrix;
use crate::design_spec::{AnalysisLevel, DesignSpec};
use crate::error::{QaError, Result};
use crate::model::DesignModel;

/// The design specification file every feat directory must carry.
pub const DESIGN_SPEC_FILE: &str = "design.fsf";
/// The numeric design matrix companion, required for first-level runs.
pub const DESIGN_MATRIX_FILE: &str = "design.mat";

pub const STATS_DIR: &str = "stats";
pub const REG_DIR: &str = "reg";
pub const REG_STANDARD_DIR: &str = "reg_standard";

/// File and subdirectory listing of one feat output directory.
#[derive(Debug, Clone)]
pub struct FeatDir {
    root: PathBuf,
    files: BTreeSet<String>,
    subdirs: BTreeSet<String>,
    stats_files: Option<BTreeSet<String>>,
    reg_files: Option<BTreeSet<String>>,
    reg_standard_files: Option<BTreeSet<String>>,
}

impl FeatDir {
    /// Enumerate `root` and its conventional subdirectories.
    ///
    /// # Errors
    ///
    /// `QaError::MissingFile` when `root` is not a directory or does not
    /// contain a `design.fsf` at its top level.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(QaError::MissingFile(root));
        }

        let (files, subdirs) = list_dir(&root)?;
        if !files.contains(DESIGN_SPEC_FILE) {
            return Err(QaError::MissingFile(root.join(DESIGN_SPEC_FILE)));
        }

        let mut listings = [None, None, None];
        for (slot, name) in listings.iter_mut().zip([STATS_DIR, REG_DIR, REG_STANDARD_DIR]) {
            if subdirs.contains(name) {
                *slot = Some(list_dir(&root.join(name))?.0);
            }
        }
        let [stats_files, reg_files, reg_standard_files] = listings;

        Ok(Self {
            root,
            files,
            subdirs,
            stats_files,
            reg_files,
            reg_standard_files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular files at the directory root.
    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Subdirectories at the directory root.
    pub fn subdirs(&self) -> &BTreeSet<String> {
        &self.subdirs
    }

    pub fn has_stats_dir(&self) -> bool {
        self.stats_files.is_some()
    }

    pub fn has_reg_dir(&self) -> bool {
        self.reg_files.is_some()
    }

    pub fn has_reg_standard_dir(&self) -> bool {
        self.reg_standard_files.is_some()
    }

    pub fn stats_files(&self) -> Option<&BTreeSet<String>> {
        self.stats_files.as_ref()
    }

    pub fn reg_files(&self) -> Option<&BTreeSet<String>> {
        self.reg_files.as_ref()
    }

    pub fn reg_standard_files(&self) -> Option<&BTreeSet<String>> {
        self.reg_standard_files.as_ref()
    }

    pub fn design_spec_path(&self) -> PathBuf {
        self.root.join(DESIGN_SPEC_FILE)
    }

    pub fn design_matrix_path(&self) -> PathBuf {
        self.root.join(DESIGN_MATRIX_FILE)
    }
}

fn list_dir(path: &Path) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
    let mut files = BTreeSet::new();
    let mut dirs = BTreeSet::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.insert(name);
        } else {
            files.insert(name);
        }
    }
    Ok((files, dirs))
}

/// One analysis directory plus everything parsed from it.
///
/// Exclusively owns its spec, model, and matrix for the duration of one
/// validation run. All state here is per-instance and freshly allocated.
#[derive(Debug)]
pub struct Analysis {
    pub dir: FeatDir,
    pub spec: DesignSpec,
    pub level: AnalysisLevel,
    /// Present for first-level analyses only; mutated in place by the
    /// stats-file check to attach image summaries.
    pub model: Option<DesignModel>,
    /// Present for first-level analyses only.
    pub matrix: Option<DesignMatrix>,
}

impl Analysis {
    /// Open a feat directory and parse its design artifacts.
    ///
    /// First-level runs additionally require a loadable `design.mat` and a
    /// design spec whose EV/contrast keys back its declared counts; any of
    /// those failing is fatal, since there would be no model to check.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let dir = FeatDir::open(root)?;
        let spec = DesignSpec::load(&dir.design_spec_path())?;
        let level = spec.analysis_level()?;

        let (model, matrix) = match level {
            AnalysisLevel::First => {
                let model = DesignModel::from_spec(&spec)?;
                let matrix = DesignMatrix::load(&dir.design_matrix_path())?;
                (Some(model), Some(matrix))
            }
            AnalysisLevel::Higher => (None, None),
        };

        debug!(root = %dir.root().display(), ?level, "opened analysis directory");
        Ok(Self {
            dir,
            spec,
            level,
            model,
            matrix,
        })
    }
}
