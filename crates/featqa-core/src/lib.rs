//! FeatQA core library
//!
//! Validates the outputs of a completed feat-style fMRI analysis against
//! the parameters recorded in its design specification file, flagging
//! inconsistencies an analyst should review before trusting results.
//!
//! The pipeline: open an [`Analysis`] (directory listing, design spec,
//! and — for first-level runs — the typed EV/contrast model and numeric
//! design matrix), then hand it to a [`CheckRunner`] together with a
//! [`VolumeSource`] that can decode statistic images. The runner executes
//! every artifact check once and returns a [`QaReport`] whose ordered
//! warning list is the tool's observable output.
//!
//! Fatal construction errors ([`QaError`]) abort before any checks run;
//! everything a check cannot read becomes one warning and the remaining
//! checks proceed.

pub mod checks;
pub mod design_matrix;
pub mod design_spec;
pub mod error;
pub mod fakes;
pub mod featdir;
pub mod model;
pub mod runner;
pub mod vif;
pub mod volume;

pub use checks::{CheckConfig, CheckId, Warning};
pub use design_matrix::DesignMatrix;
pub use design_spec::{AnalysisLevel, DesignSpec, FsfValue};
pub use error::{QaError, Result};
pub use featdir::{Analysis, FeatDir};
pub use model::{Contrast, DesignModel, Ev, ImageSummary};
pub use runner::{CheckRunner, QaReport};
pub use vif::{compute_vifs, VifScore, VifValue};
pub use volume::{Volume, VolumeError, VolumeSource};

/// FeatQA version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
