//! Check orchestration and the run report.
//!
//! [`CheckRunner`] invokes every artifact check exactly once against a
//! single analysis directory, in a fixed order chosen for report
//! readability — the checks are mutually independent. Warnings accumulate
//! in execution order and are never removed.

use serde::Serialize;
use tracing::info;

use crate::checks::{self, CheckConfig, CheckId, Warning};
use crate::design_spec::AnalysisLevel;
use crate::featdir::Analysis;
use crate::vif;
use crate::volume::VolumeSource;

/// Outcome of one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
    pub level: AnalysisLevel,
    /// Findings in check execution order; order reflects readability,
    /// not severity.
    pub warnings: Vec<Warning>,
    /// Strictly positive voxel count of the brain mask, when it loaded.
    pub mask_positive_voxels: Option<usize>,
}

impl QaReport {
    /// Whether the run produced no findings.
    pub fn passed(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Warnings produced by one specific check.
    pub fn warnings_for(&self, check: CheckId) -> Vec<&Warning> {
        self.warnings.iter().filter(|w| w.check == check).collect()
    }
}

/// Runs the full check pipeline against one analysis directory.
#[derive(Debug, Default)]
pub struct CheckRunner {
    config: CheckConfig,
}

impl CheckRunner {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Execute every check once, in fixed order: deleted volumes,
    /// preprocessing, prewhitening, collinearity and HRF shape, stats
    /// files, mask, log scan, volume count.
    ///
    /// Checks never abort the run; a recoverable failure inside a check
    /// becomes a warning and the remaining checks still execute.
    /// Collinearity, HRF, and stats checks apply to first-level analyses
    /// only — higher-level runs carry no EV/contrast model.
    pub fn run(&self, analysis: &mut Analysis, volumes: &dyn VolumeSource) -> QaReport {
        let root = analysis.dir.root().to_path_buf();
        let mut warnings = Vec::new();

        warnings.extend(checks::check_deleted_volumes(&analysis.spec));
        warnings.extend(checks::check_preproc_settings(&analysis.spec));
        warnings.extend(checks::check_prewhitening(&analysis.spec));

        if let Some(matrix) = &analysis.matrix {
            match vif::compute_vifs(matrix) {
                Ok(vifs) => warnings.extend(checks::check_collinearity(&vifs, &self.config)),
                Err(e) => warnings.push(Warning::new(
                    CheckId::Collinearity,
                    format!("could not compute VIFs: {e}"),
                )),
            }
        }
        if let Some(model) = &mut analysis.model {
            warnings.extend(checks::check_hrf_convolution(
                &analysis.spec,
                model,
                &self.config,
            ));
            warnings.extend(checks::check_stats_files(&root, model, volumes));
        }

        let (mask_positive_voxels, mask_warnings) = checks::check_mask(&root, volumes);
        warnings.extend(mask_warnings);
        warnings.extend(checks::check_log_scan(&root));
        warnings.extend(checks::check_volume_count(&root, &analysis.spec, volumes));

        info!(
            root = %root.display(),
            warnings = warnings.len(),
            "validation run complete"
        );

        QaReport {
            level: analysis.level,
            warnings,
            mask_positive_voxels,
        }
    }
}
