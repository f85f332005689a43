//! Independent artifact checks.
//!
//! Each check compares one concern — spec flags, design collinearity, HRF
//! codes, statistic images, the brain mask, the run log, volume counts —
//! against the parsed model and directory contents, and yields zero or
//! more warnings. Checks never abort: a resource a check cannot read
//! becomes exactly one warning and the remaining checks still run.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::design_spec::{keys, DesignSpec};
use crate::model::{DesignModel, ImageSummary};
use crate::vif::{VifScore, VifValue};
use crate::volume::VolumeSource;

/// Brain mask image at the directory root.
pub const MASK_FILE: &str = "mask.nii.gz";
/// Preprocessed 4-D functional data at the directory root.
pub const FUNC_FILE: &str = "filtered_func_data.nii.gz";
/// Main run log at the directory root.
pub const LOG_FILE: &str = "report_log.html";

/// Case-insensitive substrings that flag a log line.
pub const LOG_PATTERNS: &[&str] = &["error", "warning", "exception"];

fn pe_file(n: usize) -> String {
    format!("stats/pe{n}.nii.gz")
}

fn zstat_file(c: usize) -> String {
    format!("stats/zstat{c}.nii.gz")
}

// ---------------------------------------------------------------------------
// Warning model
// ---------------------------------------------------------------------------

/// Identifies which check produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    DeletedVolumes,
    PreprocSettings,
    Prewhitening,
    Collinearity,
    HrfConvolution,
    StatsFiles,
    Mask,
    LogScan,
    VolumeCount,
}

impl CheckId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckId::DeletedVolumes => "deleted_volumes",
            CheckId::PreprocSettings => "preproc_settings",
            CheckId::Prewhitening => "prewhitening",
            CheckId::Collinearity => "collinearity",
            CheckId::HrfConvolution => "hrf_convolution",
            CheckId::StatsFiles => "stats_files",
            CheckId::Mask => "mask",
            CheckId::LogScan => "log_scan",
            CheckId::VolumeCount => "volume_count",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One human-readable finding. Never removed or edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub check: CheckId,
    pub message: String,
}

impl Warning {
    pub fn new(check: CheckId, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.check, self.message)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable thresholds and domain conventions consumed by the checks.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// VIF above this counts as excessive collinearity.
    pub vif_threshold: f64,
    /// EV titles matching this pattern are treated as motion-parameter
    /// regressors, which must stay unconvolved.
    pub motion_ev_pattern: Regex,
    /// Convolution code expected on motion-parameter EVs.
    pub hrf_none_code: i64,
    /// Convolution code expected on all other EVs.
    pub hrf_double_gamma_code: i64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            vif_threshold: 5.0,
            motion_ev_pattern: Regex::new(r"(?i)(motion|motpar|_mcf|trans_|rot_|^mp[_0-9])")
                .expect("default motion pattern is valid"),
            hrf_none_code: 0,
            hrf_double_gamma_code: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Deleted volumes: nonzero `fmri(ndelete)` trims data from the start, but
/// manually supplied motion-parameter series that are too long get trimmed
/// from the end — a silent misalignment.
pub fn check_deleted_volumes(spec: &DesignSpec) -> Vec<Warning> {
    match spec.require_int(keys::NDELETE) {
        Ok(n) if n > 0 => vec![Warning::new(
            CheckId::DeletedVolumes,
            format!("{n} volume(s) deleted; if motion parameters were added manually, verify their length"),
        )],
        Ok(_) => Vec::new(),
        Err(e) => vec![Warning::new(
            CheckId::DeletedVolumes,
            format!("could not read deleted-volume count: {e}"),
        )],
    }
}

/// Preprocessing consistency: an input file named `*_mcf*` or `*_brain*`
/// was already motion corrected / brain extracted, so having the matching
/// preprocessing step still enabled applies it twice.
pub fn check_preproc_settings(spec: &DesignSpec) -> Vec<Warning> {
    let input = match spec.require_str(keys::INPUT_FILE) {
        Ok(v) => v,
        Err(e) => {
            return vec![Warning::new(
                CheckId::PreprocSettings,
                format!("could not read primary input path: {e}"),
            )]
        }
    };
    let base = Path::new(&input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.clone());

    let mut warnings = Vec::new();
    for (marker, flag_key, step) in [
        ("_mcf", keys::MOTION_CORRECTION, "motion correction"),
        ("_brain", keys::BRAIN_EXTRACTION, "brain extraction"),
    ] {
        if !base.contains(marker) {
            continue;
        }
        match spec.require_flag(flag_key) {
            Ok(true) => warnings.push(Warning::new(
                CheckId::PreprocSettings,
                format!("input {base} already carries {marker} but {step} is still enabled"),
            )),
            Ok(false) => {}
            Err(e) => warnings.push(Warning::new(
                CheckId::PreprocSettings,
                format!("could not read {step} flag: {e}"),
            )),
        }
    }
    warnings
}

/// Prewhitening should be enabled for valid first-level statistics.
pub fn check_prewhitening(spec: &DesignSpec) -> Vec<Warning> {
    match spec.require_flag(keys::PREWHITEN) {
        Ok(false) => vec![Warning::new(
            CheckId::Prewhitening,
            "prewhitening is disabled",
        )],
        Ok(true) => Vec::new(),
        Err(e) => vec![Warning::new(
            CheckId::Prewhitening,
            format!("could not read prewhitening flag: {e}"),
        )],
    }
}

/// Flag every design column whose VIF exceeds the configured threshold.
pub fn check_collinearity(vifs: &[VifScore], config: &CheckConfig) -> Vec<Warning> {
    vifs.iter()
        .filter(|score| score.value.is_excessive(config.vif_threshold))
        .map(|score| {
            let detail = match score.value {
                VifValue::Finite(v) => {
                    format!("VIF {v:.2} exceeds threshold {:.2}", config.vif_threshold)
                }
                VifValue::Unbounded => {
                    "column is an exact linear combination of the others".to_string()
                }
                VifValue::ZeroVariance => "column has zero variance (degenerate design)".to_string(),
            };
            Warning::new(
                CheckId::Collinearity,
                format!("design column {}: {detail}", score.column),
            )
        })
        .collect()
}

/// HRF convolution shape: motion-parameter EVs must stay unconvolved and
/// every other EV should use the double-gamma HRF. Also cross-checks the
/// raw title and convolution key families, whose counts diverge when the
/// spec was edited or produced by a mismatched tool version.
pub fn check_hrf_convolution(
    spec: &DesignSpec,
    model: &DesignModel,
    config: &CheckConfig,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let title_keys = spec.count_ordinal_keys(keys::EV_TITLE_PREFIX);
    let convolution_keys = spec.count_ordinal_keys(keys::EV_CONVOLUTION_PREFIX);
    if title_keys != convolution_keys {
        warnings.push(Warning::new(
            CheckId::HrfConvolution,
            format!(
                "spec has {title_keys} EV title key(s) but {convolution_keys} convolution key(s)"
            ),
        ));
    }

    for ev in &model.evs {
        let is_motion = config.motion_ev_pattern.is_match(&ev.title);
        let expected = if is_motion {
            config.hrf_none_code
        } else {
            config.hrf_double_gamma_code
        };
        if ev.convolution != expected {
            let kind = if is_motion { "motion-parameter" } else { "task" };
            warnings.push(Warning::new(
                CheckId::HrfConvolution,
                format!(
                    "EV {} ({}) is a {kind} regressor with convolution code {}, expected {expected}",
                    ev.index, ev.title, ev.convolution
                ),
            ));
        }
    }
    warnings
}

/// Statistic image presence: every EV's parameter-estimate image and every
/// contrast's z-statistic image must load. Successful loads attach the
/// image min/max to the model record for later inspection; only failures
/// warn.
pub fn check_stats_files(
    root: &Path,
    model: &mut DesignModel,
    volumes: &dyn VolumeSource,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for ev in &mut model.evs {
        let rel = pe_file(ev.index);
        match volumes.load(&root.join(&rel)) {
            Ok(vol) => {
                ev.pe_present = Some(true);
                ev.pe_summary = vol.min_max().map(|(min, max)| ImageSummary { min, max });
            }
            Err(e) => {
                ev.pe_present = Some(false);
                warnings.push(Warning::new(CheckId::StatsFiles, format!("{rel}: {e}")));
            }
        }
    }

    for contrast in &mut model.contrasts {
        let rel = zstat_file(contrast.index);
        match volumes.load(&root.join(&rel)) {
            Ok(vol) => {
                contrast.zstat_present = Some(true);
                contrast.zstat_summary =
                    vol.min_max().map(|(min, max)| ImageSummary { min, max });
            }
            Err(e) => {
                contrast.zstat_present = Some(false);
                warnings.push(Warning::new(CheckId::StatsFiles, format!("{rel}: {e}")));
            }
        }
    }
    warnings
}

/// Mask sanity: the mask must load, and a mask with zero strictly positive
/// voxels covers no brain at all. Returns the positive-voxel count for the
/// report alongside any warnings.
pub fn check_mask(root: &Path, volumes: &dyn VolumeSource) -> (Option<usize>, Vec<Warning>) {
    match volumes.load(&root.join(MASK_FILE)) {
        Ok(vol) => {
            let count = vol.positive_voxels();
            let warnings = if count == 0 {
                vec![Warning::new(
                    CheckId::Mask,
                    format!("{MASK_FILE} contains no positive voxels"),
                )]
            } else {
                Vec::new()
            };
            (Some(count), warnings)
        }
        Err(e) => (
            None,
            vec![Warning::new(CheckId::Mask, format!("{MASK_FILE}: {e}"))],
        ),
    }
}

/// Log scan: surface every log line that mentions an error, warning, or
/// exception (case-insensitive substring match), one warning per line.
pub fn check_log_scan(root: &Path) -> Vec<Warning> {
    let path = root.join(LOG_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            return vec![Warning::new(
                CheckId::LogScan,
                format!("could not read {LOG_FILE}: {e}"),
            )]
        }
    };

    let mut warnings = Vec::new();
    for line in text.lines() {
        let lowered = line.to_lowercase();
        if LOG_PATTERNS.iter().any(|p| lowered.contains(p)) {
            warnings.push(Warning::new(
                CheckId::LogScan,
                format!("{LOG_FILE}: {}", line.trim()),
            ));
        }
    }
    warnings
}

/// Volume count: the functional data's fourth-dimension extent must match
/// the `fmri(npts)` the design was built for.
pub fn check_volume_count(
    root: &Path,
    spec: &DesignSpec,
    volumes: &dyn VolumeSource,
) -> Vec<Warning> {
    let expected = match spec.require_int(keys::NPTS) {
        Ok(v) => v,
        Err(e) => {
            return vec![Warning::new(
                CheckId::VolumeCount,
                format!("could not read expected volume count: {e}"),
            )]
        }
    };

    match volumes.load(&root.join(FUNC_FILE)) {
        Ok(vol) => match vol.timepoints() {
            Some(actual) if actual as i64 == expected => Vec::new(),
            Some(actual) => vec![Warning::new(
                CheckId::VolumeCount,
                format!("{FUNC_FILE} has {actual} volume(s) but the design spec expects {expected}"),
            )],
            None => vec![Warning::new(
                CheckId::VolumeCount,
                format!("{FUNC_FILE} is {}-D, expected a 4-D time series", vol.ndim()),
            )],
        },
        Err(e) => vec![Warning::new(
            CheckId::VolumeCount,
            format!("{FUNC_FILE}: {e}"),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{constant_volume, MemoryVolumeSource};
    use crate::model::DesignModel;
    use crate::volume::Volume;
    use std::fs;

    fn spec(text: &str) -> DesignSpec {
        DesignSpec::parse(text)
    }

    fn config() -> CheckConfig {
        CheckConfig::default()
    }

    #[test]
    fn test_deleted_volumes() {
        assert!(check_deleted_volumes(&spec("set fmri(ndelete) 0\n")).is_empty());

        let warnings = check_deleted_volumes(&spec("set fmri(ndelete) 3\n"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, CheckId::DeletedVolumes);
        assert!(warnings[0].message.contains("3 volume(s)"));
    }

    #[test]
    fn test_deleted_volumes_missing_key_warns() {
        let warnings = check_deleted_volumes(&spec(""));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("fmri(ndelete)"));
    }

    #[test]
    fn test_preproc_double_motion_correction() {
        let s = spec(
            "set feat_files(1) \"/data/sub01/bold_mcf.nii.gz\"\nset fmri(mc) 1\nset fmri(bet_yn) 0\n",
        );
        let warnings = check_preproc_settings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("_mcf"));
        assert!(warnings[0].message.contains("motion correction"));
    }

    #[test]
    fn test_preproc_double_brain_extraction() {
        let s = spec(
            "set feat_files(1) \"/data/sub01/bold_mcf_brain.nii.gz\"\nset fmri(mc) 0\nset fmri(bet_yn) 1\n",
        );
        let warnings = check_preproc_settings(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("brain extraction"));
    }

    #[test]
    fn test_preproc_consistent_settings_pass() {
        let s = spec(
            "set feat_files(1) \"/data/sub01/bold_mcf.nii.gz\"\nset fmri(mc) 0\nset fmri(bet_yn) 0\n",
        );
        assert!(check_preproc_settings(&s).is_empty());

        let s = spec("set feat_files(1) \"/data/sub01/bold.nii.gz\"\n");
        assert!(check_preproc_settings(&s).is_empty());
    }

    #[test]
    fn test_prewhitening() {
        assert!(check_prewhitening(&spec("set fmri(prewhiten_yn) 1\n")).is_empty());

        let warnings = check_prewhitening(&spec("set fmri(prewhiten_yn) 0\n"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, CheckId::Prewhitening);
    }

    #[test]
    fn test_collinearity_messages_carry_column_and_value() {
        let vifs = vec![
            VifScore {
                column: 1,
                value: VifValue::Finite(1.2),
            },
            VifScore {
                column: 2,
                value: VifValue::Finite(8.5),
            },
            VifScore {
                column: 3,
                value: VifValue::Unbounded,
            },
        ];

        let warnings = check_collinearity(&vifs, &config());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].message.contains("column 2"));
        assert!(warnings[0].message.contains("8.50"));
        assert!(warnings[1].message.contains("column 3"));
        assert!(warnings[1].message.contains("linear combination"));
    }

    fn hrf_spec_text(convolve2: i64) -> String {
        format!(
            "set fmri(evs_orig) 2
set fmri(evtitle1) \"visual\"
set fmri(shape1) 3
set fmri(tempfilt_yn1) 1
set fmri(deriv_yn1) 0
set fmri(convolve1) 3
set fmri(evtitle2) \"motion_param_1\"
set fmri(shape2) 2
set fmri(tempfilt_yn2) 0
set fmri(deriv_yn2) 0
set fmri(convolve2) {convolve2}
set fmri(ncon_orig) 0
"
        )
    }

    #[test]
    fn test_hrf_correct_codes_pass() {
        let s = spec(&hrf_spec_text(0));
        let model = DesignModel::from_spec(&s).expect("valid spec");
        assert!(check_hrf_convolution(&s, &model, &config()).is_empty());
    }

    #[test]
    fn test_hrf_convolved_motion_ev_warns() {
        let s = spec(&hrf_spec_text(3));
        let model = DesignModel::from_spec(&s).expect("valid spec");
        let warnings = check_hrf_convolution(&s, &model, &config());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("EV 2"));
        assert!(warnings[0].message.contains("motion-parameter"));
    }

    #[test]
    fn test_hrf_task_ev_without_double_gamma_warns() {
        let mut text = hrf_spec_text(0);
        text = text.replace("set fmri(convolve1) 3", "set fmri(convolve1) 1");
        let s = spec(&text);
        let model = DesignModel::from_spec(&s).expect("valid spec");
        let warnings = check_hrf_convolution(&s, &model, &config());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("EV 1"));
        assert!(warnings[0].message.contains("expected 3"));
    }

    #[test]
    fn test_hrf_key_count_mismatch_warns() {
        let mut text = hrf_spec_text(0);
        text.push_str("set fmri(convolve3) 3\n");
        let s = spec(&text);
        let model = DesignModel::from_spec(&s).expect("valid spec");
        let warnings = check_hrf_convolution(&s, &model, &config());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("2 EV title key(s)"));
        assert!(warnings[0].message.contains("3 convolution key(s)"));
    }

    #[test]
    fn test_stats_files_records_summaries_and_warns_on_missing() {
        let s = spec(&hrf_spec_text(0));
        let mut model = DesignModel::from_spec(&s).expect("valid spec");
        let root = Path::new("/run.feat");

        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(
            root.join("stats/pe1.nii.gz"),
            Volume::new(vec![2, 2], vec![-0.5, 0.0, 1.5, 3.0]).expect("valid volume"),
        );
        // stats/pe2.nii.gz deliberately absent

        let warnings = check_stats_files(root, &mut model, &volumes);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("stats/pe2.nii.gz"));

        assert_eq!(model.evs[0].pe_present, Some(true));
        let summary = model.evs[0].pe_summary.expect("summary recorded");
        assert_eq!(summary.min, -0.5);
        assert_eq!(summary.max, 3.0);
        assert_eq!(model.evs[1].pe_present, Some(false));
        assert_eq!(model.evs[1].pe_summary, None);
    }

    #[test]
    fn test_stats_files_checks_contrasts() {
        let text = "set fmri(evs_orig) 0\nset fmri(ncon_orig) 1\nset fmri(conname_real.1) \"c\"\n";
        let mut model = DesignModel::from_spec(&spec(text)).expect("valid spec");
        let root = Path::new("/run.feat");

        let volumes = MemoryVolumeSource::new();
        let warnings = check_stats_files(root, &mut model, &volumes);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("stats/zstat1.nii.gz"));
        assert_eq!(model.contrasts[0].zstat_present, Some(false));
    }

    #[test]
    fn test_mask_counts_positive_voxels() {
        let root = Path::new("/run.feat");
        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(
            root.join(MASK_FILE),
            Volume::new(vec![2, 2, 2], vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0])
                .expect("valid volume"),
        );

        let (count, warnings) = check_mask(root, &volumes);
        assert_eq!(count, Some(3));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_empty_mask_warns() {
        let root = Path::new("/run.feat");
        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(root.join(MASK_FILE), constant_volume(&[2, 2, 2], 0.0));

        let (count, warnings) = check_mask(root, &volumes);
        assert_eq!(count, Some(0));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("no positive voxels"));
    }

    #[test]
    fn test_missing_mask_warns() {
        let (count, warnings) = check_mask(Path::new("/run.feat"), &MemoryVolumeSource::new());
        assert_eq!(count, None);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, CheckId::Mask);
    }

    #[test]
    fn test_log_scan_is_case_insensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(LOG_FILE),
            "Starting FEAT\nWarning: low SNR\nall good here\nWARNING: LOW SNR\nFatal ERROR in film_gls\n",
        )
        .expect("write log");

        let warnings = check_log_scan(dir.path());
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].message.contains("Warning: low SNR"));
        assert!(warnings[1].message.contains("WARNING: LOW SNR"));
        assert!(warnings[2].message.contains("ERROR in film_gls"));
        for w in &warnings {
            assert!(w.message.starts_with(LOG_FILE));
        }
    }

    #[test]
    fn test_missing_log_warns_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let warnings = check_log_scan(dir.path());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, CheckId::LogScan);
    }

    #[test]
    fn test_volume_count_mismatch_carries_both_values() {
        let s = spec("set fmri(npts) 180\n");
        let root = Path::new("/run.feat");
        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(root.join(FUNC_FILE), constant_volume(&[2, 2, 2, 175], 1.0));

        let warnings = check_volume_count(root, &s, &volumes);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("175"));
        assert!(warnings[0].message.contains("180"));
    }

    #[test]
    fn test_volume_count_match_passes() {
        let s = spec("set fmri(npts) 180\n");
        let root = Path::new("/run.feat");
        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(root.join(FUNC_FILE), constant_volume(&[2, 2, 2, 180], 1.0));

        assert!(check_volume_count(root, &s, &volumes).is_empty());
    }

    #[test]
    fn test_volume_count_rejects_3d_data() {
        let s = spec("set fmri(npts) 180\n");
        let root = Path::new("/run.feat");
        let mut volumes = MemoryVolumeSource::new();
        volumes.insert(root.join(FUNC_FILE), constant_volume(&[2, 2, 2], 1.0));

        let warnings = check_volume_count(root, &s, &volumes);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("4-D"));
    }

    #[test]
    fn test_missing_functional_data_warns() {
        let s = spec("set fmri(npts) 180\n");
        let warnings = check_volume_count(Path::new("/run.feat"), &s, &MemoryVolumeSource::new());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, CheckId::VolumeCount);
    }
}
