//! Flat key/value design specification (`design.fsf`) parsing.
//!
//! The design spec records every analysis parameter as `set <key> <value>`
//! lines, with structured records flattened into ordinal-parameterised keys
//! like `fmri(evtitle3)`. Only that line form is consumed here; comments and
//! Tcl control lines are skipped. Typed accessors fail fast when an expected
//! key is absent or mistyped — a partially reconstructed record would hide a
//! version mismatch between declared counts and actual keys.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};

/// Well-known design spec keys and the ordinal key constructors.
pub mod keys {
    /// Analysis level: 1 = first-level, anything else = higher-level.
    pub const LEVEL: &str = "fmri(level)";
    /// Number of volumes deleted from the start of the run.
    pub const NDELETE: &str = "fmri(ndelete)";
    /// Primary 4-D input file.
    pub const INPUT_FILE: &str = "feat_files(1)";
    /// Motion correction (mcflirt) enabled flag.
    pub const MOTION_CORRECTION: &str = "fmri(mc)";
    /// Brain extraction (bet) enabled flag.
    pub const BRAIN_EXTRACTION: &str = "fmri(bet_yn)";
    /// Prewhitening enabled flag.
    pub const PREWHITEN: &str = "fmri(prewhiten_yn)";
    /// Expected number of volumes in the functional data.
    pub const NPTS: &str = "fmri(npts)";
    /// Number of original explanatory variables.
    pub const EV_COUNT: &str = "fmri(evs_orig)";
    /// Number of original contrasts.
    pub const CONTRAST_COUNT: &str = "fmri(ncon_orig)";

    /// Key prefixes for counting ordinal key families.
    pub const EV_TITLE_PREFIX: &str = "fmri(evtitle";
    pub const EV_CONVOLUTION_PREFIX: &str = "fmri(convolve";

    pub fn ev_title(n: usize) -> String {
        format!("fmri(evtitle{n})")
    }

    pub fn ev_shape(n: usize) -> String {
        format!("fmri(shape{n})")
    }

    pub fn ev_temporal_filter(n: usize) -> String {
        format!("fmri(tempfilt_yn{n})")
    }

    pub fn ev_temporal_derivative(n: usize) -> String {
        format!("fmri(deriv_yn{n})")
    }

    pub fn ev_convolution(n: usize) -> String {
        format!("fmri(convolve{n})")
    }

    pub fn contrast_title(c: usize) -> String {
        format!("fmri(conname_real.{c})")
    }

    pub fn contrast_weight(c: usize, ev: usize) -> String {
        format!("fmri(con_real{c}.{ev})")
    }
}

/// Scalar value of one `set` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FsfValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for FsfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsfValue::Int(v) => write!(f, "{v}"),
            FsfValue::Float(v) => write!(f, "{v}"),
            FsfValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Analysis level derived from `fmri(level)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLevel {
    /// Single-run analysis with a design matrix and EV/contrast model.
    First,
    /// Group or fixed-effects analysis over lower-level results.
    Higher,
}

/// Immutable mapping from design spec key to scalar value.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignSpec {
    values: BTreeMap<String, FsfValue>,
}

impl DesignSpec {
    /// Load and parse a design spec file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(QaError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse `set <key> <value>` lines; every other line is ignored.
    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("set ") else {
                continue;
            };
            let mut parts = rest.splitn(2, char::is_whitespace);
            let (Some(key), Some(raw)) = (parts.next(), parts.next()) else {
                continue;
            };
            values.insert(key.to_string(), parse_value(raw.trim()));
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&FsfValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of keys of the form `<prefix><digits>)`.
    ///
    /// Used to compare ordinal key families (e.g. titles vs. convolution
    /// codes) without trusting the declared counts. Keys with non-digit
    /// remainders such as `fmri(convolve_phase1)` do not match.
    pub fn count_ordinal_keys(&self, prefix: &str) -> usize {
        self.values
            .keys()
            .filter(|k| {
                k.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(')'))
                    .map(|ordinal| {
                        !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit())
                    })
                    .unwrap_or(false)
            })
            .count()
    }

    /// Integer value of `key`, failing on absence or a non-integer value.
    pub fn require_int(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            Some(FsfValue::Int(v)) => Ok(*v),
            Some(other) => Err(QaError::MalformedSpec(format!(
                "key {key} holds {other:?}, expected an integer"
            ))),
            None => Err(QaError::MalformedSpec(format!("missing key: {key}"))),
        }
    }

    /// Non-negative integer value of `key`, as a count.
    pub fn require_count(&self, key: &str) -> Result<usize> {
        let v = self.require_int(key)?;
        usize::try_from(v)
            .map_err(|_| QaError::MalformedSpec(format!("key {key} holds negative count {v}")))
    }

    /// Numeric value of `key`; integers widen to `f64`.
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        match self.get(key) {
            Some(FsfValue::Int(v)) => Ok(*v as f64),
            Some(FsfValue::Float(v)) => Ok(*v),
            Some(other) => Err(QaError::MalformedSpec(format!(
                "key {key} holds {other:?}, expected a number"
            ))),
            None => Err(QaError::MalformedSpec(format!("missing key: {key}"))),
        }
    }

    /// String value of `key`.
    pub fn require_str(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(FsfValue::Str(v)) => Ok(v.clone()),
            Some(other) => Err(QaError::MalformedSpec(format!(
                "key {key} holds {other:?}, expected a string"
            ))),
            None => Err(QaError::MalformedSpec(format!("missing key: {key}"))),
        }
    }

    /// Integer value of `key` interpreted as an on/off flag.
    pub fn require_flag(&self, key: &str) -> Result<bool> {
        Ok(self.require_int(key)? != 0)
    }

    /// Analysis level from the reserved `fmri(level)` key.
    pub fn analysis_level(&self) -> Result<AnalysisLevel> {
        match self.require_int(keys::LEVEL)? {
            1 => Ok(AnalysisLevel::First),
            _ => Ok(AnalysisLevel::Higher),
        }
    }
}

fn parse_value(raw: &str) -> FsfValue {
    if let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return FsfValue::Str(inner.to_string());
    }
    if let Ok(v) = raw.parse::<i64>() {
        return FsfValue::Int(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return FsfValue::Float(v);
    }
    FsfValue::Str(raw.to_string())
}
