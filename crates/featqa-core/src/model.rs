//! Typed design model reconstructed from the flat design spec.
//!
//! The spec flattens EV and contrast records into ordinal-parameterised
//! keys; reconstruction probes each expected key by formatted name and
//! fails hard on the first absence, since a missing derived key means the
//! declared counts and the actual keys disagree.

use serde::{Deserialize, Serialize};

use crate::design_spec::{keys, DesignSpec};
use crate::error::Result;

/// Min/max summary of a loaded statistic image, attached by the stats check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub min: f64,
    pub max: f64,
}

/// One explanatory variable (regressor) of a first-level design.
///
/// Created once during model construction; the `pe_*` fields are the only
/// state mutated afterwards, by the stats-file check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ev {
    /// 1-based ordinal, matching design-matrix column order.
    pub index: usize,
    pub title: String,
    /// Basis-shape code from `fmri(shape{n})`.
    pub shape: i64,
    /// Whether the EV was temporally highpass filtered.
    pub temporal_filter: bool,
    /// Whether a temporal derivative EV was added.
    pub temporal_derivative: bool,
    /// HRF convolution code from `fmri(convolve{n})`.
    pub convolution: i64,
    /// Whether `stats/pe{n}` loaded; `None` until the stats check runs.
    pub pe_present: Option<bool>,
    /// Min/max of the parameter-estimate image when it loaded.
    pub pe_summary: Option<ImageSummary>,
}

/// One statistical contrast over the EVs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    /// 1-based ordinal, matching `stats/zstat{c}` numbering.
    pub index: usize,
    pub title: String,
    /// One weight per EV, order-matched to EV ordinals.
    pub weights: Vec<f64>,
    /// Whether `stats/zstat{c}` loaded; `None` until the stats check runs.
    pub zstat_present: Option<bool>,
    /// Min/max of the z-statistic image when it loaded.
    pub zstat_summary: Option<ImageSummary>,
}

/// EV and contrast collections of one first-level analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignModel {
    pub evs: Vec<Ev>,
    pub contrasts: Vec<Contrast>,
}

impl DesignModel {
    /// Reconstruct EVs and contrasts by probing ordinal-parameterised keys.
    ///
    /// # Errors
    ///
    /// `QaError::MalformedSpec` when `fmri(evs_orig)` / `fmri(ncon_orig)`
    /// are absent, negative, or declare ordinals whose derived keys do not
    /// exist. No field is ever defaulted.
    pub fn from_spec(spec: &DesignSpec) -> Result<Self> {
        let ev_count = spec.require_count(keys::EV_COUNT)?;
        let mut evs = Vec::with_capacity(ev_count);
        for n in 1..=ev_count {
            evs.push(Ev {
                index: n,
                title: spec.require_str(&keys::ev_title(n))?,
                shape: spec.require_int(&keys::ev_shape(n))?,
                temporal_filter: spec.require_flag(&keys::ev_temporal_filter(n))?,
                temporal_derivative: spec.require_flag(&keys::ev_temporal_derivative(n))?,
                convolution: spec.require_int(&keys::ev_convolution(n))?,
                pe_present: None,
                pe_summary: None,
            });
        }

        let contrast_count = spec.require_count(keys::CONTRAST_COUNT)?;
        let mut contrasts = Vec::with_capacity(contrast_count);
        for c in 1..=contrast_count {
            let mut weights = Vec::with_capacity(ev_count);
            for ev in 1..=ev_count {
                weights.push(spec.require_f64(&keys::contrast_weight(c, ev))?);
            }
            contrasts.push(Contrast {
                index: c,
                title: spec.require_str(&keys::contrast_title(c))?,
                weights,
                zstat_present: None,
                zstat_summary: None,
            });
        }

        Ok(Self { evs, contrasts })
    }
}
