//! Variance Inflation Factor collinearity diagnostics.
//!
//! Each design-matrix column is regressed against all other columns with
//! ordinary least squares; the VIF is `1 / (1 - R²)` of that regression.
//! Working over the full design catches collinearities that arise from
//! linear combinations of regressors, not just pairwise correlations.
//! Degenerate columns are reported as explicit variants instead of
//! propagating infinities or NaN.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::design_matrix::DesignMatrix;
use crate::error::{QaError, Result};

/// Tolerance below which a sum of squares counts as zero and above which
/// an R² counts as exactly one.
const EPS: f64 = 1e-10;

/// Collinearity score of one design column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VifValue {
    /// Regular score; >= 1 for full-column-rank designs with centered columns.
    Finite(f64),
    /// The column is an exact linear combination of the others (R² = 1).
    Unbounded,
    /// The column has no variance; the design is degenerate.
    ZeroVariance,
}

impl VifValue {
    /// Whether this score counts as excessive collinearity.
    ///
    /// Degenerate variants are always excessive: a design with a constant
    /// or linearly dependent column needs review regardless of threshold.
    pub fn is_excessive(&self, threshold: f64) -> bool {
        match self {
            VifValue::Finite(v) => *v > threshold,
            VifValue::Unbounded | VifValue::ZeroVariance => true,
        }
    }
}

/// One score per design-matrix column, index-aligned to EV ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VifScore {
    /// 1-based column ordinal.
    pub column: usize,
    pub value: VifValue,
}

/// Compute one VIF per column of the design matrix.
///
/// # Errors
///
/// `QaError::TooFewColumns` when the design has fewer than two columns —
/// a single regressor has nothing to be collinear with.
pub fn compute_vifs(design: &DesignMatrix) -> Result<Vec<VifScore>> {
    let mat = design.matrix();
    let p = mat.ncols();
    if p < 2 {
        return Err(QaError::TooFewColumns(p));
    }

    let mut scores = Vec::with_capacity(p);
    for j in 0..p {
        scores.push(VifScore {
            column: j + 1,
            value: column_vif(mat, j),
        });
    }
    Ok(scores)
}

fn column_vif(mat: &DMatrix<f64>, j: usize) -> VifValue {
    let y = mat.column(j).into_owned();
    let mean = y.mean();
    let ss_total: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if ss_total <= EPS {
        return VifValue::ZeroVariance;
    }

    let others = mat.clone().remove_column(j);
    let svd = others.clone().svd(true, true);
    let beta = match svd.solve(&y, EPS) {
        Ok(beta) => beta,
        // The least-squares system itself is unsolvable only for a fully
        // rank-collapsed design; treat it like exact dependence.
        Err(_) => return VifValue::Unbounded,
    };

    let fitted = &others * &beta;
    let ss_resid: f64 = y
        .iter()
        .zip(fitted.iter())
        .map(|(obs, fit)| (obs - fit).powi(2))
        .sum();

    let r_squared = 1.0 - ss_resid / ss_total;
    if r_squared >= 1.0 - EPS {
        return VifValue::Unbounded;
    }
    VifValue::Finite(1.0 / (1.0 - r_squared))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design(rows: usize, cols: usize, data: &[f64]) -> DesignMatrix {
        DesignMatrix::from_matrix(DMatrix::from_row_slice(rows, cols, data))
    }

    #[test]
    fn test_orthogonal_columns_have_unit_vif() {
        #[rustfmt::skip]
        let dm = design(4, 2, &[
            1.0, 1.0,
            -1.0, 1.0,
            1.0, -1.0,
            -1.0, -1.0,
        ]);

        let scores = compute_vifs(&dm).expect("valid design");
        assert_eq!(scores.len(), 2);
        for score in scores {
            match score.value {
                VifValue::Finite(v) => assert!((v - 1.0).abs() < 1e-9, "VIF was {v}"),
                other => panic!("expected finite VIF, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_full_rank_centered_design_has_finite_vifs_at_least_one() {
        #[rustfmt::skip]
        let dm = design(6, 3, &[
            1.0, 2.0, -1.0,
            -1.0, 1.0, 2.0,
            2.0, -1.0, 1.0,
            -2.0, -2.0, -2.0,
            1.0, 1.0, -1.0,
            -1.0, -1.0, 1.0,
        ]);

        for score in compute_vifs(&dm).expect("valid design") {
            match score.value {
                VifValue::Finite(v) => assert!(v >= 1.0 - 1e-9, "VIF was {v}"),
                other => panic!("expected finite VIF, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_duplicate_column_is_unbounded() {
        #[rustfmt::skip]
        let dm = design(4, 3, &[
            1.0, 1.0, 0.3,
            -1.0, -1.0, 1.1,
            2.0, 2.0, -0.7,
            -2.0, -2.0, -0.7,
        ]);

        let scores = compute_vifs(&dm).expect("valid design");
        assert_eq!(scores[0].value, VifValue::Unbounded);
        assert_eq!(scores[1].value, VifValue::Unbounded);
        assert!(scores[0].value.is_excessive(5.0));
    }

    #[test]
    fn test_linear_combination_is_unbounded() {
        // Third column is the sum of the first two.
        #[rustfmt::skip]
        let dm = design(4, 3, &[
            1.0, 1.0, 2.0,
            -1.0, 1.0, 0.0,
            1.0, -1.0, 0.0,
            -1.0, -1.0, -2.0,
        ]);

        let scores = compute_vifs(&dm).expect("valid design");
        assert_eq!(scores[2].value, VifValue::Unbounded);
    }

    #[test]
    fn test_zero_variance_column_reported() {
        #[rustfmt::skip]
        let dm = design(4, 2, &[
            2.0, 1.0,
            2.0, -1.0,
            2.0, 1.0,
            2.0, -1.0,
        ]);

        let scores = compute_vifs(&dm).expect("valid design");
        assert_eq!(scores[0].value, VifValue::ZeroVariance);
        assert!(scores[0].value.is_excessive(5.0));
    }

    #[test]
    fn test_single_column_rejected() {
        let dm = design(4, 1, &[1.0, -1.0, 1.0, -1.0]);
        let err = compute_vifs(&dm).unwrap_err();
        assert!(matches!(err, QaError::TooFewColumns(1)));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!VifValue::Finite(5.0).is_excessive(5.0));
        assert!(VifValue::Finite(5.01).is_excessive(5.0));
        assert!(VifValue::ZeroVariance.is_excessive(f64::MAX));
    }
}
