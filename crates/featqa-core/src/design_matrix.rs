//! FSL-style `design.mat` loading.
//!
//! The file carries a small text header (`/NumWaves`, `/NumPoints`,
//! `/Matrix`) followed by whitespace-separated rows. Declared dimensions
//! are validated against the data actually parsed.

use std::path::Path;

use nalgebra::DMatrix;

use crate::error::{QaError, Result};

/// The numeric design matrix: rows are time points, columns are regressors
/// in EV ordinal order. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    mat: DMatrix<f64>,
}

impl DesignMatrix {
    /// Load and parse a design matrix file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(QaError::MissingFile(path.to_path_buf()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parse the header and row data.
    ///
    /// Header lines other than the three consumed here (`/PPheights`,
    /// `/RequiredEffect`, ...) are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut waves: Option<usize> = None;
        let mut points: Option<usize> = None;
        let mut in_matrix = false;
        let mut data = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("/NumWaves") {
                waves = Some(parse_dim("NumWaves", rest)?);
            } else if let Some(rest) = line.strip_prefix("/NumPoints") {
                points = Some(parse_dim("NumPoints", rest)?);
            } else if line == "/Matrix" {
                in_matrix = true;
            } else if line.starts_with('/') {
                continue;
            } else if in_matrix {
                for token in line.split_whitespace() {
                    let value = token.parse::<f64>().map_err(|_| {
                        QaError::MalformedMatrix(format!("non-numeric value: {token}"))
                    })?;
                    data.push(value);
                }
            }
        }

        let waves =
            waves.ok_or_else(|| QaError::MalformedMatrix("missing /NumWaves header".into()))?;
        let points =
            points.ok_or_else(|| QaError::MalformedMatrix("missing /NumPoints header".into()))?;
        if data.len() != waves * points {
            return Err(QaError::MalformedMatrix(format!(
                "declared {points} rows x {waves} columns but found {} value(s)",
                data.len()
            )));
        }

        Ok(Self {
            mat: DMatrix::from_row_slice(points, waves, &data),
        })
    }

    /// Wrap an already-built matrix (embedders and tests).
    pub fn from_matrix(mat: DMatrix<f64>) -> Self {
        Self { mat }
    }

    /// Number of time points (rows).
    pub fn rows(&self) -> usize {
        self.mat.nrows()
    }

    /// Number of regressors (columns).
    pub fn columns(&self) -> usize {
        self.mat.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.mat
    }
}

fn parse_dim(name: &str, rest: &str) -> Result<usize> {
    rest.trim()
        .parse::<usize>()
        .map_err(|_| QaError::MalformedMatrix(format!("invalid /{name} value: {}", rest.trim())))
}
