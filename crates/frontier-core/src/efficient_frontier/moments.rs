use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FrontierError;
use crate::returns_table::ReturnsTable;
use crate::FrontierResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How missing (NaN) observations enter the sample statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Skip missing cells: means over the observed periods, each covariance
    /// entry over the periods both assets observed. Too few observations
    /// leave `NaN` in the statistic.
    #[default]
    Pairwise,
    /// Fail on the first missing cell.
    Reject,
}

/// Arithmetic mean return per asset, in table order.
#[derive(Debug, Clone)]
pub struct MeanVector {
    pub values: DVector<f64>,
}

/// Sample covariance (ddof = 1) of asset returns across time.
#[derive(Debug, Clone)]
pub struct CovarianceMatrix {
    pub values: DMatrix<f64>,
}

/// First and second sample moments of a returns table.
#[derive(Debug, Clone)]
pub struct Moments {
    pub means: MeanVector,
    pub covariance: CovarianceMatrix,
    /// Cells that were missing in the source table.
    pub missing_cells: usize,
}

impl MeanVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }
}

impl CovarianceMatrix {
    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Estimate mean returns and the sample covariance matrix.
///
/// The table is validated first, so an empty table fails with
/// `InvalidInput` before any matrix is allocated.
pub fn estimate_moments(
    table: &ReturnsTable,
    policy: MissingValuePolicy,
) -> FrontierResult<Moments> {
    table.validate()?;

    let missing_cells = table.missing_cells();
    if policy == MissingValuePolicy::Reject && missing_cells > 0 {
        return Err(first_missing_error(table));
    }

    let n = table.num_assets();
    let series = &table.returns;

    let means = DVector::from_iterator(n, series.iter().map(|s| nan_mean(s)));

    let mut cov = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let c = pairwise_covariance(&series[i], &series[j]);
            cov[(i, j)] = c;
            cov[(j, i)] = c;
        }
    }

    debug!(
        assets = n,
        periods = table.num_periods(),
        missing_cells,
        "estimated sample moments"
    );

    Ok(Moments {
        means: MeanVector { values: means },
        covariance: CovarianceMatrix { values: cov },
        missing_cells,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_missing_error(table: &ReturnsTable) -> FrontierError {
    for (i, (name, series)) in table.iter().enumerate() {
        if let Some(t) = series.iter().position(|v| v.is_nan()) {
            return FrontierError::InvalidInput {
                field: format!("returns[{}][{}]", i, t),
                reason: format!(
                    "Missing or non-numeric observation for '{}' in period {}",
                    name, t
                ),
            };
        }
    }
    FrontierError::InvalidInput {
        field: "returns".into(),
        reason: "Missing observation".into(),
    }
}

/// Mean of the non-missing observations; `NaN` when none are present.
fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Covariance over the periods where both series are observed, using the
/// means of those periods. Fewer than two shared periods gives `NaN`.
fn pairwise_covariance(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();

    let count = pairs.len();
    if count < 2 {
        return f64::NAN;
    }

    let k = count as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / k;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / k;
    let s: f64 = pairs
        .iter()
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    s / (k - 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
