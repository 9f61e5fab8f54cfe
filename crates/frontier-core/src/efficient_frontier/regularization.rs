use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use tracing::debug;

use super::moments::CovarianceMatrix;
use crate::error::FrontierError;
use crate::FrontierResult;

/// Ridge added to the covariance diagonal unless configured otherwise.
pub const DEFAULT_REGULARIZATION: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sample covariance plus `lambda * I`.
#[derive(Debug, Clone)]
pub struct RegularizedCovariance {
    pub values: DMatrix<f64>,
    pub lambda: f64,
}

/// Inverse of a regularized covariance, held as its LU factorization.
///
/// Products `Sigma^-1 * v` are computed by solving against the factors; the
/// explicit inverse is only formed on request.
#[derive(Debug, Clone)]
pub struct InverseCovariance {
    lu: LU<f64, Dyn, Dyn>,
    dim: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lift every eigenvalue of the covariance matrix by `lambda`.
pub fn regularize(
    covariance: &CovarianceMatrix,
    lambda: f64,
) -> FrontierResult<RegularizedCovariance> {
    if !lambda.is_finite() || lambda <= 0.0 {
        return Err(FrontierError::InvalidInput {
            field: "regularization".into(),
            reason: format!("Must be a finite positive number, got {}", lambda),
        });
    }

    let n = covariance.dim();
    let values = &covariance.values + DMatrix::<f64>::identity(n, n) * lambda;
    Ok(RegularizedCovariance { values, lambda })
}

/// Factorize the regularized covariance with partial-pivot LU.
///
/// Fails with `SingularMatrix` when an entry is not finite (missing data that
/// survived estimation) or when a pivot vanishes relative to the largest
/// entry. Cost is O(n^3) in the number of assets.
pub fn invert(regularized: &RegularizedCovariance) -> FrontierResult<InverseCovariance> {
    let values = &regularized.values;
    let n = values.nrows();

    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        let (row, col) = (idx % n, idx / n);
        return Err(FrontierError::SingularMatrix {
            context: format!(
                "regularized covariance has a non-finite entry at [{},{}]",
                row, col
            ),
        });
    }

    let scale = values.amax();
    let tolerance = n as f64 * f64::EPSILON * scale;

    let lu = values.clone().lu();
    let u = lu.u();
    let min_pivot = u
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |acc, p| acc.min(p.abs()));

    debug!(
        assets = n,
        lambda = regularized.lambda,
        min_pivot,
        tolerance,
        "factorized regularized covariance"
    );

    if !(min_pivot > tolerance) {
        return Err(FrontierError::SingularMatrix {
            context: format!(
                "LU pivot {:e} is below tolerance {:e} after adding {:e} * I",
                min_pivot, tolerance, regularized.lambda
            ),
        });
    }

    Ok(InverseCovariance { lu, dim: n })
}

impl InverseCovariance {
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `Sigma^-1 * rhs`, by forward and back substitution.
    pub fn apply(&self, rhs: &DVector<f64>) -> FrontierResult<DVector<f64>> {
        if rhs.len() != self.dim {
            return Err(FrontierError::InvalidInput {
                field: "rhs".into(),
                reason: format!("Expected length {} but got {}", self.dim, rhs.len()),
            });
        }
        self.lu
            .solve(rhs)
            .ok_or_else(|| FrontierError::SingularMatrix {
                context: "LU solve failed".into(),
            })
    }

    /// Explicit inverse matrix.
    pub fn matrix(&self) -> FrontierResult<DMatrix<f64>> {
        self.lu
            .try_inverse()
            .ok_or_else(|| FrontierError::SingularMatrix {
                context: "LU factors are not invertible".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
