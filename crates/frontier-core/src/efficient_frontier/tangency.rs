use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::moments::{MeanVector, MissingValuePolicy};
use super::regularization::{InverseCovariance, DEFAULT_REGULARIZATION};
use crate::error::FrontierError;
use crate::FrontierResult;

/// Target expected return per period unless configured otherwise.
pub const DEFAULT_TARGET_RETURN: f64 = 0.0095223724959047;

/// Relative threshold on `A*C - B^2` against `A*C`.
pub const DEFAULT_DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Largest accepted residual on `sum(w) = 1` and `w'mu = target_return`.
pub const CONSTRAINT_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Solver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TangencyConfig {
    /// Ridge `lambda` added to the covariance diagonal.
    #[serde(default = "default_regularization")]
    pub regularization: f64,
    /// Required expected portfolio return, same periodicity as the data.
    #[serde(default = "default_target_return")]
    pub target_return: f64,
    /// `A*C - B^2` at or below this fraction of `A*C` is treated as zero.
    #[serde(default = "default_degeneracy_tolerance")]
    pub degeneracy_tolerance: f64,
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
}

fn default_regularization() -> f64 {
    DEFAULT_REGULARIZATION
}

fn default_target_return() -> f64 {
    DEFAULT_TARGET_RETURN
}

fn default_degeneracy_tolerance() -> f64 {
    DEFAULT_DEGENERACY_TOLERANCE
}

impl Default for TangencyConfig {
    fn default() -> Self {
        TangencyConfig {
            regularization: DEFAULT_REGULARIZATION,
            target_return: DEFAULT_TARGET_RETURN,
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
            missing_values: MissingValuePolicy::default(),
        }
    }
}

/// Scalars of the two-fund closed form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontierCoefficients {
    /// 1' Sigma^-1 1
    pub a: f64,
    /// 1' Sigma^-1 mu
    pub b: f64,
    /// mu' Sigma^-1 mu
    pub c: f64,
    /// A*C - B^2
    pub denominator: f64,
    /// Loading on Sigma^-1 1.
    pub alpha: f64,
    /// Loading on Sigma^-1 mu.
    pub beta: f64,
}

/// Weights of the minimum-variance portfolio at the target return, in the
/// same order as the mean vector.
#[derive(Debug, Clone)]
pub struct TangencySolution {
    pub weights: DVector<f64>,
    pub coefficients: FrontierCoefficients,
}

/// One asset's allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub fund: String,
    pub weight: f64,
}

/// Ordered `(asset, weight)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(pub Vec<AssetWeight>);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl TangencyConfig {
    pub fn validate(&self) -> FrontierResult<()> {
        if !self.regularization.is_finite() || self.regularization <= 0.0 {
            return Err(FrontierError::InvalidInput {
                field: "regularization".into(),
                reason: format!(
                    "Must be a finite positive number, got {}",
                    self.regularization
                ),
            });
        }
        if !self.target_return.is_finite() {
            return Err(FrontierError::InvalidInput {
                field: "target_return".into(),
                reason: format!("Must be finite, got {}", self.target_return),
            });
        }
        if !self.degeneracy_tolerance.is_finite() || self.degeneracy_tolerance < 0.0 {
            return Err(FrontierError::InvalidInput {
                field: "degeneracy_tolerance".into(),
                reason: format!(
                    "Must be a finite non-negative number, got {}",
                    self.degeneracy_tolerance
                ),
            });
        }
        Ok(())
    }
}

/// Minimum-variance weights with `sum(w) = 1` and `w'mu = target_return`.
///
/// v1 = Sigma^-1 1, v2 = Sigma^-1 mu
/// A = 1'v1, B = 1'v2, C = mu'v2, Den = A*C - B^2
/// alpha = (C - B*RT) / Den, beta = (A*RT - B) / Den
/// w = alpha*v1 + beta*v2
pub fn solve_tangency(
    inverse: &InverseCovariance,
    means: &MeanVector,
    target_return: f64,
    tolerance: f64,
) -> FrontierResult<TangencySolution> {
    let n = inverse.dim();
    if means.len() != n {
        return Err(FrontierError::InvalidInput {
            field: "means".into(),
            reason: format!("Expected {} means but got {}", n, means.len()),
        });
    }

    let mu = &means.values;
    let ones = DVector::<f64>::from_element(n, 1.0);

    let v1 = inverse.apply(&ones)?;
    let v2 = inverse.apply(mu)?;

    let a = v1.sum();
    let b = v2.sum();
    let c = mu.dot(&v2);
    let denominator = a * c - b * b;

    debug!(a, b, c, denominator, "frontier coefficients");

    if is_degenerate(a, c, denominator, tolerance) {
        return Err(FrontierError::DegenerateFrontier { denominator });
    }

    let alpha = (c - b * target_return) / denominator;
    let beta = (a * target_return - b) / denominator;
    let weights = &v1 * alpha + &v2 * beta;

    if weights.iter().any(|w| !w.is_finite()) {
        return Err(FrontierError::DegenerateFrontier { denominator });
    }

    // Near the degeneracy threshold cancellation can leave both constraints unmet.
    let budget_residual = (weights.sum() - 1.0).abs();
    let return_residual = (weights.dot(mu) - target_return).abs();
    if budget_residual > CONSTRAINT_TOLERANCE || return_residual > CONSTRAINT_TOLERANCE {
        debug!(
            budget_residual,
            return_residual, "weights miss the frontier constraints"
        );
        return Err(FrontierError::DegenerateFrontier { denominator });
    }

    Ok(TangencySolution {
        weights,
        coefficients: FrontierCoefficients {
            a,
            b,
            c,
            denominator,
            alpha,
            beta,
        },
    })
}

impl WeightVector {
    /// Pair weights with their asset identifiers.
    pub fn from_solution(assets: &[String], weights: &DVector<f64>) -> Self {
        WeightVector(
            assets
                .iter()
                .zip(weights.iter())
                .map(|(fund, w)| AssetWeight {
                    fund: fund.clone(),
                    weight: *w,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetWeight> {
        self.0.iter()
    }

    pub fn get(&self, fund: &str) -> Option<f64> {
        self.0.iter().find(|aw| aw.fund == fund).map(|aw| aw.weight)
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|aw| aw.weight).sum()
    }

    /// `w' mu` for a mean vector in the same asset order.
    pub fn expected_return(&self, means: &MeanVector) -> f64 {
        self.0
            .iter()
            .zip(means.values.iter())
            .map(|(aw, m)| aw.weight * m)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// For positive definite Sigma^-1, Cauchy-Schwarz gives A*C >= B^2, so the
/// denominator is compared against A*C rather than an absolute epsilon.
fn is_degenerate(a: f64, c: f64, denominator: f64, tolerance: f64) -> bool {
    if !denominator.is_finite() {
        return true;
    }
    denominator.abs() <= tolerance * (a * c).abs()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efficient_frontier::moments::CovarianceMatrix;
    use crate::efficient_frontier::regularization::{invert, regularize};
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;

    fn inverse_of(values: DMatrix<f64>, lambda: f64) -> InverseCovariance {
        let reg = regularize(&CovarianceMatrix { values }, lambda).unwrap();
        invert(&reg).unwrap()
    }

    fn means(values: &[f64]) -> MeanVector {
        MeanVector {
            values: DVector::from_vec(values.to_vec()),
        }
    }

    fn three_asset_cov() -> DMatrix<f64> {
        let s = DVector::from_vec(vec![1.0, -1.0, 1.0]);
        &s * s.transpose() * 5e-5
    }

    // ------------------------------------------------------------------
    // 1. Coefficients against the Sherman-Morrison closed form
    // ------------------------------------------------------------------
    #[test]
    fn test_coefficients_three_assets() {
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.015, 0.01, -0.005]);
        let sol = solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10).unwrap();
        let k = sol.coefficients;
        assert_abs_diff_eq!(k.a, 28_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(k.b, 200.0, epsilon = 1e-8);
        assert_abs_diff_eq!(k.c, 3.5, epsilon = 1e-10);
        assert_abs_diff_eq!(k.denominator, 58_000.0, epsilon = 1e-4);
        assert_abs_diff_eq!(k.alpha, 2.7509060358949308e-5, epsilon = 1e-14);
        assert_abs_diff_eq!(k.beta, 1.1487315497470969e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_three_assets() {
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.015, 0.01, -0.005]);
        let sol = solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10).unwrap();
        let w = &sol.weights;
        assert_abs_diff_eq!(w[0], 0.392382215333659, epsilon = 1e-9);
        assert_abs_diff_eq!(w[1], 0.44498187928210137, epsilon = 1e-9);
        assert_abs_diff_eq!(w[2], 0.16263590538423964, epsilon = 1e-9);
        assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w.dot(&mu.values), DEFAULT_TARGET_RETURN, epsilon = 1e-12);
    }

    // ------------------------------------------------------------------
    // 2. Two-asset case pins the target exactly
    // ------------------------------------------------------------------
    #[test]
    fn test_two_assets_hit_target() {
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.006, 0.006, 0.01]);
        let inv = inverse_of(cov, 1e-4);
        let mu = means(&[0.10, 0.06]);
        // With two assets the constraints alone fix w: w_a = (0.08 - 0.06) / 0.04
        let sol = solve_tangency(&inv, &mu, 0.08, 1e-10).unwrap();
        assert_abs_diff_eq!(sol.weights[0], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.weights[1], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_target_outside_asset_range_shorts() {
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.006, 0.006, 0.01]);
        let inv = inverse_of(cov, 1e-4);
        let mu = means(&[0.10, 0.06]);
        let sol = solve_tangency(&inv, &mu, 0.14, 1e-10).unwrap();
        assert_abs_diff_eq!(sol.weights[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.weights[1], -1.0, epsilon = 1e-10);
    }

    // ------------------------------------------------------------------
    // 3. Degenerate frontier
    // ------------------------------------------------------------------
    #[test]
    fn test_equal_means_degenerate() {
        let cov = DMatrix::from_row_slice(
            3,
            3,
            &[0.0225, 0.006, 0.00375, 0.006, 0.04, 0.025, 0.00375, 0.025, 0.0625],
        );
        let inv = inverse_of(cov, 1e-4);
        let mu = means(&[0.02, 0.02, 0.02]);
        match solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10) {
            Err(FrontierError::DegenerateFrontier { denominator }) => {
                assert!(denominator.is_finite())
            }
            other => panic!("Expected DegenerateFrontier, got {:?}", other),
        }
    }

    #[test]
    fn test_single_asset_degenerate() {
        let inv = inverse_of(DMatrix::from_element(1, 1, 0.04), 1e-4);
        let mu = means(&[0.05]);
        assert!(matches!(
            solve_tangency(&inv, &mu, 0.05, 1e-10),
            Err(FrontierError::DegenerateFrontier { .. })
        ));
    }

    #[test]
    fn test_zero_means_degenerate() {
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.0, 0.0, 0.0]);
        assert!(matches!(
            solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10),
            Err(FrontierError::DegenerateFrontier { .. })
        ));
    }

    #[test]
    fn test_nan_mean_degenerate_not_nan_weights() {
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.015, f64::NAN, -0.005]);
        assert!(matches!(
            solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10),
            Err(FrontierError::DegenerateFrontier { .. })
        ));
    }

    #[test]
    fn test_near_singular_frontier_fails_constraint_check() {
        // Means almost proportional to the ones vector: Den/(A*C) is about
        // 2.5e-10, above the default tolerance, and the weights reach 1e4.
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.02, 0.020001, 0.02]);
        let result = solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10);
        assert!(
            matches!(result, Err(FrontierError::DegenerateFrontier { .. })),
            "got {:?}",
            result.map(|s| s.weights)
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let inv = inverse_of(three_asset_cov(), 1e-4);
        let mu = means(&[0.01, 0.02]);
        assert!(matches!(
            solve_tangency(&inv, &mu, DEFAULT_TARGET_RETURN, 1e-10),
            Err(FrontierError::InvalidInput { .. })
        ));
    }

    // ------------------------------------------------------------------
    // 4. Config
    // ------------------------------------------------------------------
    #[test]
    fn test_config_defaults_from_empty_json() {
        let cfg: TangencyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, TangencyConfig::default());
        assert_eq!(cfg.regularization, 1e-4);
        assert_eq!(cfg.target_return, 0.0095223724959047);
        assert_eq!(cfg.missing_values, MissingValuePolicy::Pairwise);
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = TangencyConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.target_return = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg = TangencyConfig {
            degeneracy_tolerance: -1.0,
            ..TangencyConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg = TangencyConfig {
            regularization: 0.0,
            ..TangencyConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    // ------------------------------------------------------------------
    // 5. WeightVector
    // ------------------------------------------------------------------
    #[test]
    fn test_weight_vector_pairs_in_order() {
        let assets = vec!["X".to_string(), "Y".to_string()];
        let wv = WeightVector::from_solution(&assets, &DVector::from_vec(vec![0.25, 0.75]));
        assert_eq!(wv.len(), 2);
        assert_eq!(wv.0[0].fund, "X");
        assert_eq!(wv.get("Y"), Some(0.75));
        assert_eq!(wv.total(), 1.0);
        assert_abs_diff_eq!(wv.expected_return(&means(&[0.04, 0.08])), 0.07, epsilon = 1e-15);

        let json = serde_json::to_value(&wv).unwrap();
        assert_eq!(json[1], serde_json::json!({"fund": "Y", "weight": 0.75}));
    }
}
