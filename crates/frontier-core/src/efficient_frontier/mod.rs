pub mod moments;
pub mod regularization;
pub mod tangency;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::returns_table::ReturnsTable;
use crate::types::{with_metadata, ComputationOutput};
use crate::FrontierResult;

pub use moments::{estimate_moments, CovarianceMatrix, MeanVector, MissingValuePolicy, Moments};
pub use regularization::{
    invert, regularize, InverseCovariance, RegularizedCovariance, DEFAULT_REGULARIZATION,
};
pub use tangency::{
    solve_tangency, AssetWeight, FrontierCoefficients, TangencyConfig, TangencySolution,
    WeightVector, CONSTRAINT_TOLERANCE, DEFAULT_DEGENERACY_TOLERANCE, DEFAULT_TARGET_RETURN,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A returns table plus solver parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TangencyInput {
    pub table: ReturnsTable,
    #[serde(default)]
    pub config: TangencyConfig,
}

/// Sample mean for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMean {
    pub fund: String,
    pub mean: f64,
}

/// Output of the tangency optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TangencyOutput {
    /// Weights in input asset order.
    pub weights: WeightVector,
    /// w' mu; equals the configured target return.
    pub portfolio_return: f64,
    /// w' (Sigma + lambda I) w.
    pub portfolio_variance: f64,
    pub portfolio_volatility: f64,
    pub coefficients: FrontierCoefficients,
    pub asset_means: Vec<AssetMean>,
    pub num_assets: usize,
    pub num_periods: usize,
    pub missing_cells: usize,
}

impl TangencyInput {
    /// Parse a `{"table": ..., "config": ...}` request.
    pub fn from_json(text: &str) -> FrontierResult<Self> {
        let input: TangencyInput = serde_json::from_str(text)?;
        Ok(input)
    }
}

struct Pipeline {
    moments: Moments,
    regularized: RegularizedCovariance,
    solution: TangencySolution,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Minimum-variance weights that are fully invested and earn the target
/// return, estimated from a regularized sample covariance.
///
/// Stages run in order (moments, ridge, LU, closed form) and the first
/// failure ends the call. Factorization is O(n^3) in the number of assets,
/// which dominates latency for large universes.
pub fn compute_tangency_weights(
    table: &ReturnsTable,
    config: &TangencyConfig,
) -> FrontierResult<WeightVector> {
    let pipeline = run_pipeline(table, config)?;
    Ok(WeightVector::from_solution(
        &table.assets,
        &pipeline.solution.weights,
    ))
}

/// Tangency weights with portfolio statistics, wrapped in the standard
/// computation envelope.
pub fn optimize_tangency(
    input: &TangencyInput,
) -> FrontierResult<ComputationOutput<TangencyOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let table = &input.table;
    let config = &input.config;
    let Pipeline {
        moments,
        regularized,
        solution,
    } = run_pipeline(table, config)?;

    let w = &solution.weights;
    let weights = WeightVector::from_solution(&table.assets, w);
    let portfolio_return = weights.expected_return(&moments.means);
    let portfolio_variance = (w.transpose() * &regularized.values * w)[(0, 0)];
    let portfolio_volatility = portfolio_variance.max(0.0).sqrt();

    let asset_means: Vec<AssetMean> = table
        .assets
        .iter()
        .zip(moments.means.values.iter())
        .map(|(fund, m)| AssetMean {
            fund: fund.clone(),
            mean: *m,
        })
        .collect();

    let n = table.num_assets();
    let periods = table.num_periods();

    // --- Warnings ---
    if moments.missing_cells > 0 {
        warnings.push(format!(
            "{} missing or non-numeric cells were skipped in the moment estimates",
            moments.missing_cells
        ));
    }
    if periods <= n {
        warnings.push(format!(
            "{} periods for {} assets: sample covariance is rank-deficient, weights depend on the regularization term",
            periods, n
        ));
    }
    for aw in weights.iter() {
        if aw.weight > 0.40 {
            warnings.push(format!(
                "Concentrated position: {} has weight {:.4}",
                aw.fund, aw.weight
            ));
        }
        if aw.weight < -0.10 {
            warnings.push(format!(
                "Short position: {} has weight {:.4}",
                aw.fund, aw.weight
            ));
        }
    }
    let gross: f64 = w.iter().map(|v| v.abs()).sum();
    if gross > 3.0 {
        warnings.push(format!("High gross exposure: {:.2}x", gross));
    }

    let output = TangencyOutput {
        weights,
        portfolio_return,
        portfolio_variance,
        portfolio_volatility,
        coefficients: solution.coefficients,
        asset_means,
        num_assets: n,
        num_periods: periods,
        missing_cells: moments.missing_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Regularized Markowitz minimum-variance portfolio at target return (two-fund closed form)",
        &serde_json::json!({
            "n_assets": n,
            "n_periods": periods,
            "regularization": config.regularization,
            "target_return": config.target_return,
            "degeneracy_tolerance": config.degeneracy_tolerance,
            "missing_values": config.missing_values,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn run_pipeline(table: &ReturnsTable, config: &TangencyConfig) -> FrontierResult<Pipeline> {
    config.validate()?;

    let moments = estimate_moments(table, config.missing_values)?;
    if moments.missing_cells > 0 {
        warn!(
            missing_cells = moments.missing_cells,
            "returns table has missing cells; statistics use pairwise observations"
        );
    }

    let regularized = regularize(&moments.covariance, config.regularization)?;
    let inverse = invert(&regularized)?;
    let solution = solve_tangency(
        &inverse,
        &moments.means,
        config.target_return,
        config.degeneracy_tolerance,
    )?;

    debug!(
        alpha = solution.coefficients.alpha,
        beta = solution.coefficients.beta,
        "solved tangency weights"
    );

    Ok(Pipeline {
        moments,
        regularized,
        solution,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
