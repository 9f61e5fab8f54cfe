use napi::Result as NapiResult;
use napi_derive::napi;

use frontier_core::efficient_frontier::{self, TangencyInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Efficient frontier
// ---------------------------------------------------------------------------

/// Takes `{"table": {"assets": [...], "returns": [[...]]}, "config": {...}}`
/// and returns the computation envelope as JSON.
#[napi]
pub fn compute_tangency_weights(input_json: String) -> NapiResult<String> {
    let input = TangencyInput::from_json(&input_json).map_err(to_napi_error)?;
    let output = efficient_frontier::optimize_tangency(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Weights only, as `[{"fund": ..., "weight": ...}]`.
#[napi]
pub fn tangency_weights(input_json: String) -> NapiResult<String> {
    let input = TangencyInput::from_json(&input_json).map_err(to_napi_error)?;
    let weights = efficient_frontier::compute_tangency_weights(&input.table, &input.config)
        .map_err(to_napi_error)?;
    serde_json::to_string(&weights).map_err(to_napi_error)
}
