use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Singular matrix: {context}")]
    SingularMatrix { context: String },

    #[error("Degenerate frontier: A*C - B^2 = {denominator:e}, target return is unattainable")]
    DegenerateFrontier { denominator: f64 },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FrontierError {
    fn from(e: serde_json::Error) -> Self {
        FrontierError::SerializationError(e.to_string())
    }
}
