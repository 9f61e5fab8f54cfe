pub mod efficient_frontier;
pub mod error;
pub mod returns_table;
pub mod types;

pub use efficient_frontier::{compute_tangency_weights, optimize_tangency};
pub use error::FrontierError;
pub use returns_table::ReturnsTable;
pub use types::*;

/// Standard result type for all frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;
