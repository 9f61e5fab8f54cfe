use clap::{Args, ValueEnum};
use serde_json::Value;

use frontier_core::efficient_frontier::{optimize_tangency, MissingValuePolicy, TangencyConfig};

use crate::input;
use crate::input::returns::InputFormat;

/// Arguments for tangency weight calculation
#[derive(Args)]
pub struct TangencyArgs {
    /// Path to a returns file (CSV with one fund per row, or JSON)
    #[arg(long)]
    pub input: Option<String>,

    /// Input format
    #[arg(long, value_enum, default_value = "auto")]
    pub format: InputFormat,

    /// Ridge added to the covariance diagonal (default 0.0001)
    #[arg(long)]
    pub regularization: Option<f64>,

    /// Target expected return per period (default 0.0095223724959047)
    #[arg(long, allow_hyphen_values = true)]
    pub target_return: Option<f64>,

    /// Relative tolerance for a degenerate frontier (default 1e-10)
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Treatment of missing or non-numeric cells
    #[arg(long, value_enum)]
    pub missing: Option<MissingArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MissingArg {
    /// Skip missing cells pair by pair
    Pairwise,
    /// Fail on any missing cell
    Reject,
}

impl From<MissingArg> for MissingValuePolicy {
    fn from(arg: MissingArg) -> Self {
        match arg {
            MissingArg::Pairwise => MissingValuePolicy::Pairwise,
            MissingArg::Reject => MissingValuePolicy::Reject,
        }
    }
}

pub fn run_tangency(args: TangencyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (text, hint) = if let Some(ref path) = args.input {
        (input::file::read_text(path)?, Some(path.as_str()))
    } else if let Some(data) = input::stdin::read_stdin()? {
        (data, None)
    } else {
        return Err("--input <file.csv|file.json> or stdin required for tangency weights".into());
    };

    let mut request = input::returns::parse_request(&text, args.format, hint)?;
    apply_overrides(&mut request.config, &args);

    let result = optimize_tangency(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Command-line flags win over values embedded in a JSON request.
fn apply_overrides(config: &mut TangencyConfig, args: &TangencyArgs) {
    if let Some(lambda) = args.regularization {
        config.regularization = lambda;
    }
    if let Some(target) = args.target_return {
        config.target_return = target;
    }
    if let Some(tol) = args.tolerance {
        config.degeneracy_tolerance = tol;
    }
    if let Some(missing) = args.missing {
        config.missing_values = missing.into();
    }
}
