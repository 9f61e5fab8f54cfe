mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::tangency::TangencyArgs;

/// Regularized Markowitz tangency portfolio weights
#[derive(Parser)]
#[command(
    name = "frontier",
    version,
    about = "Regularized Markowitz tangency portfolio weights",
    long_about = "Computes the minimum-variance, fully invested portfolio that earns a \
                  target return, from a table of historical fund returns. The sample \
                  covariance is regularized with a small ridge before inversion."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute tangency weights for a returns table
    Tangency(TangencyArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    // stderr only; RUST_LOG=debug traces each pipeline stage
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Tangency(args) => commands::tangency::run_tangency(args),
        Commands::Version => {
            println!("frontier {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
