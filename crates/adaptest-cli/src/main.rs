//! adaptest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Adaptive testing simulation harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of simulated CAT sessions
    Simulate {
        /// Path to the item bank TOML
        #[arg(long)]
        bank: PathBuf,

        /// Test configuration TOML (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of simulated sessions
        #[arg(long, default_value = "100")]
        sessions: usize,

        /// RNG seed for true thetas and responses
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Override the configured worker count
        #[arg(long)]
        workers: Option<usize>,

        /// Mean of the generating theta distribution
        #[arg(long, default_value = "0.0")]
        theta_mean: f64,

        /// Standard deviation of the generating theta distribution
        #[arg(long, default_value = "1.0")]
        theta_sd: f64,

        /// Write the full JSON report here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate an item bank and optional configuration
    Validate {
        /// Path to the item bank TOML
        #[arg(long)]
        bank: PathBuf,

        /// Test configuration TOML
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and example item bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adaptest=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            bank,
            config,
            sessions,
            seed,
            workers,
            theta_mean,
            theta_sd,
            output,
        } => {
            commands::simulate::execute(
                bank, config, sessions, seed, workers, theta_mean, theta_sd, output,
            )
            .await
        }
        Commands::Validate { bank, config } => commands::validate::execute(bank, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
