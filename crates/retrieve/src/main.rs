//! Retrieve CLI - embedding-based image retrieval experiments.
//!
//! Embeds the query and gallery sets of a dataset split with an ONNX
//! encoder, ranks the gallery for every query and reports top-k accuracy.
//!
//! # Usage
//!
//! ```bash
//! # Score both ranking methods on the labelled validation split
//! retrieve evaluate --data-path dataset --model triplets
//!
//! # Rank the test split and post the submission
//! retrieve query --data-path dataset --submit --group my-team
//!
//! # Enlarge the training split with augmented copies
//! retrieve augment --data-path dataset --seed 7
//!
//! # Inspect encoders and configuration
//! retrieve models list
//! retrieve config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Retrieve - rank gallery images against queries with learned embeddings.
#[derive(Parser, Debug)]
#[command(name = "retrieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "RETRIEVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed the validation split and score pairwise and k-NN retrieval
    Evaluate(cli::evaluate::EvaluateArgs),

    /// Rank the unlabelled test split and build a submission
    Query(cli::query::QueryArgs),

    /// Write augmented copies of the training images
    Augment(cli::augment::AugmentArgs),

    /// Manage encoder files (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go to stderr directly.
    let config = match retrieve_core::Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `retrieve config path`."
            );
            retrieve_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Retrieve v{}", retrieve_core::VERSION);

    match cli.command {
        Commands::Evaluate(args) => cli::evaluate::execute(args, config).await,
        Commands::Query(args) => cli::query::execute(args, config).await,
        Commands::Augment(args) => cli::augment::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, &config).await,
        Commands::Config(args) => {
            cli::config::execute(args, &config, cli.config.as_deref()).await
        }
    }
}
