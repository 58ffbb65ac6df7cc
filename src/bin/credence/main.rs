//! credence CLI tool
//!
//! Command-line interface for sampling-based inference over a network file.
//!
//! ## Commands
//!
//! - `query <network> <query>`: Estimate one posterior, e.g. `'Burglary|JohnCalls=T,MaryCalls=T'`
//! - `all <network>`: Estimate every node's posterior under one evidence clause
//! - `describe <network> <node>`: Show a node's states, parents and CPT
//! - `edit <network> <node> <payload> <query>`: Replace a CPT, then run a query against the result

use clap::{Args, Parser, Subcommand};
use credence_core::{
    network::NetworkModel, Algorithm, CredenceError, InferenceConfig, QueryEngine,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "credence")]
#[command(author, version, about = "Monte-Carlo inference over discrete Bayesian networks", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SamplingArgs {
    /// Number of samples (defaults to the configured budget)
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Estimator for queries with evidence: lw or rejection
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// Fixed base seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the posterior of one query
    Query {
        /// Network file (.toml or .json)
        network: PathBuf,

        /// Query of the form `Var|E1=s1,E2=s2`
        query: String,

        #[command(flatten)]
        sampling: SamplingArgs,
    },

    /// Estimate the posterior of every node
    All {
        /// Network file (.toml or .json)
        network: PathBuf,

        /// Evidence clause of the form `E1=s1,E2=s2`
        #[arg(short, long, default_value = "")]
        evidence: String,

        #[command(flatten)]
        sampling: SamplingArgs,
    },

    /// Show a node and its table
    Describe {
        /// Network file (.toml or .json)
        network: PathBuf,

        /// Node name
        node: String,
    },

    /// Replace a node's CPT and query the edited network
    Edit {
        /// Network file (.toml or .json)
        network: PathBuf,

        /// Node name
        node: String,

        /// Whitespace-separated probabilities, row-major
        payload: String,

        /// Query to run after the edit
        query: String,

        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

impl SamplingArgs {
    fn apply(&self, mut config: InferenceConfig) -> InferenceConfig {
        if let Some(samples) = self.samples {
            config = config.with_samples(samples);
        }
        if let Some(algorithm) = self.algorithm {
            config = config.with_algorithm(algorithm);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config
    }
}

fn engine(network: &Path, config: InferenceConfig) -> Result<QueryEngine, CredenceError> {
    let model = NetworkModel::from_path(network)?;
    tracing::info!(
        "Loaded {} nodes ({} distinct tables) from {}",
        model.len(),
        model.store().len(),
        network.display()
    );
    Ok(QueryEngine::new(model, config))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => InferenceConfig::from_path(path)?,
        None => InferenceConfig::default(),
    };

    match cli.command {
        Commands::Query {
            network,
            query,
            sampling,
        } => {
            let config = sampling.apply(base);
            let engine = engine(&network, config.clone())?;
            let posterior = engine.infer(&query, config.samples, config.algorithm)?;
            println!("{posterior}");
        }

        Commands::All {
            network,
            evidence,
            sampling,
        } => {
            let config = sampling.apply(base);
            let engine = engine(&network, config.clone())?;
            for posterior in engine.infer_all(&evidence, config.samples, config.algorithm)? {
                println!("{posterior}");
            }
        }

        Commands::Describe { network, node } => {
            let engine = engine(&network, base)?;
            println!("{}", engine.describe(&node)?);
        }

        Commands::Edit {
            network,
            node,
            payload,
            query,
            sampling,
        } => {
            let config = sampling.apply(base);
            let engine = engine(&network, config.clone())?;
            engine.edit_cpt(&node, &payload)?;
            println!("{}", engine.describe(&node)?);
            let posterior = engine.infer(&query, config.samples, config.algorithm)?;
            println!("{posterior}");
        }
    }

    Ok(())
}
