//! # credence-core
//!
//! Approximate inference over discrete Bayesian networks by parallel Monte Carlo sampling.
//!
//! ## Overview
//!
//! credence-core loads a network of discrete random variables, each with a conditional probability
//! table (CPT) over its parents, and answers queries of the form `P(X | E1=e1, ..., Ek=ek)` by
//! drawing samples across worker threads and reducing their counts.
//!
//! ### Key Features
//!
//! - **Shared tables**: CPTs are content-addressed; nodes with identical tables share one copy
//!   until one of them is edited
//! - **Two estimators**: rejection sampling and likelihood weighting
//! - **Reproducible runs**: a fixed base seed plus a fixed worker count reproduces every posterior
//! - **Live edits**: CPTs can be replaced between queries without reloading the network
//! - **TOML or JSON sources**: see [`codec`]
//!
//! ## Architecture
//!
//! - **[`network`]**: nodes, CPTs and the content-addressed [`network::CptStore`]
//! - **[`sampling`]**: prior and likelihood-weighted samples of a single joint assignment
//! - **[`parallel`]**: splits a sample budget over seeded workers and merges their histograms
//! - **[`query`]**: query parsing, validation and the [`QueryEngine`]
//! - **[`codec`]**: network source documents
//! - **[`config`]**: [`InferenceConfig`] sampling defaults
//!
//! Control flows from [`QueryEngine`] (validation) to [`parallel::ParallelAggregator`] (fan-out)
//! to [`sampling::SamplingEngine`] (one sample at a time) and back as a normalized [`Posterior`].
//!
//! ## Quick Start
//!
//! ```rust
//! use credence_core::{InferenceConfig, NodeRecord, QueryEngine};
//!
//! let engine = QueryEngine::from_records(
//!     vec![
//!         NodeRecord::probabilistic("Rain", &["T", "F"], &[], vec![0.2, 0.8]),
//!         NodeRecord::probabilistic("Wet", &["T", "F"], &["Rain"], vec![0.9, 0.1, 0.2, 0.8]),
//!     ],
//!     InferenceConfig::default().with_seed(7),
//! )?;
//!
//! let posterior = engine.infer_likelihood_weighting("Rain|Wet=T", 20_000)?;
//! assert!((posterior.sum() - 1.0).abs() < 1e-9);
//! println!("{posterior}");
//!
//! // Editing a table affects every later query
//! engine.edit_cpt("Rain", "0.5 0.5")?;
//! # Ok::<(), credence_core::CredenceError>(())
//! ```
//!
//! ### Loading From a File
//!
//! ```rust,no_run
//! use credence_core::{network::NetworkModel, InferenceConfig, QueryEngine};
//!
//! let model = NetworkModel::from_path("alarm.toml")?;
//! let engine = QueryEngine::new(model, InferenceConfig::from_path("credence.toml")?);
//! for posterior in engine.infer_all("JohnCalls=T,MaryCalls=T", 50_000, Default::default())? {
//!     println!("{posterior}");
//! }
//! # Ok::<(), credence_core::CredenceError>(())
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `credence` command line tool (`clap`, `tracing-subscriber`)

pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod parallel;
pub mod query;
pub mod sampling;

pub use config::InferenceConfig;
pub use error::*;
pub use network::{NetworkModel, NodeRecord};
pub use query::{Algorithm, Posterior, Query, QueryEngine};
