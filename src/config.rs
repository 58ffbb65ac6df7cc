use std::{
    fs::{read_to_string, write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::CredenceError, parallel::DEFAULT_WORKERS, query::Algorithm};

/// Sampling defaults shared by the query engine and the CLI.
///
/// ```toml
/// samples = 50000
/// workers = 4
/// seed = 1234
/// algorithm = "rejection"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Sample budget used when a caller does not pass one.
    pub samples: usize,
    /// Worker threads per query. `None` means hardware parallelism minus one.
    pub workers: Option<usize>,
    /// Fixed base seed for reproducible runs. `None` draws a fresh seed per query.
    pub seed: Option<u64>,
    pub algorithm: Algorithm,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            samples: 10_000,
            workers: None,
            seed: None,
            algorithm: Algorithm::default(),
        }
    }
}

impl InferenceConfig {
    /// Read a TOML config; a missing file yields the defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CredenceError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read inference config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(InferenceConfig::default());
        }
        InferenceConfig::from_toml_str(&read_to_string(path)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CredenceError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CredenceError> {
        tracing::debug!("Writing inference config to: {:?}", path.as_ref());
        write(path, toml::to_string(self)?)?;
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(*DEFAULT_WORKERS).max(1)
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}
