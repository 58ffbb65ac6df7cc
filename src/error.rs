use std::{io, num::ParseFloatError};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CredenceError {
    #[error("Network source error: {0}")]
    SourceLoad(String),
    #[error("Invalid query variable: '{0}' is not a node of this network")]
    InvalidQueryVariable(String),
    #[error("Invalid evidence variable: '{0}' is not a node of this network")]
    InvalidEvidenceVariable(String),
    #[error("Invalid evidence state: node '{variable}' has no state '{state}'")]
    InvalidEvidenceState { variable: String, state: String },
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
    #[error("CPT size mismatch for node '{node}': expected {expected} values, got {got}")]
    CptSizeMismatch {
        node: String,
        expected: usize,
        got: usize,
    },
    #[error("Invalid probabilities: {0}")]
    InvalidProbabilities(String),
    #[error("No sample was consistent with the evidence of '{0}'")]
    NoConsistentSamples(String),
    #[error("Sample budget must be greater than zero")]
    EmptySampleBudget,
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Sampling worker failed: {0}")]
    Worker(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl CredenceError {
    /// True for the errors raised while checking a query, before any sample is drawn.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CredenceError::InvalidQueryVariable(_)
                | CredenceError::InvalidEvidenceVariable(_)
                | CredenceError::InvalidEvidenceState { .. }
                | CredenceError::MalformedQuery(_)
                | CredenceError::EmptySampleBudget
        )
    }
}

impl From<toml::de::Error> for CredenceError {
    fn from(src: toml::de::Error) -> CredenceError {
        CredenceError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CredenceError {
    fn from(src: toml::ser::Error) -> CredenceError {
        CredenceError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for CredenceError {
    fn from(src: JsonError) -> CredenceError {
        CredenceError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<ParseFloatError> for CredenceError {
    fn from(src: ParseFloatError) -> CredenceError {
        CredenceError::InvalidProbabilities(format!("not a number: {src}"))
    }
}

impl From<io::Error> for CredenceError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CredenceError::NotFound(format!("{x}")),
            _ => CredenceError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<getrandom::Error> for CredenceError {
    fn from(x: getrandom::Error) -> Self {
        CredenceError::Worker(format!("could not seed sampler: {x}"))
    }
}
