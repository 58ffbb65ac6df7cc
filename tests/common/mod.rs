//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use credence_core::{InferenceConfig, NodeRecord, QueryEngine};
use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// `A -> B` with P(A=T) = 0.3, P(B=T | A=T) = 0.8 and P(B=T | A=F) = 0.1.
#[allow(dead_code)]
pub fn chain_records() -> Vec<NodeRecord> {
    vec![
        NodeRecord::probabilistic("A", &["T", "F"], &[], vec![0.3, 0.7]),
        NodeRecord::probabilistic("B", &["T", "F"], &["A"], vec![0.8, 0.2, 0.1, 0.9]),
    ]
}

/// Cloudy/Sprinkler/Rain/WetGrass. Exact posteriors given WetGrass=T:
/// P(Rain=T) = 0.7079, P(Sprinkler=T) = 0.4298.
#[allow(dead_code)]
pub fn sprinkler_records() -> Vec<NodeRecord> {
    vec![
        NodeRecord::probabilistic("Cloudy", &["T", "F"], &[], vec![0.5, 0.5]),
        NodeRecord::probabilistic("Sprinkler", &["T", "F"], &["Cloudy"], vec![0.1, 0.9, 0.5, 0.5]),
        NodeRecord::probabilistic("Rain", &["T", "F"], &["Cloudy"], vec![0.8, 0.2, 0.2, 0.8]),
        NodeRecord::probabilistic(
            "WetGrass",
            &["T", "F"],
            &["Sprinkler", "Rain"],
            vec![0.99, 0.01, 0.9, 0.1, 0.9, 0.1, 0.0, 1.0],
        ),
    ]
}

/// Engine with a fixed seed and worker count, so every run is reproducible.
#[allow(dead_code)]
pub fn seeded_engine(records: Vec<NodeRecord>) -> QueryEngine {
    QueryEngine::from_records(records, InferenceConfig::default().with_seed(2024).with_workers(3))
        .unwrap()
}

/// Write `content` to `<temp_dir>/<name>` and return the path.
#[allow(dead_code)]
pub fn write_network(temp_dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}
