//! Query parsing and the sampling estimators.
//!
//! A query names one variable and, optionally, the evidence it is conditioned on:
//!
//! ```text
//! Burglary|JohnCalls=True,MaryCalls=True
//! Burglary
//! ```
//!
//! Everything a query references is checked against the model before a single sample is drawn.

use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

use crate::{
    codec::parse_probabilities,
    config::InferenceConfig,
    error::CredenceError,
    network::{NetworkModel, NodeId, NodeRecord, NodeSummary},
    parallel::{entropy_seed, Histogram, ParallelAggregator},
    sampling::{Assignment, Evidence, SamplingEngine},
};

/// Estimator used for queries that carry evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    LikelihoodWeighting,
    Rejection,
}

impl FromStr for Algorithm {
    type Err = CredenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lw" | "likelihood" | "likelihood_weighting" | "likelihood-weighting" => {
                Ok(Algorithm::LikelihoodWeighting)
            }
            "rs" | "rejection" | "rejection_sampling" | "rejection-sampling" => {
                Ok(Algorithm::Rejection)
            }
            other => Err(CredenceError::Serialization(format!(
                "unknown algorithm '{other}' (expected 'lw' or 'rejection')"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::LikelihoodWeighting => write!(f, "likelihood weighting"),
            Algorithm::Rejection => write!(f, "rejection sampling"),
        }
    }
}

/// A parsed `<Var>|<E1>=<s1>,<E2>=<s2>` query. Names are not checked until it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub variable: String,
    pub evidence: Vec<(String, String)>,
}

impl Query {
    pub fn marginal<S: Into<String>>(variable: S) -> Self {
        Query {
            variable: variable.into(),
            evidence: Vec::new(),
        }
    }

    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }
}

fn parse_evidence(clause: &str) -> Result<Vec<(String, String)>, CredenceError> {
    let mut evidence: Vec<(String, String)> = Vec::new();
    for term in clause.split(',') {
        let Some((variable, state)) = term.split_once('=') else {
            return Err(CredenceError::MalformedQuery(format!(
                "evidence term '{}' is not of the form Variable=State",
                term.trim()
            )));
        };
        let (variable, state) = (variable.trim(), state.trim());
        if variable.is_empty() || state.is_empty() || state.contains('=') {
            return Err(CredenceError::MalformedQuery(format!(
                "evidence term '{}' is not of the form Variable=State",
                term.trim()
            )));
        }
        if evidence.iter().any(|(seen, _)| seen == variable) {
            return Err(CredenceError::MalformedQuery(format!(
                "evidence variable '{variable}' appears more than once"
            )));
        }
        evidence.push((variable.to_string(), state.to_string()));
    }
    Ok(evidence)
}

impl FromStr for Query {
    type Err = CredenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        let variable = parts.next().unwrap_or_default().trim();
        if variable.is_empty() {
            return Err(CredenceError::MalformedQuery(format!(
                "'{s}' has no query variable"
            )));
        }
        let evidence = match (parts.next(), parts.next()) {
            (None, _) => Vec::new(),
            (Some(clause), None) if clause.trim().is_empty() => {
                return Err(CredenceError::MalformedQuery(format!(
                    "'{s}' has an empty evidence clause"
                )))
            }
            (Some(clause), None) => parse_evidence(clause)?,
            (Some(_), Some(_)) => {
                return Err(CredenceError::MalformedQuery(format!(
                    "'{s}' contains more than one '|'"
                )))
            }
        };
        Ok(Query {
            variable: variable.to_string(),
            evidence,
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable)?;
        for (idx, (variable, state)) in self.evidence.iter().enumerate() {
            let sep = if idx == 0 { '|' } else { ',' };
            write!(f, "{sep}{variable}={state}")?;
        }
        Ok(())
    }
}

/// Estimated distribution of a query variable, in its state-declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posterior {
    pub query: String,
    pub states: Vec<String>,
    pub probabilities: Vec<f64>,
}

impl Posterior {
    pub fn probability(&self, state: &str) -> Option<f64> {
        self.states
            .iter()
            .position(|s| s == state)
            .map(|idx| self.probabilities[idx])
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }
}

impl fmt::Display for Posterior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.probabilities.iter().map(|p| p.to_string()).collect();
        write!(f, "P({}) = <{}>", self.query, cells.join(","))
    }
}

/// A query checked against the model it is about to run on.
struct Resolved {
    query: Query,
    target: NodeId,
    evidence: Evidence,
}

/// Entry point for inference over one network.
///
/// The model lives behind a reader/writer lock: queries hold the read side for their whole
/// duration and [`edit_cpt`](QueryEngine::edit_cpt) takes the write side, so an edit never lands in
/// the middle of a query. Clones share the same model and counters.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    model: Arc<RwLock<NetworkModel>>,
    config: InferenceConfig,
    samples_drawn: Arc<AtomicU64>,
}

impl QueryEngine {
    pub fn new(model: NetworkModel, config: InferenceConfig) -> Self {
        QueryEngine {
            model: Arc::new(RwLock::new(model)),
            config,
            samples_drawn: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_records<I>(records: I, config: InferenceConfig) -> Result<Self, CredenceError>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        Ok(QueryEngine::new(NetworkModel::load(records)?, config))
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn model(&self) -> RwLockReadGuard<'_, NetworkModel> {
        self.model.read()
    }

    /// Total samples drawn by every query run through this engine (and its clones).
    pub fn samples_drawn(&self) -> u64 {
        self.samples_drawn.load(Ordering::Relaxed)
    }

    /// Marginal of `variable`, no evidence.
    pub fn infer_prior(&self, variable: &str, samples: usize) -> Result<Posterior, CredenceError> {
        let model = self.model.read();
        let resolved = resolve(&model, Query::marginal(variable.trim()), samples)?;
        self.simple_sampling(&model, &resolved, samples)
    }

    pub fn infer_rejection(&self, query: &str, samples: usize) -> Result<Posterior, CredenceError> {
        self.infer(query, samples, Algorithm::Rejection)
    }

    pub fn infer_likelihood_weighting(
        &self,
        query: &str,
        samples: usize,
    ) -> Result<Posterior, CredenceError> {
        self.infer(query, samples, Algorithm::LikelihoodWeighting)
    }

    /// Run `query` with `algorithm`; queries without evidence use plain prior sampling.
    pub fn infer(
        &self,
        query: &str,
        samples: usize,
        algorithm: Algorithm,
    ) -> Result<Posterior, CredenceError> {
        let query: Query = query.parse()?;
        let model = self.model.read();
        self.run(&model, query, samples, algorithm)
    }

    /// Posterior of every node given one shared evidence clause (`"A=T,B=F"`, or empty for
    /// marginals), in topological order. Stops at the first failing node.
    pub fn infer_all(
        &self,
        evidence: &str,
        samples: usize,
        algorithm: Algorithm,
    ) -> Result<Vec<Posterior>, CredenceError> {
        let evidence = if evidence.trim().is_empty() {
            Vec::new()
        } else {
            parse_evidence(evidence)?
        };
        let model = self.model.read();
        let names: Vec<String> = model.nodes().iter().map(|n| n.name().to_string()).collect();
        names
            .into_iter()
            .map(|variable| {
                let query = Query {
                    variable,
                    evidence: evidence.clone(),
                };
                self.run(&model, query, samples, algorithm)
            })
            .collect()
    }

    /// Replace a node's CPT from a whitespace-separated, row-major list of probabilities.
    pub fn edit_cpt(&self, node: &str, payload: &str) -> Result<(), CredenceError> {
        let values = parse_probabilities(payload)?;
        self.edit_cpt_values(node, &values)
    }

    pub fn edit_cpt_values(&self, node: &str, values: &[f64]) -> Result<(), CredenceError> {
        self.model.write().edit_cpt(node, values)
    }

    pub fn describe(&self, node: &str) -> Result<NodeSummary, CredenceError> {
        self.model.read().describe(node)
    }

    fn run(
        &self,
        model: &NetworkModel,
        query: Query,
        samples: usize,
        algorithm: Algorithm,
    ) -> Result<Posterior, CredenceError> {
        let resolved = resolve(model, query, samples)?;
        if !resolved.query.has_evidence() {
            return self.simple_sampling(model, &resolved, samples);
        }
        match algorithm {
            Algorithm::Rejection => self.rejection_sampling(model, &resolved, samples),
            Algorithm::LikelihoodWeighting => {
                self.likelihood_weighting(model, &resolved, samples)
            }
        }
    }

    fn aggregator(&self) -> Result<ParallelAggregator, CredenceError> {
        let seed = match self.config.seed {
            Some(seed) => seed,
            None => entropy_seed()?,
        };
        Ok(ParallelAggregator::new(self.config.worker_count(), seed))
    }

    fn record(&self, hist: &Histogram) {
        self.samples_drawn.fetch_add(hist.drawn(), Ordering::Relaxed);
    }

    fn simple_sampling(
        &self,
        model: &NetworkModel,
        resolved: &Resolved,
        samples: usize,
    ) -> Result<Posterior, CredenceError> {
        let engine = SamplingEngine::new(model);
        let target = resolved.target;
        let hist = self.aggregator()?.run(
            samples,
            model.node(target).cardinality(),
            || Assignment::for_model(model),
            |scratch, rng, hist| {
                engine.prior_sample_into(rng, scratch);
                hist.add(scratch.state(target), 1.0);
            },
        )?;
        self.record(&hist);
        let probabilities = hist.normalized().ok_or_else(|| {
            CredenceError::Worker(format!("no samples recorded for '{}'", resolved.query))
        })?;
        Ok(posterior(model, resolved, probabilities))
    }

    fn rejection_sampling(
        &self,
        model: &NetworkModel,
        resolved: &Resolved,
        samples: usize,
    ) -> Result<Posterior, CredenceError> {
        let engine = SamplingEngine::new(model);
        let (target, evidence) = (resolved.target, &resolved.evidence);
        let hist = self.aggregator()?.run(
            samples,
            model.node(target).cardinality(),
            || Assignment::for_model(model),
            |scratch, rng, hist| {
                engine.prior_sample_into(rng, scratch);
                if scratch.agrees_with(evidence) {
                    hist.add(scratch.state(target), 1.0);
                }
            },
        )?;
        self.record(&hist);
        tracing::debug!(
            "[QueryEngine::rejection_sampling] {}: kept {} of {} samples",
            resolved.query,
            hist.total(),
            hist.drawn()
        );
        let probabilities = hist
            .normalized()
            .ok_or_else(|| CredenceError::NoConsistentSamples(resolved.query.to_string()))?;
        Ok(posterior(model, resolved, probabilities))
    }

    fn likelihood_weighting(
        &self,
        model: &NetworkModel,
        resolved: &Resolved,
        samples: usize,
    ) -> Result<Posterior, CredenceError> {
        let engine = SamplingEngine::new(model);
        let (target, evidence) = (resolved.target, &resolved.evidence);
        let cardinality = model.node(target).cardinality();
        let hist = self.aggregator()?.run(
            samples,
            cardinality,
            || Assignment::for_model(model),
            |scratch, rng, hist| {
                let weight = engine.weighted_sample_into(rng, evidence, scratch);
                hist.add(scratch.state(target), weight);
            },
        )?;
        self.record(&hist);
        let probabilities = match hist.normalized() {
            Some(probabilities) => probabilities,
            None => {
                tracing::warn!(
                    "[QueryEngine::likelihood_weighting] evidence of '{}' has zero likelihood, \
                     returning a uniform distribution",
                    resolved.query
                );
                vec![1.0 / cardinality as f64; cardinality]
            }
        };
        Ok(posterior(model, resolved, probabilities))
    }
}

/// Check every name in `query` against `model`. Runs before any sampling.
fn resolve(model: &NetworkModel, query: Query, samples: usize) -> Result<Resolved, CredenceError> {
    let target = model
        .node_id(&query.variable)
        .ok_or_else(|| CredenceError::InvalidQueryVariable(query.variable.clone()))?;
    let evidence = Evidence::resolve(
        model,
        query
            .evidence
            .iter()
            .map(|(variable, state)| (variable.as_str(), state.as_str())),
    )?;
    if samples == 0 {
        return Err(CredenceError::EmptySampleBudget);
    }
    tracing::debug!("Resolved query '{}' for {} samples", query, samples);
    Ok(Resolved {
        query,
        target,
        evidence,
    })
}

fn posterior(model: &NetworkModel, resolved: &Resolved, probabilities: Vec<f64>) -> Posterior {
    Posterior {
        query: resolved.query.to_string(),
        states: model.node(resolved.target).states().to_vec(),
        probabilities,
    }
}
