use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::{
    error::CredenceError,
    network::{NodeRecord, TableSpec},
};

/// A network source file: an ordered list of node declarations.
///
/// In TOML each node is a `[[node]]` table; in JSON the document is `{"node": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkDocument {
    #[serde(rename = "node", default)]
    pub nodes: Vec<DocumentNode>,
}

/// One node as written in a source file. Exactly one of `probabilities` and `resulting_states`
/// must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub states: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ProbabilityList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_states: Option<Vec<String>>,
}

/// Row-major CPT values, either as numbers or as one whitespace-separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbabilityList {
    Values(Vec<f64>),
    Text(String),
}

impl ProbabilityList {
    pub fn to_values(&self) -> Result<Vec<f64>, CredenceError> {
        match self {
            ProbabilityList::Values(values) => Ok(values.clone()),
            ProbabilityList::Text(text) => parse_probabilities(text),
        }
    }
}

/// Parse `"0.9 0.1\n0.2 0.8"` style payloads. Any whitespace separates values.
pub fn parse_probabilities(text: &str) -> Result<Vec<f64>, CredenceError> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                CredenceError::InvalidProbabilities(format!("'{token}' is not a number"))
            })
        })
        .collect()
}

fn source_error(format: &str, err: impl std::fmt::Display) -> CredenceError {
    CredenceError::SourceLoad(format!("invalid {format} network document: {err}"))
}

impl NetworkDocument {
    pub fn from_toml_str(content: &str) -> Result<Self, CredenceError> {
        toml::from_str(content).map_err(|e| source_error("TOML", e))
    }

    pub fn from_json_str(content: &str) -> Result<Self, CredenceError> {
        serde_json::from_str(content).map_err(|e| source_error("JSON", e))
    }

    /// Format is detected by fallback: JSON first, then TOML.
    pub fn from_str_detect(content: &str) -> Result<Self, CredenceError> {
        NetworkDocument::from_json_str(content).or_else(|_| NetworkDocument::from_toml_str(content))
    }

    /// Load by extension (`.toml`, `.json`); any other extension goes through
    /// [`from_str_detect`](NetworkDocument::from_str_detect).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CredenceError> {
        let path = path.as_ref();
        tracing::debug!("Reading network document: {:?}", path);
        let content = read_to_string(path).map_err(|e| {
            CredenceError::SourceLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => NetworkDocument::from_toml_str(&content),
            Some("json") => NetworkDocument::from_json_str(&content),
            _ => NetworkDocument::from_str_detect(&content),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, CredenceError> {
        Ok(toml::to_string(self)?)
    }

    /// Convert to records in document order. Structural checks (parents, sizes, sums) happen
    /// when the records are loaded into a model.
    pub fn into_records(self) -> Result<Vec<NodeRecord>, CredenceError> {
        self.nodes
            .into_iter()
            .map(|node| {
                let table = match (node.probabilities, node.resulting_states) {
                    (Some(list), None) => {
                        TableSpec::Probabilities(list.to_values().map_err(|e| {
                            CredenceError::SourceLoad(format!("node '{}': {e}", node.id))
                        })?)
                    }
                    (None, Some(states)) => TableSpec::ResultingStates(states),
                    (Some(_), Some(_)) => {
                        return Err(CredenceError::SourceLoad(format!(
                            "node '{}' declares both probabilities and resulting_states",
                            node.id
                        )))
                    }
                    (None, None) => {
                        return Err(CredenceError::SourceLoad(format!(
                            "node '{}' declares neither probabilities nor resulting_states",
                            node.id
                        )))
                    }
                };
                Ok(NodeRecord {
                    id: node.id,
                    states: node.states,
                    parents: node.parents,
                    table,
                })
            })
            .collect()
    }
}

impl From<&NodeRecord> for DocumentNode {
    fn from(record: &NodeRecord) -> Self {
        let (probabilities, resulting_states) = match &record.table {
            TableSpec::Probabilities(values) => (Some(ProbabilityList::Values(values.clone())), None),
            TableSpec::ResultingStates(states) => (None, Some(states.clone())),
        };
        DocumentNode {
            id: record.id.clone(),
            states: record.states.clone(),
            parents: record.parents.clone(),
            probabilities,
            resulting_states,
        }
    }
}

impl FromIterator<NodeRecord> for NetworkDocument {
    fn from_iter<T: IntoIterator<Item = NodeRecord>>(iter: T) -> Self {
        NetworkDocument {
            nodes: iter.into_iter().map(|record| DocumentNode::from(&record)).collect(),
        }
    }
}
