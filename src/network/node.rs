//! Random variables and the records they are loaded from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::cpt::{CptHandle, CptHash};

/// Dense index of a node inside its [`NetworkModel`](super::NetworkModel). Equal to the node's
/// position in topological order.
pub type NodeId = usize;

/// How a node's table is declared in its source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSpec {
    /// Flat row-major probabilities, `|states| × Π parent cardinalities` values.
    Probabilities(Vec<f64>),
    /// One resulting state name per parent combination.
    ResultingStates(Vec<String>),
}

/// One parsed node definition, as handed over by a document loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub states: Vec<String>,
    pub parents: Vec<String>,
    pub table: TableSpec,
}

impl NodeRecord {
    pub fn probabilistic<S: Into<String>>(
        id: S,
        states: &[&str],
        parents: &[&str],
        probabilities: Vec<f64>,
    ) -> Self {
        NodeRecord {
            id: id.into(),
            states: states.iter().map(|s| s.to_string()).collect(),
            parents: parents.iter().map(|s| s.to_string()).collect(),
            table: TableSpec::Probabilities(probabilities),
        }
    }

    pub fn deterministic<S: Into<String>>(
        id: S,
        states: &[&str],
        parents: &[&str],
        resulting_states: &[&str],
    ) -> Self {
        NodeRecord {
            id: id.into(),
            states: states.iter().map(|s| s.to_string()).collect(),
            parents: parents.iter().map(|s| s.to_string()).collect(),
            table: TableSpec::ResultingStates(
                resulting_states.iter().map(|s| s.to_string()).collect(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) states: Vec<String>,
    pub(crate) state_index: HashMap<String, usize>,
    pub(crate) parents: Vec<String>,
    pub(crate) parent_ids: Vec<NodeId>,
    /// `strides[i]` is the product of the cardinalities of parents after `i`.
    pub(crate) strides: Vec<usize>,
    pub(crate) rows: usize,
    pub(crate) cpt: CptHandle,
    pub(crate) cpt_hash: CptHash,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.state_index.get(state).copied()
    }

    pub fn state_name(&self, index: usize) -> Option<&str> {
        self.states.get(index).map(String::as_str)
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn parent_ids(&self) -> &[NodeId] {
        &self.parent_ids
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Number of CPT rows, i.e. the product of parent cardinalities.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of values a replacement table must contain.
    pub fn cpt_size(&self) -> usize {
        self.rows * self.states.len()
    }

    pub fn cpt_handle(&self) -> CptHandle {
        self.cpt
    }

    pub fn cpt_hash(&self) -> &CptHash {
        &self.cpt_hash
    }

    /// Mixed-radix row index of the current parent states.
    ///
    /// `states` is a dense assignment indexed by [`NodeId`]; only the entries of this node's
    /// parents are read.
    pub fn row_index(&self, states: &[usize]) -> usize {
        self.parent_ids
            .iter()
            .zip(&self.strides)
            .map(|(&parent, &stride)| states[parent] * stride)
            .sum()
    }

    pub(crate) fn replace_cpt(&mut self, handle: CptHandle, hash: CptHash) -> CptHandle {
        self.cpt_hash = hash;
        std::mem::replace(&mut self.cpt, handle)
    }
}

/// Positional weights for the parent cardinalities, last parent varying fastest.
pub(crate) fn strides(cardinalities: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; cardinalities.len()];
    for i in (0..cardinalities.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * cardinalities[i + 1];
    }
    strides
}
