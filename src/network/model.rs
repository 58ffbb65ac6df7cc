use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::Path,
};

use petgraph::{algo::toposort, graph::DiGraph};
use serde::Serialize;

use super::{
    cpt::{Cpt, CptHash, CptStore},
    node::{strides, Node, NodeId, NodeRecord, TableSpec},
};
use crate::{codec::NetworkDocument, error::CredenceError};

/// An ordered set of nodes, their name index, and the store that owns their tables.
///
/// `nodes` is always in topological order and a node's [`NodeId`] is its position in it, so a
/// single forward pass visits every parent before its children.
#[derive(Debug, Clone, Default)]
pub struct NetworkModel {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    store: CptStore,
}

fn load_error(node: &str, msg: impl fmt::Display) -> CredenceError {
    CredenceError::SourceLoad(format!("node '{node}': {msg}"))
}

/// Positions of `records` in an order where every parent precedes its children.
///
/// File order is kept when it already satisfies that. Otherwise the records are reordered, and a
/// cycle is reported as a load error.
fn topological_order(records: &[NodeRecord]) -> Result<Vec<usize>, CredenceError> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        if positions.insert(record.id.as_str(), idx).is_some() {
            return Err(load_error(&record.id, "declared more than once"));
        }
    }

    let mut in_order = true;
    for (idx, record) in records.iter().enumerate() {
        let mut seen = HashSet::with_capacity(record.parents.len());
        for parent in &record.parents {
            if !seen.insert(parent.as_str()) {
                return Err(load_error(
                    &record.id,
                    format!("parent '{parent}' listed twice"),
                ));
            }
            match positions.get(parent.as_str()) {
                None => {
                    return Err(load_error(
                        &record.id,
                        format!("unknown parent '{parent}'"),
                    ))
                }
                Some(&pos) if pos >= idx => in_order = false,
                Some(_) => {}
            }
        }
    }
    if in_order {
        return Ok((0..records.len()).collect());
    }

    let mut graph = DiGraph::<usize, ()>::with_capacity(records.len(), records.len());
    let vertices: Vec<_> = (0..records.len()).map(|idx| graph.add_node(idx)).collect();
    for (idx, record) in records.iter().enumerate() {
        for parent in &record.parents {
            graph.add_edge(vertices[positions[parent.as_str()]], vertices[idx], ());
        }
    }
    match toposort(&graph, None) {
        Ok(order) => {
            tracing::warn!(
                "Network records are not in topological order, loading them reordered"
            );
            Ok(order.into_iter().map(|vertex| graph[vertex]).collect())
        }
        Err(cycle) => Err(load_error(
            &records[graph[cycle.node_id()]].id,
            "is part of a dependency cycle",
        )),
    }
}

impl NetworkModel {
    /// Build a model from parsed node records.
    ///
    /// Either every record loads or an error is returned; no partially built model escapes.
    pub fn load<I>(records: I) -> Result<Self, CredenceError>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        let records: Vec<NodeRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Err(CredenceError::SourceLoad(
                "network defines no nodes".to_string(),
            ));
        }
        let order = topological_order(&records)?;

        let mut slots: Vec<Option<NodeRecord>> = records.into_iter().map(Some).collect();
        let mut model = NetworkModel::default();
        for idx in order {
            if let Some(record) = slots[idx].take() {
                model.push(record)?;
            }
        }

        tracing::info!(
            "Loaded network with {} nodes backed by {} distinct CPTs",
            model.nodes.len(),
            model.store.len()
        );
        Ok(model)
    }

    /// Load a TOML or JSON network document.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CredenceError> {
        let records = NetworkDocument::from_path(path)?.into_records()?;
        NetworkModel::load(records)
    }

    fn push(&mut self, record: NodeRecord) -> Result<(), CredenceError> {
        let NodeRecord {
            id,
            states,
            parents,
            table,
        } = record;

        if states.is_empty() {
            return Err(load_error(&id, "declares no states"));
        }
        let mut state_index = HashMap::with_capacity(states.len());
        for (idx, state) in states.iter().enumerate() {
            if state_index.insert(state.clone(), idx).is_some() {
                return Err(load_error(&id, format!("state '{state}' declared twice")));
            }
        }

        let parent_ids = parents
            .iter()
            .map(|parent| {
                self.index
                    .get(parent)
                    .copied()
                    .ok_or_else(|| load_error(&id, format!("parent '{parent}' is not loaded yet")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let cardinalities: Vec<usize> = parent_ids
            .iter()
            .map(|&parent| self.nodes[parent].cardinality())
            .collect();
        let rows = cardinalities
            .iter()
            .try_fold(1usize, |acc, &card| acc.checked_mul(card))
            .ok_or_else(|| load_error(&id, "too many parent combinations"))?;

        let table = match table {
            TableSpec::Probabilities(values) => {
                let expected = rows
                    .checked_mul(states.len())
                    .ok_or_else(|| load_error(&id, "too many parent combinations"))?;
                if values.len() != expected {
                    return Err(load_error(
                        &id,
                        format!(
                            "expected {expected} probabilities ({} states x {rows} parent combinations), found {}",
                            states.len(),
                            values.len()
                        ),
                    ));
                }
                Cpt::from_flat(values, states.len())
            }
            TableSpec::ResultingStates(resulting) => {
                if resulting.len() != rows {
                    return Err(load_error(
                        &id,
                        format!(
                            "expected {rows} resulting states, found {}",
                            resulting.len()
                        ),
                    ));
                }
                let hot = resulting
                    .iter()
                    .map(|state| {
                        state_index.get(state).copied().ok_or_else(|| {
                            load_error(&id, format!("unknown resulting state '{state}'"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Cpt::one_hot(states.len(), &hot)
            }
        }
        .map_err(|err| load_error(&id, err))?;

        let cpt_hash = table.content_hash();
        let cpt = self.store.intern(cpt_hash.clone(), table);
        let node_id = self.nodes.len();
        tracing::debug!("Registered node '{}' as #{} with CPT {}", id, node_id, cpt_hash);

        self.index.insert(id.clone(), node_id);
        self.nodes.push(Node {
            id: node_id,
            name: id,
            states,
            state_index,
            parents,
            parent_ids,
            strides: strides(&cardinalities),
            rows,
            cpt,
            cpt_hash,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Node, CredenceError> {
        self.node_id(name)
            .map(|id| &self.nodes[id])
            .ok_or_else(|| CredenceError::NotFound(format!("node '{name}'")))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn store(&self) -> &CptStore {
        &self.store
    }

    pub fn cpt(&self, node: &Node) -> &Cpt {
        &self.store[node.cpt]
    }

    /// Replace the table of `name` with `values` (row-major).
    ///
    /// A payload of the wrong length is rejected with [`CredenceError::CptSizeMismatch`] and leaves
    /// the model untouched. Nodes that shared the previous table keep it.
    pub fn edit_cpt(&mut self, name: &str, values: &[f64]) -> Result<(), CredenceError> {
        let id = self
            .node_id(name)
            .ok_or_else(|| CredenceError::NotFound(format!("node '{name}'")))?;
        let node = &self.nodes[id];
        let expected = node.cpt_size();
        if values.len() != expected {
            return Err(CredenceError::CptSizeMismatch {
                node: name.to_string(),
                expected,
                got: values.len(),
            });
        }

        let table = Cpt::from_flat(values.to_vec(), node.cardinality())?;
        let hash = table.content_hash();
        let handle = self.store.intern(hash.clone(), table);
        let previous = self.nodes[id].replace_cpt(handle, hash);
        let evicted = self.store.release(previous);
        tracing::info!(
            "Edited CPT of '{}' (now {}, previous table {})",
            name,
            self.nodes[id].cpt_hash,
            if evicted { "evicted" } else { "still shared" }
        );
        Ok(())
    }

    pub fn describe(&self, name: &str) -> Result<NodeSummary, CredenceError> {
        let node = self.lookup(name)?;
        Ok(NodeSummary {
            name: node.name.clone(),
            states: node.states.clone(),
            parents: node.parents.clone(),
            rows: self.cpt(node).iter_rows().map(<[f64]>::to_vec).collect(),
            cpt_hash: node.cpt_hash.clone(),
            shared_by: self.store.ref_count(node.cpt),
        })
    }
}

/// Printable view of one node and its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub states: Vec<String>,
    pub parents: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub cpt_hash: CptHash,
    /// Number of nodes referencing the same table, this one included.
    pub shared_by: usize,
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node: {}", self.name)?;
        writeln!(f, "States: {}", self.states.join(", "))?;
        if self.parents.is_empty() {
            writeln!(f, "Parents: (none)")?;
        } else {
            writeln!(f, "Parents: {}", self.parents.join(", "))?;
        }
        writeln!(f, "CPT {} shared by {} node(s)", self.cpt_hash, self.shared_by)?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|p| p.to_string()).collect();
            writeln!(f, "  [{}]", cells.join(" "))?;
        }
        Ok(())
    }
}
