//! Forward sampling over a [`NetworkModel`].
//!
//! Both samplers walk the nodes once in topological order, so every parent state is already set
//! when a child's CPT row is selected. Assignments are dense (one state index per [`NodeId`]);
//! names only appear at the API boundary via [`Assignment::to_named`].

use std::collections::BTreeMap;

use rand::Rng;

use crate::{
    error::CredenceError,
    network::{draw_state, NetworkModel, NodeId},
};

/// One joint assignment: `states[node_id]` is the index of the state chosen for that node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment(Vec<usize>);

impl Assignment {
    pub fn for_model(model: &NetworkModel) -> Self {
        Assignment(vec![0; model.len()])
    }

    pub fn state(&self, node: NodeId) -> usize {
        self.0[node]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// State name chosen for `name`, if the node exists.
    pub fn get<'m>(&self, model: &'m NetworkModel, name: &str) -> Option<&'m str> {
        let id = model.node_id(name)?;
        model.node(id).state_name(self.0[id])
    }

    /// True when every evidence term matches this assignment.
    pub fn agrees_with(&self, evidence: &Evidence) -> bool {
        evidence
            .terms
            .iter()
            .all(|&(node, state)| self.0[node] == state)
    }

    pub fn to_named(&self, model: &NetworkModel) -> BTreeMap<String, String> {
        model
            .nodes()
            .iter()
            .filter_map(|node| {
                node.state_name(self.0[node.id()])
                    .map(|state| (node.name().to_string(), state.to_string()))
            })
            .collect()
    }

    fn reset(&mut self, len: usize) {
        self.0.clear();
        self.0.resize(len, 0);
    }
}

/// Observed node states, resolved against one model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evidence {
    terms: Vec<(NodeId, usize)>,
    forced: Vec<Option<usize>>,
}

impl Evidence {
    /// Resolve `(variable, state)` name pairs.
    ///
    /// Fails with [`CredenceError::InvalidEvidenceVariable`] for an unknown node and
    /// [`CredenceError::InvalidEvidenceState`] for a state the node does not declare. Every
    /// variable name is checked before any state.
    pub fn resolve<I, K, V>(model: &NetworkModel, terms: I) -> Result<Self, CredenceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let named: Vec<(K, V)> = terms.into_iter().collect();
        let ids = named
            .iter()
            .map(|(variable, _)| {
                model.node_id(variable.as_ref()).ok_or_else(|| {
                    CredenceError::InvalidEvidenceVariable(variable.as_ref().to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut evidence = Evidence {
            terms: Vec::with_capacity(named.len()),
            forced: vec![None; model.len()],
        };
        for ((variable, state), id) in named.iter().zip(ids) {
            let index = model.node(id).state_index(state.as_ref()).ok_or_else(|| {
                CredenceError::InvalidEvidenceState {
                    variable: variable.as_ref().to_string(),
                    state: state.as_ref().to_string(),
                }
            })?;
            evidence.terms.push((id, index));
            evidence.forced[id] = Some(index);
        }
        Ok(evidence)
    }

    pub fn forced(&self, node: NodeId) -> Option<usize> {
        self.forced.get(node).copied().flatten()
    }

    pub fn terms(&self) -> &[(NodeId, usize)] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Draws joint samples from a model. Holds no state of its own, so one engine can be shared by
/// every worker thread as long as each brings its own RNG.
#[derive(Debug, Clone, Copy)]
pub struct SamplingEngine<'a> {
    model: &'a NetworkModel,
}

impl<'a> SamplingEngine<'a> {
    pub fn new(model: &'a NetworkModel) -> Self {
        SamplingEngine { model }
    }

    pub fn model(&self) -> &'a NetworkModel {
        self.model
    }

    pub fn prior_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Assignment {
        let mut out = Assignment::for_model(self.model);
        self.prior_sample_into(rng, &mut out);
        out
    }

    /// Prior sample written into `out`, reusing its allocation.
    pub fn prior_sample_into<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Assignment) {
        out.reset(self.model.len());
        for node in self.model.nodes() {
            let row = self.model.cpt(node).row(node.row_index(&out.0));
            out.0[node.id()] = draw_state(row, rng.gen::<f64>());
        }
    }

    /// Sample with `evidence` nodes clamped, returning the likelihood weight of the clamping.
    pub fn weighted_sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        evidence: &Evidence,
    ) -> (Assignment, f64) {
        let mut out = Assignment::for_model(self.model);
        let weight = self.weighted_sample_into(rng, evidence, &mut out);
        (out, weight)
    }

    pub fn weighted_sample_into<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        evidence: &Evidence,
        out: &mut Assignment,
    ) -> f64 {
        out.reset(self.model.len());
        let mut weight = 1.0;
        for node in self.model.nodes() {
            let cpt = self.model.cpt(node);
            let row = node.row_index(&out.0);
            out.0[node.id()] = match evidence.forced(node.id()) {
                Some(state) => {
                    weight *= cpt.prob(row, state);
                    state
                }
                None => draw_state(cpt.row(row), rng.gen::<f64>()),
            };
        }
        weight
    }
}
