//! Conditional probability tables and their content-addressed store.
//!
//! Tables are immutable once built. Nodes never own a [`Cpt`]; they hold a [`CptHandle`] into the
//! [`CptStore`], which keeps one copy of every distinct table and counts how many nodes point at
//! it. Two nodes declared with identical tables therefore share a single entry until one of them
//! is edited.

use std::{collections::HashMap, fmt, ops::Index};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CredenceError;

/// Maximum distance from 1.0 a CPT row may sum to.
pub const ROW_SUM_TOLERANCE: f64 = 1e-3;

/// Row-major matrix of conditional probabilities.
///
/// Row `r` is the distribution over the owning node's states for the parent combination encoded
/// by `r` (see [`Node::row_index`](super::Node::row_index)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpt {
    columns: usize,
    values: Vec<f64>,
}

impl Cpt {
    /// Build a table from flattened row-major values, checking that every row is a distribution.
    pub fn from_flat(values: Vec<f64>, columns: usize) -> Result<Self, CredenceError> {
        if columns == 0 {
            return Err(CredenceError::InvalidProbabilities(
                "a table needs at least one column".to_string(),
            ));
        }
        if values.is_empty() || values.len() % columns != 0 {
            return Err(CredenceError::InvalidProbabilities(format!(
                "{} values cannot be split into rows of {columns}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(CredenceError::InvalidProbabilities(format!(
                "probability {bad} is not a finite non-negative number"
            )));
        }
        for (row, chunk) in values.chunks(columns).enumerate() {
            let sum: f64 = chunk.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(CredenceError::InvalidProbabilities(format!(
                    "row {row} sums to {sum} (expected 1.0)"
                )));
            }
        }
        Ok(Cpt { columns, values })
    }

    /// Deterministic table: row `r` puts all of its mass on column `hot[r]`.
    pub fn one_hot(columns: usize, hot: &[usize]) -> Result<Self, CredenceError> {
        let mut values = vec![0.0; columns * hot.len()];
        for (row, &col) in hot.iter().enumerate() {
            if col >= columns {
                return Err(CredenceError::InvalidProbabilities(format!(
                    "row {row} selects column {col} of {columns}"
                )));
            }
            values[row * columns + col] = 1.0;
        }
        Cpt::from_flat(values, columns)
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.columns
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.columns;
        &self.values[start..start + self.columns]
    }

    pub fn prob(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.columns + column]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.columns)
    }

    /// SHA-256 over the row width and the little-endian bytes of every value.
    pub fn content_hash(&self) -> CptHash {
        let mut hasher = Sha256::new();
        hasher.update((self.columns as u64).to_le_bytes());
        for value in &self.values {
            hasher.update(value.to_le_bytes());
        }
        CptHash(hex::encode(hasher.finalize()))
    }
}

/// Inverse-CDF draw over one CPT row.
///
/// `u` is expected in `[0, 1)`. When rounding leaves residual mass so that no state is selected,
/// the last state is returned.
pub fn draw_state(row: &[f64], mut u: f64) -> usize {
    for (idx, &p) in row.iter().enumerate() {
        if u < p {
            return idx;
        }
        u -= p;
    }
    row.len().saturating_sub(1)
}

/// Content key of a [`Cpt`], hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CptHash(String);

impl CptHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, like a git object id.
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

/// Slot index of a table inside a [`CptStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CptHandle(usize);

impl CptHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct CptEntry {
    hash: CptHash,
    table: Cpt,
    refs: usize,
}

/// Reference-counted arena of tables keyed by content hash.
///
/// Every successful [`intern`](CptStore::intern) adds one reference; every
/// [`release`](CptStore::release) removes one. An entry is evicted, and its slot recycled, when its
/// count reaches zero.
#[derive(Debug, Clone, Default)]
pub struct CptStore {
    slots: Vec<Option<CptEntry>>,
    free: Vec<usize>,
    by_hash: HashMap<CptHash, CptHandle>,
}

impl CptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle already registered for `hash`, or store `table` under it.
    pub fn intern(&mut self, hash: CptHash, table: Cpt) -> CptHandle {
        if let Some(handle) = self.by_hash.get(&hash).copied() {
            if let Some(entry) = self.slots[handle.0].as_mut() {
                entry.refs += 1;
                tracing::debug!(
                    "[CptStore::intern] sharing table {} ({} references)",
                    entry.hash,
                    entry.refs
                );
                return handle;
            }
        }

        let entry = CptEntry {
            hash: hash.clone(),
            table,
            refs: 1,
        };
        let handle = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                CptHandle(slot)
            }
            None => {
                self.slots.push(Some(entry));
                CptHandle(self.slots.len() - 1)
            }
        };
        tracing::debug!("[CptStore::intern] new table {} in slot {}", hash, handle.0);
        self.by_hash.insert(hash, handle);
        handle
    }

    /// Drop one reference to `handle`. Returns true when the entry was evicted.
    pub fn release(&mut self, handle: CptHandle) -> bool {
        let Some(entry) = self.slots.get_mut(handle.0).and_then(Option::as_mut) else {
            tracing::warn!("[CptStore::release] handle {:?} is not live", handle);
            return false;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return false;
        }
        if let Some(entry) = self.slots[handle.0].take() {
            tracing::debug!("[CptStore::release] evicting table {}", entry.hash);
            self.by_hash.remove(&entry.hash);
            self.free.push(handle.0);
        }
        true
    }

    pub fn get(&self, handle: CptHandle) -> Option<&Cpt> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|entry| &entry.table)
    }

    pub fn handle_of(&self, hash: &CptHash) -> Option<CptHandle> {
        self.by_hash.get(hash).copied()
    }

    /// Number of nodes currently pointing at `handle` (0 for an evicted slot).
    pub fn ref_count(&self, handle: CptHandle) -> usize {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .map_or(0, |entry| entry.refs)
    }

    /// Number of live tables.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

impl Index<CptHandle> for CptStore {
    type Output = Cpt;

    fn index(&self, handle: CptHandle) -> &Cpt {
        match self.get(handle) {
            Some(table) => table,
            None => panic!("CPT handle {handle:?} does not point at a live table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn table(values: &[f64], columns: usize) -> Cpt {
        Cpt::from_flat(values.to_vec(), columns).unwrap()
    }

    #[test]
    fn test_from_flat_rejects_bad_rows() {
        assert!(Cpt::from_flat(vec![0.5, 0.4], 2).is_err());
        assert!(Cpt::from_flat(vec![1.2, -0.2], 2).is_err());
        assert!(Cpt::from_flat(vec![0.5, 0.5, 1.0], 2).is_err());
        assert!(Cpt::from_flat(vec![], 2).is_err());
        assert!(Cpt::from_flat(vec![1.0], 0).is_err());
        // Within tolerance
        assert!(Cpt::from_flat(vec![0.4995, 0.5], 2).is_ok());
    }

    #[test]
    fn test_rows_and_columns() {
        let cpt = table(&[0.8, 0.2, 0.1, 0.9], 2);
        assert_eq!(cpt.rows(), 2);
        assert_eq!(cpt.columns(), 2);
        assert_eq!(cpt.row(1), &[0.1, 0.9]);
        assert_eq!(cpt.prob(0, 1), 0.2);
        assert_eq!(cpt.iter_rows().count(), 2);
    }

    #[test]
    fn test_one_hot() {
        let cpt = Cpt::one_hot(3, &[2, 0]).unwrap();
        assert_eq!(cpt.values(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(Cpt::one_hot(2, &[2]).is_err());
    }

    #[test]
    fn test_hash_depends_on_shape_and_content() {
        let a = table(&[0.5, 0.5, 0.5, 0.5], 2);
        let b = table(&[0.5, 0.5, 0.5, 0.5], 2);
        let c = table(&[0.25, 0.25, 0.25, 0.25], 4);
        let d = table(&[0.6, 0.4, 0.5, 0.5], 2);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), d.content_hash());
        assert_ne!(table(&[1.0], 1).content_hash(), c.content_hash());
        assert_eq!(a.content_hash().as_str().len(), 64);
    }

    #[test]
    fn test_draw_state_inverse_cdf() {
        let row = [0.2, 0.5, 0.3];
        assert_eq!(draw_state(&row, 0.0), 0);
        assert_eq!(draw_state(&row, 0.19), 0);
        assert_eq!(draw_state(&row, 0.2), 1);
        assert_eq!(draw_state(&row, 0.69), 1);
        assert_eq!(draw_state(&row, 0.71), 2);
    }

    #[test]
    fn test_draw_state_residual_mass_falls_back_to_last_state() {
        let row = [0.4995, 0.5];
        assert_eq!(draw_state(&row, 0.9999), 1);
        let row = [0.3, 0.3, 0.3995];
        assert_eq!(draw_state(&row, 0.9999), 2);
    }

    #[test]
    fn test_intern_shares_and_release_evicts() {
        let mut store = CptStore::new();
        let cpt = table(&[0.3, 0.7], 2);
        let hash = cpt.content_hash();

        let first = store.intern(hash.clone(), cpt.clone());
        let second = store.intern(hash.clone(), cpt);
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(first), 2);

        assert!(!store.release(first));
        assert_eq!(store.ref_count(first), 1);
        assert!(store.release(first));
        assert_eq!(store.ref_count(first), 0);
        assert!(store.is_empty());
        assert!(store.get(first).is_none());
        assert!(store.handle_of(&hash).is_none());
    }

    #[test]
    fn test_evicted_slot_is_reused() {
        let mut store = CptStore::new();
        let a = table(&[0.3, 0.7], 2);
        let b = table(&[0.9, 0.1], 2);
        let handle_a = store.intern(a.content_hash(), a);
        store.release(handle_a);
        let handle_b = store.intern(b.content_hash(), b.clone());
        assert_eq!(handle_a.index(), handle_b.index());
        assert_eq!(store[handle_b], b);
    }
}
