//! Network module: the data model that every sampler reads.
//!
//! # Module Organization
//!
//! - [`cpt`]: Conditional probability tables and the content-addressed [`CptStore`]
//! - `node`: Random variables ([`Node`]) and the [`NodeRecord`]s they are loaded from
//! - `model`: [`NetworkModel`], loading, lookup and CPT edits
//!
//! ```rust
//! use credence_core::network::{NetworkModel, NodeRecord};
//!
//! let model = NetworkModel::load(vec![
//!     NodeRecord::probabilistic("Rain", &["T", "F"], &[], vec![0.2, 0.8]),
//!     NodeRecord::probabilistic("Wet", &["T", "F"], &["Rain"], vec![0.9, 0.1, 0.2, 0.8]),
//! ])
//! .unwrap();
//! assert_eq!(model.lookup("Wet").unwrap().row_count(), 2);
//! ```

pub mod cpt;
mod model;
mod node;


pub use cpt::{draw_state, Cpt, CptHandle, CptHash, CptStore, ROW_SUM_TOLERANCE};
pub use model::{NetworkModel, NodeSummary};
pub use node::{Node, NodeId, NodeRecord, TableSpec};
