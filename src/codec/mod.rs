//! Network source documents.
//!
//! A network file lists its nodes in order. Each node names its states and parents and gives its
//! CPT either as probabilities (row-major, one row per parent combination with the last parent
//! varying fastest) or as the resulting state of a deterministic node for each combination.
//!
//! ```toml
//! [[node]]
//! id = "Rain"
//! states = ["T", "F"]
//! probabilities = [0.2, 0.8]
//!
//! [[node]]
//! id = "WetGrass"
//! states = ["T", "F"]
//! parents = ["Rain"]
//! probabilities = "0.9 0.1 0.05 0.95"
//!
//! [[node]]
//! id = "Puddle"
//! states = ["T", "F"]
//! parents = ["Rain"]
//! resulting_states = ["T", "F"]
//! ```
//!
//! The same structure is accepted as JSON (`{"node": [{"id": "Rain", ...}]}`).
//!
//! ```rust
//! use credence_core::codec::NetworkDocument;
//!
//! let doc = NetworkDocument::from_toml_str(r#"
//! [[node]]
//! id = "Coin"
//! states = ["H", "T"]
//! probabilities = "0.5 0.5"
//! "#).unwrap();
//! assert_eq!(doc.into_records().unwrap().len(), 1);
//! ```

mod network;

pub use network::{parse_probabilities, DocumentNode, NetworkDocument, ProbabilityList};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CredenceError,
        network::{NodeRecord, TableSpec},
    };
    use std::fs::write;
    use tempfile::tempdir;

    const SPRINKLER_TOML: &str = r#"
[[node]]
id = "Rain"
states = ["T", "F"]
probabilities = [0.2, 0.8]

[[node]]
id = "WetGrass"
states = ["T", "F"]
parents = ["Rain"]
probabilities = """
0.9 0.1
0.05 0.95
"""

[[node]]
id = "Puddle"
states = ["T", "F"]
parents = ["Rain"]
resulting_states = ["T", "F"]
"#;

    #[test]
    fn test_parse_probabilities() {
        assert_eq!(
            parse_probabilities(" 0.25\t0.75\n1 0 ").unwrap(),
            vec![0.25, 0.75, 1.0, 0.0]
        );
        assert_eq!(parse_probabilities("").unwrap(), Vec::<f64>::new());
        assert!(matches!(
            parse_probabilities("0.5 x"),
            Err(CredenceError::InvalidProbabilities(_))
        ));
    }

    #[test]
    fn test_toml_document_to_records() {
        let records = NetworkDocument::from_toml_str(SPRINKLER_TOML)
            .unwrap()
            .into_records()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].table, TableSpec::Probabilities(vec![0.2, 0.8]));
        assert_eq!(records[1].parents, vec!["Rain".to_string()]);
        assert_eq!(
            records[1].table,
            TableSpec::Probabilities(vec![0.9, 0.1, 0.05, 0.95])
        );
        assert_eq!(
            records[2].table,
            TableSpec::ResultingStates(vec!["T".to_string(), "F".to_string()])
        );
    }

    #[test]
    fn test_json_document_matches_toml() {
        let json = r#"{"node": [
            {"id": "Rain", "states": ["T", "F"], "probabilities": [0.2, 0.8]},
            {"id": "WetGrass", "states": ["T", "F"], "parents": ["Rain"],
             "probabilities": "0.9 0.1 0.05 0.95"},
            {"id": "Puddle", "states": ["T", "F"], "parents": ["Rain"],
             "resulting_states": ["T", "F"]}
        ]}"#;
        assert_eq!(
            NetworkDocument::from_json_str(json).unwrap().into_records().unwrap(),
            NetworkDocument::from_toml_str(SPRINKLER_TOML)
                .unwrap()
                .into_records()
                .unwrap()
        );
    }

    #[test]
    fn test_table_must_be_declared_exactly_once() {
        let neither = r#"
[[node]]
id = "A"
states = ["T", "F"]
"#;
        let both = r#"
[[node]]
id = "A"
states = ["T", "F"]
probabilities = [0.5, 0.5]
resulting_states = ["T"]
"#;
        for doc in [neither, both] {
            assert!(matches!(
                NetworkDocument::from_toml_str(doc).unwrap().into_records(),
                Err(CredenceError::SourceLoad(_))
            ));
        }
    }

    #[test]
    fn test_bad_probability_text_is_a_load_error() {
        let doc = r#"
[[node]]
id = "A"
states = ["T", "F"]
probabilities = "0.5 half"
"#;
        let err = NetworkDocument::from_toml_str(doc)
            .unwrap()
            .into_records()
            .unwrap_err();
        assert!(matches!(err, CredenceError::SourceLoad(msg) if msg.contains("'A'")));
    }

    #[test]
    fn test_syntax_errors_are_load_errors() {
        assert!(matches!(
            NetworkDocument::from_toml_str("[[node]\nid ="),
            Err(CredenceError::SourceLoad(_))
        ));
        assert!(matches!(
            NetworkDocument::from_json_str("{\"node\": [}"),
            Err(CredenceError::SourceLoad(_))
        ));
    }

    #[test]
    fn test_from_path_by_extension_and_fallback() {
        let dir = tempdir().unwrap();
        let toml_path = dir.path().join("net.toml");
        write(&toml_path, SPRINKLER_TOML).unwrap();
        let from_toml = NetworkDocument::from_path(&toml_path).unwrap();
        assert_eq!(from_toml.nodes.len(), 3);

        let net_path = dir.path().join("net.bn");
        write(&net_path, SPRINKLER_TOML).unwrap();
        assert_eq!(NetworkDocument::from_path(&net_path).unwrap(), from_toml);

        assert!(matches!(
            NetworkDocument::from_path(dir.path().join("missing.toml")),
            Err(CredenceError::SourceLoad(_))
        ));
    }

    #[test]
    fn test_records_write_back_to_toml() {
        let records = vec![
            NodeRecord::probabilistic("A", &["T", "F"], &[], vec![0.3, 0.7]),
            NodeRecord::deterministic("B", &["T", "F"], &["A"], &["F", "T"]),
        ];
        let doc: NetworkDocument = records.clone().into_iter().collect();
        let text = doc.to_toml_string().unwrap();
        assert_eq!(
            NetworkDocument::from_toml_str(&text)
                .unwrap()
                .into_records()
                .unwrap(),
            records
        );
    }
}
