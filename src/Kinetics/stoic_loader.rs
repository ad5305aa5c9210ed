//! # Structured network loader
//!
//! ## Purpose
//! Second way into the builder: a JSON exchange document describing species with their
//! tracked atom counts, atom mappings and reactions with optional explicit rate symbols.
//! It produces the same [`Network`] as the text parser; the header text of the generated
//! code is regenerated from the records.
//!
//! ## Document example
//! ```json
//! {
//!   "species": [ {"name": "A", "atoms": 1}, {"name": "B", "atoms": 1} ],
//!   "atom_mappings": [ {"first": "A", "second": "B", "pairs": [[1, 1]]} ],
//!   "reactions": [
//!     {"name": "A_B", "reactants": [{"species": "A"}], "products": [{"species": "B"}],
//!      "reversible": true, "forward_rate": "v1", "reverse_rate": "v2"}
//!   ]
//! }
//! ```
use crate::Kinetics::errors::{ConfigurationError, ParseError};
use crate::Kinetics::network_parser::{
    AtomMapping, Network, Reaction, SpeciesInfo, SpeciesRef, is_c_identifier, merge_species,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoichiometryDocument {
    pub species: Vec<SpeciesRecord>,
    #[serde(default)]
    pub atom_mappings: Vec<MappingRecord>,
    pub reactions: Vec<ReactionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesRecord {
    pub name: String,
    pub atoms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingRecord {
    pub first: String,
    pub second: String,
    #[serde(default)]
    pub pairs: Vec<(usize, usize)>,
}

fn unit_coefficient() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoichRecord {
    pub species: String,
    #[serde(default = "unit_coefficient")]
    pub coefficient: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRecord {
    pub name: String,
    #[serde(default)]
    pub reactants: Vec<StoichRecord>,
    #[serde(default)]
    pub products: Vec<StoichRecord>,
    #[serde(default)]
    pub reversible: bool,
    #[serde(default)]
    pub forward_rate: Option<String>,
    #[serde(default)]
    pub reverse_rate: Option<String>,
}

impl StoichiometryDocument {
    pub fn from_json(text: &str, source_name: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Malformed {
            source_name: source_name.to_string(),
            message: format!("line {}, column {}: {}", e.line(), e.column(), e),
        })
    }

    fn check_identifier(&self, source_name: &str, what: &str, name: &str) -> Result<(), ConfigurationError> {
        if is_c_identifier(name) {
            Ok(())
        } else {
            Err(ConfigurationError::Malformed {
                source_name: source_name.to_string(),
                message: format!("{} '{}' is not a C identifier", what, name),
            })
        }
    }

    /// network with the records of the document; consistency is checked by `Network::validate`
    pub fn into_network(self, source_name: &str) -> Result<Network, ConfigurationError> {
        if self.reactions.is_empty() {
            return Err(ConfigurationError::Malformed {
                source_name: source_name.to_string(),
                message: ParseError::EmptyNetwork.to_string(),
            });
        }
        let mut species = BTreeMap::new();
        for record in &self.species {
            self.check_identifier(source_name, "species", &record.name)?;
            species.insert(
                record.name.clone(),
                SpeciesInfo {
                    name: record.name.clone(),
                    atom_count: record.atoms,
                    declared: true,
                },
            );
        }
        let mut reactions: Vec<Reaction> = Vec::with_capacity(self.reactions.len());
        for record in &self.reactions {
            self.check_identifier(source_name, "reaction", &record.name)?;
            if !record.reversible && record.reverse_rate.is_some() {
                return Err(ConfigurationError::ContradictoryRates(record.name.clone()));
            }
            let side = |records: &[StoichRecord]| -> Result<Vec<SpeciesRef>, ConfigurationError> {
                merge_species(
                    records
                        .iter()
                        .map(|r| SpeciesRef::new(&r.species, r.coefficient))
                        .collect(),
                )
                .map_err(|reason| ConfigurationError::Malformed {
                    source_name: source_name.to_string(),
                    message: format!("reaction '{}': {}", record.name, reason),
                })
            };
            let mut reaction = Reaction::new(
                &record.name,
                side(&record.reactants)?,
                side(&record.products)?,
                record.reversible,
            );
            if let Some(forward) = &record.forward_rate {
                self.check_identifier(source_name, "rate", forward)?;
                reaction.forward_rate = forward.clone();
            }
            if let Some(reverse) = &record.reverse_rate {
                self.check_identifier(source_name, "rate", reverse)?;
                reaction.reverse_rate = Some(reverse.clone());
            }
            reactions.push(reaction);
        }
        let mappings = self
            .atom_mappings
            .iter()
            .map(|m| AtomMapping::new(&m.first, &m.second, m.pairs.clone()))
            .collect();
        let mut network = Network {
            text: String::new(),
            reactions,
            mappings,
            species,
        };
        network.text = network.to_text();
        info!(
            "structured network {} loaded: {} reactions, {} species",
            source_name,
            network.reactions.len(),
            network.species.len()
        );
        Ok(network)
    }
}

pub fn load_stoic_from_json(text: &str, source_name: &str) -> Result<Network, ConfigurationError> {
    StoichiometryDocument::from_json(text, source_name)?.into_network(source_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::errors::BuildError;

    const DOCUMENT: &str = r#"{
        "species": [{"name": "A", "atoms": 1}, {"name": "B", "atoms": 2}],
        "atom_mappings": [{"first": "B", "second": "A", "pairs": [[2, 1]]}],
        "reactions": [
            {"name": "A_B", "reactants": [{"species": "A"}], "products": [{"species": "B"}],
             "reversible": true, "forward_rate": "v1", "reverse_rate": "v2"}
        ]
    }"#;

    #[test]
    fn test_load_document() {
        let network = load_stoic_from_json(DOCUMENT, "doc.json").unwrap();
        assert_eq!(network.species["B"].atom_count, 2);
        assert_eq!(network.reactions[0].forward_rate, "v1");
        assert_eq!(network.reactions[0].reverse_rate.as_deref(), Some("v2"));
        assert_eq!(network.transfers("A", "B"), vec![(1, 2)]);
        assert_eq!(
            network.header_lines(),
            vec!["B[2] + A[1] | {2:1}", "# rates of A_B: v1, v2", "A_B : A <=> B"]
        );
        assert!(network.validate().is_ok());
    }

    #[test]
    fn test_default_rates_and_coefficients() {
        let text = r#"{"species": [{"name": "A", "atoms": 1}, {"name": "B", "atoms": 1}],
            "atom_mappings": [{"first": "A", "second": "B", "pairs": [[1, 1]]}],
            "reactions": [{"name": "R", "reactants": [{"species": "A", "coefficient": 2}],
                           "products": [{"species": "B"}]}]}"#;
        let network = load_stoic_from_json(text, "doc.json").unwrap();
        let reaction = &network.reactions[0];
        assert_eq!(reaction.forward_rate, "fR");
        assert!(reaction.reverse_rate.is_none());
        assert_eq!(reaction.reactants, vec![SpeciesRef::new("A", 2)]);
    }

    #[test]
    fn test_document_errors() {
        assert!(matches!(
            load_stoic_from_json("{", "doc.json"),
            Err(ConfigurationError::Malformed { .. })
        ));
        let contradictory = r#"{"species": [{"name": "A", "atoms": 1}],
            "reactions": [{"name": "R", "reactants": [{"species": "A"}], "reverse_rate": "x"}]}"#;
        assert_eq!(
            load_stoic_from_json(contradictory, "doc.json"),
            Err(ConfigurationError::ContradictoryRates("R".to_string()))
        );
        let unknown = r#"{"species": [{"name": "A", "atoms": 1}],
            "reactions": [{"name": "R", "reactants": [{"species": "A"}], "products": [{"species": "Q"}]}]}"#;
        let zero = r#"{"species": [{"name": "A", "atoms": 1}, {"name": "B", "atoms": 1}],
            "atom_mappings": [{"first": "A", "second": "B", "pairs": [[1, 1]]}],
            "reactions": [{"name": "R", "reactants": [{"species": "A", "coefficient": 0}],
                           "products": [{"species": "B"}]}]}"#;
        assert!(matches!(
            load_stoic_from_json(zero, "doc.json"),
            Err(ConfigurationError::Malformed { message, .. }) if message.contains("zero coefficient")
        ));
        let network = load_stoic_from_json(unknown, "doc.json").unwrap();
        assert!(matches!(
            network.validate(),
            Err(BuildError::UnknownSpecies { species, .. }) if species == "Q"
        ));
    }
}
