//! # Settings Module
//!
//! ## Purpose
//! Options of the model builder and the JSON task files consumed by the command line.
//! Every option has a default, so an empty `options` object (or none at all) reproduces
//! the plain behavior: no mass-balance substitution, unit stoichiometry only, boundary
//! species kept, right-hand side function named `c_equations`.
//!
//! ## Main Data Structures
//! - [`BuildOptions`]: switches of the simplifier, the ODE builder and the emitter
//! - [`ModelTask`]: one model to build: network source, labeling, options, output file
//! - [`LabeledSpecies`]: species -> (isotopologue pattern -> fraction)
//!
//! ## Task file example
//! ```json
//! {
//!   "name": "stable_loop",
//!   "system": "A + B | {1:1}\nB + C | {1:1}\nA + C | {1:1}\nA_B : A <=> B\nB_C : B <=> C\nC_A : C <=> A",
//!   "labeled_species": { "A": { "0": 0.0, "1": 1.0 } },
//!   "options": { "replace_total_sum_with_one": true },
//!   "output": "stable_loop.c"
//! }
//! ```
use crate::Kinetics::errors::ConfigurationError;
use crate::Kinetics::network_parser::is_c_identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// species name -> (isotopologue pattern -> fraction)
pub type LabeledSpecies = BTreeMap<String, BTreeMap<String, f64>>;

/// which isotopologue absorbs the mass balance of a species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemainderChoice {
    /// the all-zero pattern
    #[default]
    Unlabeled,
    /// the all-one pattern
    Labeled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoichiometryPolicy {
    /// coefficients other than 1 are an error
    #[default]
    Reject,
    /// a coefficient n contributes the n-th power of the isotopologue sum
    MassAction,
}

/// treatment of species referenced by exactly one reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    #[default]
    Keep,
    DiscardBoundarySpecies,
    IntroduceBoundaryFluxes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    pub replace_total_sum_with_one: bool,
    pub remainder: RemainderChoice,
    /// species -> isotopologue symbol used as its remainder
    pub remainder_overrides: BTreeMap<String, String>,
    pub eliminate_remainder_states: bool,
    pub stoichiometry: StoichiometryPolicy,
    pub boundary: BoundaryPolicy,
    pub emit_jacobian: bool,
    pub function_name: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            replace_total_sum_with_one: false,
            remainder: RemainderChoice::default(),
            remainder_overrides: BTreeMap::new(),
            eliminate_remainder_states: false,
            stoichiometry: StoichiometryPolicy::default(),
            boundary: BoundaryPolicy::default(),
            emit_jacobian: false,
            function_name: "c_equations".to_string(),
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.eliminate_remainder_states && !self.replace_total_sum_with_one {
            return Err(ConfigurationError::EliminationWithoutReplacement);
        }
        if !is_c_identifier(&self.function_name) {
            return Err(ConfigurationError::InvalidFunctionName(
                self.function_name.clone(),
            ));
        }
        Ok(())
    }
}

/// where the network of a task comes from
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkSource {
    Inline(String),
    TextFile(PathBuf),
    StructuredFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelTask {
    pub name: String,
    /// network text given inline
    #[serde(default)]
    pub system: Option<String>,
    /// path of a network text file, relative to the task file
    #[serde(default)]
    pub system_file: Option<String>,
    /// path of a structured JSON network document, relative to the task file
    #[serde(default)]
    pub structured_file: Option<String>,
    #[serde(default)]
    pub labeled_species: LabeledSpecies,
    #[serde(default)]
    pub options: BuildOptions,
    #[serde(default)]
    pub output: Option<String>,
}

impl ModelTask {
    pub fn new(name: &str, system: &str) -> Self {
        Self {
            name: name.to_string(),
            system: Some(system.to_string()),
            system_file: None,
            structured_file: None,
            labeled_species: LabeledSpecies::new(),
            options: BuildOptions::default(),
            output: None,
        }
    }

    pub fn from_json(text: &str, source_name: &str) -> Result<Self, ConfigurationError> {
        let task: ModelTask =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Malformed {
                source_name: source_name.to_string(),
                message: format!("line {}, column {}: {}", e.line(), e.column(), e),
            })?;
        task.validate(source_name)?;
        Ok(task)
    }

    pub fn validate(&self, source_name: &str) -> Result<(), ConfigurationError> {
        let given = [&self.system, &self.system_file, &self.structured_file]
            .iter()
            .filter(|source| source.is_some())
            .count();
        if given != 1 {
            return Err(ConfigurationError::Malformed {
                source_name: source_name.to_string(),
                message: format!(
                    "task '{}' must give exactly one of system, system_file, structured_file ({} given)",
                    self.name, given
                ),
            });
        }
        self.options.validate()
    }

    /// network source with file paths resolved against `base_dir`
    pub fn network_source(&self, base_dir: &Path) -> Result<NetworkSource, ConfigurationError> {
        match (&self.system, &self.system_file, &self.structured_file) {
            (Some(text), None, None) => Ok(NetworkSource::Inline(text.clone())),
            (None, Some(file), None) => Ok(NetworkSource::TextFile(base_dir.join(file))),
            (None, None, Some(file)) => Ok(NetworkSource::StructuredFile(base_dir.join(file))),
            _ => Err(ConfigurationError::Malformed {
                source_name: self.name.clone(),
                message: "exactly one network source must be given".to_string(),
            }),
        }
    }

    /// output path resolved against `base_dir`, defaulting to `<name>.c`
    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        match &self.output {
            Some(output) => base_dir.join(output),
            None => base_dir.join(format!("{}.c", self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options: BuildOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BuildOptions::default());
        assert!(!options.replace_total_sum_with_one);
        assert_eq!(options.function_name, "c_equations");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_json() {
        let options: BuildOptions = serde_json::from_str(
            r#"{"replace_total_sum_with_one": true, "remainder": "labeled",
                "stoichiometry": "mass_action", "boundary": "introduce_boundary_fluxes",
                "remainder_overrides": {"C": "C01"}}"#,
        )
        .unwrap();
        assert_eq!(options.remainder, RemainderChoice::Labeled);
        assert_eq!(options.stoichiometry, StoichiometryPolicy::MassAction);
        assert_eq!(options.boundary, BoundaryPolicy::IntroduceBoundaryFluxes);
        assert_eq!(options.remainder_overrides["C"], "C01");
    }

    #[test]
    fn test_unknown_option_rejected() {
        let result: Result<BuildOptions, _> = serde_json::from_str(r#"{"replace": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_options() {
        let mut options = BuildOptions::new();
        options.eliminate_remainder_states = true;
        assert_eq!(
            options.validate(),
            Err(ConfigurationError::EliminationWithoutReplacement)
        );
        options.replace_total_sum_with_one = true;
        assert!(options.validate().is_ok());
        options.function_name = "2rhs".to_string();
        assert_eq!(
            options.validate(),
            Err(ConfigurationError::InvalidFunctionName("2rhs".to_string()))
        );
    }

    #[test]
    fn test_task_sources() {
        let task = ModelTask::from_json(
            r#"{"name": "loop", "system_file": "loop.txt", "labeled_species": {"A": {"1": 1.0}}}"#,
            "task.json",
        )
        .unwrap();
        assert_eq!(
            task.network_source(Path::new("/data")).unwrap(),
            NetworkSource::TextFile(PathBuf::from("/data/loop.txt"))
        );
        assert_eq!(task.output_path(Path::new("/data")), PathBuf::from("/data/loop.c"));
        assert_eq!(task.labeled_species["A"]["1"], 1.0);

        let both = ModelTask::from_json(
            r#"{"name": "x", "system": "A => B", "system_file": "x.txt"}"#,
            "task.json",
        );
        assert!(matches!(both, Err(ConfigurationError::Malformed { .. })));
        let none = ModelTask::from_json(r#"{"name": "x"}"#, "task.json");
        assert!(none.is_err());
    }
}
