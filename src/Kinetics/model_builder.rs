//! # Isotopologue Model Builder
//!
//! ## Purpose
//! Entry point of the crate: runs the whole pipeline
//! network -> isotopologue catalogue -> balance equations -> mass-balance normalization ->
//! [`OdeSystem`] -> C code. The builder owns its inputs and is immutable, so building the
//! same model twice gives byte-identical text, and independent builders can run in parallel
//! ([`build_batch`]).
//!
//! ## Example
//! ```
//! use IsoKin::Kinetics::model_builder::IsotopologueModelBuilder;
//! use IsoKin::settings::{BuildOptions, LabeledSpecies};
//! let system = "A + B | {1:1}\nA_B : A <=> B";
//! let labeled = LabeledSpecies::from([(
//!     "A".to_string(),
//!     [("0".to_string(), 0.0), ("1".to_string(), 1.0)].into_iter().collect(),
//! )]);
//! let builder =
//!     IsotopologueModelBuilder::new(system, "single", labeled, BuildOptions::default()).unwrap();
//! let code = builder.ccode().unwrap();
//! assert!(code.contains("double B0 = input_list[0] ;"));
//! ```
use crate::Kinetics::code_emitter::CodeEmitter;
use crate::Kinetics::enumerator::IsotopologueCatalogue;
use crate::Kinetics::errors::IsoKinError;
use crate::Kinetics::network_parser::Network;
use crate::Kinetics::ode_builder::OdeBuilder;
use crate::Kinetics::ode_system::OdeSystem;
use crate::Kinetics::simplifier::MassBalance;
use crate::Utils::load_from_file::load_network;
use crate::settings::{BuildOptions, LabeledSpecies, ModelTask};
use log::{error, info};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
pub struct IsotopologueModelBuilder {
    pub system_name: String,
    /// network after the boundary policy was applied
    pub network: Network,
    pub labeled_species: LabeledSpecies,
    pub options: BuildOptions,
}

impl IsotopologueModelBuilder {
    /// builder over network text
    pub fn new(
        system: &str,
        system_name: &str,
        labeled_species: LabeledSpecies,
        options: BuildOptions,
    ) -> Result<Self, IsoKinError> {
        options.validate()?;
        let network = Network::parse(system)?;
        Self::from_network(network, system_name, labeled_species, options)
    }

    /// builder over an already parsed or loaded network
    pub fn from_network(
        network: Network,
        system_name: &str,
        labeled_species: LabeledSpecies,
        options: BuildOptions,
    ) -> Result<Self, IsoKinError> {
        options.validate()?;
        let network = network.with_boundary_policy(options.boundary);
        Ok(Self {
            system_name: system_name.to_string(),
            network,
            labeled_species,
            options,
        })
    }

    /// builder for a task file, network files are looked up relative to `base_dir`
    pub fn from_task(task: &ModelTask, base_dir: &Path) -> Result<Self, IsoKinError> {
        task.validate(&task.name)?;
        let network = load_network(&task.network_source(base_dir)?)?;
        Self::from_network(
            network,
            &task.name,
            task.labeled_species.clone(),
            task.options.clone(),
        )
    }

    pub fn build(&self) -> Result<OdeSystem, IsoKinError> {
        info!("building isotopologue model {}", self.system_name);
        self.network.validate()?;
        let catalogue = IsotopologueCatalogue::enumerate(&self.network, &self.labeled_species)?;
        catalogue.check_symbols(&self.network)?;
        let mass_balance = MassBalance::new(&catalogue, &self.options)?;
        let mut equations =
            OdeBuilder::new(&self.network, &catalogue, self.options.stoichiometry).build()?;
        if self.options.replace_total_sum_with_one {
            equations = mass_balance.apply(equations);
        }
        let mut system = OdeSystem::new(&self.system_name, &self.network, &catalogue, equations);
        if self.options.eliminate_remainder_states {
            system = mass_balance.eliminate_remainders(system);
        }
        info!(
            "model {}: {} states, {} rates, {} pools",
            self.system_name,
            system.states.len(),
            system.rates.len(),
            system.pools.len()
        );
        Ok(system)
    }

    pub fn ccode(&self) -> Result<String, IsoKinError> {
        let system = self.build()?;
        let emitter = CodeEmitter::new(
            &system,
            &self.options.function_name,
            self.options.emit_jacobian,
        );
        Ok(emitter.render()?)
    }

    /// the stream receives nothing unless the whole build succeeds
    pub fn write_ccode<W: Write>(&self, stream: &mut W) -> Result<(), IsoKinError> {
        let code = self.ccode()?;
        stream.write_all(code.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// writes through a temporary file in the destination directory, so a failed build
    /// leaves no output file behind
    pub fn write_ccode_to_path(&self, path: &Path) -> Result<(), IsoKinError> {
        let code = self.ccode()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(code.as_bytes())?;
        file.flush()?;
        file.persist(path).map_err(|e| IsoKinError::Io(e.error))?;
        info!(
            "C code of model {} written to {}",
            self.system_name,
            path.display()
        );
        Ok(())
    }
}

/// C code of independent models, built in parallel, results in input order
pub fn build_batch(builders: &[IsotopologueModelBuilder]) -> Vec<Result<String, IsoKinError>> {
    builders.par_iter().map(|builder| builder.ccode()).collect()
}

/// builds and writes independent models in parallel, results in input order
pub fn write_batch(
    jobs: &[(IsotopologueModelBuilder, PathBuf)],
) -> Vec<Result<PathBuf, IsoKinError>> {
    jobs.par_iter()
        .map(|(builder, path)| {
            builder
                .write_ccode_to_path(path)
                .map(|_| path.clone())
                .inspect_err(|e| error!("model {} failed: {}", builder.system_name, e))
        })
        .collect()
}
