//! # Isotopologue Enumerator
//!
//! ## Purpose
//! Expands every species of a [`Network`] into its `2^k` isotopologues (k = tracked atom
//! count) and splits the species into *labeled* ones, whose fractions are fixed inputs, and
//! *internal* ones, whose fractions become ODE states.
//!
//! ## Orders
//! - isotopologues of a species: ascending binary pattern, position 1 is the leftmost bit
//! - states: internal species by ascending name, then ascending pattern
//! - pools: internal species by descending name
//! - labeled constants: labeled species by name, then ascending pattern
//!
//! ## Main Data Structures
//! - [`Isotopologue`]: pattern and symbol `<species><pattern>`
//! - [`SpeciesVariants`]: all isotopologues of one species with its role
//! - [`IsotopologueCatalogue`]: species name -> variants
use crate::Kinetics::errors::{BuildError, ConfigurationError, IsoKinError};
use crate::Kinetics::network_parser::Network;
use crate::settings::LabeledSpecies;
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

pub const MAX_TRACKED_ATOMS: usize = 16;
/// parameter names of the generated C functions
pub const RESERVED_SYMBOLS: [&str; 6] = [
    "pool_list",
    "flux_list",
    "solver_time",
    "input_list",
    "out",
    "jac",
];
const FRACTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Isotopologue {
    pub species: String,
    /// one character per tracked position, `1` = labeled
    pub pattern: String,
    pub symbol: String,
}

impl Isotopologue {
    pub fn new(species: &str, pattern: &str) -> Self {
        Self {
            species: species.to_string(),
            pattern: pattern.to_string(),
            symbol: format!("{}{}", species, pattern),
        }
    }

    /// label state of the 1-based `position`
    pub fn is_labeled_at(&self, position: usize) -> bool {
        position >= 1 && self.pattern.as_bytes().get(position - 1) == Some(&b'1')
    }

    /// true when every constrained position carries the required label state
    pub fn matches(&self, constraints: &BTreeMap<usize, bool>) -> bool {
        constraints
            .iter()
            .all(|(&position, &labeled)| self.is_labeled_at(position) == labeled)
    }

    pub fn is_unlabeled(&self) -> bool {
        !self.pattern.contains('1')
    }

    pub fn is_fully_labeled(&self) -> bool {
        !self.pattern.contains('0')
    }
}

/// all patterns of `atoms` positions in ascending binary order
pub fn patterns(atoms: usize) -> Vec<String> {
    if atoms == 0 {
        return vec![String::new()];
    }
    (0..1u32 << atoms)
        .map(|value| format!("{:0width$b}", value, width = atoms))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesRole {
    Labeled,
    Internal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesVariants {
    pub name: String,
    pub atom_count: usize,
    pub role: SpeciesRole,
    pub isotopologues: Vec<Isotopologue>,
    /// fraction per isotopologue, only for labeled species
    pub fractions: Vec<f64>,
}

impl SpeciesVariants {
    pub fn pool_symbol(&self) -> String {
        format!("pool_{}", self.name)
    }

    pub fn is_internal(&self) -> bool {
        self.role == SpeciesRole::Internal
    }

    pub fn symbols(&self) -> Vec<String> {
        self.isotopologues.iter().map(|i| i.symbol.clone()).collect()
    }

    pub fn isotopologue(&self, symbol: &str) -> Option<&Isotopologue> {
        self.isotopologues.iter().find(|i| i.symbol == symbol)
    }

    /// sum of all isotopologue symbols
    pub fn total_sum(&self) -> Expr {
        Expr::sum(self.isotopologues.iter().map(|i| Expr::symbol(&i.symbol)))
    }

    /// sum of the isotopologues carrying the required label state at the constrained positions
    pub fn consistent_sum(&self, constraints: Option<&BTreeMap<usize, bool>>) -> Expr {
        match constraints {
            None => self.total_sum(),
            Some(constraints) => Expr::sum(
                self.isotopologues
                    .iter()
                    .filter(|i| i.matches(constraints))
                    .map(|i| Expr::symbol(&i.symbol)),
            ),
        }
    }

    /// internal fractions always sum to 1, labeled ones only when configured so
    pub fn fractions_sum_to_one(&self) -> bool {
        match self.role {
            SpeciesRole::Internal => true,
            SpeciesRole::Labeled => {
                (self.fractions.iter().sum::<f64>() - 1.0).abs() < FRACTION_TOLERANCE
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsotopologueCatalogue {
    pub species: BTreeMap<String, SpeciesVariants>,
}

impl IsotopologueCatalogue {
    pub fn enumerate(
        network: &Network,
        labeled: &LabeledSpecies,
    ) -> Result<IsotopologueCatalogue, IsoKinError> {
        if let Some(unknown) = labeled.keys().find(|name| !network.species.contains_key(*name)) {
            return Err(BuildError::UnknownLabeledSpecies(unknown.clone()).into());
        }
        let mut species = BTreeMap::new();
        for info in network.species.values() {
            if info.atom_count > MAX_TRACKED_ATOMS {
                return Err(BuildError::TooManyAtoms {
                    species: info.name.clone(),
                    atoms: info.atom_count,
                    limit: MAX_TRACKED_ATOMS,
                }
                .into());
            }
            let isotopologues: Vec<Isotopologue> = patterns(info.atom_count)
                .iter()
                .map(|pattern| Isotopologue::new(&info.name, pattern))
                .collect();
            let variants = match labeled.get(&info.name) {
                Some(configured) => {
                    let fractions = labeled_fractions(&info.name, &isotopologues, configured)?;
                    SpeciesVariants {
                        name: info.name.clone(),
                        atom_count: info.atom_count,
                        role: SpeciesRole::Labeled,
                        isotopologues,
                        fractions,
                    }
                }
                None => SpeciesVariants {
                    name: info.name.clone(),
                    atom_count: info.atom_count,
                    role: SpeciesRole::Internal,
                    isotopologues,
                    fractions: Vec::new(),
                },
            };
            species.insert(info.name.clone(), variants);
        }
        let catalogue = IsotopologueCatalogue { species };
        info!(
            "isotopologues enumerated: {} internal species, {} labeled species, {} states",
            catalogue.internal_species().count(),
            catalogue.labeled_species().count(),
            catalogue.state_symbols().len()
        );
        Ok(catalogue)
    }

    pub fn get(&self, name: &str) -> Option<&SpeciesVariants> {
        self.species.get(name)
    }

    /// internal species in ascending name order
    pub fn internal_species(&self) -> impl DoubleEndedIterator<Item = &SpeciesVariants> {
        self.species.values().filter(|s| s.is_internal())
    }

    pub fn labeled_species(&self) -> impl Iterator<Item = &SpeciesVariants> {
        self.species.values().filter(|s| !s.is_internal())
    }

    pub fn state_symbols(&self) -> Vec<String> {
        self.internal_species().flat_map(|s| s.symbols()).collect()
    }

    pub fn pool_symbols(&self) -> Vec<String> {
        self.internal_species()
            .rev()
            .map(SpeciesVariants::pool_symbol)
            .collect()
    }

    /// (symbol, fraction) of every labeled isotopologue
    pub fn labeled_constants(&self) -> Vec<(String, f64)> {
        self.labeled_species()
            .flat_map(|s| {
                s.isotopologues
                    .iter()
                    .zip(s.fractions.iter())
                    .map(|(i, &fraction)| (i.symbol.clone(), fraction))
            })
            .collect()
    }

    /// every identifier of the generated code must be unique
    pub fn check_symbols(&self, network: &Network) -> Result<(), BuildError> {
        let mut owners: HashMap<String, String> = RESERVED_SYMBOLS
            .iter()
            .map(|name| (name.to_string(), "function parameter".to_string()))
            .collect();
        let mut claim = |symbol: String, owner: String| -> Result<(), BuildError> {
            match owners.get(&symbol) {
                Some(first) => Err(BuildError::SymbolClash {
                    symbol,
                    first: first.clone(),
                    second: owner,
                }),
                None => {
                    owners.insert(symbol, owner);
                    Ok(())
                }
            }
        };
        for variants in self.species.values() {
            for isotopologue in &variants.isotopologues {
                claim(
                    isotopologue.symbol.clone(),
                    format!("isotopologue of {}", variants.name),
                )?;
            }
            if variants.is_internal() {
                claim(variants.pool_symbol(), format!("pool of {}", variants.name))?;
            }
        }
        for reaction in &network.reactions {
            for rate in reaction.rates() {
                claim(rate.to_string(), format!("rate of {}", reaction.name))?;
            }
        }
        Ok(())
    }
}

fn labeled_fractions(
    species: &str,
    isotopologues: &[Isotopologue],
    configured: &BTreeMap<String, f64>,
) -> Result<Vec<f64>, ConfigurationError> {
    let atoms = isotopologues.first().map_or(0, |i| i.pattern.len());
    for (pattern, &fraction) in configured {
        if pattern.len() != atoms || !pattern.chars().all(|c| c == '0' || c == '1') {
            return Err(ConfigurationError::InvalidPattern {
                species: species.to_string(),
                pattern: pattern.clone(),
                atoms,
            });
        }
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(ConfigurationError::InvalidFraction {
                species: species.to_string(),
                pattern: pattern.clone(),
                fraction: fraction.to_string(),
            });
        }
    }
    let fractions: Vec<f64> = isotopologues
        .iter()
        .map(|i| match configured.get(&i.pattern) {
            Some(&fraction) => fraction,
            None => {
                debug!("{}: no fraction given, set to 0", i.symbol);
                0.0
            }
        })
        .collect();
    let total: f64 = fractions.iter().sum();
    if (total - 1.0).abs() >= FRACTION_TOLERANCE {
        warn!(
            "fractions of labeled species {} sum to {} instead of 1",
            species, total
        );
    }
    Ok(fractions)
}
