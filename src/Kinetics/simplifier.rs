//! # Simplifier
//!
//! ## Purpose
//! Mass-balance normalization. The isotopologue fractions of a species sum to 1, so one of
//! them (the *remainder*) equals `1 - Σ siblings`. Substituting the remainder inside a sum
//! and re-collecting shortens the sum when all isotopologues were present: `A0+A1`
//! collapses to `1` and disappears from products, while a partial sum such as `C00+C10`
//! would grow and is left alone.
//!
//! Optionally the remainders of internal species are also removed from the state vector:
//! each one is defined from its siblings and loses its own balance equation.
//!
//! ## Main Data Structures
//! - [`RemainderEntry`]: remainder symbol of one species and its siblings
//! - [`MassBalance`]: all entries, the substitution and the elimination
use crate::Kinetics::enumerator::{IsotopologueCatalogue, SpeciesVariants};
use crate::Kinetics::errors::BuildError;
use crate::Kinetics::ode_builder::{IsotopologueOde, RateTerm};
use crate::Kinetics::ode_system::OdeSystem;
use crate::settings::{BuildOptions, RemainderChoice};
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct RemainderEntry {
    pub species: String,
    pub remainder: String,
    pub siblings: Vec<String>,
    pub internal: bool,
}

impl RemainderEntry {
    /// `1 - Σ siblings`
    pub fn replacement(&self) -> Expr {
        Expr::sum(
            std::iter::once(Expr::one())
                .chain(self.siblings.iter().map(|s| Expr::symbol(s).negate())),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MassBalance {
    pub entries: Vec<RemainderEntry>,
}

impl MassBalance {
    /// remainders of every species whose fractions sum to 1, checking the overrides
    pub fn new(catalogue: &IsotopologueCatalogue, options: &BuildOptions) -> Result<Self, BuildError> {
        for (species, symbol) in &options.remainder_overrides {
            let variants = catalogue
                .get(species)
                .ok_or_else(|| BuildError::UnknownSpecies {
                    context: "remainder override".to_string(),
                    species: species.clone(),
                })?;
            if variants.isotopologue(symbol).is_none() {
                return Err(BuildError::MissingRemainder {
                    species: species.clone(),
                    symbol: symbol.clone(),
                });
            }
        }
        let mut entries = Vec::new();
        for variants in catalogue.species.values() {
            if !variants.fractions_sum_to_one() {
                debug!(
                    "fractions of {} do not sum to 1, no remainder substitution",
                    variants.name
                );
                continue;
            }
            if let Some(remainder) = remainder_symbol(variants, options) {
                let siblings = variants
                    .symbols()
                    .into_iter()
                    .filter(|symbol| *symbol != remainder)
                    .collect();
                entries.push(RemainderEntry {
                    species: variants.name.clone(),
                    remainder,
                    siblings,
                    internal: variants.is_internal(),
                });
            }
        }
        Ok(MassBalance { entries })
    }

    pub fn entry(&self, species: &str) -> Option<&RemainderEntry> {
        self.entries.iter().find(|entry| entry.species == species)
    }

    /// substitutes remainders inside every sum where that shortens the sum
    pub fn simplify(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Number(_) | Expr::Symbol(_) => expr.clone(),
            Expr::Sum(terms) => {
                let mut current = Expr::sum(terms.iter().map(|term| self.simplify(term)));
                for entry in &self.entries {
                    if !current.contains_symbol(&entry.remainder) {
                        continue;
                    }
                    let candidate = current
                        .subs(&entry.remainder, &entry.replacement())
                        .expand();
                    if candidate.term_count() < current.term_count() {
                        current = candidate;
                    }
                }
                current
            }
            Expr::Product(factors) => {
                Expr::product(factors.iter().map(|factor| self.simplify(factor)))
            }
            Expr::Power(base, exponent) => Expr::pow(self.simplify(base), *exponent),
        }
    }

    pub fn apply(&self, equations: Vec<IsotopologueOde>) -> Vec<IsotopologueOde> {
        let simplified: Vec<IsotopologueOde> = equations
            .into_iter()
            .map(|equation| IsotopologueOde {
                terms: equation
                    .terms
                    .iter()
                    .map(|term| RateTerm {
                        sign: term.sign,
                        rate: term.rate.clone(),
                        factor: self.simplify(&term.factor),
                    })
                    .filter(|term| !term.factor.is_zero())
                    .collect(),
                ..equation
            })
            .collect();
        info!(
            "mass-balance substitution applied with {} remainders",
            self.entries.len()
        );
        simplified
    }

    /// removes the remainders of internal species from the state vector
    pub fn eliminate_remainders(&self, mut system: OdeSystem) -> OdeSystem {
        let removed: BTreeSet<&str> = self
            .entries
            .iter()
            .filter(|entry| entry.internal)
            .map(|entry| entry.remainder.as_str())
            .collect();
        system.states.retain(|state| !removed.contains(state.as_str()));
        system
            .equations
            .retain(|equation| !removed.contains(equation.symbol.as_str()));
        system.eliminated = self
            .entries
            .iter()
            .filter(|entry| entry.internal)
            .map(|entry| (entry.remainder.clone(), entry.replacement()))
            .collect();
        info!("{} remainder states eliminated", system.eliminated.len());
        system
    }
}

fn remainder_symbol(variants: &SpeciesVariants, options: &BuildOptions) -> Option<String> {
    if let Some(symbol) = options.remainder_overrides.get(&variants.name) {
        return Some(symbol.clone());
    }
    let chosen = match options.remainder {
        RemainderChoice::Unlabeled => variants.isotopologues.iter().find(|i| i.is_unlabeled()),
        RemainderChoice::Labeled => variants.isotopologues.iter().find(|i| i.is_fully_labeled()),
    };
    chosen.map(|isotopologue| isotopologue.symbol.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::network_parser::Network;
    use crate::settings::LabeledSpecies;

    fn catalogue(labeled: LabeledSpecies) -> IsotopologueCatalogue {
        let network = Network::parse(
            "C + A | {1:1}\nC + B | {2:1}\nAB_C : A + B <=> C",
        )
        .unwrap();
        IsotopologueCatalogue::enumerate(&network, &labeled).unwrap()
    }

    fn a_labeled(fractions: &[(&str, f64)]) -> LabeledSpecies {
        LabeledSpecies::from([(
            "A".to_string(),
            fractions.iter().map(|(p, f)| (p.to_string(), *f)).collect(),
        )])
    }

    #[test]
    fn test_entries() {
        let balance =
            MassBalance::new(&catalogue(a_labeled(&[("0", 0.5), ("1", 0.5)])), &BuildOptions::default())
                .unwrap();
        let species: Vec<&str> = balance.entries.iter().map(|e| e.species.as_str()).collect();
        assert_eq!(species, vec!["A", "B", "C"]);
        let c = balance.entry("C").unwrap();
        assert_eq!(c.remainder, "C00");
        assert_eq!(c.replacement().to_string(), "1-C01-C10-C11");
        assert!(!balance.entry("A").unwrap().internal);
    }

    #[test]
    fn test_labeled_without_unit_sum_is_skipped() {
        let balance =
            MassBalance::new(&catalogue(a_labeled(&[("1", 0.5)])), &BuildOptions::default()).unwrap();
        assert!(balance.entry("A").is_none());
        assert!(balance.entry("B").is_some());
    }

    #[test]
    fn test_remainder_choice_and_overrides() {
        let mut options = BuildOptions::default();
        options.remainder = RemainderChoice::Labeled;
        let balance = MassBalance::new(&catalogue(LabeledSpecies::new()), &options).unwrap();
        assert_eq!(balance.entry("C").unwrap().remainder, "C11");

        options
            .remainder_overrides
            .insert("C".to_string(), "C01".to_string());
        let balance = MassBalance::new(&catalogue(LabeledSpecies::new()), &options).unwrap();
        assert_eq!(balance.entry("C").unwrap().remainder, "C01");
        assert_eq!(balance.entry("C").unwrap().siblings, vec!["C00", "C10", "C11"]);

        options
            .remainder_overrides
            .insert("C".to_string(), "C2".to_string());
        let err = MassBalance::new(&catalogue(LabeledSpecies::new()), &options).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingRemainder {
                species: "C".to_string(),
                symbol: "C2".to_string()
            }
        );
    }

    #[test]
    fn test_full_sum_collapses_partial_sum_stays() {
        let balance =
            MassBalance::new(&catalogue(LabeledSpecies::new()), &BuildOptions::default()).unwrap();
        let full = Expr::product(vec![
            Expr::sum(vec![Expr::symbol("A0"), Expr::symbol("A1")]),
            Expr::symbol("B0"),
        ]);
        assert_eq!(balance.simplify(&full).to_string(), "B0");

        let partial = Expr::sum(vec![Expr::symbol("C00"), Expr::symbol("C10")]);
        assert_eq!(balance.simplify(&partial), partial);

        let all_c = Expr::sum(
            ["C00", "C01", "C10", "C11"].iter().map(|s| Expr::symbol(s)),
        );
        assert!(balance.simplify(&all_c).is_one());
    }
}
