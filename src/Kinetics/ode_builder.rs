//! # Symbolic ODE Builder
//!
//! ## Purpose
//! Derives, for every isotopologue of every internal species, the signed rate terms of its
//! balance equation. Each reaction contributes a forward flux and, when reversible, a
//! reverse flux. A flux consumes every isotopologue of its internal sources and produces
//! target isotopologues from the source isotopologues whose mapped atoms carry the same
//! label state.
//!
//! ## Equations
//! For a flux with rate `v`, sources `S1..Sn` and target `T`:
//! - production of `T_q`: `+v * Π_j Σ{ S_j isotopologues consistent with q }`
//! - consumption of `S1_p`: `-v * S1_p * Π_{j>1} Σ S_j`
//!
//! Terms with the same sign and rate are added up; the finished equation lists positive
//! terms before negative ones, then by rate symbol. The numerator is divided by the pool
//! size of the species.
use crate::Kinetics::enumerator::{IsotopologueCatalogue, SpeciesVariants};
use crate::Kinetics::errors::BuildError;
use crate::Kinetics::network_parser::{Network, Reaction, SpeciesRef};
use crate::settings::StoichiometryPolicy;
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sign {
    Plus,
    Minus,
}

/// `sign * rate * factor`
#[derive(Debug, Clone, PartialEq)]
pub struct RateTerm {
    pub sign: Sign,
    pub rate: String,
    pub factor: Expr,
}

impl RateTerm {
    pub fn to_expr(&self) -> Expr {
        let term = Expr::product([Expr::symbol(&self.rate), self.factor.clone()]);
        match self.sign {
            Sign::Plus => term,
            Sign::Minus => term.negate(),
        }
    }

    /// `+rate*(factor)` or `-rate*(factor)`
    pub fn render(&self) -> String {
        let sign = match self.sign {
            Sign::Plus => '+',
            Sign::Minus => '-',
        };
        format!("{}{}*({})", sign, self.rate, self.factor)
    }
}

/// balance equation of one isotopologue: d<symbol>/dt = (Σ terms) / pool
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopologueOde {
    pub symbol: String,
    pub species: String,
    pub pool: String,
    pub terms: Vec<RateTerm>,
}

impl IsotopologueOde {
    pub fn numerator(&self) -> Expr {
        Expr::sum(self.terms.iter().map(RateTerm::to_expr))
    }

    pub fn render_numerator(&self) -> String {
        if self.terms.is_empty() {
            return "0".to_string();
        }
        self.terms.iter().map(RateTerm::render).collect()
    }
}

/// one direction of a reaction
#[derive(Debug, Clone)]
pub struct UniFlux<'a> {
    pub reaction: &'a Reaction,
    pub rate: &'a str,
    pub sources: &'a [SpeciesRef],
    pub targets: &'a [SpeciesRef],
}

/// per target species: for each position the (source species, source position) feeding it
pub type Transition = BTreeMap<String, Vec<Option<(String, usize)>>>;

pub struct OdeBuilder<'a> {
    network: &'a Network,
    catalogue: &'a IsotopologueCatalogue,
    stoichiometry: StoichiometryPolicy,
    /// isotopologue symbol -> (sign, rate) -> collected contributions
    accumulators: BTreeMap<String, BTreeMap<(Sign, String), Vec<Expr>>>,
}

impl<'a> OdeBuilder<'a> {
    pub fn new(
        network: &'a Network,
        catalogue: &'a IsotopologueCatalogue,
        stoichiometry: StoichiometryPolicy,
    ) -> Self {
        Self {
            network,
            catalogue,
            stoichiometry,
            accumulators: BTreeMap::new(),
        }
    }

    /// equations of all internal isotopologues in state order
    pub fn build(mut self) -> Result<Vec<IsotopologueOde>, BuildError> {
        let network = self.network;
        for reaction in &network.reactions {
            self.check_stoichiometry(reaction)?;
            for flux in fluxes(reaction) {
                let transition = self.transition(&flux)?;
                self.add_consumption(&flux)?;
                self.add_production(&flux, &transition)?;
                debug!("flux {} of reaction {} processed", flux.rate, reaction.name);
            }
        }
        let mut equations = Vec::new();
        for species in self.catalogue.internal_species() {
            for isotopologue in &species.isotopologues {
                let collected = self
                    .accumulators
                    .remove(&isotopologue.symbol)
                    .unwrap_or_default();
                let terms: Vec<RateTerm> = collected
                    .into_iter()
                    .map(|((sign, rate), contributions)| RateTerm {
                        sign,
                        rate,
                        factor: Expr::sum(contributions),
                    })
                    .filter(|term| !term.factor.is_zero())
                    .collect();
                equations.push(IsotopologueOde {
                    symbol: isotopologue.symbol.clone(),
                    species: species.name.clone(),
                    pool: species.pool_symbol(),
                    terms,
                });
            }
        }
        info!("balance equations created for {} isotopologues", equations.len());
        Ok(equations)
    }

    fn check_stoichiometry(&self, reaction: &Reaction) -> Result<(), BuildError> {
        if self.stoichiometry == StoichiometryPolicy::MassAction {
            return Ok(());
        }
        match reaction
            .reactants
            .iter()
            .chain(reaction.products.iter())
            .find(|s| s.coefficient != 1)
        {
            Some(species) => Err(BuildError::UnsupportedStoichiometry {
                reaction: reaction.name.clone(),
                species: species.name.clone(),
                coefficient: species.coefficient,
            }),
            None => Ok(()),
        }
    }

    fn variants(&self, reaction: &Reaction, name: &str) -> Result<&'a SpeciesVariants, BuildError> {
        self.catalogue
            .get(name)
            .ok_or_else(|| BuildError::UnknownSpecies {
                context: format!("reaction '{}'", reaction.name),
                species: name.to_string(),
            })
    }

    /// atom transition of a flux: which source atom ends up in each target position
    pub fn transition(&self, flux: &UniFlux<'_>) -> Result<Transition, BuildError> {
        let mut transition = Transition::new();
        for target in flux.targets {
            let target_variants = self.variants(flux.reaction, &target.name)?;
            let mut routes: Vec<Option<(String, usize)>> = vec![None; target_variants.atom_count];
            for source in flux.sources {
                let source_variants = self.variants(flux.reaction, &source.name)?;
                for (target_position, source_position) in
                    self.network.transfers(&target.name, &source.name)
                {
                    for (species, position, atom_count) in [
                        (&target.name, target_position, target_variants.atom_count),
                        (&source.name, source_position, source_variants.atom_count),
                    ] {
                        if position == 0 || position > atom_count {
                            return Err(BuildError::AtomCountMismatch {
                                context: format!("reaction '{}'", flux.reaction.name),
                                species: species.clone(),
                                position,
                                atom_count,
                            });
                        }
                    }
                    let route = Some((source.name.clone(), source_position));
                    let slot = &mut routes[target_position - 1];
                    if slot.is_some() && *slot != route {
                        return Err(BuildError::ConflictingAtomSource {
                            reaction: flux.reaction.name.clone(),
                            species: target.name.clone(),
                            position: target_position,
                        });
                    }
                    *slot = route;
                }
            }
            transition.insert(target.name.clone(), routes);
        }
        Ok(transition)
    }

    fn push(&mut self, symbol: &str, sign: Sign, rate: &str, contribution: Expr) {
        self.accumulators
            .entry(symbol.to_string())
            .or_default()
            .entry((sign, rate.to_string()))
            .or_default()
            .push(contribution);
    }

    fn add_consumption(&mut self, flux: &UniFlux<'_>) -> Result<(), BuildError> {
        for (i, source) in flux.sources.iter().enumerate() {
            let variants = self.variants(flux.reaction, &source.name)?;
            if !variants.is_internal() {
                continue;
            }
            let mut partners: Vec<Expr> = Vec::new();
            for (j, other) in flux.sources.iter().enumerate() {
                if i != j {
                    let other_variants = self.variants(flux.reaction, &other.name)?;
                    partners.push(Expr::pow(other_variants.total_sum(), other.coefficient));
                }
            }
            let own_total = Expr::pow(
                variants.total_sum(),
                remaining_copies(flux.reaction, source)?,
            );
            for isotopologue in &variants.isotopologues {
                let mut factors = vec![
                    Expr::number(i64::from(source.coefficient)),
                    Expr::symbol(&isotopologue.symbol),
                    own_total.clone(),
                ];
                factors.extend(partners.iter().cloned());
                self.push(&isotopologue.symbol, Sign::Minus, flux.rate, Expr::product(factors));
            }
        }
        Ok(())
    }

    fn add_production(
        &mut self,
        flux: &UniFlux<'_>,
        transition: &Transition,
    ) -> Result<(), BuildError> {
        for target in flux.targets {
            let variants = self.variants(flux.reaction, &target.name)?;
            if !variants.is_internal() {
                continue;
            }
            let routes = match transition.get(&target.name) {
                Some(routes) => routes,
                None => continue,
            };
            'patterns: for isotopologue in &variants.isotopologues {
                // source species -> required label state per source position
                let mut constraints: BTreeMap<&str, BTreeMap<usize, bool>> = BTreeMap::new();
                for (i, route) in routes.iter().enumerate() {
                    let labeled = isotopologue.is_labeled_at(i + 1);
                    match route {
                        None if labeled => continue 'patterns,
                        None => {}
                        Some((source, position)) => {
                            let required = constraints.entry(source.as_str()).or_default();
                            if let Some(previous) = required.insert(*position, labeled) {
                                if previous != labeled {
                                    continue 'patterns;
                                }
                            }
                        }
                    }
                }
                let mut factors = vec![Expr::number(i64::from(target.coefficient))];
                for source in flux.sources {
                    let source_variants = self.variants(flux.reaction, &source.name)?;
                    let constrained =
                        source_variants.consistent_sum(constraints.get(source.name.as_str()));
                    if constrained.is_zero() {
                        continue 'patterns;
                    }
                    factors.push(constrained);
                    factors.push(Expr::pow(
                        source_variants.total_sum(),
                        remaining_copies(flux.reaction, source)?,
                    ));
                }
                self.push(
                    &isotopologue.symbol,
                    Sign::Plus,
                    flux.rate,
                    Expr::product(factors),
                );
            }
        }
        Ok(())
    }
}

/// copies of a source species besides the one that carries the tracked atoms
fn remaining_copies(reaction: &Reaction, source: &SpeciesRef) -> Result<u32, BuildError> {
    source
        .coefficient
        .checked_sub(1)
        .ok_or_else(|| BuildError::UnsupportedStoichiometry {
            reaction: reaction.name.clone(),
            species: source.name.clone(),
            coefficient: source.coefficient,
        })
}

/// forward flux and, for reversible reactions, the reverse flux
pub fn fluxes(reaction: &Reaction) -> Vec<UniFlux<'_>> {
    let mut fluxes = vec![UniFlux {
        reaction,
        rate: &reaction.forward_rate,
        sources: &reaction.reactants,
        targets: &reaction.products,
    }];
    if let Some(reverse) = &reaction.reverse_rate {
        fluxes.push(UniFlux {
            reaction,
            rate: reverse,
            sources: &reaction.products,
            targets: &reaction.reactants,
        });
    }
    fluxes
}
