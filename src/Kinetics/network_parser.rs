//! # Network Parser
//!
//! ## Purpose
//! Turns the textual description of a reaction network into a [`Network`]: reactions in
//! parse order, atom mappings between species and the species catalogue with tracked atom
//! counts.
//!
//! ## Syntax
//! ```text
//! # comment
//! C[2] + A | {1:1}        atom mapping: position 1 of C <-> position 1 of A, C tracks 2 atoms
//! C + B | {2:1}
//! AB_C : A + B <=> C      named reversible reaction, rates fAB_C and rAB_C
//! 2*B => D                unnamed irreversible reaction, named R_B_D
//! E <= D                  reversed arrow, reactants are on the right
//! ```
//! Longer arrows (`<==>`, `==>`, `<==`) are accepted. Species and reaction names are C
//! identifiers.
//!
//! ## Main Data Structures
//! - [`Reaction`], [`SpeciesRef`]: one reaction with its stoichiometry and rate symbols
//! - [`AtomMapping`]: undirected correspondence of atom positions between two species
//! - [`Network`]: the parsed network, also produced by the structured loader
//! - [`NetworkBuilder`]: line-by-line accumulator consumed by [`NetworkBuilder::finish`]
use crate::Kinetics::errors::{BuildError, ParseError};
use crate::settings::BoundaryPolicy;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

const IDENTIFIER: &str = r"[A-Za-z_][A-Za-z0-9_]*";

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^{}$", IDENTIFIER)).expect("valid identifier regex"))
}

fn mapping_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^({id})\s*(?:\[\s*(\d+)\s*\])?\s*\+\s*({id})\s*(?:\[\s*(\d+)\s*\])?\s*\|\s*\{{([^}}]*)\}}$",
            id = IDENTIFIER
        ))
        .expect("valid mapping regex")
    })
}

fn pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*:\s*(\d+)$").expect("valid pair regex"))
}

fn reaction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?:({id})\s*:)?([^:<=>]*?)(<=+>|<=+|=+>)([^:<=>]*)$",
            id = IDENTIFIER
        ))
        .expect("valid reaction regex")
    })
}

fn term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^(?:(\d+)\s*\*?\s*)?({})$", IDENTIFIER)).expect("valid term regex")
    })
}

pub fn is_c_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/////////////////////////////////////RECORDS/////////////////////////////////////////////////

/// species with its stoichiometric coefficient on one side of a reaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesRef {
    pub name: String,
    pub coefficient: u32,
}

impl SpeciesRef {
    pub fn new(name: &str, coefficient: u32) -> Self {
        Self {
            name: name.to_string(),
            coefficient,
        }
    }

    fn to_text(&self) -> String {
        if self.coefficient == 1 {
            self.name.clone()
        } else {
            format!("{}*{}", self.coefficient, self.name)
        }
    }
}

/// largest stoichiometric coefficient of one species on one side of a reaction
pub const MAX_COEFFICIENT: u32 = 1000;

/// adds up the coefficients of repeated species keeping the first occurrence order
pub fn merge_species(side: Vec<SpeciesRef>) -> Result<Vec<SpeciesRef>, String> {
    let mut merged: Vec<SpeciesRef> = Vec::with_capacity(side.len());
    for species in side {
        if species.coefficient == 0 {
            return Err(format!("zero coefficient of '{}'", species.name));
        }
        match merged.iter_mut().find(|known| known.name == species.name) {
            Some(known) => {
                known.coefficient = known
                    .coefficient
                    .checked_add(species.coefficient)
                    .ok_or_else(|| format!("coefficient overflow of '{}'", species.name))?;
            }
            None => merged.push(species),
        }
    }
    if let Some(species) = merged.iter().find(|s| s.coefficient > MAX_COEFFICIENT) {
        return Err(format!(
            "coefficient {} of '{}' exceeds {}",
            species.coefficient, species.name, MAX_COEFFICIENT
        ));
    }
    Ok(merged)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub name: String,
    pub reactants: Vec<SpeciesRef>,
    pub products: Vec<SpeciesRef>,
    pub reversible: bool,
    pub forward_rate: String,
    pub reverse_rate: Option<String>,
    /// line of the network text, None for reactions built programmatically
    pub line: Option<usize>,
}

impl Reaction {
    /// reaction with the default rate symbols `f<name>` and `r<name>`, sides as merged by
    /// [`merge_species`]
    pub fn new(
        name: &str,
        reactants: Vec<SpeciesRef>,
        products: Vec<SpeciesRef>,
        reversible: bool,
    ) -> Self {
        let reverse_rate = if reversible {
            Some(format!("r{}", name))
        } else {
            None
        };
        Self {
            name: name.to_string(),
            reactants,
            products,
            reversible,
            forward_rate: format!("f{}", name),
            reverse_rate,
            line: None,
        }
    }

    /// `R_<reactants>_<products>` with empty parts omitted
    pub fn default_name(reactants: &[SpeciesRef], products: &[SpeciesRef]) -> String {
        let concat = |side: &[SpeciesRef]| -> String {
            side.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().concat()
        };
        let mut parts = vec!["R".to_string()];
        for part in [concat(reactants), concat(products)] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        parts.join("_")
    }

    pub fn species_names(&self) -> BTreeSet<&str> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn references(&self, species: &str) -> bool {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .any(|s| s.name == species)
    }

    pub fn rates(&self) -> Vec<&str> {
        let mut rates = vec![self.forward_rate.as_str()];
        if let Some(reverse) = &self.reverse_rate {
            rates.push(reverse.as_str());
        }
        rates
    }

    pub fn to_text(&self) -> String {
        let side = |side: &[SpeciesRef]| -> String {
            side.iter().map(SpeciesRef::to_text).collect::<Vec<_>>().join(" + ")
        };
        let arrow = if self.reversible { "<=>" } else { "=>" };
        [
            self.name.clone(),
            ":".to_string(),
            side(&self.reactants),
            arrow.to_string(),
            side(&self.products),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn has_default_rates(&self) -> bool {
        let default_reverse = self.reversible.then(|| format!("r{}", self.name));
        self.forward_rate == format!("f{}", self.name) && self.reverse_rate == default_reverse
    }
}

/// `first` position `a` corresponds to `second` position `b`, positions are 1-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomMapping {
    pub first: String,
    pub second: String,
    pub pairs: Vec<(usize, usize)>,
    pub line: Option<usize>,
}

impl AtomMapping {
    pub fn new(first: &str, second: &str, pairs: Vec<(usize, usize)>) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            pairs,
            line: None,
        }
    }

    /// pairs oriented as (target position, source position), None when the mapping does not
    /// connect the two species
    pub fn transfers(&self, target: &str, source: &str) -> Option<Vec<(usize, usize)>> {
        if self.first == target && self.second == source {
            Some(self.pairs.clone())
        } else if self.second == target && self.first == source {
            Some(self.pairs.iter().map(|&(a, b)| (b, a)).collect())
        } else {
            None
        }
    }

    pub fn to_text(&self, species: &BTreeMap<String, SpeciesInfo>) -> String {
        let declared = |name: &str| -> String {
            match species.get(name) {
                Some(info) if info.declared => format!("{}[{}]", name, info.atom_count),
                _ => name.to_string(),
            }
        };
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|(a, b)| format!("{}:{}", a, b))
            .collect();
        format!(
            "{} + {} | {{{}}}",
            declared(&self.first),
            declared(&self.second),
            pairs.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesInfo {
    pub name: String,
    pub atom_count: usize,
    /// atom count given explicitly rather than inferred from the mappings
    pub declared: bool,
}

/////////////////////////////////////NETWORK/////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// network text as given, reproduced in the header of the generated code
    pub text: String,
    pub reactions: Vec<Reaction>,
    pub mappings: Vec<AtomMapping>,
    pub species: BTreeMap<String, SpeciesInfo>,
}

impl Network {
    pub fn parse(text: &str) -> Result<Network, ParseError> {
        let mut builder = NetworkBuilder::new(text);
        for (i, line) in text.lines().enumerate() {
            builder.parse_line(i + 1, line)?;
        }
        builder.finish()
    }

    /// non-blank lines of the network text, trimmed
    pub fn header_lines(&self) -> Vec<String> {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// all (target position, source position) pairs connecting `target` to `source`
    pub fn transfers(&self, target: &str, source: &str) -> Vec<(usize, usize)> {
        self.mappings
            .iter()
            .filter_map(|mapping| mapping.transfers(target, source))
            .flatten()
            .collect()
    }

    pub fn reaction_count(&self, species: &str) -> usize {
        self.reactions
            .iter()
            .filter(|reaction| reaction.references(species))
            .count()
    }

    /// network text regenerated from the records
    pub fn to_text(&self) -> String {
        let mut lines: Vec<String> = self
            .mappings
            .iter()
            .map(|mapping| mapping.to_text(&self.species))
            .collect();
        for reaction in &self.reactions {
            if !reaction.has_default_rates() {
                lines.push(format!("# rates of {}: {}", reaction.name, reaction.rates().join(", ")));
            }
            lines.push(reaction.to_text());
        }
        lines.join("\n")
    }

    /// consistency checks shared by the text parser and the structured loader
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut rates: HashSet<&str> = HashSet::new();
        for reaction in &self.reactions {
            for species in reaction.reactants.iter().chain(reaction.products.iter()) {
                if !self.species.contains_key(&species.name) {
                    return Err(BuildError::UnknownSpecies {
                        context: format!("reaction '{}'", reaction.name),
                        species: species.name.clone(),
                    });
                }
            }
            for rate in reaction.rates() {
                if !rates.insert(rate) {
                    return Err(BuildError::DuplicateRate(rate.to_string()));
                }
            }
        }
        for mapping in &self.mappings {
            let context = format!("atom mapping {} + {}", mapping.first, mapping.second);
            for (name, positions) in [
                (&mapping.first, mapping.pairs.iter().map(|p| p.0).collect::<Vec<_>>()),
                (&mapping.second, mapping.pairs.iter().map(|p| p.1).collect::<Vec<_>>()),
            ] {
                let info = self.species.get(name).ok_or_else(|| BuildError::UnknownSpecies {
                    context: context.clone(),
                    species: name.clone(),
                })?;
                if let Some(&position) = positions
                    .iter()
                    .find(|&&p| p == 0 || p > info.atom_count)
                {
                    return Err(BuildError::AtomCountMismatch {
                        context: context.clone(),
                        species: name.clone(),
                        position,
                        atom_count: info.atom_count,
                    });
                }
            }
        }
        for name in self.species.keys() {
            if self.reaction_count(name) == 0 {
                return Err(BuildError::UnusedSpecies(name.clone()));
            }
        }
        Ok(())
    }

    /// species referenced by exactly one reaction with the index of that reaction
    pub fn boundary_species(&self) -> Vec<(String, usize)> {
        self.species
            .keys()
            .filter_map(|name| {
                let users: Vec<usize> = self
                    .reactions
                    .iter()
                    .enumerate()
                    .filter(|(_, reaction)| reaction.references(name))
                    .map(|(i, _)| i)
                    .collect();
                (users.len() == 1).then(|| (name.clone(), users[0]))
            })
            .collect()
    }

    /// network with boundary species treated according to `policy`
    pub fn with_boundary_policy(&self, policy: BoundaryPolicy) -> Network {
        match policy {
            BoundaryPolicy::Keep => self.clone(),
            BoundaryPolicy::DiscardBoundarySpecies => self.discard_boundary_species(),
            BoundaryPolicy::IntroduceBoundaryFluxes => self.introduce_boundary_fluxes(),
        }
    }

    fn discard_boundary_species(&self) -> Network {
        let mut network = self.clone();
        let mut discarded: BTreeSet<String> = BTreeSet::new();
        for (species, index) in self.boundary_species() {
            let reaction = &self.reactions[index];
            let has_inner_partner = reaction
                .species_names()
                .into_iter()
                .any(|other| other != species && self.reaction_count(other) > 1);
            if !has_inner_partner {
                debug!(
                    "boundary species {} kept: reaction {} has no inner species",
                    species, reaction.name
                );
                continue;
            }
            let target = &mut network.reactions[index];
            target.reactants.retain(|s| s.name != species);
            target.products.retain(|s| s.name != species);
            discarded.insert(species);
        }
        if discarded.is_empty() {
            return network;
        }
        info!("discarded boundary species: {:?}", discarded);
        network.species.retain(|name, _| !discarded.contains(name));
        network
            .mappings
            .retain(|m| !discarded.contains(&m.first) && !discarded.contains(&m.second));
        network.text = network.to_text();
        network
    }

    fn introduce_boundary_fluxes(&self) -> Network {
        let mut network = self.clone();
        let mut introduced: Vec<String> = Vec::new();
        for (species, index) in self.boundary_species() {
            let reaction = &self.reactions[index];
            let is_product = reaction.products.iter().any(|s| s.name == species);
            let is_reactant = reaction.reactants.iter().any(|s| s.name == species);
            if is_product == is_reactant {
                continue;
            }
            let name = format!("BR_{}", species);
            if network.reactions.iter().any(|r| r.name == name) {
                warn!("boundary reaction {} already exists, not introduced", name);
                continue;
            }
            let boundary = if is_product {
                Reaction::new(&name, vec![SpeciesRef::new(&species, 1)], vec![], false)
            } else {
                Reaction::new(&name, vec![], vec![SpeciesRef::new(&species, 1)], false)
            };
            network.reactions.push(boundary);
            introduced.push(name);
        }
        if introduced.is_empty() {
            return network;
        }
        info!("introduced boundary reactions: {:?}", introduced);
        network.text = network.to_text();
        network
    }
}

/////////////////////////////////////PARSER//////////////////////////////////////////////////

/// accumulates lines of network text
pub struct NetworkBuilder {
    text: String,
    reactions: Vec<Reaction>,
    mappings: Vec<AtomMapping>,
    /// species -> (declared atom count, line of the declaration)
    declared: HashMap<String, (usize, usize)>,
}

impl NetworkBuilder {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            reactions: Vec::new(),
            mappings: Vec::new(),
            declared: HashMap::new(),
        }
    }

    pub fn parse_line(&mut self, line_number: usize, raw: &str) -> Result<(), ParseError> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        if line.contains('|') {
            self.parse_mapping(line_number, line)
        } else if line.contains("=>") || line.contains("<=") {
            self.parse_reaction(line_number, line)
        } else {
            Err(ParseError::UnrecognizedLine {
                line: line_number,
                text: line.to_string(),
            })
        }
    }

    fn parse_mapping(&mut self, line_number: usize, line: &str) -> Result<(), ParseError> {
        let malformed = |reason: &str| ParseError::MalformedMapping {
            line: line_number,
            text: line.to_string(),
            reason: reason.to_string(),
        };
        let caps = mapping_regex()
            .captures(line)
            .ok_or_else(|| malformed("expected 'X + Y | {a:b, ...}'"))?;
        let first = caps[1].to_string();
        let second = caps[3].to_string();
        for (species, count) in [(&first, caps.get(2)), (&second, caps.get(4))] {
            if let Some(count) = count {
                let count: usize = count
                    .as_str()
                    .parse()
                    .map_err(|_| malformed("atom count is not a number"))?;
                self.declare_atoms(species, count, line_number)?;
            }
        }
        let mut pairs = Vec::new();
        for pair in caps[5].split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let pair_caps = pair_regex()
                .captures(pair)
                .ok_or_else(|| malformed(&format!("bad position pair '{}'", pair)))?;
            let a: usize = pair_caps[1]
                .parse()
                .map_err(|_| malformed("position is not a number"))?;
            let b: usize = pair_caps[2]
                .parse()
                .map_err(|_| malformed("position is not a number"))?;
            for (species, index) in [(&first, a), (&second, b)] {
                if index == 0 {
                    return Err(ParseError::ZeroAtomIndex {
                        line: line_number,
                        species: species.clone(),
                    });
                }
            }
            pairs.push((a, b));
        }
        let mut mapping = AtomMapping::new(&first, &second, pairs);
        mapping.line = Some(line_number);
        self.mappings.push(mapping);
        Ok(())
    }

    pub fn declare_atoms(
        &mut self,
        species: &str,
        count: usize,
        line_number: usize,
    ) -> Result<(), ParseError> {
        match self.declared.get(species) {
            Some(&(previous, _)) if previous != count => Err(ParseError::ConflictingAtomCount {
                line: line_number,
                species: species.to_string(),
                declared: count,
                previous,
            }),
            Some(_) => Ok(()),
            None => {
                self.declared
                    .insert(species.to_string(), (count, line_number));
                Ok(())
            }
        }
    }

    fn parse_reaction(&mut self, line_number: usize, line: &str) -> Result<(), ParseError> {
        let malformed = |reason: &str| ParseError::MalformedReaction {
            line: line_number,
            text: line.to_string(),
            reason: reason.to_string(),
        };
        let caps = reaction_regex()
            .captures(line)
            .ok_or_else(|| malformed("expected '[name :] side <=> side'"))?;
        let left = parse_side(&caps[2]).map_err(|reason| malformed(&reason))?;
        let right = parse_side(&caps[4]).map_err(|reason| malformed(&reason))?;
        if left.is_empty() && right.is_empty() {
            return Err(malformed("both sides are empty"));
        }
        let arrow = &caps[3];
        let reversible = arrow.starts_with('<') && arrow.ends_with('>');
        let (reactants, products) = if arrow.starts_with('<') && !reversible {
            (right, left)
        } else {
            (left, right)
        };
        let name = match caps.get(1) {
            Some(name) => name.as_str().to_string(),
            None => Reaction::default_name(&reactants, &products),
        };
        if self.reactions.iter().any(|r| r.name == name) {
            return Err(ParseError::DuplicateReaction {
                line: line_number,
                reaction: name,
            });
        }
        let mut reaction = Reaction::new(&name, reactants, products, reversible);
        reaction.line = Some(line_number);
        debug!("line {}: reaction {}", line_number, reaction.to_text());
        self.reactions.push(reaction);
        Ok(())
    }

    pub fn finish(self) -> Result<Network, ParseError> {
        if self.reactions.is_empty() {
            return Err(ParseError::EmptyNetwork);
        }
        let mut species: BTreeMap<String, SpeciesInfo> = BTreeMap::new();
        let mut register = |name: &str, position: usize| {
            let info = species
                .entry(name.to_string())
                .or_insert_with(|| SpeciesInfo {
                    name: name.to_string(),
                    atom_count: 0,
                    declared: false,
                });
            info.atom_count = info.atom_count.max(position);
        };
        for mapping in &self.mappings {
            register(&mapping.first, 0);
            register(&mapping.second, 0);
            for &(a, b) in &mapping.pairs {
                register(&mapping.first, a);
                register(&mapping.second, b);
            }
        }
        for mapping in &self.mappings {
            let line = mapping.line.unwrap_or(0);
            for (name, index) in mapping
                .pairs
                .iter()
                .flat_map(|&(a, b)| [(&mapping.first, a), (&mapping.second, b)])
            {
                if let Some(&(declared, _)) = self.declared.get(name) {
                    if index > declared {
                        return Err(ParseError::AtomIndexOutOfRange {
                            line,
                            species: name.clone(),
                            index,
                            declared,
                        });
                    }
                }
            }
        }
        for (name, &(declared, _)) in &self.declared {
            if let Some(info) = species.get_mut(name) {
                info.atom_count = declared;
                info.declared = true;
            }
        }
        for reaction in &self.reactions {
            for name in reaction.species_names() {
                if !species.contains_key(name) {
                    return Err(ParseError::UnmappedSpecies {
                        line: reaction.line.unwrap_or(0),
                        reaction: reaction.name.clone(),
                        species: name.to_string(),
                    });
                }
            }
        }
        info!(
            "network parsed: {} reactions, {} atom mappings, {} species",
            self.reactions.len(),
            self.mappings.len(),
            species.len()
        );
        Ok(Network {
            text: self.text,
            reactions: self.reactions,
            mappings: self.mappings,
            species,
        })
    }
}

fn parse_side(side: &str) -> Result<Vec<SpeciesRef>, String> {
    let side = side.trim();
    if side.is_empty() {
        return Ok(Vec::new());
    }
    let mut species = Vec::new();
    for term in side.split('+').map(str::trim) {
        if term.is_empty() {
            return Err("empty species term".to_string());
        }
        let caps = term_regex()
            .captures(term)
            .ok_or_else(|| format!("bad species term '{}'", term))?;
        let coefficient: u32 = match caps.get(1) {
            Some(c) => c
                .as_str()
                .parse()
                .map_err(|_| format!("bad coefficient in '{}'", term))?,
            None => 1,
        };
        species.push(SpeciesRef::new(&caps[2], coefficient));
    }
    merge_species(species)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOP: &str = "
B + A | {1:1}
C + B | {1:1}
A + C | {1:1}
A_B   : A <=> B
B_C   : B <=> C
C_A   : C <=> A
";

    #[test]
    fn test_parse_loop() {
        let network = Network::parse(LOOP).unwrap();
        assert_eq!(network.reactions.len(), 3);
        assert_eq!(network.mappings.len(), 3);
        let names: Vec<&str> = network.species.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(network.species.values().all(|s| s.atom_count == 1));
        let a_b = &network.reactions[0];
        assert_eq!(a_b.name, "A_B");
        assert_eq!(a_b.forward_rate, "fA_B");
        assert_eq!(a_b.reverse_rate.as_deref(), Some("rA_B"));
        assert_eq!(a_b.line, Some(5));
        assert_eq!(network.header_lines()[3], "A_B   : A <=> B");
        assert_eq!(network.transfers("A", "B"), vec![(1, 1)]);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn test_unnamed_and_reversed_reactions() {
        let text = "A + B | {1:1}\nB + C | {1:2}\nA + B => C\nD <== C\nC + D | {1:1}";
        let network = Network::parse(text).unwrap();
        assert_eq!(network.reactions[0].name, "R_AB_C");
        assert!(!network.reactions[0].reversible);
        assert!(network.reactions[0].reverse_rate.is_none());
        let reversed = &network.reactions[1];
        assert_eq!(reversed.name, "R_C_D");
        assert_eq!(reversed.reactants, vec![SpeciesRef::new("C", 1)]);
        assert_eq!(reversed.products, vec![SpeciesRef::new("D", 1)]);
        assert_eq!(network.species["C"].atom_count, 2);
        assert_eq!(network.transfers("C", "B"), vec![(2, 1)]);
    }

    #[test]
    fn test_coefficients_merge() {
        let text = "A + B | {1:1}\nR1 : 2*A + A <=> 3 B";
        let network = Network::parse(text).unwrap();
        assert_eq!(network.reactions[0].reactants, vec![SpeciesRef::new("A", 3)]);
        assert_eq!(network.reactions[0].products, vec![SpeciesRef::new("B", 3)]);
    }

    #[test]
    fn test_declared_atom_count() {
        let text = "A[3] + B | {1:1}\nA => B";
        let network = Network::parse(text).unwrap();
        assert_eq!(network.species["A"].atom_count, 3);
        assert!(network.species["A"].declared);
        assert_eq!(network.species["B"].atom_count, 1);
    }

    #[test]
    fn test_atom_index_out_of_range() {
        let text = "A[1] + B | {2:1}\nA => B";
        let err = Network::parse(text).unwrap_err();
        assert_eq!(
            err,
            ParseError::AtomIndexOutOfRange {
                line: 1,
                species: "A".to_string(),
                index: 2,
                declared: 1
            }
        );
        assert!(err.to_string().contains("'A'"));
        assert!(err.to_string().contains("atom index 2"));
    }

    #[test]
    fn test_declaration_after_use() {
        let text = "A + B | {2:1}\nA[1] + C | {1:1}\nA => B\nA => C";
        let err = Network::parse(text).unwrap_err();
        assert!(matches!(err, ParseError::AtomIndexOutOfRange { index: 2, .. }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Network::parse("A + B | {1:1}\nthis is not a reaction"),
            Err(ParseError::UnrecognizedLine { line: 2, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {1-1}\nA => B"),
            Err(ParseError::MalformedMapping { line: 1, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {0:1}\nA => B"),
            Err(ParseError::ZeroAtomIndex { line: 1, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {1:1}\nA => 0 B"),
            Err(ParseError::MalformedReaction { line: 2, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {1:1}\nA + => B"),
            Err(ParseError::MalformedReaction { line: 2, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {1:1}\nA => C"),
            Err(ParseError::UnmappedSpecies { line: 2, .. })
        ));
        assert!(matches!(
            Network::parse("A + B | {1:1}\nX : A => B\nX : B => A"),
            Err(ParseError::DuplicateReaction { line: 3, .. })
        ));
        assert!(matches!(
            Network::parse("A[1] + B | {1:1}\nA[2] + B | {1:1}\nA => B"),
            Err(ParseError::ConflictingAtomCount { line: 2, .. })
        ));
        assert_eq!(Network::parse("A + B | {1:1}"), Err(ParseError::EmptyNetwork));
    }

    #[test]
    fn test_coefficient_limits() {
        let err = Network::parse("A + B | {1:1}\nX : 3000000000 A + 3000000000 A => B").unwrap_err();
        assert!(matches!(
            &err,
            ParseError::MalformedReaction { line: 2, reason, .. } if reason.contains("overflow")
        ));
        assert!(matches!(
            Network::parse("A + B | {1:1}\nX : 600 A + 600 A => B"),
            Err(ParseError::MalformedReaction { line: 2, .. })
        ));
        let network = Network::parse("A + B | {1:1}\nX : 500 A + 500 A => B").unwrap();
        assert_eq!(network.reactions[0].reactants, vec![SpeciesRef::new("A", 1000)]);
        assert!(merge_species(vec![SpeciesRef::new("A", 0)]).is_err());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# loop\n\n  A + B | {1:1}  \n\nA => B\n";
        let network = Network::parse(text).unwrap();
        assert_eq!(network.header_lines(), vec!["# loop", "A + B | {1:1}", "A => B"]);
        assert_eq!(network.reactions[0].line, Some(5));
    }

    #[test]
    fn test_unused_species_rejected() {
        let network = Network::parse("A + B | {1:1}\nB + C | {1:1}\nA => B").unwrap();
        assert_eq!(
            network.validate(),
            Err(BuildError::UnusedSpecies("C".to_string()))
        );
    }

    #[test]
    fn test_boundary_fluxes() {
        let text = "A + B | {1:1}\nB + C | {1:1}\nA => B\nB => C";
        let network = Network::parse(text).unwrap();
        let open = network.with_boundary_policy(BoundaryPolicy::IntroduceBoundaryFluxes);
        let names: Vec<&str> = open.reactions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["R_A_B", "R_B_C", "BR_A", "BR_C"]);
        assert!(open.reactions[2].reactants.is_empty());
        assert_eq!(open.reactions[2].products, vec![SpeciesRef::new("A", 1)]);
        assert_eq!(open.reactions[3].reactants, vec![SpeciesRef::new("C", 1)]);
        assert!(open.text.contains("BR_C : C =>"));
    }

    #[test]
    fn test_discard_boundary_species() {
        let text = "A + B | {1:1}\nB + C | {1:1}\nA => B\nB => C";
        let network = Network::parse(text).unwrap();
        let trimmed = network.with_boundary_policy(BoundaryPolicy::DiscardBoundarySpecies);
        assert_eq!(trimmed.species.keys().collect::<Vec<_>>(), vec!["B"]);
        assert!(trimmed.reactions[0].reactants.is_empty());
        assert!(trimmed.reactions[1].products.is_empty());
        assert!(trimmed.mappings.is_empty());
        assert!(trimmed.validate().is_ok());
        assert_eq!(network.with_boundary_policy(BoundaryPolicy::Keep), network);
    }

    #[test]
    fn test_to_text_round_trip() {
        let text = "A[2] + B | {1:1, 2:2}\nX : A <=> 2*B";
        let network = Network::parse(text).unwrap();
        let again = Network::parse(&network.to_text()).unwrap();
        assert_eq!(again.reactions, {
            let mut reactions = network.reactions.clone();
            reactions[0].line = Some(2);
            reactions
        });
        assert_eq!(again.species, network.species);
    }
}
