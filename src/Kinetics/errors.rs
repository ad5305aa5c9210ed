//! # Errors
//!
//! ## Purpose
//! Error types of the model-building pipeline. Parsing problems carry the line number of the
//! network text, build problems name the species, reaction or symbol involved,
//! configuration problems name the offending option or file.
use std::fmt;
use std::io;
use thiserror::Error;

/// malformed network text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unrecognized line '{text}'")]
    UnrecognizedLine { line: usize, text: String },
    #[error("line {line}: malformed atom mapping '{text}': {reason}")]
    MalformedMapping {
        line: usize,
        text: String,
        reason: String,
    },
    #[error("line {line}: malformed reaction '{text}': {reason}")]
    MalformedReaction {
        line: usize,
        text: String,
        reason: String,
    },
    #[error("line {line}: reaction '{reaction}' uses species '{species}' that appears in no atom mapping")]
    UnmappedSpecies {
        line: usize,
        reaction: String,
        species: String,
    },
    #[error("line {line}: atom index {index} of species '{species}' exceeds its declared atom count {declared}")]
    AtomIndexOutOfRange {
        line: usize,
        species: String,
        index: usize,
        declared: usize,
    },
    #[error("line {line}: atom index 0 used for species '{species}', positions are 1-based")]
    ZeroAtomIndex { line: usize, species: String },
    #[error("line {line}: species '{species}' declared with {declared} atoms, previously with {previous}")]
    ConflictingAtomCount {
        line: usize,
        species: String,
        declared: usize,
        previous: usize,
    },
    #[error("line {line}: reaction name '{reaction}' is already used")]
    DuplicateReaction { line: usize, reaction: String },
    #[error("network contains no reactions")]
    EmptyNetwork,
}

/// structurally inconsistent network or labeling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{context}: unknown species '{species}'")]
    UnknownSpecies { context: String, species: String },
    #[error("labeled species '{0}' does not occur in the network")]
    UnknownLabeledSpecies(String),
    #[error("{context}: position {position} of species '{species}' exceeds its atom count {atom_count}")]
    AtomCountMismatch {
        context: String,
        species: String,
        position: usize,
        atom_count: usize,
    },
    #[error("reaction '{reaction}': position {position} of '{species}' is mapped from two different source atoms")]
    ConflictingAtomSource {
        reaction: String,
        species: String,
        position: usize,
    },
    #[error("reaction '{reaction}': stoichiometric coefficient {coefficient} of '{species}' is not supported, enable mass-action stoichiometry")]
    UnsupportedStoichiometry {
        reaction: String,
        species: String,
        coefficient: u32,
    },
    #[error("species '{species}' tracks {atoms} atoms, at most {limit} are supported")]
    TooManyAtoms {
        species: String,
        atoms: usize,
        limit: usize,
    },
    #[error("symbol '{symbol}' is generated twice ({first} and {second})")]
    SymbolClash {
        symbol: String,
        first: String,
        second: String,
    },
    #[error("remainder '{symbol}' is not an isotopologue of species '{species}'")]
    MissingRemainder { species: String, symbol: String },
    #[error("species '{0}' is not used by any reaction")]
    UnusedSpecies(String),
    #[error("rate symbol '{0}' is used by two reactions")]
    DuplicateRate(String),
}

/// invalid options, task files or labeling configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("labeled species '{species}': invalid isotopologue pattern '{pattern}', expected {atoms} characters of 0/1")]
    InvalidPattern {
        species: String,
        pattern: String,
        atoms: usize,
    },
    #[error(
        "labeled species '{species}': fraction {fraction} for pattern '{pattern}' is not a finite non-negative number"
    )]
    InvalidFraction {
        species: String,
        pattern: String,
        fraction: String,
    },
    #[error("eliminate_remainder_states requires replace_total_sum_with_one")]
    EliminationWithoutReplacement,
    #[error("function name '{0}' is not a C identifier")]
    InvalidFunctionName(String),
    #[error("reaction '{0}': reverse rate given for an irreversible reaction")]
    ContradictoryRates(String),
    #[error("{source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum IsoKinError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("evaluation error: {0}")]
    Evaluation(String),
    #[error("code formatting error: {0}")]
    Format(#[from] fmt::Error),
}
