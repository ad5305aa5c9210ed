//! # ODE System
//!
//! ## Purpose
//! The finished isotopologue model: every symbol the generated code declares, in the order
//! that fixes its array index, plus one balance equation per state. The code emitter and
//! the reference evaluator only read it.
//!
//! ## Array contract
//! | array | content | order |
//! |---|---|---|
//! | `input_list` | state fractions | internal species by name, then pattern |
//! | `out` | state derivatives | same as `input_list` |
//! | `flux_list` | rates | reactions in network order, forward then reverse |
//! | `pool_list` | pool sizes | internal species by descending name |
//!
//! ## Reference evaluation
//! [`OdeSystem::evaluate`] and [`OdeSystem::evaluate_jacobian`] compute the same right-hand
//! side and Jacobian as the generated C code, with `nalgebra` vectors and matrices.
use crate::Kinetics::enumerator::IsotopologueCatalogue;
use crate::Kinetics::errors::IsoKinError;
use crate::Kinetics::network_parser::Network;
use crate::Kinetics::ode_builder::IsotopologueOde;
use crate::symbolic::symbolic_engine::Expr;
use nalgebra::{DMatrix, DVector};
use prettytable::{Cell, Row, Table};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct OdeSystem {
    pub name: String,
    /// non-blank lines of the network text
    pub header: Vec<String>,
    /// labeled isotopologues with their fixed fractions
    pub labeled: Vec<(String, f64)>,
    pub states: Vec<String>,
    /// remainders removed from the states with their defining expressions
    pub eliminated: Vec<(String, Expr)>,
    pub rates: Vec<String>,
    pub pools: Vec<String>,
    /// one equation per state, same order
    pub equations: Vec<IsotopologueOde>,
}

/// non-zero entry `d(numerator_row)/d(state_column)`, divided by `pool` in the generated code
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianEntry {
    pub row: usize,
    pub column: usize,
    pub derivative: Expr,
    pub pool: String,
}

impl OdeSystem {
    pub fn new(
        name: &str,
        network: &Network,
        catalogue: &IsotopologueCatalogue,
        equations: Vec<IsotopologueOde>,
    ) -> Self {
        OdeSystem {
            name: name.to_string(),
            header: network.header_lines(),
            labeled: catalogue.labeled_constants(),
            states: catalogue.state_symbols(),
            eliminated: Vec::new(),
            rates: network
                .reactions
                .iter()
                .flat_map(|reaction| reaction.rates())
                .map(str::to_string)
                .collect(),
            pools: catalogue.pool_symbols(),
            equations,
        }
    }

    pub fn state_index(&self, symbol: &str) -> Option<usize> {
        self.states.iter().position(|state| state == symbol)
    }

    pub fn rate_index(&self, symbol: &str) -> Option<usize> {
        self.rates.iter().position(|rate| rate == symbol)
    }

    pub fn pool_index(&self, symbol: &str) -> Option<usize> {
        self.pools.iter().position(|pool| pool == symbol)
    }

    /// numerator of equation `row` expressed in states only
    pub fn resolved_numerator(&self, row: usize) -> Expr {
        let mut numerator = self.equations[row].numerator();
        for (symbol, definition) in &self.eliminated {
            if numerator.contains_symbol(symbol) {
                numerator = numerator.subs(symbol, definition);
            }
        }
        numerator
    }

    /// non-zero Jacobian entries in row-major order
    pub fn jacobian(&self) -> Vec<JacobianEntry> {
        let mut entries = Vec::new();
        for (row, equation) in self.equations.iter().enumerate() {
            let numerator = self.resolved_numerator(row);
            for (column, state) in self.states.iter().enumerate() {
                if !numerator.contains_symbol(state) {
                    continue;
                }
                let derivative = numerator.diff(state);
                if !derivative.is_zero() {
                    entries.push(JacobianEntry {
                        row,
                        column,
                        derivative,
                        pool: equation.pool.clone(),
                    });
                }
            }
        }
        entries
    }

    /// symbol values bound the way the generated code binds its arrays
    fn environment(
        &self,
        pools: &[f64],
        fluxes: &[f64],
        states: &[f64],
    ) -> Result<HashMap<String, f64>, IsoKinError> {
        for (what, expected, given) in [
            ("pool sizes", self.pools.len(), pools.len()),
            ("fluxes", self.rates.len(), fluxes.len()),
            ("states", self.states.len(), states.len()),
        ] {
            if expected != given {
                return Err(IsoKinError::Evaluation(format!(
                    "expected {} {}, got {}",
                    expected, what, given
                )));
            }
        }
        let mut env: HashMap<String, f64> = HashMap::new();
        env.extend(self.labeled.iter().cloned());
        env.extend(self.states.iter().cloned().zip(states.iter().copied()));
        for (symbol, definition) in &self.eliminated {
            let value = definition.eval(&env).map_err(|unbound| {
                IsoKinError::Evaluation(format!("{} refers to unbound symbol {}", symbol, unbound))
            })?;
            env.insert(symbol.clone(), value);
        }
        env.extend(self.rates.iter().cloned().zip(fluxes.iter().copied()));
        env.extend(self.pools.iter().cloned().zip(pools.iter().copied()));
        Ok(env)
    }

    fn pool_value(env: &HashMap<String, f64>, pool: &str) -> Result<f64, IsoKinError> {
        env.get(pool)
            .copied()
            .ok_or_else(|| IsoKinError::Evaluation(format!("unbound pool symbol {}", pool)))
    }

    /// right-hand side: `out[k] = numerator_k / pool_k`
    pub fn evaluate(
        &self,
        pools: &[f64],
        fluxes: &[f64],
        states: &[f64],
    ) -> Result<DVector<f64>, IsoKinError> {
        let env = self.environment(pools, fluxes, states)?;
        let mut out = DVector::zeros(self.equations.len());
        for (k, equation) in self.equations.iter().enumerate() {
            let numerator = equation.numerator().eval(&env).map_err(|unbound| {
                IsoKinError::Evaluation(format!(
                    "equation of {} refers to unbound symbol {}",
                    equation.symbol, unbound
                ))
            })?;
            out[k] = numerator / Self::pool_value(&env, &equation.pool)?;
        }
        Ok(out)
    }

    /// `jac[(i, j)] = d out[i] / d input_list[j]`
    pub fn evaluate_jacobian(
        &self,
        pools: &[f64],
        fluxes: &[f64],
        states: &[f64],
    ) -> Result<DMatrix<f64>, IsoKinError> {
        let env = self.environment(pools, fluxes, states)?;
        let n = self.states.len();
        let mut jac = DMatrix::zeros(self.equations.len(), n);
        for entry in self.jacobian() {
            let value = entry.derivative.eval(&env).map_err(|unbound| {
                IsoKinError::Evaluation(format!("Jacobian refers to unbound symbol {}", unbound))
            })?;
            jac[(entry.row, entry.column)] = value / Self::pool_value(&env, &entry.pool)?;
        }
        Ok(jac)
    }

    /// index layout of the arrays of the generated code
    pub fn layout_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(
            ["index", "input_list / out", "flux_list", "pool_list"]
                .iter()
                .map(|title| Cell::new(title))
                .collect(),
        ));
        let rows = self.states.len().max(self.rates.len()).max(self.pools.len());
        let column = |items: &[String], i: usize| -> Cell {
            Cell::new(items.get(i).map(String::as_str).unwrap_or(""))
        };
        for i in 0..rows {
            table.add_row(Row::new(vec![
                Cell::new(&i.to_string()),
                column(&self.states, i),
                column(&self.rates, i),
                column(&self.pools, i),
            ]));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::ode_builder::OdeBuilder;
    use crate::settings::{LabeledSpecies, StoichiometryPolicy};
    use approx::assert_relative_eq;

    fn system() -> OdeSystem {
        let network = Network::parse("A + B | {1:1}\nA_B : A <=> B").unwrap();
        let labeled = LabeledSpecies::from([(
            "A".to_string(),
            [("0".to_string(), 0.2), ("1".to_string(), 0.8)].into_iter().collect(),
        )]);
        let catalogue = IsotopologueCatalogue::enumerate(&network, &labeled).unwrap();
        let equations = OdeBuilder::new(&network, &catalogue, StoichiometryPolicy::Reject)
            .build()
            .unwrap();
        OdeSystem::new("single", &network, &catalogue, equations)
    }

    #[test]
    fn test_layout() {
        let system = system();
        assert_eq!(system.states, vec!["B0", "B1"]);
        assert_eq!(system.rates, vec!["fA_B", "rA_B"]);
        assert_eq!(system.pools, vec!["pool_B"]);
        assert_eq!(system.rate_index("rA_B"), Some(1));
        assert_eq!(system.state_index("B1"), Some(1));
        let table = system.layout_table();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_evaluate() {
        let system = system();
        // dB0/dt = (fA_B*A0 - rA_B*B0)/pool_B
        let out = system.evaluate(&[2.0], &[1.0, 0.5], &[0.4, 0.6]).unwrap();
        assert_relative_eq!(out[0], (0.2 - 0.5 * 0.4) / 2.0);
        assert_relative_eq!(out[1], (0.8 - 0.5 * 0.6) / 2.0);
    }

    #[test]
    fn test_evaluate_length_mismatch() {
        let system = system();
        let err = system.evaluate(&[2.0], &[1.0], &[0.4, 0.6]).unwrap_err();
        assert!(err.to_string().contains("expected 2 fluxes, got 1"));
    }

    #[test]
    fn test_jacobian() {
        let system = system();
        let entries = system.jacobian();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].row, entries[0].column), (0, 0));
        assert_eq!(entries[0].derivative.to_string(), "-rA_B");
        let jac = system
            .evaluate_jacobian(&[2.0], &[1.0, 0.5], &[0.4, 0.6])
            .unwrap();
        assert_relative_eq!(jac[(0, 0)], -0.25);
        assert_relative_eq!(jac[(1, 1)], -0.25);
        assert_relative_eq!(jac[(0, 1)], 0.0);
    }
}
