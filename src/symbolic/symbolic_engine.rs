//! # Symbolic Engine
//!
//! ## Purpose
//! Expression tree for the isotopologue balance equations. Every node built through the
//! smart constructors ([`Expr::sum`], [`Expr::product`], [`Expr::pow`]) is canonical:
//! nested sums and products are flattened, like terms are collected, numeric factors are
//! folded into a single leading coefficient and the operands are sorted by their printed
//! form. Two canonical expressions are mathematically equal exactly when they are
//! structurally equal, which lets terms be used as hash keys during collection.
//!
//! ## Main Data Structures
//! - [`Expr`]: `Number(i64)`, `Symbol(String)`, `Sum(Vec)`, `Product(Vec)`, `Power(Box, u32)`
//!
//! ## Printing
//! C-compatible text: sums list numbers first and then terms by their unsigned text,
//! products start with the coefficient and put sums in parentheses, powers print as
//! `pow(base,n)`.
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Number(i64),
    Symbol(String),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    Power(Box<Expr>, u32),
}

impl Expr {
    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    pub fn number(value: i64) -> Expr {
        Expr::Number(value)
    }

    pub fn zero() -> Expr {
        Expr::Number(0)
    }

    pub fn one() -> Expr {
        Expr::Number(1)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Number(1))
    }

    /////////////////////////////////CONSTRUCTORS////////////////////////////////////////////

    /// canonical sum: flattens nested sums, drops zeros, collects like terms
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        let mut constant: i64 = 0;
        let mut coefficients: HashMap<Expr, i64> = HashMap::new();
        let mut stack: Vec<Expr> = terms.into_iter().collect();
        while let Some(term) = stack.pop() {
            if let Expr::Sum(inner) = term {
                stack.extend(inner);
                continue;
            }
            let (coefficient, rest) = term.split_coefficient();
            match rest {
                None => constant += coefficient,
                Some(rest) => *coefficients.entry(rest).or_insert(0) += coefficient,
            }
        }
        let mut collected: Vec<(String, Expr)> = coefficients
            .into_iter()
            .filter(|(_, coefficient)| *coefficient != 0)
            .map(|(rest, coefficient)| (rest.to_string(), Expr::scaled(coefficient, rest)))
            .collect();
        collected.sort_by(|a, b| a.0.cmp(&b.0));

        let mut result: Vec<Expr> = Vec::with_capacity(collected.len() + 1);
        if constant != 0 {
            result.push(Expr::Number(constant));
        }
        result.extend(collected.into_iter().map(|(_, term)| term));
        match result.len() {
            0 => Expr::zero(),
            1 => result.remove(0),
            _ => Expr::Sum(result),
        }
    }

    /// canonical product: flattens nested products, folds numbers, merges equal bases
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Expr {
        let mut coefficient: i64 = 1;
        let mut exponents: HashMap<Expr, u32> = HashMap::new();
        let mut stack: Vec<Expr> = factors.into_iter().collect();
        while let Some(factor) = stack.pop() {
            match factor {
                Expr::Number(value) => coefficient *= value,
                Expr::Product(inner) => stack.extend(inner),
                Expr::Power(base, exponent) => *exponents.entry(*base).or_insert(0) += exponent,
                other => *exponents.entry(other).or_insert(0) += 1,
            }
        }
        if coefficient == 0 {
            return Expr::zero();
        }
        let mut rest: Vec<Expr> = exponents
            .into_iter()
            .map(|(base, exponent)| {
                if exponent == 1 {
                    base
                } else {
                    Expr::Power(Box::new(base), exponent)
                }
            })
            .collect();
        rest.sort_by_cached_key(|factor| factor.factor_text());
        if rest.is_empty() {
            return Expr::Number(coefficient);
        }
        if coefficient == 1 && rest.len() == 1 {
            return rest.remove(0);
        }
        if coefficient != 1 {
            rest.insert(0, Expr::Number(coefficient));
        }
        Expr::Product(rest)
    }

    pub fn pow(base: Expr, exponent: u32) -> Expr {
        match (base, exponent) {
            (_, 0) => Expr::one(),
            (base, 1) => base,
            (Expr::Number(value), exponent) => match value.checked_pow(exponent) {
                Some(power) => Expr::Number(power),
                None => Expr::Power(Box::new(Expr::Number(value)), exponent),
            },
            (Expr::Power(inner, inner_exponent), exponent) => {
                match inner_exponent.checked_mul(exponent) {
                    Some(product) => Expr::pow(*inner, product),
                    None => Expr::Power(Box::new(Expr::Power(inner, inner_exponent)), exponent),
                }
            }
            (Expr::Product(factors), exponent) => {
                Expr::product(factors.into_iter().map(|factor| Expr::pow(factor, exponent)))
            }
            (base, exponent) => Expr::Power(Box::new(base), exponent),
        }
    }

    pub fn negate(self) -> Expr {
        Expr::product([Expr::Number(-1), self])
    }

    pub fn subtract(self, other: Expr) -> Expr {
        Expr::sum([self, other.negate()])
    }

    fn scaled(coefficient: i64, rest: Expr) -> Expr {
        if coefficient == 1 {
            rest
        } else {
            Expr::product([Expr::Number(coefficient), rest])
        }
    }

    /// splits a canonical term into its numeric coefficient and the remaining factors
    pub fn split_coefficient(&self) -> (i64, Option<Expr>) {
        match self {
            Expr::Number(value) => (*value, None),
            Expr::Product(factors) => match factors.first() {
                Some(Expr::Number(value)) => {
                    let mut rest = factors[1..].to_vec();
                    let rest = if rest.len() == 1 {
                        rest.remove(0)
                    } else {
                        Expr::Product(rest)
                    };
                    (*value, Some(rest))
                }
                _ => (1, Some(self.clone())),
            },
            other => (1, Some(other.clone())),
        }
    }

    /// operands of a sum, or the expression itself as a single term
    pub fn terms(&self) -> Vec<Expr> {
        match self {
            Expr::Sum(terms) => terms.clone(),
            Expr::Number(0) => Vec::new(),
            other => vec![other.clone()],
        }
    }

    pub fn term_count(&self) -> usize {
        match self {
            Expr::Sum(terms) => terms.len(),
            Expr::Number(0) => 0,
            _ => 1,
        }
    }

    /////////////////////////////////TRANSFORMATIONS/////////////////////////////////////////

    /// replaces every occurrence of the symbol `name` by `value` and re-canonicalizes
    pub fn subs(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Symbol(symbol) if symbol == name => value.clone(),
            Expr::Number(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(terms) => Expr::sum(terms.iter().map(|term| term.subs(name, value))),
            Expr::Product(factors) => {
                Expr::product(factors.iter().map(|factor| factor.subs(name, value)))
            }
            Expr::Power(base, exponent) => Expr::pow(base.subs(name, value), *exponent),
        }
    }

    /// fully distributes products over sums
    pub fn expand(&self) -> Expr {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(terms) => Expr::sum(terms.iter().map(Expr::expand)),
            Expr::Product(factors) => factors
                .iter()
                .map(Expr::expand)
                .fold(Expr::one(), |acc, factor| distribute(&acc, &factor)),
            Expr::Power(base, exponent) => {
                let base = base.expand();
                (0..*exponent).fold(Expr::one(), |acc, _| distribute(&acc, &base))
            }
        }
    }

    /// partial derivative with respect to the symbol `var`
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Number(_) => Expr::zero(),
            Expr::Symbol(symbol) => {
                if symbol == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Sum(terms) => Expr::sum(terms.iter().map(|term| term.diff(var))),
            Expr::Product(factors) => Expr::sum((0..factors.len()).map(|i| {
                let derivative = factors[i].diff(var);
                if derivative.is_zero() {
                    return Expr::zero();
                }
                Expr::product(factors.iter().enumerate().map(|(j, factor)| {
                    if i == j {
                        derivative.clone()
                    } else {
                        factor.clone()
                    }
                }))
            })),
            Expr::Power(base, exponent) => {
                let derivative = base.diff(var);
                if derivative.is_zero() {
                    return Expr::zero();
                }
                Expr::product([
                    Expr::Number(i64::from(*exponent)),
                    Expr::pow((**base).clone(), exponent - 1),
                    derivative,
                ])
            }
        }
    }

    /// numeric value; the error carries the first unbound symbol
    pub fn eval(&self, env: &HashMap<String, f64>) -> Result<f64, String> {
        match self {
            Expr::Number(value) => Ok(*value as f64),
            Expr::Symbol(symbol) => env.get(symbol).copied().ok_or_else(|| symbol.clone()),
            Expr::Sum(terms) => terms
                .iter()
                .try_fold(0.0_f64, |acc, term| term.eval(env).map(|value| acc + value)),
            Expr::Product(factors) => factors
                .iter()
                .try_fold(1.0_f64, |acc, factor| factor.eval(env).map(|value| acc * value)),
            Expr::Power(base, exponent) => {
                let base = base.eval(env)?;
                Ok(match i32::try_from(*exponent) {
                    Ok(exponent) => base.powi(exponent),
                    Err(_) => base.powf(f64::from(*exponent)),
                })
            }
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, symbols: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(symbol) => {
                symbols.insert(symbol.clone());
            }
            Expr::Sum(operands) | Expr::Product(operands) => {
                for operand in operands {
                    operand.collect_symbols(symbols);
                }
            }
            Expr::Power(base, _) => base.collect_symbols(symbols),
        }
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Symbol(symbol) => symbol == name,
            Expr::Sum(operands) | Expr::Product(operands) => {
                operands.iter().any(|operand| operand.contains_symbol(name))
            }
            Expr::Power(base, _) => base.contains_symbol(name),
        }
    }

    /// text of the expression when it stands as a factor of a product
    fn factor_text(&self) -> String {
        match self {
            Expr::Sum(_) => format!("({})", self),
            _ => self.to_string(),
        }
    }
}

fn distribute(left: &Expr, right: &Expr) -> Expr {
    let left_terms = left.terms();
    let right_terms = right.terms();
    Expr::sum(left_terms.iter().flat_map(|a| {
        right_terms
            .iter()
            .map(move |b| Expr::product([a.clone(), b.clone()]))
    }))
}

/// writes `|coefficient| * rest` without the sign
fn write_magnitude(f: &mut fmt::Formatter<'_>, magnitude: i64, rest: &Option<Expr>) -> fmt::Result {
    match rest {
        None => write!(f, "{}", magnitude),
        Some(rest) if magnitude == 1 => write!(f, "{}", rest),
        Some(rest) => write!(f, "{}*{}", magnitude, rest),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Symbol(symbol) => write!(f, "{}", symbol),
            Expr::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (coefficient, rest) = term.split_coefficient();
                    if coefficient < 0 {
                        write!(f, "-")?;
                    } else if i > 0 {
                        write!(f, "+")?;
                    }
                    write_magnitude(f, coefficient.abs(), &rest)?;
                }
                Ok(())
            }
            Expr::Product(factors) => {
                let mut rest = factors.as_slice();
                if let Some(Expr::Number(coefficient)) = factors.first() {
                    rest = &factors[1..];
                    match *coefficient {
                        -1 => write!(f, "-")?,
                        _ => write!(f, "{}*", coefficient)?,
                    }
                }
                let text: Vec<String> = rest.iter().map(Expr::factor_text).collect();
                write!(f, "{}", text.join("*"))
            }
            Expr::Power(base, exponent) => write!(f, "pow({},{})", base, exponent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn s(name: &str) -> Expr {
        Expr::symbol(name)
    }

    #[test]
    fn test_sum_collects_and_sorts() {
        let e = Expr::sum(vec![s("B0"), s("A1"), s("A0"), s("B0"), Expr::number(3)]);
        assert_eq!(e.to_string(), "3+A0+A1+2*B0");
        let cancelled = Expr::sum(vec![s("A0"), s("A0").negate()]);
        assert!(cancelled.is_zero());
    }

    #[test]
    fn test_sum_flattens_nested() {
        let inner = Expr::sum(vec![s("C00"), s("C10")]);
        let e = Expr::sum(vec![s("A0"), inner]);
        assert_eq!(e, Expr::Sum(vec![s("A0"), s("C00"), s("C10")]));
    }

    #[test]
    fn test_product_orders_factors_and_parenthesizes_sums() {
        let total = Expr::sum(vec![s("A0"), s("A1")]);
        let e = Expr::product(vec![s("B0"), total]);
        assert_eq!(e.to_string(), "(A0+A1)*B0");
        let p = Expr::product(vec![s("x"), Expr::number(2), s("x")]);
        assert_eq!(p.to_string(), "2*pow(x,2)");
    }

    #[test]
    fn test_negative_rendering() {
        let e = Expr::sum(vec![Expr::one(), s("C01").negate(), s("C10").negate()]);
        assert_eq!(e.to_string(), "1-C01-C10");
        assert_eq!(s("A0").negate().to_string(), "-A0");
    }

    #[test]
    fn test_subs_and_expand() {
        let total = Expr::sum(vec![s("A0"), s("A1")]);
        let replacement = Expr::one().subtract(s("A1"));
        let replaced = total.subs("A0", &replacement);
        assert!(replaced.is_one());

        let square = Expr::pow(Expr::sum(vec![s("a"), s("b")]), 2);
        assert_eq!(square.expand().to_string(), "2*a*b+pow(a,2)+pow(b,2)");
    }

    #[test]
    fn test_diff() {
        let e = Expr::product(vec![s("k"), Expr::pow(s("x"), 3)]);
        assert_eq!(e.diff("x").to_string(), "3*k*pow(x,2)");
        assert!(e.diff("y").is_zero());
        let linear = Expr::sum(vec![Expr::product(vec![s("f"), s("x")]), s("y")]);
        assert_eq!(linear.diff("x").to_string(), "f");
    }

    #[test]
    fn test_eval() {
        let e = Expr::sum(vec![
            Expr::product(vec![s("k"), Expr::pow(s("x"), 2)]),
            Expr::number(1),
        ]);
        let env = HashMap::from([("k".to_string(), 2.0), ("x".to_string(), 3.0)]);
        assert_relative_eq!(e.eval(&env).unwrap(), 19.0);
        let missing = HashMap::from([("k".to_string(), 2.0)]);
        assert_eq!(e.eval(&missing), Err("x".to_string()));
    }

    #[test]
    fn test_large_exponents() {
        let env = HashMap::from([("x".to_string(), 0.5)]);
        let huge = Expr::pow(s("x"), 1 << 31);
        assert_eq!(huge.eval(&env).unwrap(), 0.0);
        assert_eq!(
            Expr::pow(Expr::number(10), 40),
            Expr::Power(Box::new(Expr::number(10)), 40)
        );
        let nested = Expr::pow(Expr::pow(s("x"), 1 << 20), 1 << 20);
        assert_eq!(nested.eval(&env).unwrap(), 0.0);
    }

    #[test]
    fn test_free_symbols_and_term_count() {
        let e = Expr::sum(vec![s("b"), Expr::product(vec![s("a"), s("c")])]);
        let symbols: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["a", "b", "c"]);
        assert_eq!(e.term_count(), 2);
        assert_eq!(Expr::zero().term_count(), 0);
        assert!(e.contains_symbol("c"));
        assert!(!e.contains_symbol("d"));
    }
}
