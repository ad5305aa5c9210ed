//! # Code Emitter
//!
//! ## Purpose
//! Renders an [`OdeSystem`] as C source: a comment with the network text, then
//! `void <name>(double* pool_list, double* flux_list, double* solver_time, double* input_list, double* out)`
//! declaring every symbol from its array slot and assigning one derivative per state.
//! With the Jacobian switched on a second function `<name>_jacobian` writes the non-zero
//! entries of `d out / d input_list` into `jac` (row-major, the caller zero-initializes it).
//!
//! The text depends only on the system, so equal inputs give byte-identical output.
use crate::Kinetics::ode_system::OdeSystem;
use std::fmt::{self, Write};

const PARAMETERS: &str =
    "double* pool_list, double* flux_list, double* solver_time, double* input_list";

pub struct CodeEmitter<'a> {
    pub system: &'a OdeSystem,
    pub function_name: &'a str,
    pub emit_jacobian: bool,
}

impl<'a> CodeEmitter<'a> {
    pub fn new(system: &'a OdeSystem, function_name: &'a str, emit_jacobian: bool) -> Self {
        Self {
            system,
            function_name,
            emit_jacobian,
        }
    }

    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut code = String::new();
        self.write_to(&mut code)?;
        Ok(code)
    }

    /// writes the whole C text into any formatter sink
    pub fn write_to<W: Write>(&self, code: &mut W) -> fmt::Result {
        self.render_header(code)?;
        self.render_rhs(code)?;
        if self.emit_jacobian {
            code.write_char('\n')?;
            self.render_jacobian(code)?;
        }
        Ok(())
    }

    fn render_header<W: Write>(&self, code: &mut W) -> fmt::Result {
        code.write_str("/*\n")?;
        for line in &self.system.header {
            writeln!(code, "{}", line.replace("*/", "* /"))?;
        }
        code.write_str("*/\n")
    }

    /// symbol declarations shared by both functions
    fn render_declarations<W: Write>(&self, code: &mut W) -> fmt::Result {
        let system = self.system;
        for (symbol, value) in &system.labeled {
            writeln!(code, "double {} = {} ;", symbol, value)?;
        }
        for (i, state) in system.states.iter().enumerate() {
            writeln!(code, "double {} = input_list[{}] ;", state, i)?;
        }
        for (symbol, definition) in &system.eliminated {
            writeln!(code, "double {} = {} ;", symbol, definition)?;
        }
        code.write_char('\n')?;
        for (i, rate) in system.rates.iter().enumerate() {
            writeln!(code, "double {} = flux_list[{}] ;", rate, i)?;
        }
        code.write_char('\n')?;
        for (i, pool) in system.pools.iter().enumerate() {
            writeln!(code, "double {} = pool_list[{}] ;", pool, i)?;
        }
        code.write_char('\n')
    }

    fn render_rhs<W: Write>(&self, code: &mut W) -> fmt::Result {
        writeln!(
            code,
            "void {}({}, double* out)",
            self.function_name, PARAMETERS
        )?;
        code.write_str("{\n")?;
        self.render_declarations(code)?;
        for (k, equation) in self.system.equations.iter().enumerate() {
            writeln!(
                code,
                "/*d{}/dt=*/ out[{}] = ( {} )/ {} ;\n",
                equation.symbol,
                k,
                equation.render_numerator(),
                equation.pool
            )?;
        }
        code.write_str("}\n")
    }

    fn render_jacobian<W: Write>(&self, code: &mut W) -> fmt::Result {
        let n = self.system.states.len();
        writeln!(
            code,
            "void {}_jacobian({}, double* jac)",
            self.function_name, PARAMETERS
        )?;
        code.write_str("{\n")?;
        self.render_declarations(code)?;
        for entry in self.system.jacobian() {
            writeln!(
                code,
                "/*d(d{}/dt)/d{}=*/ jac[{}] = ( {} )/ {} ;\n",
                self.system.states[entry.row],
                self.system.states[entry.column],
                entry.row * n + entry.column,
                entry.derivative,
                entry.pool
            )?;
        }
        code.write_str("}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::model_builder::IsotopologueModelBuilder;
    use crate::settings::{BuildOptions, LabeledSpecies};

    /// sink refusing everything after `capacity` bytes
    struct Limited {
        text: String,
        capacity: usize,
    }

    impl Write for Limited {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.text.len() + s.len() > self.capacity {
                return Err(fmt::Error);
            }
            self.text.push_str(s);
            Ok(())
        }
    }

    fn system() -> OdeSystem {
        IsotopologueModelBuilder::new(
            "A + B | {1:1}\nA_B : A <=> B",
            "single",
            LabeledSpecies::new(),
            BuildOptions::default(),
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn test_render_matches_write_to() {
        let system = system();
        let emitter = CodeEmitter::new(&system, "single_rhs", true);
        let mut sink = Limited {
            text: String::new(),
            capacity: usize::MAX,
        };
        emitter.write_to(&mut sink).unwrap();
        assert_eq!(sink.text, emitter.render().unwrap());
        assert!(sink.text.starts_with("/*\nA + B | {1:1}\nA_B : A <=> B\n*/\nvoid single_rhs("));
    }

    #[test]
    fn test_sink_failure_propagates() {
        let system = system();
        let emitter = CodeEmitter::new(&system, "single_rhs", false);
        let mut sink = Limited {
            text: String::new(),
            capacity: 40,
        };
        assert_eq!(emitter.write_to(&mut sink), Err(fmt::Error));
        assert!(sink.text.len() <= 40);
    }
}
