use serde::{Deserialize, Serialize};

use crate::compiler::{CompileResult, compile_line};
use crate::error::Error;
use crate::error::runtime::RuntimeError;
use crate::prog::Prog;
use crate::registry::{Registry, UserProgram};
use crate::scope::{Declarations, VariableScope};
use crate::value::{BoxedValue, Value};
use crate::{Ident, Shared};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum nesting of user program calls before execution fails.
    pub max_call_depth: u32,
    /// Maximum nesting of sub-expressions the parser accepts on one line.
    pub max_nesting_depth: usize,
}

#[cfg(debug_assertions)]
// Debug builds run on a smaller stack.
impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_depth: 32,
            max_nesting_depth: 128,
        }
    }
}

#[cfg(not(debug_assertions))]
impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_depth: 192,
            max_nesting_depth: 1024,
        }
    }
}

/// Owns a registry and the programs defined against it.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: Registry,
    options: Options,
    progs: Vec<Shared<Prog>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Hosts register object properties and extra functions here before compiling.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Compiles one expression as line 1.
    #[allow(clippy::result_large_err)]
    pub fn compile(&self, text: &str, declarations: &Declarations) -> CompileResult {
        self.compile_at(text, 1, declarations)
    }

    #[allow(clippy::result_large_err)]
    pub fn compile_at(&self, text: &str, line: usize, declarations: &Declarations) -> CompileResult {
        let mut declarations = declarations.clone();
        compile_line(text, line, &self.registry, &mut declarations, &self.options)
    }

    /// Compiles and executes one expression with the given variables bound.
    #[allow(clippy::result_large_err)]
    pub fn eval<'a>(&self, text: &str, variables: impl IntoIterator<Item = (&'a str, BoxedValue)>) -> Result<BoxedValue, Error> {
        let mut declarations = Declarations::new();
        let mut scope = VariableScope::new();
        for (name, boxed) in variables {
            declarations.define(name, boxed.ty);
            scope.define(name, boxed.value);
        }

        self.compile(text, &declarations)?.evaluate(&mut scope)
    }

    /// Adds a program and makes it callable as `@name(...)` from every program compiled
    /// afterwards, including itself. A program with the same name and parameter types
    /// replaces the earlier definition.
    pub fn define_prog(&mut self, prog: Prog) -> Shared<Prog> {
        let prog = Shared::new(prog.with_options(self.options));
        let parameters = prog.parameter_types();

        self.progs
            .retain(|p| !(p.name().eq_ignore_ascii_case(prog.name()) && p.parameter_types() == parameters));
        self.progs.push(Shared::clone(&prog));
        self.registry.register_program(Shared::clone(&prog) as Shared<dyn UserProgram>);

        prog
    }

    /// Compiles every defined program and returns the ones that failed.
    pub fn compile_progs(&self) -> Vec<(Ident, Error)> {
        let failures = self
            .progs
            .iter()
            .filter_map(|prog| {
                prog.compile(&self.registry)
                    .err()
                    .map(|e| (Ident::new(prog.name()), e))
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            programs = self.progs.len(),
            failed = failures.len(),
            "compiled programs"
        );
        failures
    }

    pub fn prog(&self, name: &str) -> Option<Shared<Prog>> {
        self.progs
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn progs(&self) -> impl Iterator<Item = &Shared<Prog>> {
        self.progs.iter()
    }

    #[allow(clippy::result_large_err)]
    pub fn run_prog(&self, name: &str, args: Vec<Value>) -> Result<BoxedValue, Error> {
        match self.prog(name) {
            Some(prog) => prog.execute(args),
            None => Err(Error::from_error(
                format!("@{name}"),
                1,
                RuntimeError::UndefinedProgram(Ident::new(name)),
            )),
        }
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProgType;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(options.max_call_depth > 0);
        assert!(options.max_nesting_depth > options.max_call_depth as usize);
    }

    #[test]
    fn test_eval_with_variables() {
        let engine = Engine::new();
        let result = engine.eval(
            "@x * 2 + 1",
            [("x", BoxedValue::new(ProgType::NUMBER, Value::from(4i64)))],
        );
        assert_eq!(result.map(|b| b.value), Ok(Value::from(9i64)));
    }

    #[test]
    fn test_compile_reports_line() {
        let engine = Engine::new();
        let error = engine.compile_at("@missing + 1", 4, &Declarations::new()).err();
        assert_eq!(error.map(|e| e.line), Some(4));
    }

    #[test]
    fn test_define_prog_replaces() {
        let mut engine = Engine::new();
        engine.define_prog(Prog::new("double", ProgType::NUMBER, "return @n * 2").with_parameter("n", ProgType::NUMBER));
        engine.define_prog(Prog::new("DOUBLE", ProgType::NUMBER, "return @n + @n").with_parameter("n", ProgType::NUMBER));

        assert_eq!(engine.progs().count(), 1);
        assert!(engine.compile_progs().is_empty());
        assert_eq!(
            engine.run_prog("double", vec![Value::from(5i64)]).map(|b| b.value),
            Ok(Value::from(10i64))
        );
    }

    #[test]
    fn test_run_unknown_prog() {
        let engine = Engine::new();
        let error = engine.run_prog("nothing", vec![]).err();
        assert_eq!(
            error.map(|e| e.message()),
            Some("There is no program @nothing".to_string())
        );
    }

    #[test]
    fn test_version() {
        assert!(!Engine::version().is_empty());
    }
}
