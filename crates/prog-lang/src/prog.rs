//! Named, typed, multi-line programs.
//!
//! Every non-empty line of a program body is one statement:
//!
//! - `return <expression>` ends the program with the value of the expression
//! - `return` alone ends a program that returns `Void`
//! - `// ...` is a comment
//! - any other line is an expression executed for its effect, usually an indexer
//!   assignment such as `@totals["gold"] = @totals["gold"] + 1`
use crate::compiler::error::CompileErrorKind;
use crate::compiler::{CompiledExpression, compile_line};
use crate::engine::Options;
use crate::error::runtime::RuntimeError;
use crate::error::{Error, InnerError};
use crate::range::{Position, Range};
use crate::registry::{Registry, UserProgram};
use crate::scope::{Declarations, VariableScope};
use crate::types::ProgType;
use crate::value::{BoxedValue, Value};
use crate::{Ident, Shared, SharedCell};

const RETURN: &str = "return";
const COMMENT: &str = "//";

#[derive(Debug)]
enum Statement {
    Return(Option<CompiledExpression>),
    Evaluate(CompiledExpression),
}

#[derive(Debug)]
pub struct Prog {
    name: Ident,
    parameters: Vec<(Ident, ProgType)>,
    return_type: ProgType,
    body: String,
    options: Options,
    statements: SharedCell<Option<Shared<[Statement]>>>,
}

impl Prog {
    pub fn new(name: &str, return_type: ProgType, body: impl Into<String>) -> Self {
        Self {
            name: Ident::new(name),
            parameters: Vec::new(),
            return_type,
            body: body.into(),
            options: Options::default(),
            statements: SharedCell::new(None),
        }
    }

    pub fn with_parameter(mut self, name: &str, ty: ProgType) -> Self {
        self.parameters.push((Ident::new(name), ty));
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn parameters(&self) -> &[(Ident, ProgType)] {
        &self.parameters
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_compiled(&self) -> bool {
        crate::value::read(&self.statements).is_some()
    }

    /// Compiles every statement of the body, replacing any earlier compilation.
    ///
    /// Stops at the first line that fails; the program stays uncompiled in that case.
    #[allow(clippy::result_large_err)]
    pub fn compile(&self, registry: &Registry) -> Result<(), Error> {
        let mut declarations = self
            .parameters
            .iter()
            .map(|(name, ty)| (name.as_str(), *ty))
            .collect::<Declarations>();

        let mut statements = Vec::new();
        let mut returns = false;

        for (index, text) in self.body.lines().enumerate() {
            let line = index + 1;
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
                continue;
            }

            let statement = match return_expression(text) {
                Some(None) => {
                    self.check_return(text, line, ProgType::VOID, full_line(text))?;
                    Statement::Return(None)
                }
                Some(Some(padded)) => {
                    let expression = compile_line(&padded, line, registry, &mut declarations, &self.options)
                        .map_err(|e| Error { source_code: text.to_string(), ..e })?;
                    self.check_return(text, line, expression.return_type(), full_line(text))?;
                    Statement::Return(Some(expression))
                }
                None => Statement::Evaluate(compile_line(text, line, registry, &mut declarations, &self.options)?),
            };

            returns |= matches!(statement, Statement::Return(_));
            statements.push(statement);
        }

        if !returns && self.return_type != ProgType::VOID {
            let line = self.body.lines().count().max(1);
            return Err(Error::from_error(
                self.body.lines().last().unwrap_or_default(),
                line,
                CompileErrorKind::ReturnType {
                    expected: self.return_type,
                    actual: ProgType::VOID,
                }
                .at(Range::default()),
            ));
        }

        tracing::debug!(name = %self.name, statements = statements.len(), "program compiled");
        *crate::value::write(&self.statements) = Some(statements.into());
        Ok(())
    }

    #[allow(clippy::result_large_err)]
    fn check_return(&self, text: &str, line: usize, actual: ProgType, range: Range) -> Result<(), Error> {
        let matches = if self.return_type == ProgType::VOID {
            actual == ProgType::VOID
        } else {
            actual.compatible(&self.return_type)
        };

        if matches {
            Ok(())
        } else {
            Err(Error::from_error(
                text,
                line,
                CompileErrorKind::ReturnType {
                    expected: self.return_type,
                    actual,
                }
                .at(range),
            ))
        }
    }

    /// Runs the compiled program from the host, outside any other program.
    #[allow(clippy::result_large_err)]
    pub fn execute(&self, args: Vec<Value>) -> Result<BoxedValue, Error> {
        self.run(args, 0)
            .map(|value| BoxedValue::new(self.return_type, value))
    }

    #[allow(clippy::result_large_err)]
    fn run(&self, args: Vec<Value>, call_depth: u32) -> Result<Value, Error> {
        let header = || format!("@{}", self.name);

        let Some(statements) = crate::value::read(&self.statements).clone() else {
            return Err(Error::from_error(header(), 0, RuntimeError::NotCompiled(self.name.clone())));
        };

        if args.len() != self.parameters.len() {
            return Err(Error::from_error(
                header(),
                0,
                RuntimeError::Runtime(format!(
                    "Program @{} expects {} arguments, got {}",
                    self.name,
                    self.parameters.len(),
                    args.len()
                )),
            ));
        }

        let mut scope = VariableScope::nested(call_depth);
        for ((name, _), value) in self.parameters.iter().zip(args) {
            scope.define(name, value);
        }

        for statement in statements.iter() {
            match statement {
                Statement::Evaluate(expression) => {
                    expression.execute(&mut scope)?;
                }
                Statement::Return(Some(expression)) => return expression.execute(&mut scope),
                Statement::Return(None) => return Ok(Value::Null),
            }
        }

        Ok(Value::Null)
    }
}

impl UserProgram for Prog {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_types(&self) -> Vec<ProgType> {
        self.parameters.iter().map(|(_, ty)| *ty).collect()
    }

    fn return_type(&self) -> ProgType {
        self.return_type
    }

    fn invoke(&self, args: Vec<Value>, call_depth: u32) -> Result<Value, RuntimeError> {
        let depth = call_depth + 1;
        if depth > self.options.max_call_depth {
            return Err(RuntimeError::RecursionError(self.options.max_call_depth));
        }

        tracing::trace!(name = %self.name, depth, "invoking program");

        self.run(args, depth).map_err(|e| match e.cause {
            InnerError::Runtime(inner @ RuntimeError::RecursionError(_)) => inner,
            InnerError::Runtime(inner) => RuntimeError::Program {
                name: self.name.clone(),
                line: e.line,
                inner: Box::new(inner),
            },
            other => RuntimeError::Runtime(other.to_string()),
        })
    }
}

/// For a `return` statement, the expression with the keyword blanked out so columns
/// still match the original line. `Some(None)` is a bare `return`.
fn return_expression(text: &str) -> Option<Option<String>> {
    let start = text.len() - text.trim_start().len();
    let rest = text.get(start..)?;
    let keyword = rest.get(..RETURN.len())?;
    if !keyword.eq_ignore_ascii_case(RETURN) {
        return None;
    }

    let after = &rest[RETURN.len()..];
    if after.trim().is_empty() {
        return Some(None);
    }
    if !after.starts_with(char::is_whitespace) {
        return None;
    }

    Some(Some(format!("{}{after}", " ".repeat(start + RETURN.len()))))
}

fn full_line(text: &str) -> Range {
    Range::new(Position::new(1, 1), Position::new(1, text.chars().count() + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InnerError;
    use rstest::rstest;

    fn compiled(prog: Prog, registry: &mut Registry) -> Shared<Prog> {
        let prog = Shared::new(prog);
        registry.register_program(Shared::clone(&prog) as Shared<dyn UserProgram>);
        prog
    }

    #[rstest]
    #[case::plain("return 1 + 2", Some(Some("       1 + 2".to_string())))]
    #[case::indented("  RETURN @x", Some(Some("         @x".to_string())))]
    #[case::bare("return", Some(None))]
    #[case::bare_spaces("return   ", Some(None))]
    #[case::identifier_prefix("returned(1)", None)]
    #[case::expression("@a[\"x\"] = 1", None)]
    fn test_return_expression(#[case] text: &str, #[case] expected: Option<Option<String>>) {
        assert_eq!(return_expression(text), expected);
    }

    #[test]
    fn test_statements_and_comments() {
        let mut registry = Registry::default();
        let prog = compiled(
            Prog::new(
                "tally",
                ProgType::NUMBER,
                "// count the gold\n\n@totals[\"gold\"] = @totals[\"gold\"] + @amount\nreturn @totals[\"gold\"]",
            )
            .with_parameter("totals", ProgType::Dictionary(crate::types::Scalar::Number))
            .with_parameter("amount", ProgType::NUMBER),
            &mut registry,
        );

        assert_eq!(prog.compile(&registry), Ok(()));
        let totals = Value::dictionary([("gold", Value::from(3i64))]);
        assert_eq!(
            prog.execute(vec![totals, Value::from(4i64)]).map(|b| b.value),
            Ok(Value::from(7i64))
        );
    }

    #[test]
    fn test_return_type_mismatch() {
        let registry = Registry::default();
        let prog = Prog::new("name", ProgType::NUMBER, "return \"bob\"");
        let error = prog.compile(&registry).err();

        assert_eq!(
            error.as_ref().map(|e| e.message()),
            Some("Expected a Number return value, found Text".to_string())
        );
        assert!(!prog.is_compiled());
    }

    #[test]
    fn test_missing_return() {
        let registry = Registry::default();
        let prog = Prog::new("nothing", ProgType::NUMBER, "1 + 1");
        assert!(matches!(
            prog.compile(&registry).map_err(|e| e.cause),
            Err(InnerError::Compile(_))
        ));
    }

    #[test]
    fn test_void_program() {
        let registry = Registry::default();
        let prog = Prog::new("noop", ProgType::VOID, "return");
        assert_eq!(prog.compile(&registry), Ok(()));
        assert_eq!(prog.execute(vec![]).map(|b| b.value), Ok(Value::Null));
    }

    #[test]
    fn test_not_compiled() {
        let prog = Prog::new("later", ProgType::NUMBER, "return 1");
        assert_eq!(
            prog.execute(vec![]).map_err(|e| e.cause),
            Err(InnerError::Runtime(RuntimeError::NotCompiled("later".into())))
        );
    }

    #[test]
    fn test_recursion_limit() {
        let mut registry = Registry::default();
        let options = Options {
            max_call_depth: 8,
            ..Options::default()
        };
        let prog = compiled(
            Prog::new("forever", ProgType::NUMBER, "return @forever(@n + 1)")
                .with_parameter("n", ProgType::NUMBER)
                .with_options(options),
            &mut registry,
        );

        assert_eq!(prog.compile(&registry), Ok(()));
        assert_eq!(
            prog.execute(vec![Value::from(0i64)]).map_err(|e| e.cause),
            Err(InnerError::Runtime(RuntimeError::RecursionError(8)))
        );
    }

    #[test]
    fn test_runtime_error_names_program_and_line() {
        let mut registry = Registry::default();
        let inner = compiled(
            Prog::new("divide", ProgType::NUMBER, "// divide\nreturn @a / @b")
                .with_parameter("a", ProgType::NUMBER)
                .with_parameter("b", ProgType::NUMBER),
            &mut registry,
        );
        let outer = compiled(Prog::new("outer", ProgType::NUMBER, "return @divide(1, 0)"), &mut registry);

        assert_eq!(inner.compile(&registry), Ok(()));
        assert_eq!(outer.compile(&registry), Ok(()));
        assert_eq!(
            outer.execute(vec![]).map_err(|e| e.to_string()),
            Err("Line 1: Error in program @divide at line 2: Divided by 0".to_string())
        );
    }
}
