//! Program definition files.
//!
//! ```toml
//! [options]
//! max_call_depth = 64
//!
//! [[prog]]
//! name = "fib"
//! returns = "number"
//! parameters = ["number n"]
//! body = """
//! return if(@n < 2, @n, @fib(@n - 1) + @fib(@n - 2))
//! """
//! ```
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use miette::{IntoDiagnostic, WrapErr};
use prog_lang::{Engine, Options, Prog, ProgType};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgFile {
    #[serde(default)]
    pub options: Option<Options>,
    #[serde(default, rename = "prog")]
    pub progs: Vec<ProgDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgDefinition {
    pub name: String,
    #[serde(default = "void")]
    pub returns: ProgType,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub body: String,
}

/// A parameter written as `<type> <name>`, e.g. `number collection scores`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Parameter {
    pub name: String,
    pub ty: ProgType,
}

fn void() -> ProgType {
    ProgType::VOID
}

impl TryFrom<String> for Parameter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (ty, name) = value
            .trim()
            .rsplit_once(char::is_whitespace)
            .ok_or_else(|| format!("Parameter `{value}` must be written as `<type> <name>`"))?;

        let name = name.trim_start_matches('@');
        if name.is_empty() {
            return Err(format!("Parameter `{value}` has no name"));
        }

        Ok(Self {
            name: name.to_string(),
            ty: ty.parse().map_err(|e| format!("Parameter `{value}`: {e}"))?,
        })
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

impl ProgFile {
    pub fn parse(content: &str) -> miette::Result<Self> {
        toml::from_str(content).into_diagnostic()
    }

    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }

    /// Defines every program in an engine configured with the file's options.
    /// The programs are not compiled yet.
    pub fn into_engine(self) -> Engine {
        let mut engine = Engine::default().with_options(self.options.unwrap_or_default());

        for definition in self.progs {
            tracing::debug!(name = %definition.name, "defining program");
            engine.define_prog(definition.into_prog());
        }

        engine
    }
}

impl ProgDefinition {
    pub fn into_prog(self) -> Prog {
        self.parameters.iter().fold(
            Prog::new(&self.name, self.returns, self.body),
            |prog, parameter| prog.with_parameter(&parameter.name, parameter.ty),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prog_lang::Scalar;
    use rstest::rstest;

    #[rstest]
    #[case::scalar("number n", Ok(Parameter { name: "n".into(), ty: ProgType::NUMBER }))]
    #[case::collection("text collection names", Ok(Parameter { name: "names".into(), ty: ProgType::Collection(Scalar::Text) }))]
    #[case::sigil("  number @n ", Ok(Parameter { name: "n".into(), ty: ProgType::NUMBER }))]
    #[case::no_type("n", Err("Parameter `n` must be written as `<type> <name>`".to_string()))]
    fn test_parameter(#[case] input: &str, #[case] expected: Result<Parameter, String>) {
        assert_eq!(Parameter::try_from(input.to_string()), expected);
    }

    #[test]
    fn test_parse_file() {
        let file = ProgFile::parse(
            r#"
            [options]
            max_call_depth = 8

            [[prog]]
            name = "double"
            returns = "number"
            parameters = ["number n"]
            body = "return @n * 2"

            [[prog]]
            name = "noop"
            body = "return"
            "#,
        )
        .unwrap();

        assert_eq!(file.options.map(|o| o.max_call_depth), Some(8));
        assert_eq!(file.progs.len(), 2);
        assert_eq!(file.progs[1].returns, ProgType::VOID);

        let engine = file.into_engine();
        assert_eq!(engine.options().max_call_depth, 8);
        assert!(engine.compile_progs().is_empty());
    }

    #[test]
    fn test_parse_bad_parameter() {
        let result = ProgFile::parse(
            r#"
            [[prog]]
            name = "bad"
            parameters = ["widget w"]
            body = "return"
            "#,
        );
        assert!(result.is_err());
    }
}
