//! `prog-lang` compiles and runs the typed expressions and programs that drive game
//! logic: eligibility checks, computed titles, conditional effects and the like.
//!
//! A source line goes through a balance check, a tokenizer, a precedence-climbing
//! parser and a type-checking compiler. The result is an immutable node tree that can
//! be executed any number of times, from any thread, against different variables.
//!
//! ## Examples
//!
//! ```rust
//! use prog_lang::{BoxedValue, Declarations, Engine, ProgType, Value, VariableScope};
//!
//! let engine = Engine::default();
//! let declarations: Declarations = [("level", ProgType::NUMBER)].into_iter().collect();
//! let expression = engine.compile("@level > 5 and @level < 10", &declarations).unwrap();
//!
//! assert_eq!(expression.return_type(), ProgType::BOOLEAN);
//!
//! let mut scope = VariableScope::new().with("level", 7i64);
//! assert_eq!(expression.execute(&mut scope).unwrap(), Value::TRUE);
//!
//! // Programs may call each other with `@name(args)`.
//! let mut engine = Engine::default();
//! engine.define_prog(
//!     prog_lang::Prog::new("square", ProgType::NUMBER, "return @n * @n")
//!         .with_parameter("n", ProgType::NUMBER),
//! );
//! assert!(engine.compile_progs().is_empty());
//! assert_eq!(
//!     engine.eval("@square(3) + 1", Vec::<(&str, BoxedValue)>::new()).unwrap().value,
//!     Value::from(10i64)
//! );
//! ```
mod ast;
mod compiler;
mod engine;
mod error;
mod lexer;
mod node;
mod number;
mod prog;
mod range;
mod registry;
mod scope;
mod types;
mod value;

use error::InnerError;
use lexer::Lexer;

pub use ast::error::ParseError;
pub use ast::node::BinaryOp as AstBinaryOp;
pub use ast::node::Expr as AstExpr;
pub use ast::node::Literal as AstLiteral;
pub use ast::node::Node as AstNode;
pub use ast::node::Operator as AstOperator;
pub use ast::parser::Parser as AstParser;
pub use ast::Ident;
pub use compiler::error::{CompileError, CompileErrorKind, Side};
pub use compiler::{CompileResult, CompiledExpression, Compiler, compile_line};
pub use engine::{Engine, Options};
pub use error::Error;
pub use error::runtime::RuntimeError;
pub use lexer::error::LexerError;
pub use lexer::scan::{check_balance, unwrap_redundant_parens};
pub use lexer::token::{Token, TokenKind};
pub use node::call::BuiltinFn;
pub use node::dot::PropertyGetter;
pub use node::extension::{ExtensionFn, Selector};
pub use node::{Node, NodeRef};
pub use number::Number;
pub use prog::Prog;
pub use range::{Position, Range};
pub use registry::{
    ArgType, BuiltinFunctionDoc, ExtensionReturn, ExtensionSignature, FunctionSignature, NodeFactory, Param,
    PropertyOwner, PropertySignature, PropertyType, Registry, ReturnRule, STANDARD_REGISTRY, UserProgram,
};
pub use scope::{Declarations, Scope, VariableScope};
pub use types::{ObjectKind, ProgType, Scalar, Shape, TypeParseError};
pub use value::{BoxedValue, Collection, DictKey, Dictionary, ProgObject, Value, format_timespan};

pub type Shared<T> = std::sync::Arc<T>;
pub type SharedCell<T> = std::sync::RwLock<T>;

/// Compiles one line against the standard registry with default options.
#[allow(clippy::result_large_err)]
pub fn compile(code: &str, declarations: &Declarations) -> CompileResult {
    let mut declarations = declarations.clone();
    compile_line(code, 1, &STANDARD_REGISTRY, &mut declarations, &Options::default())
}

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    Lexer::new()
        .tokenize(code)
        .map_err(|e| Error::from_error(code, 1, InnerError::Lexer(e)))
}

#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<AstNode, Error> {
    let unwrapped = unwrap_redundant_parens(code);
    let tokens = tokenize(&unwrapped).map_err(|e| Error {
        source_code: code.to_string(),
        ..e
    })?;

    AstParser::new(&tokens, Options::default().max_nesting_depth)
        .parse()
        .map_err(|e| Error::from_error(code, 1, InnerError::Parse(e)))
}
