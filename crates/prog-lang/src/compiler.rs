pub mod error;

use smallvec::SmallVec;

use crate::ast::{self, Args, Expr, Ident, Literal, Operator, Parser};
use crate::engine::Options;
use crate::error::{Error, InnerError};
use crate::lexer::{Lexer, scan};
use crate::node::binary::{ArithmeticNode, ComparisonNode, LogicalNode};
use crate::node::constant::ConstantNode;
use crate::node::dot::PropertyNode;
use crate::node::extension::ExtensionNode;
use crate::node::index::{AssignNode, IndexNode};
use crate::node::invoke::ProgCallNode;
use crate::node::unary::NegateNode;
use crate::node::variable::VariableNode;
use crate::node::NodeRef;
use crate::registry::{ArgType, Registry, element_of};
use crate::scope::{Declarations, VariableScope};
use crate::types::ProgType;
use crate::value::{BoxedValue, Value};
use error::{CompileError, CompileErrorKind, Side};

/// Turns a parsed expression into a typed node tree, resolving every name against a
/// [`Registry`] and every variable against a set of [`Declarations`].
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    registry: &'a Registry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn compile(&self, node: &ast::Node, declarations: &mut Declarations) -> Result<NodeRef, CompileError> {
        match &node.expr {
            Expr::Literal(literal) => Ok(Self::literal(literal)),
            Expr::Variable(name) => match declarations.resolve(name) {
                Some(ty) => Ok(Box::new(VariableNode::new(name.clone(), *ty))),
                None => Err(CompileErrorKind::UndefinedVariable(name.clone()).at(node.range)),
            },
            Expr::Ident(name) => Err(CompileErrorKind::BareIdentifier(name.clone()).at(node.range)),
            Expr::Negate(operand) => self.compile_negate(node, operand, declarations),
            Expr::Binary(operator, lhs, rhs) => self.compile_binary(node, operator, lhs, rhs, declarations),
            Expr::Call(name, args) => self.compile_call(node, name, args, declarations),
            Expr::ProgCall(name, args) => self.compile_prog_call(node, name, args, declarations),
            Expr::Dot(target, name, None) => self.compile_property(node, target, name, declarations),
            Expr::Dot(target, name, Some(args)) => self.compile_extension(node, target, name, args, declarations),
            Expr::Index(target, key) => self.compile_index(target, key, declarations),
            Expr::Assign(target, key, value) => self.compile_assign(node, target, key, value, declarations),
        }
    }

    fn literal(literal: &Literal) -> NodeRef {
        let (value, ty) = match literal {
            Literal::Boolean(b) => (Value::Boolean(*b), ProgType::BOOLEAN),
            Literal::Number(n) => (Value::Number(*n), ProgType::NUMBER),
            Literal::Text(s) => (Value::Text(s.clone()), ProgType::TEXT),
            Literal::TimeSpan(t) => (Value::TimeSpan(*t), ProgType::TIMESPAN),
        };
        Box::new(ConstantNode::new(value, ty))
    }

    fn compile_negate(
        &self,
        node: &ast::Node,
        operand: &ast::Node,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        // A negative number literal stays a literal.
        match &operand.expr {
            Expr::Literal(Literal::Number(n)) => {
                return Ok(Box::new(ConstantNode::new(Value::Number(-*n), ProgType::NUMBER)));
            }
            Expr::Literal(Literal::TimeSpan(t)) => {
                return Ok(Box::new(ConstantNode::new(Value::TimeSpan(-*t), ProgType::TIMESPAN)));
            }
            _ => {}
        }

        let operand = self.compile(operand, declarations)?;
        let ty = operand.return_type();
        if NegateNode::accepts(&ty) {
            Ok(Box::new(NegateNode::new(operand)))
        } else {
            Err(CompileErrorKind::NegateType(ty).at(node.range))
        }
    }

    fn compile_binary(
        &self,
        node: &ast::Node,
        operator: &Operator,
        lhs: &ast::Node,
        rhs: &ast::Node,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let operand = |side: Side| {
            let symbol = operator.symbol.clone();
            move |inner: CompileError| {
                CompileErrorKind::Operand {
                    operator: symbol,
                    side,
                    inner: Box::new(inner),
                }
                .at(node.range)
            }
        };

        let lhs = self.compile(lhs, declarations).map_err(operand(Side::Left))?;
        let rhs = self.compile(rhs, declarations).map_err(operand(Side::Right))?;
        let (left, right) = (lhs.return_type(), rhs.return_type());

        let mismatch = || {
            CompileErrorKind::OperatorTypes {
                operator: operator.symbol.clone(),
                left,
                right,
            }
            .at(node.range)
        };

        match operator.op {
            op if op.is_logical() => {
                if left.compatible(&ProgType::BOOLEAN) && right.compatible(&ProgType::BOOLEAN) {
                    Ok(Box::new(LogicalNode::new(op, lhs, rhs)))
                } else {
                    Err(mismatch())
                }
            }
            op if op.is_comparison() => {
                if ComparisonNode::accepts(op, &left, &right) {
                    Ok(Box::new(ComparisonNode::new(op, lhs, rhs)))
                } else {
                    Err(mismatch())
                }
            }
            op => match ArithmeticNode::resolve(op, &left, &right) {
                Some(rule) => Ok(Box::new(ArithmeticNode::new(rule, lhs, rhs))),
                None => Err(mismatch()),
            },
        }
    }

    fn compile_args(
        &self,
        node: &ast::Node,
        function: &Ident,
        args: &Args,
        declarations: &mut Declarations,
    ) -> Result<Vec<NodeRef>, CompileError> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| {
                self.compile(arg, declarations).map_err(|inner| {
                    CompileErrorKind::Argument {
                        function: function.clone(),
                        index: i + 1,
                        inner: Box::new(inner),
                    }
                    .at(node.range)
                })
            })
            .collect()
    }

    fn compile_call(
        &self,
        node: &ast::Node,
        name: &Ident,
        args: &Args,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        if !self.registry.has_function(name) {
            return Err(CompileErrorKind::UndefinedFunction(name.clone()).at(node.range));
        }

        let args = self.compile_args(node, name, args, declarations)?;
        let arg_types = args
            .iter()
            .map(|arg| ArgType {
                ty: arg.return_type(),
                literal: arg.is_literal(),
            })
            .collect::<SmallVec<[ArgType; 4]>>();
        let types = arg_types.iter().map(|a| a.ty).collect::<SmallVec<[ProgType; 4]>>();

        match self.registry.resolve_builtin(name, &arg_types) {
            Some(signature) => {
                let ty = signature.return_rule.resolve(&types);
                Ok(signature.build(args, ty))
            }
            None => Err(CompileErrorKind::NoMatchingOverload {
                function: name.clone(),
                args: types.to_vec(),
            }
            .at(node.range)),
        }
    }

    fn compile_prog_call(
        &self,
        node: &ast::Node,
        name: &Ident,
        args: &Args,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let function = Ident::new(format!("@{name}"));
        let args = self.compile_args(node, &function, args, declarations)?;
        let types = args.iter().map(|arg| arg.return_type()).collect::<Vec<_>>();

        match self.registry.resolve_program(name, &types) {
            Some(program) => Ok(Box::new(ProgCallNode::new(program, args))),
            None => Err(CompileErrorKind::UndefinedProgram {
                name: name.clone(),
                args: types,
            }
            .at(node.range)),
        }
    }

    fn compile_target(
        &self,
        node: &ast::Node,
        target: &ast::Node,
        member: &Ident,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        self.compile(target, declarations).map_err(|inner| {
            CompileErrorKind::Member {
                member: member.clone(),
                inner: Box::new(inner),
            }
            .at(node.range)
        })
    }

    fn compile_property(
        &self,
        node: &ast::Node,
        target: &ast::Node,
        name: &Ident,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let target = self.compile_target(node, target, name, declarations)?;
        let owner = target.return_type();

        match self.registry.resolve_property(&owner, name) {
            Some(property) => {
                let ty = property.ty.resolve(&owner);
                Ok(Box::new(PropertyNode::new(
                    target,
                    name.clone(),
                    property.getter.clone(),
                    ty,
                )))
            }
            None => Err(CompileErrorKind::UndefinedProperty {
                owner,
                name: name.clone(),
            }
            .at(node.range)),
        }
    }

    fn compile_extension(
        &self,
        node: &ast::Node,
        target: &ast::Node,
        name: &Ident,
        args: &Args,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let [
            ast::Node {
                expr: Expr::Ident(variable),
                ..
            },
            inner,
        ] = args.as_slice()
        else {
            return Err(CompileErrorKind::ExtensionShape(name.clone()).at(node.range));
        };

        let source = self.compile_target(node, target, name, declarations)?;
        let source_type = source.return_type();
        if !source_type.is_collection() {
            return Err(CompileErrorKind::ExtensionTarget {
                function: name.clone(),
                target: source_type,
            }
            .at(node.range));
        }

        let element = element_of(&source_type);
        let inner = declarations
            .with_frame(|declarations| {
                declarations.define(variable, element);
                self.compile(inner, declarations)
            })
            .map_err(|inner| {
                CompileErrorKind::ExtensionInner {
                    function: name.clone(),
                    inner: Box::new(inner),
                }
                .at(node.range)
            })?;
        let inner_type = inner.return_type();

        match self.registry.resolve_extension(name, &element, &inner_type) {
            Some(extension) => {
                let ty = extension.return_type(&element, &inner_type);
                Ok(Box::new(ExtensionNode::new(
                    name.clone(),
                    source,
                    variable.clone(),
                    inner,
                    extension.func,
                    ty,
                )))
            }
            None => Err(CompileErrorKind::UndefinedExtension {
                function: name.clone(),
                element,
                inner: inner_type,
            }
            .at(node.range)),
        }
    }

    /// Compiles the container and key of an indexer and checks the key type.
    fn compile_indexer(
        &self,
        target: &ast::Node,
        key: &ast::Node,
        declarations: &mut Declarations,
    ) -> Result<Indexer, CompileError> {
        let target_node = self.compile(target, declarations)?;
        let target_type = target_node.return_type();
        let Some((key_type, element)) = target_type.indexer() else {
            return Err(CompileErrorKind::NotIndexable(target_type).at(target.range));
        };

        let key_node = self.compile(key, declarations).map_err(|inner| {
            CompileErrorKind::Indexer { inner: Box::new(inner) }.at(key.range)
        })?;
        let actual = key_node.return_type();
        if !actual.compatible(&key_type) {
            return Err(CompileErrorKind::IndexKey {
                target: target_type,
                expected: key_type,
                actual,
            }
            .at(key.range));
        }

        Ok(Indexer {
            target: target_node,
            key: key_node,
            target_type,
            element,
        })
    }

    fn compile_index(
        &self,
        target: &ast::Node,
        key: &ast::Node,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let indexer = self.compile_indexer(target, key, declarations)?;
        Ok(Box::new(IndexNode::new(indexer.target, indexer.key, indexer.element)))
    }

    fn compile_assign(
        &self,
        node: &ast::Node,
        target: &ast::Node,
        key: &ast::Node,
        value: &ast::Node,
        declarations: &mut Declarations,
    ) -> Result<NodeRef, CompileError> {
        let indexer = self.compile_indexer(target, key, declarations)?;
        let value = self.compile(value, declarations)?;
        let actual = value.return_type();

        if actual.compatible(&indexer.element) {
            Ok(Box::new(AssignNode::new(indexer.target, indexer.key, value)))
        } else {
            Err(CompileErrorKind::AssignmentType {
                target: indexer.target_type,
                actual,
            }
            .at(node.range))
        }
    }
}

struct Indexer {
    target: NodeRef,
    key: NodeRef,
    target_type: ProgType,
    element: ProgType,
}

/// A compiled source line ready to run any number of times.
#[derive(Debug)]
pub struct CompiledExpression {
    node: NodeRef,
    source: String,
    line: usize,
}

impl CompiledExpression {
    pub fn return_type(&self) -> ProgType {
        self.node.return_type()
    }

    pub fn is_literal(&self) -> bool {
        self.node.is_literal()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> usize {
        self.line
    }

    #[allow(clippy::result_large_err)]
    pub fn execute(&self, scope: &mut VariableScope) -> Result<Value, Error> {
        self.node
            .execute(scope)
            .map_err(|e| Error::from_error(self.source.as_str(), self.line, e))
    }

    /// Executes and pairs the result with the static type of the expression.
    #[allow(clippy::result_large_err)]
    pub fn evaluate(&self, scope: &mut VariableScope) -> Result<BoxedValue, Error> {
        self.execute(scope).map(|value| BoxedValue::new(self.return_type(), value))
    }
}

pub type CompileResult = Result<CompiledExpression, Error>;

/// Runs the whole pipeline on one source line: redundant parentheses, balance check,
/// tokenization, parsing and type-checked compilation.
#[allow(clippy::result_large_err)]
pub fn compile_line(
    text: &str,
    line: usize,
    registry: &Registry,
    declarations: &mut Declarations,
    options: &Options,
) -> CompileResult {
    let fail = |cause: InnerError| Error::from_error(text, line, cause);

    let unwrapped = scan::unwrap_redundant_parens(text);
    let tokens = Lexer::new().tokenize(&unwrapped).map_err(|e| fail(e.into()))?;
    let ast = Parser::new(&tokens, options.max_nesting_depth)
        .parse()
        .map_err(|e| fail(e.into()))?;
    let node = Compiler::new(registry)
        .compile(&ast, declarations)
        .map_err(|e| fail(e.into()))?;

    tracing::debug!(line, return_type = %node.return_type(), "compiled {text:?}");

    Ok(CompiledExpression {
        node,
        source: text.to_string(),
        line,
    })
}
