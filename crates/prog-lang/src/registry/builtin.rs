use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use itertools::Itertools;

use super::{ArgType, Registry, collection_of, element_of};
use crate::Shared;
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::node::NodeRef;
use crate::node::binary::compare;
use crate::node::call::{BuiltinCallNode, BuiltinFn, IfNode};
use crate::number::Number;
use crate::types::{ProgType, Scalar};
use crate::value::{Value, fold_case, read};

pub type NodeFactory = Shared<dyn Fn(Vec<NodeRef>, ProgType) -> NodeRef + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Typed(ProgType),
    /// The argument must be written as a literal in the source text.
    Literal(ProgType),
    /// Any value of any shape.
    Any,
}

impl Param {
    pub fn accepts(&self, arg: &ArgType) -> bool {
        match self {
            Param::Typed(ty) => arg.ty.compatible(ty),
            Param::Literal(ty) => arg.literal && arg.ty.compatible(ty),
            Param::Any => arg.ty.scalar() != Scalar::Void,
        }
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Param::Typed(ty) => write!(f, "{ty}"),
            Param::Literal(ty) => write!(f, "literal {ty}"),
            Param::Any => write!(f, "any"),
        }
    }
}

/// How the static result type of a call is derived from its argument types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnRule {
    Fixed(ProgType),
    SameAs(usize),
    ElementOf(usize),
    CollectionOf(usize),
}

impl ReturnRule {
    pub fn resolve(&self, args: &[ProgType]) -> ProgType {
        match self {
            ReturnRule::Fixed(ty) => *ty,
            ReturnRule::SameAs(i) => args.get(*i).copied().unwrap_or(ProgType::ERROR),
            ReturnRule::ElementOf(i) => args.get(*i).map(element_of).unwrap_or(ProgType::ERROR),
            ReturnRule::CollectionOf(i) => args.get(*i).map(collection_of).unwrap_or(ProgType::ERROR),
        }
    }
}

impl Display for ReturnRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReturnRule::Fixed(ty) => write!(f, "{ty}"),
            ReturnRule::SameAs(i) => write!(f, "type of argument {}", i + 1),
            ReturnRule::ElementOf(i) => write!(f, "element of argument {}", i + 1),
            ReturnRule::CollectionOf(i) => write!(f, "collection of argument {}", i + 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltinFunctionDoc {
    pub description: &'static str,
    pub params: &'static [&'static str],
}

/// One overload of a built-in function.
#[derive(Clone)]
pub struct FunctionSignature {
    pub name: Ident,
    pub params: Vec<Param>,
    /// The last parameter may repeat any number of times.
    pub variadic: bool,
    /// Extra check over all argument types, for constraints that span parameters.
    pub filter: Option<fn(&[ProgType]) -> bool>,
    pub return_rule: ReturnRule,
    pub doc: BuiltinFunctionDoc,
    factory: NodeFactory,
}

impl Debug for FunctionSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSignature")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .field("return_rule", &self.return_rule)
            .finish()
    }
}

impl FunctionSignature {
    /// An overload whose body is a native function over evaluated arguments.
    pub fn native(name: &str, params: Vec<Param>, return_rule: ReturnRule, func: BuiltinFn) -> Self {
        let ident = Ident::new(name);
        Self::custom(name, params, return_rule, move |args, ty| {
            Box::new(BuiltinCallNode::new(ident.clone(), func, args, ty))
        })
    }

    /// An overload that builds its own node, e.g. to evaluate arguments lazily.
    pub fn custom(
        name: &str,
        params: Vec<Param>,
        return_rule: ReturnRule,
        factory: impl Fn(Vec<NodeRef>, ProgType) -> NodeRef + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Ident::new(name),
            params,
            variadic: false,
            filter: None,
            return_rule,
            doc: BuiltinFunctionDoc::default(),
            factory: Shared::new(factory),
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn with_filter(mut self, filter: fn(&[ProgType]) -> bool) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_doc(mut self, description: &'static str, params: &'static [&'static str]) -> Self {
        self.doc = BuiltinFunctionDoc { description, params };
        self
    }

    pub fn matches(&self, args: &[ArgType]) -> bool {
        let arity_ok = if self.variadic {
            !self.params.is_empty() && args.len() >= self.params.len()
        } else {
            args.len() == self.params.len()
        };
        if !arity_ok {
            return false;
        }

        let params_ok = args.iter().enumerate().all(|(i, arg)| {
            self.params
                .get(i)
                .or(self.params.last())
                .is_some_and(|param| param.accepts(arg))
        });
        if !params_ok {
            return false;
        }

        match self.filter {
            Some(filter) => filter(&args.iter().map(|a| a.ty).collect::<Vec<_>>()),
            None => true,
        }
    }

    pub fn build(&self, args: Vec<NodeRef>, ty: ProgType) -> NodeRef {
        (self.factory)(args, ty)
    }

    /// Human-readable signature such as `round(Number, literal Number) -> Number`.
    pub fn signature(&self) -> String {
        let params = self.params.iter().join(", ");
        let variadic = if self.variadic { "..." } else { "" };
        format!("{}({params}{variadic}) -> {}", self.name, self.return_rule)
    }
}

fn invalid(args: &[Value]) -> RuntimeError {
    RuntimeError::invalid_types("", args)
}

fn runtime(message: impl Into<String>) -> RuntimeError {
    RuntimeError::Runtime(message.into())
}

fn span_from_seconds(seconds: Number) -> Result<Value, RuntimeError> {
    let millis = seconds.value() * 1000.0;
    if !millis.is_finite() {
        return Err(runtime("Time span out of range"));
    }
    TimeDelta::try_milliseconds(millis.round() as i64)
        .map(Value::TimeSpan)
        .ok_or_else(|| runtime("Time span out of range"))
}

fn pick(args: &[Value], wanted: Ordering) -> Result<Value, RuntimeError> {
    match args {
        [a, b] => Ok(if compare(a, b)? == wanted { a.clone() } else { b.clone() }),
        _ => Err(invalid(args)),
    }
}

const TEXT: Param = Param::Typed(ProgType::TEXT);
const NUMBER: Param = Param::Typed(ProgType::NUMBER);
const BOOLEAN: Param = Param::Typed(ProgType::BOOLEAN);
const ANY_COLLECTION: Param = Param::Typed(ProgType::Collection(Scalar::Anything));

pub(crate) fn register_standard(registry: &mut Registry) {
    use ReturnRule::*;

    let functions = vec![
        FunctionSignature::native("not", vec![BOOLEAN], Fixed(ProgType::BOOLEAN), |args| match args {
            [Value::Boolean(b)] => Ok(Value::Boolean(!b)),
            _ => Err(invalid(args)),
        })
        .with_doc("Negates a boolean.", &["value"]),
        FunctionSignature::native("isnull", vec![Param::Any], Fixed(ProgType::BOOLEAN), |args| match args {
            [v] => Ok(Value::Boolean(v.is_null())),
            _ => Err(invalid(args)),
        })
        .with_doc("Returns true if the value is missing.", &["value"]),
        FunctionSignature::custom("if", vec![BOOLEAN, Param::Any, Param::Any], SameAs(1), |args, ty| {
            Box::new(IfNode::new(args, ty))
        })
        .with_filter(|types| types[1] == types[2])
        .with_doc(
            "Returns the second argument when the condition holds and the third otherwise. Only the chosen branch is evaluated.",
            &["condition", "then", "otherwise"],
        ),
        FunctionSignature::native("tostring", vec![Param::Any], Fixed(ProgType::TEXT), |args| match args {
            [v] => Ok(Value::Text(v.to_string())),
            _ => Err(invalid(args)),
        })
        .with_doc("Converts a value to its text form.", &["value"]),
        FunctionSignature::native("tonumber", vec![TEXT], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Text(s)] => s
                .trim()
                .parse::<f64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| runtime(format!("Cannot convert \"{s}\" to a number"))),
            _ => Err(invalid(args)),
        })
        .with_doc("Parses text as a number.", &["text"]),
        FunctionSignature::native("upper", vec![TEXT], Fixed(ProgType::TEXT), |args| match args {
            [Value::Text(s)] => Ok(Value::Text(s.to_uppercase())),
            _ => Err(invalid(args)),
        })
        .with_doc("Converts text to upper case.", &["text"]),
        FunctionSignature::native("lower", vec![TEXT], Fixed(ProgType::TEXT), |args| match args {
            [Value::Text(s)] => Ok(Value::Text(s.to_lowercase())),
            _ => Err(invalid(args)),
        })
        .with_doc("Converts text to lower case.", &["text"]),
        FunctionSignature::native("trim", vec![TEXT], Fixed(ProgType::TEXT), |args| match args {
            [Value::Text(s)] => Ok(Value::Text(s.trim().to_string())),
            _ => Err(invalid(args)),
        })
        .with_doc("Removes leading and trailing whitespace.", &["text"]),
        FunctionSignature::native("length", vec![TEXT], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Text(s)] => Ok(Value::from(s.chars().count())),
            _ => Err(invalid(args)),
        })
        .with_doc("Returns the number of characters in the text.", &["text"]),
        FunctionSignature::native("contains", vec![TEXT, TEXT], Fixed(ProgType::BOOLEAN), |args| match args {
            [Value::Text(s), Value::Text(needle)] => {
                Ok(Value::Boolean(fold_case(s).contains(&fold_case(needle))))
            }
            _ => Err(invalid(args)),
        })
        .with_doc("Returns true if the text contains the other text, ignoring case.", &["text", "needle"]),
        FunctionSignature::native(
            "contains",
            vec![ANY_COLLECTION, Param::Any],
            Fixed(ProgType::BOOLEAN),
            |args| match args {
                [Value::Collection(items), needle] => {
                    Ok(Value::Boolean(read(items).iter().any(|item| item.script_eq(needle))))
                }
                _ => Err(invalid(args)),
            },
        )
        .with_filter(|types| types[1] == element_of(&types[0]))
        .with_doc("Returns true if the collection holds an element equal to the value.", &["collection", "value"]),
        FunctionSignature::native("startswith", vec![TEXT, TEXT], Fixed(ProgType::BOOLEAN), |args| match args {
            [Value::Text(s), Value::Text(prefix)] => {
                Ok(Value::Boolean(fold_case(s).starts_with(&fold_case(prefix))))
            }
            _ => Err(invalid(args)),
        })
        .with_doc("Returns true if the text starts with the prefix, ignoring case.", &["text", "prefix"]),
        FunctionSignature::native("endswith", vec![TEXT, TEXT], Fixed(ProgType::BOOLEAN), |args| match args {
            [Value::Text(s), Value::Text(suffix)] => {
                Ok(Value::Boolean(fold_case(s).ends_with(&fold_case(suffix))))
            }
            _ => Err(invalid(args)),
        })
        .with_doc("Returns true if the text ends with the suffix, ignoring case.", &["text", "suffix"]),
        FunctionSignature::native("replace", vec![TEXT, TEXT, TEXT], Fixed(ProgType::TEXT), |args| match args {
            [Value::Text(s), Value::Text(from), _] if from.is_empty() => Ok(Value::Text(s.clone())),
            [Value::Text(s), Value::Text(from), Value::Text(to)] => Ok(Value::Text(s.replace(from.as_str(), to))),
            _ => Err(invalid(args)),
        })
        .with_doc("Replaces every occurrence of a pattern.", &["text", "from", "to"]),
        FunctionSignature::native("substring", vec![TEXT, NUMBER, NUMBER], Fixed(ProgType::TEXT), |args| match args {
            [Value::Text(s), Value::Number(start), Value::Number(len)] => {
                let start = start.value().max(0.0) as usize;
                let len = len.value().max(0.0) as usize;
                Ok(Value::Text(s.chars().skip(start).take(len).collect()))
            }
            _ => Err(invalid(args)),
        })
        .with_doc("Returns up to `length` characters starting at `start`.", &["text", "start", "length"]),
        FunctionSignature::native("abs", vec![NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n.abs())),
            _ => Err(invalid(args)),
        })
        .with_doc("Returns the absolute value.", &["number"]),
        FunctionSignature::native("round", vec![NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n.round_to(0))),
            _ => Err(invalid(args)),
        })
        .with_doc("Rounds to the nearest whole number, halves away from zero.", &["number"]),
        FunctionSignature::native(
            "round",
            vec![NUMBER, Param::Literal(ProgType::NUMBER)],
            Fixed(ProgType::NUMBER),
            |args| match args {
                [Value::Number(n), Value::Number(places)] => Ok(Value::Number(n.round_to(places.to_int()))),
                _ => Err(invalid(args)),
            },
        )
        .with_doc("Rounds to a fixed number of decimal places (0 to 15).", &["number", "places"]),
        FunctionSignature::native("floor", vec![NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n.floor())),
            _ => Err(invalid(args)),
        })
        .with_doc("Rounds down.", &["number"]),
        FunctionSignature::native("ceiling", vec![NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n.ceil())),
            _ => Err(invalid(args)),
        })
        .with_doc("Rounds up.", &["number"]),
        FunctionSignature::native("sqrt", vec![NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(n)] if n.value() < 0.0 => Err(runtime("Cannot take the square root of a negative number")),
            [Value::Number(n)] => Ok(Value::Number(n.sqrt())),
            _ => Err(invalid(args)),
        })
        .with_doc("Returns the square root.", &["number"]),
        FunctionSignature::native("clamp", vec![NUMBER, NUMBER, NUMBER], Fixed(ProgType::NUMBER), |args| match args {
            [Value::Number(v), Value::Number(lo), Value::Number(hi)] => {
                Ok(Value::Number(Number::new(v.value().min(hi.value()).max(lo.value()))))
            }
            _ => Err(invalid(args)),
        })
        .with_doc("Limits a number to the inclusive range [low, high].", &["number", "low", "high"]),
        FunctionSignature::native("now", vec![], Fixed(ProgType::DATETIME), |args| match args {
            [] => Ok(Value::DateTime(Utc::now())),
            _ => Err(invalid(args)),
        })
        .with_doc("Returns the current date and time.", &[]),
        FunctionSignature::native("todatetime", vec![TEXT], Fixed(ProgType::DATETIME), |args| match args {
            [Value::Text(s)] => parse_datetime(s)
                .map(Value::DateTime)
                .ok_or_else(|| runtime(format!("Cannot convert \"{s}\" to a date and time"))),
            _ => Err(invalid(args)),
        })
        .with_doc("Parses `YYYY-MM-DD` or `YYYY-MM-DD hh:mm:ss` as a UTC date and time.", &["text"]),
        FunctionSignature::native("seconds", vec![NUMBER], Fixed(ProgType::TIMESPAN), |args| match args {
            [Value::Number(n)] => span_from_seconds(*n),
            _ => Err(invalid(args)),
        })
        .with_doc("A time span of the given number of seconds.", &["amount"]),
        FunctionSignature::native("minutes", vec![NUMBER], Fixed(ProgType::TIMESPAN), |args| match args {
            [Value::Number(n)] => span_from_seconds(*n * Number::from(60i64)),
            _ => Err(invalid(args)),
        })
        .with_doc("A time span of the given number of minutes.", &["amount"]),
        FunctionSignature::native("hours", vec![NUMBER], Fixed(ProgType::TIMESPAN), |args| match args {
            [Value::Number(n)] => span_from_seconds(*n * Number::from(3_600)),
            _ => Err(invalid(args)),
        })
        .with_doc("A time span of the given number of hours.", &["amount"]),
        FunctionSignature::native("days", vec![NUMBER], Fixed(ProgType::TIMESPAN), |args| match args {
            [Value::Number(n)] => span_from_seconds(*n * Number::from(86_400)),
            _ => Err(invalid(args)),
        })
        .with_doc("A time span of the given number of days.", &["amount"]),
        FunctionSignature::native("collection", vec![Param::Any], CollectionOf(0), |args| {
            Ok(Value::collection(args.iter().cloned()))
        })
        .variadic()
        .with_filter(|types| types.iter().all(|ty| ty.is_scalar() && *ty == types[0]))
        .with_doc("Builds a collection from values of one scalar type.", &["values"]),
        FunctionSignature::native("merge", vec![ANY_COLLECTION, ANY_COLLECTION], SameAs(0), |args| match args {
            [Value::Collection(a), Value::Collection(b)] => {
                let merged = read(a).iter().chain(read(b).iter()).cloned().collect::<Vec<_>>();
                Ok(Value::collection(merged))
            }
            _ => Err(invalid(args)),
        })
        .with_filter(|types| types[0] == types[1])
        .with_doc("Returns a new collection with the elements of both collections.", &["first", "second"]),
    ];

    for function in functions {
        registry.register_builtin(function);
    }

    for ty in [ProgType::NUMBER, ProgType::DATETIME, ProgType::TIMESPAN] {
        registry.register_builtin(
            FunctionSignature::native("min", vec![Param::Typed(ty), Param::Typed(ty)], SameAs(0), |args| {
                pick(args, Ordering::Less)
            })
            .with_doc("Returns the smaller of two values.", &["a", "b"]),
        );
        registry.register_builtin(
            FunctionSignature::native("max", vec![Param::Typed(ty), Param::Typed(ty)], SameAs(0), |args| {
                pick(args, Ordering::Greater)
            })
            .with_doc("Returns the larger of two values.", &["a", "b"]),
        );
    }
}

fn parse_datetime(text: &str) -> Option<chrono::DateTime<Utc>> {
    let text = text.trim();

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn arg(ty: ProgType) -> ArgType {
        ArgType { ty, literal: false }
    }

    fn literal(ty: ProgType) -> ArgType {
        ArgType { ty, literal: true }
    }

    fn standard() -> Registry {
        let mut registry = Registry::empty();
        register_standard(&mut registry);
        registry
    }

    #[rstest]
    #[case::round_one("round", vec![arg(ProgType::NUMBER)], Some(ProgType::NUMBER))]
    #[case::round_literal("round", vec![arg(ProgType::NUMBER), literal(ProgType::NUMBER)], Some(ProgType::NUMBER))]
    #[case::round_variable_places("round", vec![arg(ProgType::NUMBER), arg(ProgType::NUMBER)], None)]
    #[case::contains_text("contains", vec![arg(ProgType::TEXT), arg(ProgType::TEXT)], Some(ProgType::BOOLEAN))]
    #[case::contains_collection("contains", vec![arg(ProgType::Collection(Scalar::Number)), arg(ProgType::NUMBER)], Some(ProgType::BOOLEAN))]
    #[case::contains_wrong_element("contains", vec![arg(ProgType::Collection(Scalar::Number)), arg(ProgType::TEXT)], None)]
    #[case::if_same("if", vec![arg(ProgType::BOOLEAN), arg(ProgType::TEXT), arg(ProgType::TEXT)], Some(ProgType::TEXT))]
    #[case::if_mixed("if", vec![arg(ProgType::BOOLEAN), arg(ProgType::TEXT), arg(ProgType::NUMBER)], None)]
    #[case::collection("collection", vec![arg(ProgType::NUMBER), arg(ProgType::NUMBER), arg(ProgType::NUMBER)], Some(ProgType::Collection(Scalar::Number)))]
    #[case::collection_mixed("collection", vec![arg(ProgType::NUMBER), arg(ProgType::TEXT)], None)]
    #[case::collection_empty("collection", vec![], None)]
    #[case::max_dates("MAX", vec![arg(ProgType::DATETIME), arg(ProgType::DATETIME)], Some(ProgType::DATETIME))]
    #[case::merge("merge", vec![arg(ProgType::Collection(Scalar::Text)), arg(ProgType::Collection(Scalar::Text))], Some(ProgType::Collection(Scalar::Text)))]
    #[case::merge_mismatch("merge", vec![arg(ProgType::Collection(Scalar::Text)), arg(ProgType::Collection(Scalar::Number))], None)]
    fn test_resolve(#[case] name: &str, #[case] args: Vec<ArgType>, #[case] expected: Option<ProgType>) {
        let registry = standard();
        let types = args.iter().map(|a| a.ty).collect::<Vec<_>>();
        assert_eq!(
            registry
                .resolve_builtin(name, &args)
                .map(|s| s.return_rule.resolve(&types)),
            expected
        );
    }

    #[test]
    fn test_signature_text() {
        let registry = standard();
        let round = registry.resolve_builtin(
            "round",
            &[arg(ProgType::NUMBER), literal(ProgType::NUMBER)],
        );
        assert_eq!(
            round.map(|s| s.signature()),
            Some("round(Number, literal Number) -> Number".to_string())
        );
    }

    #[rstest]
    #[case("2024-03-01", true)]
    #[case("2024-03-01 12:30:00", true)]
    #[case("2024-03-01T12:30:00+02:00", true)]
    #[case("yesterday", false)]
    fn test_parse_datetime(#[case] text: &str, #[case] ok: bool) {
        assert_eq!(parse_datetime(text).is_some(), ok);
    }
}
