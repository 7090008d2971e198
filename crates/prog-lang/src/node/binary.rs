use std::cmp::Ordering;

use chrono::TimeDelta;

use super::{Node, NodeRef};
use crate::ast::BinaryOp;
use crate::error::runtime::RuntimeError;
use crate::number::Number;
use crate::scope::VariableScope;
use crate::types::{ObjectKind, ProgType, Scalar};
use crate::value::{Value, text_cmp};

const MUD_DATETIME: ProgType = ProgType::Scalar(Scalar::Object(ObjectKind::MudDateTime));

/// `and` and `or` skip their right operand when the left one decides the result;
/// `xor` always evaluates both.
#[derive(Debug)]
pub struct LogicalNode {
    op: BinaryOp,
    lhs: NodeRef,
    rhs: NodeRef,
}

impl LogicalNode {
    pub fn new(op: BinaryOp, lhs: NodeRef, rhs: NodeRef) -> Self {
        Self { op, lhs, rhs }
    }

    fn operand(&self, value: Value) -> Result<bool, RuntimeError> {
        value.as_bool().ok_or_else(|| RuntimeError::invalid_types(self.symbol(), &[value]))
    }

    fn symbol(&self) -> &'static str {
        match self.op {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            _ => "xor",
        }
    }
}

impl Node for LogicalNode {
    fn return_type(&self) -> ProgType {
        ProgType::BOOLEAN
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let lhs = self.operand(self.lhs.execute(scope)?)?;

        match (self.op, lhs) {
            (BinaryOp::And, false) => Ok(Value::FALSE),
            (BinaryOp::Or, true) => Ok(Value::TRUE),
            (BinaryOp::Xor, lhs) => Ok(Value::Boolean(lhs ^ self.operand(self.rhs.execute(scope)?)?)),
            _ => Ok(Value::Boolean(self.operand(self.rhs.execute(scope)?)?)),
        }
    }
}

#[derive(Debug)]
pub struct ComparisonNode {
    op: BinaryOp,
    lhs: NodeRef,
    rhs: NodeRef,
}

impl ComparisonNode {
    /// Whether `op` is defined between operands of the given static types.
    pub fn accepts(op: BinaryOp, lhs: &ProgType, rhs: &ProgType) -> bool {
        if lhs.is_error() || rhs.is_error() {
            return true;
        }
        if lhs != rhs || lhs.scalar() == Scalar::Void {
            return false;
        }

        match op {
            BinaryOp::Equal | BinaryOp::NotEqual => true,
            _ => lhs.is_scalar() && lhs.scalar().is_ordered(),
        }
    }

    pub fn new(op: BinaryOp, lhs: NodeRef, rhs: NodeRef) -> Self {
        Self { op, lhs, rhs }
    }
}

impl Node for ComparisonNode {
    fn return_type(&self) -> ProgType {
        ProgType::BOOLEAN
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let lhs = self.lhs.execute(scope)?;
        let rhs = self.rhs.execute(scope)?;

        let result = match self.op {
            BinaryOp::Equal => lhs.script_eq(&rhs),
            BinaryOp::NotEqual => !lhs.script_eq(&rhs),
            BinaryOp::Greater => compare(&lhs, &rhs)? == Ordering::Greater,
            BinaryOp::GreaterEqual => compare(&lhs, &rhs)? != Ordering::Less,
            BinaryOp::Less => compare(&lhs, &rhs)? == Ordering::Less,
            BinaryOp::LessEqual => compare(&lhs, &rhs)? != Ordering::Greater,
            _ => return Err(RuntimeError::invalid_types("comparison", &[lhs, rhs])),
        };

        Ok(Value::Boolean(result))
    }
}

/// Orders two values of the same ordered kind. Text compares without regard to case.
pub fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a.tolerant_cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(text_cmp(a, b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::TimeSpan(a), Value::TimeSpan(b)) => Ok(a.cmp(b)),
        _ => Err(RuntimeError::invalid_types("compare", &[lhs.clone(), rhs.clone()])),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Exactly(ProgType),
    /// Any scalar value, including game objects.
    AnyScalar,
}

impl Operand {
    fn accepts(&self, ty: &ProgType) -> bool {
        match self {
            Operand::Exactly(expected) => ty == expected,
            Operand::AnyScalar => ty.is_scalar() && !matches!(ty.scalar(), Scalar::Void | Scalar::Error),
        }
    }
}

type Apply = fn(&Value, &Value) -> Result<Value, RuntimeError>;

/// One permitted combination of operator and operand types.
#[derive(Debug)]
pub struct ArithmeticRule {
    op: BinaryOp,
    lhs: Operand,
    rhs: Operand,
    result: ProgType,
    apply: Apply,
}

// Order matters: the first matching rule wins, so number and date rules come before
// the text concatenation rules that accept any scalar.
static ARITHMETIC_RULES: &[ArithmeticRule] = &[
    rule(BinaryOp::Add, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_add),
    rule(BinaryOp::Add, ProgType::DATETIME, ProgType::TIMESPAN, ProgType::DATETIME, datetime_add),
    rule(BinaryOp::Add, ProgType::TIMESPAN, ProgType::DATETIME, ProgType::DATETIME, span_add_datetime),
    rule(BinaryOp::Add, ProgType::TIMESPAN, ProgType::TIMESPAN, ProgType::TIMESPAN, span_add),
    rule(BinaryOp::Add, MUD_DATETIME, ProgType::TIMESPAN, MUD_DATETIME, mud_add),
    rule(BinaryOp::Add, ProgType::TIMESPAN, MUD_DATETIME, MUD_DATETIME, span_add_mud),
    ArithmeticRule {
        op: BinaryOp::Add,
        lhs: Operand::Exactly(ProgType::TEXT),
        rhs: Operand::AnyScalar,
        result: ProgType::TEXT,
        apply: concat,
    },
    ArithmeticRule {
        op: BinaryOp::Add,
        lhs: Operand::AnyScalar,
        rhs: Operand::Exactly(ProgType::TEXT),
        result: ProgType::TEXT,
        apply: concat,
    },
    rule(BinaryOp::Subtract, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_sub),
    rule(BinaryOp::Subtract, ProgType::DATETIME, ProgType::DATETIME, ProgType::TIMESPAN, datetime_diff),
    rule(BinaryOp::Subtract, ProgType::DATETIME, ProgType::TIMESPAN, ProgType::DATETIME, datetime_sub),
    rule(BinaryOp::Subtract, ProgType::TIMESPAN, ProgType::TIMESPAN, ProgType::TIMESPAN, span_sub),
    rule(BinaryOp::Subtract, MUD_DATETIME, ProgType::TIMESPAN, MUD_DATETIME, mud_sub),
    rule(BinaryOp::Subtract, MUD_DATETIME, MUD_DATETIME, ProgType::TIMESPAN, mud_diff),
    rule(BinaryOp::Multiply, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_mul),
    rule(BinaryOp::Multiply, ProgType::TIMESPAN, ProgType::NUMBER, ProgType::TIMESPAN, span_mul),
    rule(BinaryOp::Multiply, ProgType::NUMBER, ProgType::TIMESPAN, ProgType::TIMESPAN, number_mul_span),
    rule(BinaryOp::Divide, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_div),
    rule(BinaryOp::Divide, ProgType::TIMESPAN, ProgType::NUMBER, ProgType::TIMESPAN, span_div),
    rule(BinaryOp::Divide, ProgType::TIMESPAN, ProgType::TIMESPAN, ProgType::NUMBER, span_ratio),
    rule(BinaryOp::Modulo, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_mod),
    rule(BinaryOp::Power, ProgType::NUMBER, ProgType::NUMBER, ProgType::NUMBER, number_pow),
];

const fn rule(op: BinaryOp, lhs: ProgType, rhs: ProgType, result: ProgType, apply: Apply) -> ArithmeticRule {
    ArithmeticRule {
        op,
        lhs: Operand::Exactly(lhs),
        rhs: Operand::Exactly(rhs),
        result,
        apply,
    }
}

#[derive(Debug)]
pub struct ArithmeticNode {
    rule: &'static ArithmeticRule,
    symbol: &'static str,
    lhs: NodeRef,
    rhs: NodeRef,
}

impl ArithmeticNode {
    /// Finds the rule for `op` applied to operands of the given static types.
    pub fn resolve(op: BinaryOp, lhs: &ProgType, rhs: &ProgType) -> Option<&'static ArithmeticRule> {
        ARITHMETIC_RULES
            .iter()
            .find(|rule| rule.op == op && rule.lhs.accepts(lhs) && rule.rhs.accepts(rhs))
    }

    pub fn new(rule: &'static ArithmeticRule, lhs: NodeRef, rhs: NodeRef) -> Self {
        let symbol = match rule.op {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            _ => "^",
        };
        Self { rule, symbol, lhs, rhs }
    }
}

impl Node for ArithmeticNode {
    fn return_type(&self) -> ProgType {
        self.rule.result
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let lhs = self.lhs.execute(scope)?;
        let rhs = self.rhs.execute(scope)?;

        (self.rule.apply)(&lhs, &rhs).map_err(|e| match e {
            RuntimeError::InvalidTypes { .. } => RuntimeError::invalid_types(self.symbol, &[lhs.clone(), rhs.clone()]),
            e => e,
        })
    }
}

fn mismatch(lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::invalid_types("arithmetic", &[lhs.clone(), rhs.clone()])
}

fn numbers(lhs: &Value, rhs: &Value) -> Result<(Number, Number), RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn spans(lhs: &Value, rhs: &Value) -> Result<(TimeDelta, TimeDelta), RuntimeError> {
    match (lhs, rhs) {
        (Value::TimeSpan(a), Value::TimeSpan(b)) => Ok((*a, *b)),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn overflow() -> RuntimeError {
    RuntimeError::Runtime("Date or time span out of range".to_string())
}

fn scale_span(span: TimeDelta, factor: Number) -> Result<Value, RuntimeError> {
    let millis = span.num_milliseconds() as f64 * factor.value();
    if !millis.is_finite() {
        return Err(overflow());
    }
    TimeDelta::try_milliseconds(millis.round() as i64)
        .map(Value::TimeSpan)
        .ok_or_else(overflow)
}

fn number_add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    numbers(lhs, rhs).map(|(a, b)| Value::Number(a + b))
}

fn number_sub(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    numbers(lhs, rhs).map(|(a, b)| Value::Number(a - b))
}

fn number_mul(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    numbers(lhs, rhs).map(|(a, b)| Value::Number(a * b))
}

fn number_div(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = numbers(lhs, rhs)?;
    if b.is_zero() {
        return Err(RuntimeError::ZeroDivision);
    }
    Ok(Value::Number(a / b))
}

fn number_mod(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = numbers(lhs, rhs)?;
    if b.is_zero() {
        return Err(RuntimeError::ZeroDivision);
    }
    Ok(Value::Number(a % b))
}

fn number_pow(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    numbers(lhs, rhs).map(|(a, b)| Value::Number(a.pow(b)))
}

fn concat(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Text(format!("{lhs}{rhs}")))
}

fn datetime_add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::DateTime(d), Value::TimeSpan(t)) => d
            .checked_add_signed(*t)
            .map(Value::DateTime)
            .ok_or_else(overflow),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn span_add_datetime(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    datetime_add(rhs, lhs)
}

fn span_add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = spans(lhs, rhs)?;
    a.checked_add(&b).map(Value::TimeSpan).ok_or_else(overflow)
}

fn datetime_diff(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::DateTime(a), Value::DateTime(b)) => Ok(Value::TimeSpan(a.signed_duration_since(*b))),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn datetime_sub(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::DateTime(d), Value::TimeSpan(t)) => d
            .checked_sub_signed(*t)
            .map(Value::DateTime)
            .ok_or_else(overflow),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn span_sub(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = spans(lhs, rhs)?;
    a.checked_sub(&b).map(Value::TimeSpan).ok_or_else(overflow)
}

fn mud_add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Object(o), Value::TimeSpan(t)) => o.offset(*t).map(Value::Object).ok_or_else(|| {
            RuntimeError::Runtime(format!("{} cannot be shifted by a time span", o.name()))
        }),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn span_add_mud(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    mud_add(rhs, lhs)
}

fn mud_sub(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match rhs {
        Value::TimeSpan(t) => mud_add(lhs, &Value::TimeSpan(-*t)),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn mud_diff(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Object(a), Value::Object(b)) => a.difference(b.as_ref()).map(Value::TimeSpan).ok_or_else(|| {
            RuntimeError::Runtime(format!("Cannot measure the time between {} and {}", a.name(), b.name()))
        }),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn span_mul(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::TimeSpan(t), Value::Number(n)) => scale_span(*t, *n),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn number_mul_span(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    span_mul(rhs, lhs)
}

fn span_div(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::TimeSpan(_), Value::Number(n)) if n.is_zero() => Err(RuntimeError::ZeroDivision),
        (Value::TimeSpan(t), Value::Number(n)) => scale_span(*t, Number::new(1.0 / n.value())),
        _ => Err(mismatch(lhs, rhs)),
    }
}

fn span_ratio(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = spans(lhs, rhs)?;
    if b.is_zero() {
        return Err(RuntimeError::ZeroDivision);
    }
    Ok(Value::Number(Number::new(
        a.num_milliseconds() as f64 / b.num_milliseconds() as f64,
    )))
}
