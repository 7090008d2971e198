use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

use super::{BuiltinFunctionDoc, Registry, collection_of};
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::node::binary::compare;
use crate::node::extension::{ExtensionFn, Selector};
use crate::number::Number;
use crate::types::{ProgType, Scalar};
use crate::value::Value;

/// Static result type of a collection extension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtensionReturn {
    Fixed(ProgType),
    /// One element of the source collection.
    Element,
    /// A collection of the same type as the source.
    SourceCollection,
    /// A collection of whatever the inner expression produces.
    CollectionOfInner,
}

/// One overload of a collection extension `source.name(variable, inner)`.
#[derive(Clone)]
pub struct ExtensionSignature {
    pub name: Ident,
    /// Required type of the inner expression. `Anything` accepts every scalar type.
    pub inner: ProgType,
    pub returns: ExtensionReturn,
    pub doc: BuiltinFunctionDoc,
    pub func: ExtensionFn,
}

impl Debug for ExtensionSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionSignature")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .field("returns", &self.returns)
            .finish()
    }
}

impl ExtensionSignature {
    pub fn new(name: &str, inner: ProgType, returns: ExtensionReturn, func: ExtensionFn) -> Self {
        Self {
            name: Ident::new(name),
            inner,
            returns,
            doc: BuiltinFunctionDoc::default(),
            func,
        }
    }

    pub fn with_doc(mut self, description: &'static str, params: &'static [&'static str]) -> Self {
        self.doc = BuiltinFunctionDoc { description, params };
        self
    }

    pub fn matches(&self, element: &ProgType, inner: &ProgType) -> bool {
        if !element.is_scalar() {
            return false;
        }

        if self.inner == ProgType::ANYTHING {
            inner.is_scalar() && inner.scalar() != Scalar::Void
        } else {
            inner.compatible(&self.inner)
        }
    }

    /// Human-readable signature such as `Collection.sum(variable, Number) -> element`.
    pub fn signature(&self) -> String {
        let returns = match self.returns {
            ExtensionReturn::Fixed(ty) => ty.to_string(),
            ExtensionReturn::Element => "element".to_string(),
            ExtensionReturn::SourceCollection => "source collection".to_string(),
            ExtensionReturn::CollectionOfInner => "collection of inner".to_string(),
        };
        format!("Collection.{}(variable, {}) -> {returns}", self.name, self.inner)
    }

    pub fn return_type(&self, element: &ProgType, inner: &ProgType) -> ProgType {
        match self.returns {
            ExtensionReturn::Fixed(ty) => ty,
            ExtensionReturn::Element => *element,
            ExtensionReturn::SourceCollection => collection_of(element),
            ExtensionReturn::CollectionOfInner => collection_of(inner),
        }
    }
}

fn predicate(select: &mut Selector<'_>, item: &Value) -> Result<bool, RuntimeError> {
    match select(item)? {
        Value::Boolean(b) => Ok(b),
        other => Err(RuntimeError::invalid_types("predicate", &[other])),
    }
}

fn number(select: &mut Selector<'_>, item: &Value) -> Result<Number, RuntimeError> {
    match select(item)? {
        Value::Number(n) => Ok(n),
        other => Err(RuntimeError::invalid_types("selector", &[other])),
    }
}

fn any(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    for item in items {
        if predicate(select, item)? {
            return Ok(Value::TRUE);
        }
    }
    Ok(Value::FALSE)
}

fn all(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    for item in items {
        if !predicate(select, item)? {
            return Ok(Value::FALSE);
        }
    }
    Ok(Value::TRUE)
}

fn none(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    any(items, select).map(|found| Value::Boolean(!found.as_bool().unwrap_or_default()))
}

fn count(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    let mut n = 0usize;
    for item in items {
        if predicate(select, item)? {
            n += 1;
        }
    }
    Ok(Value::from(n))
}

fn filter(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    let mut kept = Vec::new();
    for item in items {
        if predicate(select, item)? {
            kept.push(item.clone());
        }
    }
    Ok(Value::collection(kept))
}

fn map(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    items
        .iter()
        .map(|item| select(item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::collection)
}

fn first(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    for item in items {
        if predicate(select, item)? {
            return Ok(item.clone());
        }
    }
    Ok(Value::Null)
}

fn last(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    for item in items.iter().rev() {
        if predicate(select, item)? {
            return Ok(item.clone());
        }
    }
    Ok(Value::Null)
}

fn sum(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    let mut total = Number::default();
    for item in items {
        total = total + number(select, item)?;
    }
    Ok(Value::Number(total))
}

fn average(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    if items.is_empty() {
        return Ok(Value::Number(Number::default()));
    }

    match sum(items, select)? {
        Value::Number(total) => Ok(Value::Number(total / Number::from(items.len()))),
        other => Err(RuntimeError::invalid_types("average", &[other])),
    }
}

fn extreme(items: &[Value], select: &mut Selector<'_>, wanted: Ordering) -> Result<Value, RuntimeError> {
    let mut best: Option<Number> = None;
    for item in items {
        let n = number(select, item)?;
        if best.is_none_or(|b| n.total_cmp(&b) == wanted) {
            best = Some(n);
        }
    }
    Ok(best.map(Value::Number).unwrap_or_default())
}

fn max(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    extreme(items, select, Ordering::Greater)
}

fn min(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    extreme(items, select, Ordering::Less)
}

/// Sort keys need a total order; the tolerant number comparison of `<` is not one.
fn sort_order(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a.total_cmp(b)),
        _ => compare(lhs, rhs),
    }
}

fn sorted(items: &[Value], select: &mut Selector<'_>, descending: bool) -> Result<Value, RuntimeError> {
    let mut keyed = items
        .iter()
        .map(|item| select(item).map(|key| (key, item.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = sort_order(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        });
        if descending { ordering.reverse() } else { ordering }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(Value::collection(keyed.into_iter().map(|(_, item)| item))),
    }
}

fn order_by(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    sorted(items, select, false)
}

fn order_by_descending(items: &[Value], select: &mut Selector<'_>) -> Result<Value, RuntimeError> {
    sorted(items, select, true)
}

pub(crate) fn register_standard(registry: &mut Registry) {
    use ExtensionReturn::*;

    let extensions = [
        ExtensionSignature::new("any", ProgType::BOOLEAN, Fixed(ProgType::BOOLEAN), any)
            .with_doc("True if the condition holds for at least one element.", &["variable", "condition"]),
        ExtensionSignature::new("all", ProgType::BOOLEAN, Fixed(ProgType::BOOLEAN), all)
            .with_doc("True if the condition holds for every element.", &["variable", "condition"]),
        ExtensionSignature::new("none", ProgType::BOOLEAN, Fixed(ProgType::BOOLEAN), none)
            .with_doc("True if the condition holds for no element.", &["variable", "condition"]),
        ExtensionSignature::new("count", ProgType::BOOLEAN, Fixed(ProgType::NUMBER), count)
            .with_doc("Number of elements for which the condition holds.", &["variable", "condition"]),
        ExtensionSignature::new("where", ProgType::BOOLEAN, SourceCollection, filter)
            .with_doc("Elements for which the condition holds, in order.", &["variable", "condition"]),
        ExtensionSignature::new("select", ProgType::ANYTHING, CollectionOfInner, map)
            .with_doc("The expression evaluated for every element.", &["variable", "expression"]),
        ExtensionSignature::new("first", ProgType::BOOLEAN, Element, first)
            .with_doc("First element for which the condition holds, or null.", &["variable", "condition"]),
        ExtensionSignature::new("last", ProgType::BOOLEAN, Element, last)
            .with_doc("Last element for which the condition holds, or null.", &["variable", "condition"]),
        ExtensionSignature::new("sum", ProgType::NUMBER, Fixed(ProgType::NUMBER), sum)
            .with_doc("Sum of the expression over all elements; 0 when empty.", &["variable", "expression"]),
        ExtensionSignature::new("average", ProgType::NUMBER, Fixed(ProgType::NUMBER), average)
            .with_doc("Mean of the expression over all elements; 0 when empty.", &["variable", "expression"]),
        ExtensionSignature::new("max", ProgType::NUMBER, Fixed(ProgType::NUMBER), max)
            .with_doc("Largest value of the expression, or null when empty.", &["variable", "expression"]),
        ExtensionSignature::new("min", ProgType::NUMBER, Fixed(ProgType::NUMBER), min)
            .with_doc("Smallest value of the expression, or null when empty.", &["variable", "expression"]),
    ];

    for extension in extensions {
        registry.register_collection_extension(extension);
    }

    for key in [ProgType::NUMBER, ProgType::TEXT, ProgType::DATETIME, ProgType::TIMESPAN] {
        registry.register_collection_extension(
            ExtensionSignature::new("orderby", key, SourceCollection, order_by)
                .with_doc("Elements sorted ascending by the key expression.", &["variable", "key"]),
        );
        registry.register_collection_extension(
            ExtensionSignature::new("orderbydescending", key, SourceCollection, order_by_descending)
                .with_doc("Elements sorted descending by the key expression.", &["variable", "key"]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn numbers(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::from(*n)).collect()
    }

    fn greater_than(limit: i64) -> impl FnMut(&Value) -> Result<Value, RuntimeError> {
        move |item| match item {
            Value::Number(n) => Ok(Value::Boolean(*n > Number::from(limit))),
            other => Err(RuntimeError::invalid_types("test", std::slice::from_ref(other))),
        }
    }

    fn identity(item: &Value) -> Result<Value, RuntimeError> {
        Ok(item.clone())
    }

    #[rstest]
    #[case::any(any as ExtensionFn, &[1, 7, 3], Value::TRUE)]
    #[case::any_empty(any as ExtensionFn, &[], Value::FALSE)]
    #[case::all(all as ExtensionFn, &[6, 7], Value::TRUE)]
    #[case::all_empty(all as ExtensionFn, &[], Value::TRUE)]
    #[case::none(none as ExtensionFn, &[1, 2], Value::TRUE)]
    #[case::count(count as ExtensionFn, &[6, 1, 9], Value::from(2i64))]
    #[case::first(first as ExtensionFn, &[1, 8, 9], Value::from(8i64))]
    #[case::last(last as ExtensionFn, &[1, 8, 9, 2], Value::from(9i64))]
    #[case::first_missing(first as ExtensionFn, &[1, 2], Value::Null)]
    fn test_predicates(#[case] func: ExtensionFn, #[case] items: &[i64], #[case] expected: Value) {
        let mut select = greater_than(5);
        assert_eq!(func(&numbers(items), &mut select), Ok(expected));
    }

    #[rstest]
    #[case::sum(sum as ExtensionFn, &[1, 2, 3], Value::from(6i64))]
    #[case::sum_empty(sum as ExtensionFn, &[], Value::from(0i64))]
    #[case::average(average as ExtensionFn, &[2, 4], Value::from(3i64))]
    #[case::average_empty(average as ExtensionFn, &[], Value::from(0i64))]
    #[case::max(max as ExtensionFn, &[2, 9, 4], Value::from(9i64))]
    #[case::min(min as ExtensionFn, &[2, 9, 4], Value::from(2i64))]
    #[case::max_empty(max as ExtensionFn, &[], Value::Null)]
    fn test_aggregates(#[case] func: ExtensionFn, #[case] items: &[i64], #[case] expected: Value) {
        let mut select = identity;
        assert_eq!(func(&numbers(items), &mut select), Ok(expected));
    }

    #[test]
    fn test_where_keeps_order() {
        let mut select = greater_than(2);
        let result = filter(&numbers(&[5, 1, 3]), &mut select);
        assert_eq!(result.map(|v| v.items()), Ok(Some(numbers(&[5, 3]))));
    }

    #[test]
    fn test_orderby_descending_text() {
        let items = vec![Value::from("b"), Value::from("C"), Value::from("a")];
        let mut select = identity;
        let result = order_by_descending(&items, &mut select);
        assert_eq!(
            result.map(|v| v.items()),
            Ok(Some(vec![Value::from("C"), Value::from("b"), Value::from("a")]))
        );
    }

    #[test]
    fn test_orderby_closely_spaced_numbers() {
        // Neighbours sit within the equality tolerance of each other.
        let items = (0..200i64)
            .map(|i| Value::Number(Number::new(((i * 7919) % 200) as f64 * 6e-10)))
            .collect::<Vec<_>>();
        let raw = |result: Result<Value, RuntimeError>| {
            result
                .unwrap()
                .items()
                .unwrap()
                .iter()
                .map(|v| v.as_number().unwrap().value())
                .collect::<Vec<_>>()
        };
        let expected = (0..200i64).map(|i| i as f64 * 6e-10).collect::<Vec<_>>();

        let mut select = identity;
        assert_eq!(raw(order_by(&items, &mut select)), expected);
        assert_eq!(
            raw(order_by_descending(&items, &mut select)),
            expected.iter().rev().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_predicate_error_propagates() {
        let items = vec![Value::from("text")];
        let mut select = greater_than(1);
        assert!(any(&items, &mut select).is_err());
    }

    #[rstest]
    #[case::predicate("where", ProgType::NUMBER, ProgType::BOOLEAN, Some(ProgType::Collection(Scalar::Number)))]
    #[case::predicate_wrong_inner("any", ProgType::NUMBER, ProgType::NUMBER, None)]
    #[case::select("select", ProgType::NUMBER, ProgType::TEXT, Some(ProgType::Collection(Scalar::Text)))]
    #[case::orderby_text("OrderBy", ProgType::NUMBER, ProgType::TEXT, Some(ProgType::Collection(Scalar::Number)))]
    #[case::orderby_boolean("orderby", ProgType::NUMBER, ProgType::BOOLEAN, None)]
    #[case::first("first", ProgType::TEXT, ProgType::BOOLEAN, Some(ProgType::TEXT))]
    fn test_resolve(
        #[case] name: &str,
        #[case] element: ProgType,
        #[case] inner: ProgType,
        #[case] expected: Option<ProgType>,
    ) {
        let mut registry = Registry::empty();
        register_standard(&mut registry);

        assert_eq!(
            registry
                .resolve_extension(name, &element, &inner)
                .map(|s| s.return_type(&element, &inner)),
            expected
        );
    }
}
