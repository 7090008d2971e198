use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::number::Number;
use crate::types::{ObjectKind, ProgType};
use crate::{Shared, SharedCell};

/// A game-domain object exposed to scripts.
///
/// The compiler never looks inside these; it only needs the kind for type checking.
/// Properties are read through the dot-reference registry, which by default forwards
/// to [`ProgObject::property`].
pub trait ProgObject: Debug + Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// Text form used when the object is concatenated with text.
    fn name(&self) -> String;

    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Shifts a calendar-like object by a duration (`MudDateTime + TimeSpan`).
    fn offset(&self, _delta: TimeDelta) -> Option<Shared<dyn ProgObject>> {
        None
    }

    /// Distance between two calendar-like objects (`MudDateTime - MudDateTime`).
    fn difference(&self, _other: &dyn ProgObject) -> Option<TimeDelta> {
        None
    }
}

fn folded(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_lowercase)
}

/// Lowercase form used for every case-insensitive text operation.
pub fn fold_case(text: &str) -> String {
    folded(text).collect()
}

/// Orders text the way scripts compare it: by Unicode lowercase form, so `"É"` and
/// `"é"` are equal. Equality, ordering and dictionary keys all use this rule.
pub fn text_cmp(a: &str, b: &str) -> Ordering {
    folded(a).cmp(folded(b))
}

/// Dictionary key compared and hashed without regard to case.
#[derive(Debug, Clone, Eq)]
pub struct DictKey(SmolStr);

impl DictKey {
    pub fn new(key: &str) -> Self {
        DictKey(SmolStr::new(key))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        text_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Ord for DictKey {
    fn cmp(&self, other: &Self) -> Ordering {
        text_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for DictKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in folded(&self.0) {
            c.hash(state);
        }
    }
}

impl From<&str> for DictKey {
    fn from(value: &str) -> Self {
        DictKey::new(value)
    }
}

impl Display for DictKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Collection = Shared<SharedCell<Vec<Value>>>;
pub type Dictionary = Shared<SharedCell<FxHashMap<DictKey, Value>>>;

/// The untyped runtime representation of every script value.
///
/// Containers are shared: cloning a `Value::Collection` clones the handle, so an
/// indexer assignment is visible to every holder of the container.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(Number),
    Text(String),
    DateTime(DateTime<Utc>),
    TimeSpan(TimeDelta),
    Object(Shared<dyn ProgObject>),
    Collection(Collection),
    /// Backs both dictionaries and collection dictionaries; the static type tells them apart.
    Dictionary(Dictionary),
}

pub fn read<T>(cell: &SharedCell<T>) -> RwLockReadGuard<'_, T> {
    cell.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write<T>(cell: &SharedCell<T>) -> RwLockWriteGuard<'_, T> {
    cell.write().unwrap_or_else(PoisonError::into_inner)
}

impl Value {
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    pub fn collection(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Collection(Shared::new(SharedCell::new(values.into_iter().collect())))
    }

    pub fn dictionary<K: Into<DictKey>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Dictionary(Shared::new(SharedCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    pub fn object(object: impl ProgObject + 'static) -> Self {
        Value::Object(Shared::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Snapshot of the elements of a collection, or `None` for any other value.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Collection(items) => Some(read(items).clone()),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
            Value::TimeSpan(_) => "timespan",
            Value::Object(_) => "object",
            Value::Collection(_) => "collection",
            Value::Dictionary(_) => "dictionary",
        }
    }

    /// Equality as scripts see it: case-insensitive text, reference equality for
    /// objects and containers, and `Null` equal only to `Null`.
    pub fn script_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => text_cmp(a, b) == Ordering::Equal,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Shared::as_ptr(a), Shared::as_ptr(b))
            }
            (Value::Collection(a), Value::Collection(b)) => Shared::ptr_eq(a, b),
            (Value::Dictionary(a), Value::Dictionary(b)) => Shared::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub fn format_timespan(span: &TimeDelta) -> String {
    if span.is_zero() {
        return "0s".to_string();
    }

    let sign = if *span < TimeDelta::zero() { "-" } else { "" };
    let span = span.abs();
    let parts = [
        (span.num_days(), "d"),
        (span.num_hours() % 24, "h"),
        (span.num_minutes() % 60, "m"),
        (span.num_seconds() % 60, "s"),
        (span.num_milliseconds() % 1000, "f"),
    ];

    format!(
        "{}{}",
        sign,
        parts
            .iter()
            .filter(|(n, _)| *n != 0)
            .map(|(n, unit)| format!("{n}{unit}"))
            .join(" ")
    )
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::TimeSpan(t) => write!(f, "{}", format_timespan(t)),
            Value::Object(o) => write!(f, "{}", o.name()),
            Value::Collection(items) => write!(f, "[{}]", read(items).iter().join(", ")),
            Value::Dictionary(entries) => write!(
                f,
                "{{{}}}",
                read(entries)
                    .iter()
                    .sorted_by(|(a, _), (b, _)| a.cmp(b))
                    .map(|(k, v)| format!("{k}: {v}"))
                    .join(", ")
            ),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::DateTime(d) => write!(f, "DateTime({d})"),
            Value::TimeSpan(t) => write!(f, "TimeSpan({})", format_timespan(t)),
            Value::Object(o) => write!(f, "Object({o:?})"),
            Value::Collection(items) => f.debug_list().entries(read(items).iter()).finish(),
            Value::Dictionary(entries) => f.debug_map().entries(read(entries).iter()).finish(),
        }
    }
}

/// Structural equality, used by tests and by hosts comparing results.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Collection(a), Value::Collection(b)) => {
                Shared::ptr_eq(a, b) || *read(a) == *read(b)
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                Shared::ptr_eq(a, b) || *read(a) == *read(b)
            }
            _ => self.script_eq(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<TimeDelta> for Value {
    fn from(value: TimeDelta) -> Self {
        Value::TimeSpan(value)
    }
}

/// A value paired with the static type it was produced under.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxedValue {
    pub ty: ProgType,
    pub value: Value,
}

impl BoxedValue {
    pub fn new(ty: ProgType, value: Value) -> Self {
        Self { ty, value }
    }
}

impl Display for BoxedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::text(Value::from("Bob"), Value::from("bob"), true)]
    #[case::accented_text(Value::from("École"), Value::from("éCOLE"), true)]
    #[case::number(Value::from(1.0), Value::from(1i64), true)]
    #[case::null(Value::Null, Value::Null, true)]
    #[case::null_text(Value::Null, Value::from(""), false)]
    #[case::collections(Value::collection(vec![1i64.into()]), Value::collection(vec![1i64.into()]), false)]
    fn test_script_eq(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
        assert_eq!(a.script_eq(&b), expected);
    }

    #[test]
    fn test_shared_collection_handle() {
        let a = Value::collection(vec![1i64.into()]);
        let b = a.clone();
        if let Value::Collection(items) = &a {
            write(items).push(2i64.into());
        }
        assert!(a.script_eq(&b));
        assert_eq!(b.items().map(|items| items.len()), Some(2));
    }

    #[test]
    fn test_dict_key_case_insensitive() {
        let dict = Value::dictionary(vec![("Alpha", Value::from(1i64))]);
        if let Value::Dictionary(entries) = &dict {
            assert_eq!(read(entries).get(&DictKey::new("ALPHA")), Some(&Value::from(1i64)));
        }
    }

    #[rstest]
    #[case::ascii("apple", "Banana", Ordering::Less)]
    #[case::accented_equal("É", "é", Ordering::Equal)]
    #[case::accented_order("éa", "ÉB", Ordering::Less)]
    fn test_text_cmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(text_cmp(a, b), expected);
        assert_eq!(DictKey::new(a) == DictKey::new(b), expected == Ordering::Equal);
    }

    #[test]
    fn test_dict_key_folds_unicode() {
        let dict = Value::dictionary(vec![("Épée", Value::from(1i64))]);
        if let Value::Dictionary(entries) = &dict {
            assert_eq!(read(entries).get(&DictKey::new("ÉPÉE")), Some(&Value::from(1i64)));
            assert_eq!(read(entries).get(&DictKey::new("épée")), Some(&Value::from(1i64)));
        }
    }

    #[rstest]
    #[case(TimeDelta::zero(), "0s")]
    #[case(TimeDelta::days(1) + TimeDelta::hours(2), "1d 2h")]
    #[case(TimeDelta::seconds(90), "1m 30s")]
    #[case(TimeDelta::milliseconds(-1500), "-1s 500f")]
    fn test_format_timespan(#[case] span: TimeDelta, #[case] expected: &str) {
        assert_eq!(format_timespan(&span), expected);
    }

    #[test]
    fn test_display() {
        let value = Value::collection(vec![Value::from(1i64), Value::from("a")]);
        assert_eq!(value.to_string(), "[1, a]");
        let dict = Value::dictionary(vec![("b", Value::from(2i64)), ("a", Value::from(1i64))]);
        assert_eq!(dict.to_string(), "{a: 1, b: 2}");
    }
}
