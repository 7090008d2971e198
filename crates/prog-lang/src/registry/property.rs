use std::fmt::{self, Debug, Formatter};

use chrono::{Datelike, NaiveTime, TimeDelta, Timelike};
use itertools::Itertools;

use super::{BuiltinFunctionDoc, Registry, element_of};
use crate::Shared;
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::node::dot::PropertyGetter;
use crate::number::Number;
use crate::types::{ProgType, Scalar, Shape};
use crate::value::{Value, read};

/// Which static types a dot reference applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyOwner {
    Type(ProgType),
    /// Every type of the given container shape, whatever its element kind.
    Shape(Shape),
}

impl PropertyOwner {
    pub fn accepts(&self, owner: &ProgType) -> bool {
        match self {
            PropertyOwner::Type(ty) => ty == owner,
            PropertyOwner::Shape(shape) => owner.shape() == *shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyType {
    Fixed(ProgType),
    /// The element type of the owning container.
    Element,
}

impl PropertyType {
    pub fn resolve(&self, owner: &ProgType) -> ProgType {
        match self {
            PropertyType::Fixed(ty) => *ty,
            PropertyType::Element => element_of(owner),
        }
    }
}

#[derive(Clone)]
pub struct PropertySignature {
    pub name: Ident,
    pub owner: PropertyOwner,
    pub ty: PropertyType,
    pub doc: BuiltinFunctionDoc,
    pub getter: PropertyGetter,
}

impl Debug for PropertySignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySignature")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("ty", &self.ty)
            .finish()
    }
}

impl PropertySignature {
    pub fn new(
        name: &str,
        owner: PropertyOwner,
        ty: PropertyType,
        getter: impl Fn(&Value) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Ident::new(name),
            owner,
            ty,
            doc: BuiltinFunctionDoc::default(),
            getter: Shared::new(getter),
        }
    }

    /// Human-readable signature such as `Text.Length -> Number`.
    pub fn signature(&self) -> String {
        let owner = match self.owner {
            PropertyOwner::Type(ty) => ty.to_string(),
            PropertyOwner::Shape(Shape::Scalar) => "Scalar".to_string(),
            PropertyOwner::Shape(Shape::Collection) => "Collection".to_string(),
            PropertyOwner::Shape(Shape::Dictionary) => "Dictionary".to_string(),
            PropertyOwner::Shape(Shape::CollectionDictionary) => "CollectionDictionary".to_string(),
        };
        let ty = match self.ty {
            PropertyType::Fixed(ty) => ty.to_string(),
            PropertyType::Element => "element".to_string(),
        };
        format!("{owner}.{} -> {ty}", self.name)
    }

    pub fn with_doc(mut self, description: &'static str) -> Self {
        self.doc = BuiltinFunctionDoc {
            description,
            params: &[],
        };
        self
    }
}

fn mismatch(name: &str, target: &Value) -> RuntimeError {
    RuntimeError::invalid_types(name, std::slice::from_ref(target))
}

fn total(span: &TimeDelta, unit_millis: f64) -> Value {
    Value::Number(Number::new(span.num_milliseconds() as f64 / unit_millis))
}

macro_rules! property {
    ($registry:ident, $owner:expr, $name:literal, $ty:expr, $doc:literal, |$target:ident| $body:expr) => {
        $registry.register_dot_reference(
            PropertySignature::new($name, $owner, $ty, |$target: &Value| $body).with_doc($doc),
        )
    };
}

pub(crate) fn register_standard(registry: &mut Registry) {
    use PropertyType::{Element, Fixed};

    let text = PropertyOwner::Type(ProgType::TEXT);
    property!(registry, text, "Length", Fixed(ProgType::NUMBER), "Number of characters.", |target| match target {
        Value::Text(s) => Ok(Value::from(s.chars().count())),
        other => Err(mismatch("Length", other)),
    });
    property!(registry, text, "Upper", Fixed(ProgType::TEXT), "The text in upper case.", |target| match target {
        Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
        other => Err(mismatch("Upper", other)),
    });
    property!(registry, text, "Lower", Fixed(ProgType::TEXT), "The text in lower case.", |target| match target {
        Value::Text(s) => Ok(Value::Text(s.to_lowercase())),
        other => Err(mismatch("Lower", other)),
    });

    let collection = PropertyOwner::Shape(Shape::Collection);
    property!(registry, collection, "Count", Fixed(ProgType::NUMBER), "Number of elements.", |target| match target {
        Value::Collection(items) => Ok(Value::from(read(items).len())),
        other => Err(mismatch("Count", other)),
    });
    property!(registry, collection, "Empty", Fixed(ProgType::BOOLEAN), "True when there are no elements.", |target| match target {
        Value::Collection(items) => Ok(Value::Boolean(read(items).is_empty())),
        other => Err(mismatch("Empty", other)),
    });
    property!(registry, collection, "First", Element, "The first element, or null.", |target| match target {
        Value::Collection(items) => Ok(read(items).first().cloned().unwrap_or_default()),
        other => Err(mismatch("First", other)),
    });
    property!(registry, collection, "Last", Element, "The last element, or null.", |target| match target {
        Value::Collection(items) => Ok(read(items).last().cloned().unwrap_or_default()),
        other => Err(mismatch("Last", other)),
    });

    for shape in [Shape::Dictionary, Shape::CollectionDictionary] {
        let dictionary = PropertyOwner::Shape(shape);
        property!(registry, dictionary, "Count", Fixed(ProgType::NUMBER), "Number of keys.", |target| match target {
            Value::Dictionary(entries) => Ok(Value::from(read(entries).len())),
            other => Err(mismatch("Count", other)),
        });
        property!(
            registry,
            dictionary,
            "Keys",
            Fixed(ProgType::Collection(Scalar::Text)),
            "The keys in alphabetical order.",
            |target| match target {
                Value::Dictionary(entries) => Ok(Value::collection(
                    read(entries)
                        .keys()
                        .sorted()
                        .map(|key| Value::Text(key.to_string()))
                        .collect::<Vec<_>>(),
                )),
                other => Err(mismatch("Keys", other)),
            }
        );
    }

    let datetime = PropertyOwner::Type(ProgType::DATETIME);
    let number = Fixed(ProgType::NUMBER);
    property!(registry, datetime, "Year", number, "The calendar year.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.year() as i64)),
        other => Err(mismatch("Year", other)),
    });
    property!(registry, datetime, "Month", number, "The month, 1 to 12.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.month() as i64)),
        other => Err(mismatch("Month", other)),
    });
    property!(registry, datetime, "Day", number, "The day of the month.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.day() as i64)),
        other => Err(mismatch("Day", other)),
    });
    property!(registry, datetime, "Hour", number, "The hour, 0 to 23.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.hour() as i64)),
        other => Err(mismatch("Hour", other)),
    });
    property!(registry, datetime, "Minute", number, "The minute, 0 to 59.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.minute() as i64)),
        other => Err(mismatch("Minute", other)),
    });
    property!(registry, datetime, "Second", number, "The second, 0 to 59.", |target| match target {
        Value::DateTime(d) => Ok(Value::from(d.second() as i64)),
        other => Err(mismatch("Second", other)),
    });
    property!(registry, datetime, "DayOfWeek", Fixed(ProgType::TEXT), "The weekday name, e.g. Monday.", |target| match target {
        Value::DateTime(d) => Ok(Value::Text(d.format("%A").to_string())),
        other => Err(mismatch("DayOfWeek", other)),
    });
    property!(registry, datetime, "Date", Fixed(ProgType::DATETIME), "Midnight of the same day.", |target| match target {
        Value::DateTime(d) => Ok(Value::DateTime(d.date_naive().and_time(NaiveTime::MIN).and_utc())),
        other => Err(mismatch("Date", other)),
    });

    let timespan = PropertyOwner::Type(ProgType::TIMESPAN);
    property!(registry, timespan, "Days", number, "Whole days.", |target| match target {
        Value::TimeSpan(t) => Ok(Value::from(t.num_days())),
        other => Err(mismatch("Days", other)),
    });
    property!(registry, timespan, "Hours", number, "The hours component, 0 to 23.", |target| match target {
        Value::TimeSpan(t) => Ok(Value::from(t.num_hours() % 24)),
        other => Err(mismatch("Hours", other)),
    });
    property!(registry, timespan, "Minutes", number, "The minutes component, 0 to 59.", |target| match target {
        Value::TimeSpan(t) => Ok(Value::from(t.num_minutes() % 60)),
        other => Err(mismatch("Minutes", other)),
    });
    property!(registry, timespan, "Seconds", number, "The seconds component, 0 to 59.", |target| match target {
        Value::TimeSpan(t) => Ok(Value::from(t.num_seconds() % 60)),
        other => Err(mismatch("Seconds", other)),
    });
    property!(registry, timespan, "TotalDays", number, "The whole span in days.", |target| match target {
        Value::TimeSpan(t) => Ok(total(t, 86_400_000.0)),
        other => Err(mismatch("TotalDays", other)),
    });
    property!(registry, timespan, "TotalHours", number, "The whole span in hours.", |target| match target {
        Value::TimeSpan(t) => Ok(total(t, 3_600_000.0)),
        other => Err(mismatch("TotalHours", other)),
    });
    property!(registry, timespan, "TotalMinutes", number, "The whole span in minutes.", |target| match target {
        Value::TimeSpan(t) => Ok(total(t, 60_000.0)),
        other => Err(mismatch("TotalMinutes", other)),
    });
    property!(registry, timespan, "TotalSeconds", number, "The whole span in seconds.", |target| match target {
        Value::TimeSpan(t) => Ok(total(t, 1_000.0)),
        other => Err(mismatch("TotalSeconds", other)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn get(owner: ProgType, name: &str, target: Value) -> Option<(ProgType, Result<Value, RuntimeError>)> {
        let mut registry = Registry::empty();
        register_standard(&mut registry);
        registry
            .resolve_property(&owner, name)
            .map(|p| (p.ty.resolve(&owner), (p.getter)(&target)))
    }

    #[rstest]
    #[case::text_length(ProgType::TEXT, "length", Value::from("héllo"), ProgType::NUMBER, Value::from(5i64))]
    #[case::collection_first(
        ProgType::Collection(Scalar::Text),
        "First",
        Value::collection(vec![Value::from("a"), Value::from("b")]),
        ProgType::TEXT,
        Value::from("a")
    )]
    #[case::collection_last_empty(
        ProgType::Collection(Scalar::Number),
        "last",
        Value::collection(Vec::new()),
        ProgType::NUMBER,
        Value::Null
    )]
    #[case::dictionary_keys(
        ProgType::Dictionary(Scalar::Number),
        "keys",
        Value::dictionary([("b", Value::from(1i64)), ("A", Value::from(2i64))]),
        ProgType::Collection(Scalar::Text),
        Value::collection(vec![Value::from("A"), Value::from("b")])
    )]
    #[case::timespan_hours(
        ProgType::TIMESPAN,
        "Hours",
        Value::TimeSpan(TimeDelta::hours(26)),
        ProgType::NUMBER,
        Value::from(2i64)
    )]
    #[case::timespan_total_hours(
        ProgType::TIMESPAN,
        "TotalHours",
        Value::TimeSpan(TimeDelta::minutes(90)),
        ProgType::NUMBER,
        Value::from(1.5)
    )]
    fn test_property(
        #[case] owner: ProgType,
        #[case] name: &str,
        #[case] target: Value,
        #[case] expected_type: ProgType,
        #[case] expected: Value,
    ) {
        let (ty, value) = get(owner, name, target).expect("property should resolve");
        assert_eq!(ty, expected_type);
        assert_eq!(value, Ok(expected));
    }

    #[test]
    fn test_datetime_parts() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 13, 45, 10).single().expect("valid date");
        assert_eq!(
            get(ProgType::DATETIME, "dayofweek", Value::DateTime(date)).map(|(_, v)| v),
            Some(Ok(Value::from("Friday")))
        );
        assert_eq!(
            get(ProgType::DATETIME, "hour", Value::DateTime(date)).map(|(_, v)| v),
            Some(Ok(Value::from(13i64)))
        );
    }

    #[test]
    fn test_unknown_owner() {
        assert!(get(ProgType::BOOLEAN, "Length", Value::TRUE).is_none());
    }

    #[test]
    fn test_signature() {
        let mut registry = Registry::empty();
        register_standard(&mut registry);

        let signatures = registry
            .properties()
            .filter(|p| p.name.as_str() == "Length" || p.name.as_str() == "First")
            .map(|p| p.signature())
            .sorted()
            .collect::<Vec<_>>();
        assert_eq!(signatures, vec!["Collection.First -> element", "Text.Length -> Number"]);
    }
}
