//! The static type algebra used by every compile-time check.
//!
//! A [`ProgType`] is a scalar kind wrapped in a container shape. Compatibility is
//! decided structurally: the shape must match exactly and the scalar kinds must be
//! equal, unless the expected scalar is [`Scalar::Anything`] or either side is the bare
//! [`ProgType::ERROR`] sentinel.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reference kinds owned by the game object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Character,
    Item,
    Location,
    Zone,
    Body,
    Clan,
    Craft,
    Race,
    Culture,
    Gender,
    Currency,
    MudDateTime,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 12] = [
        ObjectKind::Character,
        ObjectKind::Item,
        ObjectKind::Location,
        ObjectKind::Zone,
        ObjectKind::Body,
        ObjectKind::Clan,
        ObjectKind::Craft,
        ObjectKind::Race,
        ObjectKind::Culture,
        ObjectKind::Gender,
        ObjectKind::Currency,
        ObjectKind::MudDateTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Character => "Character",
            ObjectKind::Item => "Item",
            ObjectKind::Location => "Location",
            ObjectKind::Zone => "Zone",
            ObjectKind::Body => "Body",
            ObjectKind::Clan => "Clan",
            ObjectKind::Craft => "Craft",
            ObjectKind::Race => "Race",
            ObjectKind::Culture => "Culture",
            ObjectKind::Gender => "Gender",
            ObjectKind::Currency => "Currency",
            ObjectKind::MudDateTime => "MudDateTime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Boolean,
    Number,
    Text,
    DateTime,
    TimeSpan,
    Object(ObjectKind),
    /// Parameter-side wildcard accepting any value kind of the same shape.
    Anything,
    /// Result kind of programs that return nothing.
    Void,
    /// Sentinel for an expression whose type could not be determined.
    Error,
}

impl Scalar {
    pub fn name(&self) -> &'static str {
        match self {
            Scalar::Boolean => "Boolean",
            Scalar::Number => "Number",
            Scalar::Text => "Text",
            Scalar::DateTime => "DateTime",
            Scalar::TimeSpan => "TimeSpan",
            Scalar::Object(kind) => kind.name(),
            Scalar::Anything => "Anything",
            Scalar::Void => "Void",
            Scalar::Error => "Error",
        }
    }

    /// Ordering comparisons (`<`, `>=`, ...) are defined for these kinds only.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Scalar::Number | Scalar::Text | Scalar::DateTime | Scalar::TimeSpan
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Scalar,
    Collection,
    Dictionary,
    CollectionDictionary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgType {
    Scalar(Scalar),
    Collection(Scalar),
    Dictionary(Scalar),
    /// A dictionary whose values are collections of the scalar kind.
    CollectionDictionary(Scalar),
}

impl ProgType {
    pub const BOOLEAN: ProgType = ProgType::Scalar(Scalar::Boolean);
    pub const NUMBER: ProgType = ProgType::Scalar(Scalar::Number);
    pub const TEXT: ProgType = ProgType::Scalar(Scalar::Text);
    pub const DATETIME: ProgType = ProgType::Scalar(Scalar::DateTime);
    pub const TIMESPAN: ProgType = ProgType::Scalar(Scalar::TimeSpan);
    pub const ANYTHING: ProgType = ProgType::Scalar(Scalar::Anything);
    pub const VOID: ProgType = ProgType::Scalar(Scalar::Void);
    pub const ERROR: ProgType = ProgType::Scalar(Scalar::Error);

    pub fn object(kind: ObjectKind) -> Self {
        ProgType::Scalar(Scalar::Object(kind))
    }

    pub fn scalar(&self) -> Scalar {
        match self {
            ProgType::Scalar(s)
            | ProgType::Collection(s)
            | ProgType::Dictionary(s)
            | ProgType::CollectionDictionary(s) => *s,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            ProgType::Scalar(_) => Shape::Scalar,
            ProgType::Collection(_) => Shape::Collection,
            ProgType::Dictionary(_) => Shape::Dictionary,
            ProgType::CollectionDictionary(_) => Shape::CollectionDictionary,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ProgType::Scalar(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ProgType::Collection(_))
    }

    pub fn is_error(&self) -> bool {
        *self == ProgType::ERROR
    }

    /// Same scalar kind in a different container shape.
    pub fn with_shape(&self, shape: Shape) -> ProgType {
        let scalar = self.scalar();
        match shape {
            Shape::Scalar => ProgType::Scalar(scalar),
            Shape::Collection => ProgType::Collection(scalar),
            Shape::Dictionary => ProgType::Dictionary(scalar),
            Shape::CollectionDictionary => ProgType::CollectionDictionary(scalar),
        }
    }

    /// The type produced by indexing into a value of this type, with the key type it requires.
    pub fn indexer(&self) -> Option<(ProgType, ProgType)> {
        match self {
            ProgType::Scalar(_) => None,
            ProgType::Collection(s) => Some((ProgType::NUMBER, ProgType::Scalar(*s))),
            ProgType::Dictionary(s) => Some((ProgType::TEXT, ProgType::Scalar(*s))),
            ProgType::CollectionDictionary(s) => Some((ProgType::TEXT, ProgType::Collection(*s))),
        }
    }

    /// Returns `true` if a value of type `self` may be used where `expected` is required.
    pub fn compatible(&self, expected: &ProgType) -> bool {
        if self.is_error() || expected.is_error() {
            return true;
        }

        if self.shape() != expected.shape() {
            return false;
        }

        match (self.scalar(), expected.scalar()) {
            (Scalar::Void, _) => false,
            (_, Scalar::Anything) => true,
            (actual, expected) => actual == expected,
        }
    }

    /// Human-readable name used in diagnostics, e.g. `Number Collection`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl Display for ProgType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProgType::Scalar(s) => write!(f, "{}", s.name()),
            ProgType::Collection(s) => write!(f, "{} Collection", s.name()),
            ProgType::Dictionary(s) => write!(f, "{} Dictionary", s.name()),
            ProgType::CollectionDictionary(s) => write!(f, "{} CollectionDictionary", s.name()),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("Unknown type `{0}`")]
    UnknownScalar(String),
    #[error("Unknown type modifier `{0}`")]
    UnknownModifier(String),
    #[error("Empty type name")]
    Empty,
}

impl FromStr for Scalar {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        let scalar = match lowered.as_str() {
            "bool" | "boolean" => Scalar::Boolean,
            "number" | "num" => Scalar::Number,
            "text" | "string" => Scalar::Text,
            "datetime" => Scalar::DateTime,
            "timespan" => Scalar::TimeSpan,
            "anything" => Scalar::Anything,
            "void" => Scalar::Void,
            other => ObjectKind::ALL
                .iter()
                .find(|kind| kind.name().eq_ignore_ascii_case(other))
                .map(|kind| Scalar::Object(*kind))
                .ok_or_else(|| TypeParseError::UnknownScalar(s.to_string()))?,
        };

        Ok(scalar)
    }
}

impl FromStr for ProgType {
    type Err = TypeParseError;

    /// Parses names such as `number`, `text collection` or `character dictionary`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let scalar = words.next().ok_or(TypeParseError::Empty)?.parse::<Scalar>()?;

        match words.next().map(|w| w.to_ascii_lowercase()) {
            None => Ok(ProgType::Scalar(scalar)),
            Some(modifier) => {
                let ty = match modifier.as_str() {
                    "collection" => ProgType::Collection(scalar),
                    "dictionary" => ProgType::Dictionary(scalar),
                    "collectiondictionary" => ProgType::CollectionDictionary(scalar),
                    _ => return Err(TypeParseError::UnknownModifier(modifier)),
                };

                match words.next() {
                    None => Ok(ty),
                    Some(extra) => Err(TypeParseError::UnknownModifier(extra.to_string())),
                }
            }
        }
    }
}

impl Serialize for ProgType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProgType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::same(ProgType::NUMBER, ProgType::NUMBER, true)]
    #[case::different(ProgType::NUMBER, ProgType::TEXT, false)]
    #[case::collection_vs_scalar(ProgType::Collection(Scalar::Number), ProgType::NUMBER, false)]
    #[case::scalar_vs_collection(ProgType::NUMBER, ProgType::Collection(Scalar::Number), false)]
    #[case::anything(ProgType::TEXT, ProgType::ANYTHING, true)]
    #[case::anything_collection(ProgType::Collection(Scalar::Text), ProgType::Collection(Scalar::Anything), true)]
    #[case::anything_shape_mismatch(ProgType::Collection(Scalar::Text), ProgType::ANYTHING, false)]
    #[case::error_actual(ProgType::ERROR, ProgType::Dictionary(Scalar::Text), true)]
    #[case::error_expected(ProgType::Collection(Scalar::Number), ProgType::ERROR, true)]
    #[case::void(ProgType::VOID, ProgType::ANYTHING, false)]
    #[case::objects(ProgType::object(ObjectKind::Item), ProgType::object(ObjectKind::Character), false)]
    fn test_compatible(#[case] actual: ProgType, #[case] expected: ProgType, #[case] result: bool) {
        assert_eq!(actual.compatible(&expected), result);
    }

    #[rstest]
    #[case("number", ProgType::NUMBER)]
    #[case("Text Collection", ProgType::Collection(Scalar::Text))]
    #[case("character dictionary", ProgType::Dictionary(Scalar::Object(ObjectKind::Character)))]
    #[case("number collectiondictionary", ProgType::CollectionDictionary(Scalar::Number))]
    #[case("bool", ProgType::BOOLEAN)]
    fn test_parse(#[case] input: &str, #[case] expected: ProgType) {
        assert_eq!(input.parse::<ProgType>(), Ok(expected));
    }

    #[rstest]
    #[case("", TypeParseError::Empty)]
    #[case("widget", TypeParseError::UnknownScalar("widget".to_string()))]
    #[case("number list", TypeParseError::UnknownModifier("list".to_string()))]
    fn test_parse_error(#[case] input: &str, #[case] expected: TypeParseError) {
        assert_eq!(input.parse::<ProgType>(), Err(expected));
    }

    #[rstest]
    #[case(ProgType::NUMBER, "Number")]
    #[case(ProgType::Collection(Scalar::Object(ObjectKind::Item)), "Item Collection")]
    #[case(ProgType::CollectionDictionary(Scalar::Text), "Text CollectionDictionary")]
    fn test_describe(#[case] ty: ProgType, #[case] expected: &str) {
        assert_eq!(ty.describe(), expected);
        assert_eq!(ty.describe().parse::<ProgType>(), Ok(ty));
    }

    #[test]
    fn test_indexer() {
        assert_eq!(
            ProgType::CollectionDictionary(Scalar::Number).indexer(),
            Some((ProgType::TEXT, ProgType::Collection(Scalar::Number)))
        );
        assert_eq!(ProgType::NUMBER.indexer(), None);
    }
}
