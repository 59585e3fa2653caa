//! Selectors and selections: which devices and sensors a query targets.
//!
//! A [`Selector`] is a small predicate tree. A [`Selection`] pairs a
//! selector with the kind of entity it filters.
//!
//! Wire encodings:
//!
//! | Selector                  | JSON                              |
//! |---------------------------|-----------------------------------|
//! | `Key("k")`                | `{"key": "k"}`                    |
//! | `AttributeEquals("k","v")`| `{"attributes": {"k": "v"}}`      |
//! | `AttributeKeyExists("k")` | `{"attribute": "k"}`              |
//! | `And([..])`               | `{"and": [..]}`                   |
//! | `Or([..])`                | `{"or": [..]}`                    |
//! | `All`                     | `"all"`                           |

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The kind of entity a selector applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Devices.
    Devices,
    /// Sensors.
    Sensors,
}

impl EntityKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Devices => "devices",
            EntityKind::Sensors => "sensors",
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "devices" => Ok(Self::Devices),
            "sensors" => Ok(Self::Sensors),
            _ => Err(Error::InvalidQuery(format!("unknown entity kind '{}'", input))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A composable predicate over devices or sensors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Match the entity with this key.
    Key(String),
    /// Match entities whose attribute `key` equals `value`.
    AttributeEquals {
        /// Attribute name.
        key: String,
        /// Required attribute value.
        value: String,
    },
    /// Match entities that carry the attribute, whatever its value.
    AttributeKeyExists(String),
    /// Match entities matched by every child.
    And(Vec<Selector>),
    /// Match entities matched by at least one child.
    Or(Vec<Selector>),
    /// Match everything.
    All,
}

impl Selector {
    /// `Key` selector.
    pub fn key(key: impl Into<String>) -> Self {
        Selector::Key(key.into())
    }

    /// `AttributeEquals` selector.
    pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
        Selector::AttributeEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `AttributeKeyExists` selector.
    pub fn attribute_key(key: impl Into<String>) -> Self {
        Selector::AttributeKeyExists(key.into())
    }

    /// `And` selector. Zero children is allowed and encodes as an empty list.
    pub fn and(children: impl IntoIterator<Item = Selector>) -> Self {
        Selector::And(children.into_iter().collect())
    }

    /// `Or` selector. Zero children is allowed and encodes as an empty list.
    pub fn or(children: impl IntoIterator<Item = Selector>) -> Self {
        Selector::Or(children.into_iter().collect())
    }

    /// `All` selector.
    pub fn all() -> Self {
        Selector::All
    }

    fn from_json(value: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value as Json;

        let object = match value {
            Json::String(s) if s == "all" => return Ok(Selector::All),
            Json::Object(object) if object.len() == 1 => object,
            other => return Err(format!("unrecognised selector: {}", other)),
        };
        let (field, inner) = object
            .into_iter()
            .next()
            .ok_or_else(|| "empty selector object".to_string())?;

        match (field.as_str(), inner) {
            ("key", Json::String(key)) => Ok(Selector::Key(key)),
            ("attribute", Json::String(key)) => Ok(Selector::AttributeKeyExists(key)),
            ("attributes", Json::Object(pair)) if pair.len() == 1 => {
                let (key, value) = pair
                    .into_iter()
                    .next()
                    .ok_or_else(|| "empty attributes selector".to_string())?;
                match value {
                    Json::String(value) => Ok(Selector::AttributeEquals { key, value }),
                    other => Err(format!("attribute value must be a string, got {}", other)),
                }
            }
            ("and", Json::Array(children)) => children
                .into_iter()
                .map(Selector::from_json)
                .collect::<Result<_, _>>()
                .map(Selector::And),
            ("or", Json::Array(children)) => children
                .into_iter()
                .map(Selector::from_json)
                .collect::<Result<_, _>>()
                .map(Selector::Or),
            (field, inner) => Err(format!("unrecognised selector field '{}': {}", field, inner)),
        }
    }
}

/// Serializes a one-entry JSON object without allocating a map.
struct Entry<'a, V: ?Sized>(&'a str, &'a V);

impl<V: Serialize + ?Sized> Serialize for Entry<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selector::Key(key) => Entry("key", key.as_str()).serialize(serializer),
            Selector::AttributeEquals { key, value } => {
                Entry("attributes", &Entry(key.as_str(), value.as_str())).serialize(serializer)
            }
            Selector::AttributeKeyExists(key) => {
                Entry("attribute", key.as_str()).serialize(serializer)
            }
            Selector::And(children) => Entry("and", children.as_slice()).serialize(serializer),
            Selector::Or(children) => Entry("or", children.as_slice()).serialize(serializer),
            Selector::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Selector::from_json(value).map_err(de::Error::custom)
    }
}

/// Ordered `(kind, selector)` pairs, encoded as the `filters` object.
///
/// Adding a second selector for a kind appends rather than replaces; the
/// encoded object then carries the key twice, and the server's handling of
/// that is not specified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    selectors: Vec<(EntityKind, Selector)>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a selector for `kind`.
    pub fn add(mut self, kind: EntityKind, selector: Selector) -> Self {
        self.selectors.push((kind, selector));
        self
    }

    /// Shorthand for `add(EntityKind::Devices, selector)`.
    pub fn devices(self, selector: Selector) -> Self {
        self.add(EntityKind::Devices, selector)
    }

    /// Shorthand for `add(EntityKind::Sensors, selector)`.
    pub fn sensors(self, selector: Selector) -> Self {
        self.add(EntityKind::Sensors, selector)
    }

    /// The selector pairs in insertion order.
    pub fn selectors(&self) -> &[(EntityKind, Selector)] {
        &self.selectors
    }

    /// The last selector added for `kind`.
    pub fn get(&self, kind: EntityKind) -> Option<&Selector> {
        self.selectors
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s)
    }

    /// Whether no selector has been added.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.selectors.len()))?;
        for (kind, selector) in &self.selectors {
            map.serialize_entry(kind.as_str(), selector)?;
        }
        map.end()
    }
}

struct SelectionVisitor;

impl<'de> Visitor<'de> for SelectionVisitor {
    type Value = Selection;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of entity kind to selector")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Selection, A::Error> {
        let mut selection = Selection::new();
        while let Some((kind, selector)) = access.next_entry::<EntityKind, Selector>()? {
            selection = selection.add(kind, selector);
        }
        Ok(selection)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SelectionVisitor)
    }
}
