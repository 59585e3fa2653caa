//! The query model: search, optional pipeline, and exactly one action.
//!
//! A [`Query`] is the single unit sent to the service. It is also what a
//! continuation token decodes back into, so every type here both serializes
//! and deserializes.
//!
//! ```json
//! {
//!   "search": {"select": "devices", "filters": {"devices": {"key": "therm.0"}}},
//!   "fold":   {"functions": [..]},
//!   "read":   {"start": "..", "stop": ".."}
//! }
//! ```
//!
//! The action is encoded as a field named after it (`read`, `find`,
//! `single`, `delete`), not as a tagged `type` field.

use std::fmt;
use std::str::FromStr;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::selector::{EntityKind, Selection};
use crate::timestamp::Timestamp;

/// What to search for and how to filter it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySearch {
    /// Kind of entity the query returns.
    #[serde(rename = "select")]
    pub kind: EntityKind,
    /// Filters applied to devices and sensors.
    #[serde(rename = "filters")]
    pub selection: Selection,
}

impl QuerySearch {
    /// Create a search.
    pub fn new(kind: EntityKind, selection: Selection) -> Self {
        Self { kind, selection }
    }
}

/// Read raw or transformed data in the half-open interval `[start, stop)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAction {
    /// Inclusive start.
    #[serde(with = "crate::timestamp")]
    pub start: Timestamp,
    /// Exclusive stop.
    #[serde(with = "crate::timestamp")]
    pub stop: Timestamp,
    /// Maximum number of rows per page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// List the matching entities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindAction {
    #[serde(default = "quantifier_all")]
    quantifier: String,
    /// Maximum number of entities per page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

fn quantifier_all() -> String {
    "all".to_string()
}

impl FindAction {
    /// Find every matching entity.
    pub fn new() -> Self {
        Self {
            quantifier: quantifier_all(),
            limit: None,
        }
    }

    /// Find matching entities, at most `limit` per page.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// The quantifier sent with the action. Always `"all"`.
    pub fn quantifier(&self) -> &str {
        &self.quantifier
    }
}

/// Which value a single-value query picks relative to its timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Last value strictly before the timestamp.
    Before,
    /// First value strictly after the timestamp.
    After,
    /// Value closest to the timestamp.
    Nearest,
    /// Value exactly at the timestamp.
    Exact,
    /// Most recent value.
    Latest,
    /// Oldest value.
    Earliest,
}

impl Direction {
    /// Lower-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Before => "before",
            Direction::After => "after",
            Direction::Nearest => "nearest",
            Direction::Exact => "exact",
            Direction::Latest => "latest",
            Direction::Earliest => "earliest",
        }
    }

    /// Whether this direction is relative to a timestamp.
    pub fn needs_timestamp(&self) -> bool {
        !matches!(self, Direction::Latest | Direction::Earliest)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "nearest" => Ok(Self::Nearest),
            "exact" => Ok(Self::Exact),
            "latest" => Ok(Self::Latest),
            "earliest" => Ok(Self::Earliest),
            _ => Err(Error::InvalidQuery(format!("unknown direction '{}'", input))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Pick one value per stream relative to a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSingleValue")]
pub struct SingleValue {
    function: Direction,
    #[serde(
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    include_selection: bool,
}

#[derive(Deserialize)]
struct RawSingleValue {
    function: Direction,
    #[serde(default, with = "crate::timestamp::option")]
    timestamp: Option<Timestamp>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    include_selection: bool,
}

impl TryFrom<RawSingleValue> for SingleValue {
    type Error = Error;

    fn try_from(raw: RawSingleValue) -> Result<Self> {
        let mut single = SingleValue::new(raw.function, raw.timestamp)?;
        single.limit = raw.limit;
        single.include_selection = raw.include_selection;
        Ok(single)
    }
}

impl SingleValue {
    /// Create a single-value action.
    ///
    /// Every direction except `Latest` and `Earliest` needs a timestamp;
    /// omitting it is an [`Error::InvalidQuery`].
    pub fn new(function: Direction, timestamp: Option<Timestamp>) -> Result<Self> {
        if function.needs_timestamp() && timestamp.is_none() {
            return Err(Error::InvalidQuery(format!(
                "single value '{}' requires a timestamp",
                function
            )));
        }
        Ok(Self {
            function,
            timestamp,
            limit: None,
            include_selection: false,
        })
    }

    /// Most recent value of each stream.
    pub fn latest() -> Self {
        Self {
            function: Direction::Latest,
            timestamp: None,
            limit: None,
            include_selection: false,
        }
    }

    /// Oldest value of each stream.
    pub fn earliest() -> Self {
        Self {
            function: Direction::Earliest,
            ..Self::latest()
        }
    }

    /// Value picked by `function` relative to `timestamp`.
    pub fn at(function: Direction, timestamp: Timestamp) -> Self {
        Self {
            function,
            timestamp: Some(timestamp),
            limit: None,
            include_selection: false,
        }
    }

    /// Limit the number of rows per page.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Direction of this action.
    pub fn function(&self) -> Direction {
        self.function
    }

    /// Reference timestamp, if any.
    pub fn timestamp(&self) -> Option<&Timestamp> {
        self.timestamp.as_ref()
    }

    /// Row limit, if any.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

/// Delete data points in the half-open interval `[start, stop)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAction {
    /// Inclusive start.
    #[serde(with = "crate::timestamp")]
    pub start: Timestamp,
    /// Exclusive stop.
    #[serde(with = "crate::timestamp")]
    pub stop: Timestamp,
}

/// The operation a query performs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryAction {
    /// Read data points.
    Read(ReadAction),
    /// List entities.
    Find(FindAction),
    /// Pick one value per stream.
    SingleValue(SingleValue),
    /// Delete data points.
    Delete(DeleteAction),
}

impl QueryAction {
    /// `Read` over `[start, stop)`.
    pub fn read(start: Timestamp, stop: Timestamp, limit: Option<u32>) -> Self {
        QueryAction::Read(ReadAction { start, stop, limit })
    }

    /// `Find` with an optional page limit.
    pub fn find(limit: Option<u32>) -> Self {
        QueryAction::Find(match limit {
            Some(limit) => FindAction::with_limit(limit),
            None => FindAction::new(),
        })
    }

    /// `Delete` over `[start, stop)`.
    pub fn delete(start: Timestamp, stop: Timestamp) -> Self {
        QueryAction::Delete(DeleteAction { start, stop })
    }

    /// Field name the action is encoded under.
    pub fn name(&self) -> &'static str {
        match self {
            QueryAction::Read(_) => "read",
            QueryAction::Find(_) => "find",
            QueryAction::SingleValue(_) => "single",
            QueryAction::Delete(_) => "delete",
        }
    }
}

impl From<SingleValue> for QueryAction {
    fn from(action: SingleValue) -> Self {
        QueryAction::SingleValue(action)
    }
}

/// A complete query. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// What to search for.
    pub search: QuerySearch,
    /// Server-side transformations, if any.
    pub pipeline: Option<Pipeline>,
    /// What to do with the matches.
    pub action: QueryAction,
}

impl Query {
    /// Create a query.
    pub fn new(search: QuerySearch, pipeline: Option<Pipeline>, action: QueryAction) -> Self {
        Self {
            search,
            pipeline,
            action,
        }
    }

    /// Encode the query as a JSON request body.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialization)
    }

    /// Decode a query from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::Decode)
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.pipeline.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("search", &self.search)?;
        if let Some(pipeline) = &self.pipeline {
            map.serialize_entry("fold", pipeline)?;
        }
        let name = self.action.name();
        match &self.action {
            QueryAction::Read(action) => map.serialize_entry(name, action)?,
            QueryAction::Find(action) => map.serialize_entry(name, action)?,
            QueryAction::SingleValue(action) => map.serialize_entry(name, action)?,
            QueryAction::Delete(action) => map.serialize_entry(name, action)?,
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct RawQuery {
    search: QuerySearch,
    #[serde(default)]
    fold: Option<Pipeline>,
    read: Option<ReadAction>,
    find: Option<FindAction>,
    single: Option<SingleValue>,
    delete: Option<DeleteAction>,
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawQuery::deserialize(deserializer)?;
        let mut actions = [
            raw.read.map(QueryAction::Read),
            raw.find.map(QueryAction::Find),
            raw.single.map(QueryAction::SingleValue),
            raw.delete.map(QueryAction::Delete),
        ]
        .into_iter()
        .flatten();

        let action = match (actions.next(), actions.next()) {
            (Some(action), None) => action,
            (None, _) => return Err(serde::de::Error::custom("query has no action")),
            (Some(_), Some(_)) => {
                return Err(serde::de::Error::custom("query has more than one action"));
            }
        };

        Ok(Query {
            search: raw.search,
            pipeline: raw.fold,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Fold, Period};
    use crate::selector::Selector;
    use crate::timestamp;

    fn ts(s: &str) -> Timestamp {
        timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_find_query_exact_json() {
        let selection = Selection::new()
            .devices(Selector::or([
                Selector::key("building-1234"),
                Selector::key("building-4321"),
            ]))
            .sensors(Selector::key("temp-1"));
        let query = Query::new(
            QuerySearch::new(EntityKind::Devices, selection),
            None,
            QueryAction::find(None),
        );

        let expected = r#"{"search":{"select":"devices","filters":{"devices":{"or":[{"key":"building-1234"},{"key":"building-4321"}]},"sensors":{"key":"temp-1"}}},"find":{"quantifier":"all"}}"#;
        assert_eq!(query.to_json().unwrap(), expected);
    }

    #[test]
    fn test_read_action_json() {
        let action = ReadAction {
            start: ts("2014-01-01T01:00:00.001Z"),
            stop: ts("2014-03-01T00:00:00Z"),
            limit: Some(1),
        };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"start":"2014-01-01T01:00:00.001Z","stop":"2014-03-01T00:00:00.000Z","limit":1}"#
        );
    }

    #[test]
    fn test_find_with_limit_json() {
        assert_eq!(
            serde_json::to_string(&FindAction::with_limit(25)).unwrap(),
            r#"{"quantifier":"all","limit":25}"#
        );
    }

    #[test]
    fn test_single_value_requires_timestamp() {
        for direction in [
            Direction::Before,
            Direction::After,
            Direction::Nearest,
            Direction::Exact,
        ] {
            assert!(matches!(
                SingleValue::new(direction, None),
                Err(Error::InvalidQuery(_))
            ));
        }
        assert!(SingleValue::new(Direction::Latest, None).is_ok());
        assert!(SingleValue::new(Direction::Earliest, None).is_ok());
        assert!(SingleValue::new(Direction::Before, Some(ts("2015-01-01T00:00:00Z"))).is_ok());
    }

    #[test]
    fn test_single_value_json() {
        assert_eq!(
            serde_json::to_string(&SingleValue::latest()).unwrap(),
            r#"{"function":"latest","include_selection":false}"#
        );

        let nearest =
            SingleValue::at(Direction::Nearest, ts("2015-01-01T00:00:00Z")).with_limit(10);
        assert_eq!(
            serde_json::to_string(&nearest).unwrap(),
            r#"{"function":"nearest","timestamp":"2015-01-01T00:00:00.000Z","limit":10,"include_selection":false}"#
        );
    }

    #[test]
    fn test_single_value_deserialize_validates() {
        let ok: SingleValue = serde_json::from_str(r#"{"function":"EARLIEST"}"#).unwrap();
        assert_eq!(ok.function(), Direction::Earliest);

        let missing = serde_json::from_str::<SingleValue>(r#"{"function":"before"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_delete_action_json() {
        let action = QueryAction::delete(ts("2012-01-01T00:00:00Z"), ts("2015-01-01T00:00:00Z"));
        assert_eq!(action.name(), "delete");
        if let QueryAction::Delete(delete) = action {
            assert_eq!(
                serde_json::to_string(&delete).unwrap(),
                r#"{"start":"2012-01-01T00:00:00.000Z","stop":"2015-01-01T00:00:00.000Z"}"#
            );
        }
    }

    #[test]
    fn test_query_decodes_what_it_encodes() {
        let query = Query::new(
            QuerySearch::new(
                EntityKind::Sensors,
                Selection::new().devices(Selector::and([Selector::key("key1")])),
            ),
            Some(Pipeline::new().rollup(Period::hours(1), Fold::Mean, ts("2014-01-01T00:00:00Z"))),
            QueryAction::read(ts("2014-01-01T01:00:00.001Z"), ts("2014-03-01T00:00:00Z"), Some(1)),
        );
        let back = Query::from_json(&query.to_json().unwrap()).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_query_decode_ignores_unknown_action_fields() {
        let json = r#"{"search":{"select":"sensors","filters":{"devices":{"and":[{"key":"key1"}]}}},"read":{"start":"2014-01-01T01:00:00.001Z","stop":"2014-03-01T00:00:00.000Z","limit":1,"include_selection":false}}"#;
        let query = Query::from_json(json).unwrap();

        assert_eq!(query.search.kind, EntityKind::Sensors);
        assert!(query.pipeline.is_none());
        assert_eq!(
            query.action,
            QueryAction::read(ts("2014-01-01T01:00:00.001Z"), ts("2014-03-01T00:00:00Z"), Some(1))
        );
    }

    #[test]
    fn test_query_decode_requires_exactly_one_action() {
        let none = r#"{"search":{"select":"devices","filters":{"devices":"all"}}}"#;
        assert!(matches!(Query::from_json(none), Err(Error::Decode(_))));

        let two = r#"{"search":{"select":"devices","filters":{"devices":"all"}},"find":{"quantifier":"all"},"single":{"function":"latest"}}"#;
        assert!(Query::from_json(two).is_err());
    }
}
