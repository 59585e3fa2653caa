//! One page of a paginated result.
//!
//! The service answers every listing or read with
//! `{"data": [...], "next_page": {"next_query": <query>}}`. A missing,
//! `null`, empty string or empty object `next_page` marks the last page.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{Error, Result};
use crate::query::Query;

/// Server-issued pointer to the next page.
///
/// The raw `next_page` value is kept as received and only decoded into a
/// [`Query`] when the next page is actually requested, so a malformed token
/// fails the call that needs it rather than the page that carried it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuationToken(serde_json::Value);

impl ContinuationToken {
    /// Wrap a raw `next_page` value.
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    /// The raw `next_page` value.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode the query for the next page.
    ///
    /// `next_query` may hold the query object itself or a string containing
    /// its JSON encoding.
    pub fn to_query(&self) -> Result<Query> {
        let next = self
            .0
            .get("next_query")
            .ok_or_else(|| Error::continuation("next_page has no 'next_query'"))?;

        let decoded = match next {
            serde_json::Value::String(encoded) => serde_json::from_str(encoded),
            other => Query::deserialize(other),
        };
        decoded.map_err(|e| Error::continuation(format!("undecodable next_query: {}", e)))
    }

    /// Decode the next query and check that it continues `origin`.
    ///
    /// The entity kind and the action must be the same as the query that
    /// started the cursor.
    pub fn resolve(&self, origin: &Query) -> Result<Query> {
        let next = self.to_query()?;

        if next.search.kind != origin.search.kind {
            warn!(
                expected = %origin.search.kind,
                found = %next.search.kind,
                "continuation selects a different entity kind"
            );
            return Err(Error::continuation(format!(
                "next_query selects '{}', expected '{}'",
                next.search.kind, origin.search.kind
            )));
        }

        if next.action.name() != origin.action.name() {
            warn!(
                expected = origin.action.name(),
                found = next.action.name(),
                "continuation carries a different action"
            );
            return Err(Error::continuation(format!(
                "next_query action is '{}', expected '{}'",
                next.action.name(),
                origin.action.name()
            )));
        }

        Ok(next)
    }
}

/// One page of results plus an optional pointer to the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment<T> {
    /// Items on this page, in server order.
    pub data: Vec<T>,
    /// Pointer to the next page; `None` on the last page.
    pub next: Option<ContinuationToken>,
}

#[derive(Deserialize)]
struct RawSegment<T> {
    data: Vec<T>,
    #[serde(default)]
    next_page: Option<serde_json::Value>,
}

impl<T> Segment<T> {
    /// Create a segment.
    pub fn new(data: Vec<T>, next: Option<ContinuationToken>) -> Self {
        Self { data, next }
    }

    /// Whether this is the last page.
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

impl<T: DeserializeOwned> Segment<T> {
    /// Decode a segment from a response body.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawSegment<T> = serde_json::from_str(body).map_err(Error::Decode)?;
        Ok(Self {
            data: raw.data,
            next: raw.next_page.and_then(continuation),
        })
    }
}

fn continuation(raw: serde_json::Value) -> Option<ContinuationToken> {
    match &raw {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::Object(m) if m.is_empty() => None,
        _ => Some(ContinuationToken::new(raw)),
    }
}
