//! Page fetching and flattening.
//!
//! A [`PageLoader`] walks a chain of [`Segment`]s, fetching each one with a
//! single request when it is first needed. A [`PagingIterator`] flattens the
//! loader's segments into one sequence of items.
//!
//! Nothing here spawns tasks or prefetches in the background: a fetch only
//! happens inside a `has_next()` or `next()` call, and the caller awaits it.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::query::Query;
use crate::segment::{ContinuationToken, Segment};
use crate::transport::{Method, Request, Transport};

/// Where the pages of one query come from.
///
/// Every page is requested with the same method and path as the first one;
/// only the body changes, carrying the query decoded from the previous
/// page's continuation token.
#[derive(Clone)]
pub struct PageSource {
    transport: Arc<dyn Transport>,
    method: Method,
    path: String,
    origin: Query,
}

impl PageSource {
    /// Create a source for `origin` at `method path`.
    pub fn new(
        transport: Arc<dyn Transport>,
        method: Method,
        path: impl Into<String>,
        origin: Query,
    ) -> Self {
        Self {
            transport,
            method,
            path: path.into(),
            origin,
        }
    }

    /// The query that started this chain.
    pub fn origin(&self) -> &Query {
        &self.origin
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch one page for `query`.
    pub async fn load<T: DeserializeOwned>(&self, query: &Query) -> Result<Segment<T>> {
        let request = Request::new(self.method, self.path.as_str()).with_body(query.to_json()?);
        let response = self.transport.execute(request).await?.error_for_status()?;
        let segment = Segment::<T>::from_json(&response.body)?;

        debug!(
            path = %self.path,
            items = segment.data.len(),
            has_next = !segment.is_last(),
            "fetched page"
        );

        Ok(segment)
    }

    /// Fetch the page a continuation token points to.
    pub async fn follow<T: DeserializeOwned>(
        &self,
        token: &ContinuationToken,
    ) -> Result<Segment<T>> {
        let query = token.resolve(&self.origin)?;
        self.load(&query).await
    }
}

impl fmt::Debug for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSource")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Internal state of a [`PageLoader`].
#[derive(Debug)]
enum LoaderState<T> {
    /// A segment is on deck and has not been handed out.
    Ready(Segment<T>),
    /// The last segment handed out pointed at another one, not fetched yet.
    Pending(ContinuationToken),
    /// A fetch is in flight. Seen on entry only if that fetch was dropped.
    Fetching,
    /// No more segments. Terminal.
    Exhausted,
}

/// Hands out the segments of one query, fetching each at most once.
///
/// The first segment is supplied up front. After a segment with a
/// continuation token has been handed out, the next `has_next()` or `next()`
/// performs exactly one fetch and caches the result, however many times
/// `has_next()` is called before `next()`.
///
/// Exhaustion is sticky: once a segment without a continuation token has
/// been handed out, or a fetch has failed, no further requests are made.
/// A failed fetch reports its error once.
#[derive(Debug)]
pub struct PageLoader<T> {
    source: PageSource,
    state: LoaderState<T>,
}

impl<T: DeserializeOwned> PageLoader<T> {
    /// Create a loader whose first segment is already fetched.
    pub fn new(source: PageSource, first: Segment<T>) -> Self {
        Self {
            source,
            state: LoaderState::Ready(first),
        }
    }

    /// Whether another segment is available, fetching it if needed.
    pub async fn has_next(&mut self) -> Result<bool> {
        self.advance().await?;
        Ok(matches!(self.state, LoaderState::Ready(_)))
    }

    /// Take the next segment, fetching it if needed.
    ///
    /// Returns `Ok(None)` once the chain is exhausted.
    pub async fn next(&mut self) -> Result<Option<Segment<T>>> {
        self.advance().await?;
        match std::mem::replace(&mut self.state, LoaderState::Exhausted) {
            LoaderState::Ready(segment) => {
                if let Some(token) = &segment.next {
                    self.state = LoaderState::Pending(token.clone());
                }
                Ok(Some(segment))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }

    /// Whether the loader has reached its terminal state.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, LoaderState::Exhausted)
    }

    /// Source the loader fetches from.
    pub fn source(&self) -> &PageSource {
        &self.source
    }

    /// Move from `Pending` to `Ready` by fetching. Other states are kept.
    async fn advance(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, LoaderState::Fetching) {
            LoaderState::Pending(token) => match self.source.follow(&token).await {
                Ok(segment) => {
                    self.state = LoaderState::Ready(segment);
                    Ok(())
                }
                Err(e) => {
                    self.state = LoaderState::Exhausted;
                    Err(e)
                }
            },
            LoaderState::Fetching => {
                self.state = LoaderState::Exhausted;
                Err(Error::Interrupted)
            }
            other => {
                self.state = other;
                Ok(())
            }
        }
    }
}

/// Flattens a [`PageLoader`]'s segments into a single sequence of items.
///
/// Empty segments are skipped; an empty page that carries a continuation
/// token does not end the sequence.
#[derive(Debug)]
pub struct PagingIterator<T> {
    loader: PageLoader<T>,
    current: std::vec::IntoIter<T>,
}

impl<T: DeserializeOwned> PagingIterator<T> {
    /// Create an iterator over `loader`'s segments.
    pub fn new(loader: PageLoader<T>) -> Self {
        Self {
            loader,
            current: Vec::new().into_iter(),
        }
    }

    /// Whether another item is available.
    ///
    /// May fetch one or more pages, one request per page boundary crossed.
    pub async fn has_next(&mut self) -> Result<bool> {
        while self.current.as_slice().is_empty() {
            match self.loader.next().await? {
                Some(segment) => self.current = segment.data.into_iter(),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Take the next item, or `Ok(None)` at the end of the sequence.
    pub async fn next(&mut self) -> Result<Option<T>> {
        if !self.has_next().await? {
            return Ok(None);
        }
        Ok(self.current.next())
    }

    /// Whether every page has been fetched and every item taken.
    pub fn is_exhausted(&self) -> bool {
        self.current.as_slice().is_empty() && self.loader.is_exhausted()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::query::{QueryAction, QuerySearch};
    use crate::selector::{EntityKind, Selection};
    use crate::transport::Response;
    use crate::types::Device;

    /// Replays canned responses and counts requests.
    struct Scripted {
        responses: Mutex<VecDeque<Result<Response>>>,
        requests: Mutex<Vec<Request>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Response>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: Request) -> Result<Response> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(Response::new(500, "Internal Server Error", "script exhausted"))
                })
        }
    }

    fn find_devices() -> Query {
        Query::new(
            QuerySearch::new(EntityKind::Devices, Selection::new()),
            None,
            QueryAction::find(None),
        )
    }

    fn token() -> ContinuationToken {
        ContinuationToken::new(serde_json::json!({
            "next_query": {"search":{"select":"devices","filters":{}},"find":{"quantifier":"all"}}
        }))
    }

    fn page(keys: &[&str], more: bool) -> Response {
        let data: Vec<_> = keys.iter().map(|k| serde_json::json!({"key": k})).collect();
        let mut body = serde_json::json!({"data": data});
        if more {
            body["next_page"] = token().as_json().clone();
        }
        Response::new(200, "OK", body.to_string())
    }

    fn loader(transport: Arc<Scripted>, first: Segment<Device>) -> PageLoader<Device> {
        let source = PageSource::new(transport, Method::Get, "/v2/devices/query/", find_devices());
        PageLoader::new(source, first)
    }

    fn keys(devices: &[Device]) -> Vec<&str> {
        devices.iter().map(|d| d.key.as_str()).collect()
    }

    // ========================================================================
    // PageLoader
    // ========================================================================

    #[tokio::test]
    async fn test_first_segment_needs_no_fetch() {
        let transport = Scripted::new(vec![]);
        let mut loader = loader(transport.clone(), Segment::new(vec![Device::new("a")], None));

        assert!(loader.has_next().await.unwrap());
        let segment = loader.next().await.unwrap().unwrap();
        assert_eq!(keys(&segment.data), vec!["a"]);

        assert!(!loader.has_next().await.unwrap());
        assert!(loader.next().await.unwrap().is_none());
        assert!(loader.is_exhausted());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_has_next_fetches_once() {
        let transport = Scripted::new(vec![Ok(page(&["b"], false))]);
        let mut loader = loader(
            transport.clone(),
            Segment::new(vec![Device::new("a")], Some(token())),
        );

        loader.next().await.unwrap();
        assert_eq!(transport.request_count(), 0);

        for _ in 0..3 {
            assert!(loader.has_next().await.unwrap());
        }
        assert_eq!(transport.request_count(), 1);

        let segment = loader.next().await.unwrap().unwrap();
        assert_eq!(keys(&segment.data), vec!["b"]);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_once() {
        let transport = Scripted::new(vec![Ok(Response::new(503, "Service Unavailable", ""))]);
        let mut loader = loader(transport.clone(), Segment::new(vec![], Some(token())));

        loader.next().await.unwrap();
        let err = loader.has_next().await.unwrap_err();
        assert_eq!(err.code(), 503);

        assert!(!loader.has_next().await.unwrap());
        assert!(loader.next().await.unwrap().is_none());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_fetch() {
        let transport = Scripted::new(vec![]);
        let mut loader = loader(transport.clone(), Segment::new(vec![], None));
        loader.state = LoaderState::Fetching;

        assert!(matches!(loader.has_next().await, Err(Error::Interrupted)));
        assert!(!loader.has_next().await.unwrap());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_follow_sends_decoded_query() {
        let transport = Scripted::new(vec![Ok(page(&[], false))]);
        let mut loader = loader(transport.clone(), Segment::new(vec![], Some(token())));

        loader.next().await.unwrap();
        loader.next().await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].path, "/v2/devices/query/");
        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["find"]["quantifier"], "all");
    }

    // ========================================================================
    // PagingIterator
    // ========================================================================

    #[tokio::test]
    async fn test_flatten_skips_empty_pages() {
        let transport = Scripted::new(vec![
            Ok(page(&[], true)),
            Ok(page(&[], true)),
            Ok(page(&["c", "d"], false)),
        ]);
        let first = Segment::new(vec![Device::new("a"), Device::new("b")], Some(token()));
        let mut iter = PagingIterator::new(loader(transport.clone(), first));

        let mut seen = Vec::new();
        while let Some(device) = iter.next().await.unwrap() {
            seen.push(device.key);
        }

        assert_eq!(seen, vec!["a", "b", "c", "d"]);
        assert!(iter.is_exhausted());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_iterator_stays_exhausted() {
        let transport = Scripted::new(vec![]);
        let mut iter = PagingIterator::new(loader(transport.clone(), Segment::new(vec![], None)));

        for _ in 0..3 {
            assert!(!iter.has_next().await.unwrap());
            assert!(iter.next().await.unwrap().is_none());
        }
        assert_eq!(transport.request_count(), 0);
    }
}
