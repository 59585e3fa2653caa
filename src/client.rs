//! TempoIQ client.
//!
//! This module provides the main `Client` type: device management, bulk
//! writes, and the paginated listing and read queries.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientBuilder, ClientConfig};
use crate::cursor::{Cursor, DeviceCursor, RowCursor, SensorCursor};
use crate::error::{Error, Result};
use crate::paging::{PageLoader, PageSource, PagingIterator};
use crate::pipeline::Pipeline;
use crate::query::{DeleteAction, Query, QueryAction, QuerySearch, SingleValue};
use crate::response::{DeleteSummary, WriteOutcome, WriteResponse};
use crate::selector::{EntityKind, Selection};
use crate::timestamp::Timestamp;
use crate::transport::{Method, Request, Response, Transport, resource_path};
use crate::types::{Device, WriteRequest};

/// TempoIQ client.
///
/// The client is cheap to clone and safe to share between tasks; clones
/// share one transport and its connection pool. Cursors it returns are not
/// shared: each one belongs to the task that advances it.
///
/// # Example
///
/// ```ignore
/// use tempoiq_stream::{Client, Selection, Selector};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::builder()
///         .host("my-env.backend.tempoiq.com")
///         .key("my-key")
///         .secret("my-secret")
///         .build()?;
///
///     let selection = Selection::new()
///         .devices(Selector::attribute("building", "1234"))
///         .sensors(Selector::key("temperature"));
///
///     let mut rows = client.read(&selection, None, start, stop, None).await?;
///     while let Some(row) = rows.next().await? {
///         println!("{}: {:?}", row.timestamp, row.values);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for `host` with the default port, scheme and timeout.
    pub fn new(
        host: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self> {
        ClientBuilder::new().host(host).key(key).secret(secret).build()
    }

    /// Create a client from a loaded config.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build()
    }

    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client on top of any transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a client on top of a shared transport.
    pub fn with_shared_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Create a device.
    pub async fn create_device(&self, device: &Device) -> Result<Device> {
        let response = self
            .send(Method::Post, "/v2/devices/", Some(encode(device)?))
            .await?;
        decode(&response.body)
    }

    /// Fetch one device by key.
    pub async fn get_device(&self, key: &str) -> Result<Device> {
        let response = self.send(Method::Get, &device_path(key)?, None).await?;
        decode(&response.body)
    }

    /// Replace a device's name, attributes and sensors.
    pub async fn update_device(&self, device: &Device) -> Result<Device> {
        let response = self
            .send(Method::Put, &device_path(&device.key)?, Some(encode(device)?))
            .await?;
        decode(&response.body)
    }

    /// Delete one device and all of its data.
    pub async fn delete_device(&self, key: &str) -> Result<()> {
        self.send(Method::Delete, &device_path(key)?, None).await?;
        Ok(())
    }

    /// Delete every device matching `selection`.
    pub async fn delete_devices(&self, selection: &Selection) -> Result<DeleteSummary> {
        let query = find(EntityKind::Devices, selection);
        let response = self
            .send(Method::Delete, "/v2/devices/", Some(query.to_json()?))
            .await?;
        decode(&response.body)
    }

    /// List the devices matching `selection`.
    pub async fn list_devices(&self, selection: &Selection) -> Result<DeviceCursor> {
        self.query("/v2/devices/query/", &find(EntityKind::Devices, selection))
            .await
    }

    /// List the sensors matching `selection`.
    pub async fn list_sensors(&self, selection: &Selection) -> Result<SensorCursor> {
        self.query("/v2/sensors/query/", &find(EntityKind::Sensors, selection))
            .await
    }

    // ========================================================================
    // Data points
    // ========================================================================

    /// Write data points to several devices and sensors at once.
    ///
    /// A 207 response is returned as [`State::PartialSuccess`](crate::State)
    /// with the per-device breakdown, not as an error.
    pub async fn write_data_points(&self, request: &WriteRequest) -> Result<WriteOutcome> {
        let response = self
            .send(Method::Post, "/v2/write/", Some(encode(request)?))
            .await?;
        Ok(WriteOutcome {
            state: response.state(),
            response: WriteResponse::from_json(&response.body)?,
        })
    }

    /// Read rows in `[start, stop)` for the sensors matching `selection`.
    pub async fn read(
        &self,
        selection: &Selection,
        pipeline: Option<&Pipeline>,
        start: Timestamp,
        stop: Timestamp,
        limit: Option<u32>,
    ) -> Result<RowCursor> {
        let query = Query::new(
            QuerySearch::new(EntityKind::Sensors, selection.clone()),
            pipeline.cloned(),
            QueryAction::read(start, stop, limit),
        );
        Ok(RowCursor::new(self.query("/v2/read/", &query).await?))
    }

    /// Read one value per sensor matching `selection`.
    pub async fn single(
        &self,
        selection: &Selection,
        pipeline: Option<&Pipeline>,
        action: SingleValue,
    ) -> Result<RowCursor> {
        let query = Query::new(
            QuerySearch::new(EntityKind::Sensors, selection.clone()),
            pipeline.cloned(),
            action.into(),
        );
        Ok(RowCursor::new(self.query("/v2/single/", &query).await?))
    }

    /// Delete one sensor's data points in `[start, stop)`.
    pub async fn delete_data_points(
        &self,
        device: &str,
        sensor: &str,
        start: Timestamp,
        stop: Timestamp,
    ) -> Result<DeleteSummary> {
        let path = resource_path(&["v2", "devices", device, "sensors", sensor, "datapoints"])?;
        let body = encode(&DeleteAction { start, stop })?;
        let response = self.send(Method::Delete, &path, Some(body)).await?;
        decode(&response.body)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Run a paginated query and return a cursor over its results.
    ///
    /// The first page is fetched before this returns, so a rejected query
    /// fails here. Later pages are fetched as the cursor reaches them, with
    /// `GET path` and the continuation query as the body.
    pub async fn query<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<Cursor<T>> {
        debug!(
            path,
            select = %query.search.kind,
            action = query.action.name(),
            "starting query"
        );

        let source = PageSource::new(self.transport.clone(), Method::Get, path, query.clone());
        let first = source.load(query).await?;
        Ok(Cursor::new(PagingIterator::new(PageLoader::new(source, first))))
    }

    async fn send(&self, method: Method, path: &str, body: Option<String>) -> Result<Response> {
        let mut request = Request::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.transport.execute(request).await?.error_for_status()
    }
}

fn find(kind: EntityKind, selection: &Selection) -> Query {
    Query::new(
        QuerySearch::new(kind, selection.clone()),
        None,
        QueryAction::find(None),
    )
}

fn device_path(key: &str) -> Result<String> {
    resource_path(&["v2", "devices", key])
}

fn encode<S: Serialize>(value: &S) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Serialization)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(Error::Decode)
}
