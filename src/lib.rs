//! # tempoiq-stream
//!
//! Async client for the TempoIQ time-series service that presents paginated
//! results as one lazy sequence.
//!
//! ## Why?
//!
//! The service answers reads and listings in bounded pages, each pointing at
//! the next. Collecting every page before looking at the first row costs
//! memory and latency:
//!
//! ```ignore
//! // Every page is fetched and held before anything is processed
//! let rows: Vec<Row> = fetch_all_pages(query).await?;
//! ```
//!
//! `tempoiq-stream` fetches a page only when the cursor reaches it:
//!
//! ```ignore
//! // One page in memory at a time, one request per page boundary
//! let mut rows = client.read(&selection, None, start, stop, None).await?;
//! while let Some(row) = rows.next().await? {
//!     process(row);
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tempoiq_stream::{Client, Fold, Period, Pipeline, Selection, Selector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("my-env.backend.tempoiq.com", "my-key", "my-secret")?;
//!
//!     let selection = Selection::new()
//!         .devices(Selector::key("therm.0"))
//!         .sensors(Selector::key("temperature"));
//!     let pipeline = Pipeline::new().rollup(Period::days(1), Fold::Sum, start);
//!
//!     let mut rows = client.read(&selection, Some(&pipeline), start, stop, None).await?;
//!     let mut points = rows.points_for_stream("therm.0", "temperature");
//!     while let Some(point) = points.next().await? {
//!         println!("{}: {}", point.timestamp, point.value);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Lazy paging**: One outstanding request per cursor, fetched on demand
//! - **Async native**: Built on futures; cursors convert into `Stream`s
//! - **Typed queries**: Selectors, pipelines and actions are plain enums
//! - **Checked continuations**: Next-page tokens are decoded and validated
//!   against the query that started the cursor
//! - **Pluggable transport**: Anything implementing [`Transport`] can back a
//!   [`Client`]

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod paging;
pub mod pipeline;
pub mod query;
pub mod response;
pub mod segment;
pub mod selector;
pub mod timestamp;
pub mod transport;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use client::Client;
pub use config::{ClientBuilder, ClientConfig};
pub use cursor::{Cursor, CursorStream, DataPointCursor, DeviceCursor, RowCursor, SensorCursor};
pub use error::{Error, Result};
pub use pipeline::{Fold, Period, Pipeline, PipelineFunction};
pub use query::{Direction, Query, QueryAction, QuerySearch, SingleValue};
pub use response::{DeleteSummary, DeviceState, DeviceStatus, State, WriteOutcome, WriteResponse};
pub use selector::{EntityKind, Selection, Selector};
pub use timestamp::Timestamp;
pub use transport::{HttpTransport, Method, Request, Response, Transport, resource_path};
pub use types::{DataPoint, Device, Row, Sensor, WriteRequest};
pub use value::Value;

// Re-export paging internals for custom cursors
pub use paging::{PageLoader, PageSource, PagingIterator};
pub use segment::{ContinuationToken, Segment};
