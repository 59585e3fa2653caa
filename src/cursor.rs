//! Public cursors over paginated results.
//!
//! A [`Cursor`] is a lazy, single-pass sequence. Items are pulled with
//! `next().await`; page boundaries are crossed transparently, one request
//! per boundary, and a failure to fetch a page surfaces from the call that
//! needed it. Every cursor can also be turned into a `futures::Stream`.
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut devices = client.list_devices(&Selection::new().devices(Selector::all())).await?;
//! while let Some(device) = devices.next().await? {
//!     println!("{}", device.key);
//! }
//!
//! let mut stream = client.read(&selection, None, start, stop, None).await?.into_stream();
//! while let Some(row) = stream.next().await {
//!     let row = row?;
//!     println!("{}", row.timestamp);
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;

use async_stream::stream;
use futures::Stream;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::paging::PagingIterator;
use crate::types::{DataPoint, Device, Row, Sensor};

/// Boxed stream of cursor items.
pub type CursorStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Lazy, single-pass sequence of results.
///
/// Re-iterating a query means issuing it again; pages are not cached.
#[derive(Debug)]
pub struct Cursor<T> {
    items: PagingIterator<T>,
}

/// Cursor over a device listing.
pub type DeviceCursor = Cursor<Device>;

/// Cursor over a sensor listing.
pub type SensorCursor = Cursor<Sensor>;

impl<T: DeserializeOwned> Cursor<T> {
    /// Wrap a paging iterator.
    pub fn new(items: PagingIterator<T>) -> Self {
        Self { items }
    }

    /// Whether another item is available. May fetch a page.
    pub async fn has_next(&mut self) -> Result<bool> {
        self.items.has_next().await
    }

    /// Take the next item. `Ok(None)` marks the end.
    pub async fn next(&mut self) -> Result<Option<T>> {
        self.items.next().await
    }

    /// Whether every item has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.items.is_exhausted()
    }

    /// Drain the cursor into a `Vec`.
    ///
    /// **Warning**: this fetches every remaining page and holds all items in
    /// memory.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

impl<T: DeserializeOwned + Send + 'static> Cursor<T> {
    /// Turn the cursor into a stream. The stream ends after the first error.
    pub fn into_stream(self) -> CursorStream<T> {
        let mut cursor = self;
        let s = stream! {
            loop {
                match cursor.next().await {
                    Ok(Some(item)) => yield Ok(item),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(s)
    }
}

/// Cursor over the rows of a read or single-value query.
///
/// Besides the rows themselves it remembers which device and sensor keys
/// have appeared so far. Those views only cover rows already taken from the
/// cursor; they are complete only once the cursor is exhausted.
#[derive(Debug)]
pub struct RowCursor {
    rows: Cursor<Row>,
    seen: BTreeMap<String, BTreeSet<String>>,
}

impl RowCursor {
    /// Wrap a row cursor.
    pub fn new(rows: Cursor<Row>) -> Self {
        Self {
            rows,
            seen: BTreeMap::new(),
        }
    }

    /// Whether another row is available. May fetch a page.
    pub async fn has_next(&mut self) -> Result<bool> {
        self.rows.has_next().await
    }

    /// Take the next row.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        let row = self.rows.next().await?;
        if let Some(row) = &row {
            self.record(row);
        }
        Ok(row)
    }

    /// Whether every row has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.rows.is_exhausted()
    }

    fn record(&mut self, row: &Row) {
        for (device, sensors) in &row.values {
            let known = self.seen.entry(device.clone()).or_default();
            known.extend(sensors.keys().cloned());
        }
    }

    /// Device keys seen in the rows taken so far.
    ///
    /// This is not a server-side listing: devices that only appear in rows
    /// not yet taken are missing until the cursor reaches them.
    pub fn devices_for_cursor(&self) -> BTreeSet<&str> {
        self.seen.keys().map(String::as_str).collect()
    }

    /// Sensor keys seen for `device` in the rows taken so far.
    ///
    /// Like [`devices_for_cursor`](Self::devices_for_cursor), this only
    /// reflects rows already taken.
    pub fn streams_for_device(&self, device: &str) -> BTreeSet<&str> {
        self.seen
            .get(device)
            .map(|sensors| sensors.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Project the remaining rows onto one device/sensor stream.
    ///
    /// The projection advances this cursor: rows it skips or consumes are
    /// gone from the row sequence. It borrows the cursor mutably, so the two
    /// cannot be advanced in alternation.
    pub fn points_for_stream(
        &mut self,
        device: impl Into<String>,
        sensor: impl Into<String>,
    ) -> DataPointCursor<'_> {
        DataPointCursor {
            rows: self,
            device: device.into(),
            sensor: sensor.into(),
            pending: None,
        }
    }

    /// Turn the cursor into a stream of rows.
    pub fn into_stream(self) -> CursorStream<Row> {
        self.rows.into_stream()
    }

    /// Turn the cursor into a stream of points for one device/sensor pair.
    ///
    /// Rows without a value for the pair are skipped.
    pub fn into_point_stream(
        self,
        device: impl Into<String>,
        sensor: impl Into<String>,
    ) -> CursorStream<DataPoint> {
        let mut rows = self;
        let device = device.into();
        let sensor = sensor.into();
        let s = stream! {
            let mut points = rows.points_for_stream(device, sensor);
            loop {
                match points.next().await {
                    Ok(Some(point)) => yield Ok(point),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(s)
    }
}

/// Points of one device/sensor pair, projected from a [`RowCursor`].
///
/// Rows that carry no value for the pair are skipped.
#[derive(Debug)]
pub struct DataPointCursor<'a> {
    rows: &'a mut RowCursor,
    device: String,
    sensor: String,
    pending: Option<DataPoint>,
}

impl DataPointCursor<'_> {
    /// Device key of the projected stream.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Sensor key of the projected stream.
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// Whether another point is available.
    ///
    /// Takes rows from the underlying cursor until one carries the pair.
    pub async fn has_next(&mut self) -> Result<bool> {
        while self.pending.is_none() {
            match self.rows.next().await? {
                Some(row) => self.pending = row.point(&self.device, &self.sensor),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Take the next point.
    pub async fn next(&mut self) -> Result<Option<DataPoint>> {
        if !self.has_next().await? {
            return Ok(None);
        }
        Ok(self.pending.take())
    }

    /// Drain the projection into a `Vec`.
    pub async fn collect_all(mut self) -> Result<Vec<DataPoint>> {
        let mut points = Vec::new();
        while let Some(point) = self.next().await? {
            points.push(point);
        }
        Ok(points)
    }
}
