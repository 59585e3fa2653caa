//! Core domain types: devices, sensors, rows and data points.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;
use crate::value::Value;

/// A named data stream on a [`Device`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    /// Sensor key, unique within its device.
    pub key: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// Free-form string attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Sensor {
    /// Create a sensor with only a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the sensor name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// An addressable entity with attributes and a set of sensors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device key.
    pub key: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// Free-form string attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Sensors attached to this device.
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

impl Device {
    /// Create a device with only a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the device name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach a sensor.
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Look up a sensor by key.
    pub fn sensor(&self, key: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.key == key)
    }
}

/// One timestamped value of a single sensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Sample time.
    #[serde(rename = "t", with = "crate::timestamp")]
    pub timestamp: Timestamp,
    /// Sample value.
    #[serde(rename = "v")]
    pub value: Value,
}

impl DataPoint {
    /// Create a new data point.
    pub fn new(timestamp: Timestamp, value: impl Into<Value>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// One timestamp plus the values of every device/sensor pair present at it.
///
/// This is the unit returned by multi-stream reads.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Row {
    /// Row time.
    #[serde(rename = "t", with = "crate::timestamp")]
    pub timestamp: Timestamp,
    /// device key -> sensor key -> value.
    #[serde(rename = "data", default)]
    pub values: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Row {
    /// Create a row from its parts.
    pub fn new(timestamp: Timestamp, values: BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        Self { timestamp, values }
    }

    /// Value of one device/sensor pair, if present in this row.
    pub fn value(&self, device: &str, sensor: &str) -> Option<Value> {
        self.values.get(device).and_then(|s| s.get(sensor)).copied()
    }

    /// Whether this row carries a value for the device/sensor pair.
    pub fn has_sensor(&self, device: &str, sensor: &str) -> bool {
        self.values
            .get(device)
            .is_some_and(|s| s.contains_key(sensor))
    }

    /// Device keys present in this row.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Sensor keys present in this row for one device.
    pub fn sensors(&self, device: &str) -> impl Iterator<Item = &str> {
        self.values
            .get(device)
            .into_iter()
            .flat_map(|s| s.keys().map(String::as_str))
    }

    /// Project this row onto a single stream.
    pub fn point(&self, device: &str, sensor: &str) -> Option<DataPoint> {
        self.value(device, sensor).map(|value| DataPoint {
            timestamp: self.timestamp,
            value,
        })
    }
}

/// A batch of data points to write to several devices and sensors.
///
/// Serializes as `{"<device>": {"<sensor>": [{"t": .., "v": ..}, ..]}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WriteRequest {
    data: BTreeMap<String, BTreeMap<String, Vec<DataPoint>>>,
}

impl WriteRequest {
    /// Create an empty write request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one data point.
    pub fn add(mut self, device: &str, sensor: &str, point: DataPoint) -> Self {
        self.points_mut(device, sensor).push(point);
        self
    }

    /// Add several data points for the same device/sensor pair.
    pub fn add_all(
        mut self,
        device: &str,
        sensor: &str,
        points: impl IntoIterator<Item = DataPoint>,
    ) -> Self {
        self.points_mut(device, sensor).extend(points);
        self
    }

    fn points_mut(&mut self, device: &str, sensor: &str) -> &mut Vec<DataPoint> {
        self.data
            .entry(device.to_string())
            .or_default()
            .entry(sensor.to_string())
            .or_default()
    }

    /// Devices touched by this request.
    pub fn devices(&self) -> BTreeSet<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Total number of data points.
    pub fn len(&self) -> usize {
        self.data
            .values()
            .flat_map(|sensors| sensors.values())
            .map(Vec::len)
            .sum()
    }

    /// Whether the request holds no data points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
