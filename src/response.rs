//! Response classification and the write/delete result bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outcome class of a response, derived from its status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Any 2xx except 207.
    Success,
    /// 207: some entities in a bulk write failed.
    PartialSuccess,
    /// Everything else.
    Failure,
}

impl State {
    /// Classify a status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            207 => State::PartialSuccess,
            200..=299 => State::Success,
            _ => State::Failure,
        }
    }
}

/// What a write did to a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// The device already existed unchanged.
    Existing,
    /// The device gained sensors.
    Modified,
    /// The device was created by the write.
    Created,
}

/// Per-device status of a bulk write.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DeviceStatus {
    /// What happened to the device.
    pub device_state: DeviceState,
    /// Whether every point for the device was written.
    pub success: bool,
    /// Server message for failed devices.
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-device status map of a bulk write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct WriteResponse {
    statuses: BTreeMap<String, DeviceStatus>,
}

impl WriteResponse {
    /// Decode a write response body. An empty body is an empty map.
    pub fn from_json(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body).map_err(Error::Decode)
    }

    /// Status of one device.
    pub fn get(&self, device: &str) -> Option<&DeviceStatus> {
        self.statuses.get(device)
    }

    /// Every device status, keyed by device.
    pub fn statuses(&self) -> &BTreeMap<String, DeviceStatus> {
        &self.statuses
    }

    /// Whether no device failed.
    pub fn was_successful(&self) -> bool {
        self.statuses.values().all(|s| s.success)
    }

    /// Whether at least one device succeeded.
    pub fn was_partially_successful(&self) -> bool {
        self.statuses.values().any(|s| s.success)
    }

    /// Devices that already existed.
    pub fn existing(&self) -> BTreeMap<&str, &DeviceStatus> {
        self.with_state(DeviceState::Existing)
    }

    /// Devices that gained sensors.
    pub fn modified(&self) -> BTreeMap<&str, &DeviceStatus> {
        self.with_state(DeviceState::Modified)
    }

    /// Devices created by the write.
    pub fn created(&self) -> BTreeMap<&str, &DeviceStatus> {
        self.with_state(DeviceState::Created)
    }

    /// Devices whose points were not written.
    pub fn failures(&self) -> BTreeMap<&str, &DeviceStatus> {
        self.filter(|s| !s.success)
    }

    fn with_state(&self, state: DeviceState) -> BTreeMap<&str, &DeviceStatus> {
        self.filter(|s| s.device_state == state)
    }

    fn filter(&self, pred: impl Fn(&DeviceStatus) -> bool) -> BTreeMap<&str, &DeviceStatus> {
        self.statuses
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(k, s)| (k.as_str(), s))
            .collect()
    }
}

/// Result of a bulk write.
///
/// A 207 is reported here as [`State::PartialSuccess`], not as an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    /// `Success` or `PartialSuccess`.
    pub state: State,
    /// Per-device breakdown.
    pub response: WriteResponse,
}

/// Result of a delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteSummary {
    /// Number of entities or points deleted.
    #[serde(default)]
    pub deleted: u64,
}
