//! Integration tests for tempoiq-stream.
//!
//! These tests require a TempoIQ environment. They skip themselves unless
//! `TEMPOIQ_HOST`, `TEMPOIQ_KEY` and `TEMPOIQ_SECRET` are set.
//!
//! Every test deletes the devices it creates; use a scratch environment.
//!
//! Run tests with: `cargo test --test integration`

use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use serial_test::serial;
use tempoiq_stream::{
    Client, ClientBuilder, DataPoint, Device, Direction, Fold, Period, Pipeline, RowCursor,
    Selection, Selector, Sensor, SingleValue, State, Timestamp, WriteRequest,
};

const TEST_ATTRIBUTE: &str = "tempoiq-stream-test";

/// Helper to build a client from the environment, if configured.
fn live_client() -> Option<Client> {
    let host = std::env::var("TEMPOIQ_HOST").ok()?;
    let key = std::env::var("TEMPOIQ_KEY").ok()?;
    let secret = std::env::var("TEMPOIQ_SECRET").ok()?;

    ClientBuilder::new()
        .host(host)
        .key(key)
        .secret(secret)
        .timeout(Duration::from_secs(30))
        .build()
        .ok()
}

fn test_devices() -> Selection {
    Selection::new().devices(Selector::attribute(TEST_ATTRIBUTE, "true"))
}

/// Helper to delete every device created by this suite
async fn cleanup(client: &Client) {
    client.delete_devices(&test_devices()).await.unwrap();
}

fn make_device(key: &str, sensors: &[&str]) -> Device {
    sensors.iter().fold(
        Device::new(key).with_attribute(TEST_ATTRIBUTE, "true"),
        |device, sensor| device.with_sensor(Sensor::new(*sensor)),
    )
}

fn hour(h: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2015, 1, 1, h, 0, 0).unwrap().fixed_offset()
}

/// Generate one point per hour for a day
fn generate_points(count: u32) -> Vec<DataPoint> {
    (0..count).map(|h| DataPoint::new(hour(h), h as f64)).collect()
}

// ============================================================================
// Devices
// ============================================================================

#[tokio::test]
#[serial]
async fn test_device_lifecycle() {
    let Some(client) = live_client() else {
        eprintln!("Skipping test: TempoIQ not configured");
        return;
    };
    cleanup(&client).await;

    let device = make_device("stream-test-device", &["temp"]);
    let created = client.create_device(&device).await.unwrap();
    assert_eq!(created.key, device.key);

    let fetched = client.get_device(&device.key).await.unwrap();
    assert_eq!(fetched.sensors.len(), 1);

    let renamed = device.clone().with_name("renamed");
    let updated = client.update_device(&renamed).await.unwrap();
    assert_eq!(updated.name, "renamed");

    client.delete_device(&device.key).await.unwrap();
    let err = client.get_device(&device.key).await.unwrap_err();
    assert_eq!(err.code(), 404);
}

#[tokio::test]
#[serial]
async fn test_list_devices_pages() {
    let Some(client) = live_client() else {
        eprintln!("Skipping test: TempoIQ not configured");
        return;
    };
    cleanup(&client).await;

    for i in 0..5 {
        client
            .create_device(&make_device(&format!("stream-list-{}", i), &["s"]))
            .await
            .unwrap();
    }

    let devices = client
        .list_devices(&test_devices())
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(devices.len(), 5);

    let sensors = client
        .list_sensors(&test_devices())
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(sensors.len(), 5);

    let summary = client.delete_devices(&test_devices()).await.unwrap();
    assert_eq!(summary.deleted, 5);
}

// ============================================================================
// Data points
// ============================================================================

#[tokio::test]
#[serial]
async fn test_write_and_read() {
    let Some(client) = live_client() else {
        eprintln!("Skipping test: TempoIQ not configured");
        return;
    };
    cleanup(&client).await;

    client
        .create_device(&make_device("stream-rw", &["temp", "humidity"]))
        .await
        .unwrap();

    let request = WriteRequest::new()
        .add_all("stream-rw", "temp", generate_points(24))
        .add_all("stream-rw", "humidity", generate_points(12));
    let outcome = client.write_data_points(&request).await.unwrap();
    assert_eq!(outcome.state, State::Success);

    let selection = Selection::new().devices(Selector::key("stream-rw"));
    let mut rows = client
        .read(&selection, None, hour(0), hour(23) + chrono::Duration::hours(1), Some(5))
        .await
        .unwrap();

    let mut count = 0;
    while let Some(row) = rows.next().await.unwrap() {
        assert!(row.has_sensor("stream-rw", "temp"));
        count += 1;
    }
    assert_eq!(count, 24);
    assert_eq!(
        rows.streams_for_device("stream-rw").into_iter().collect::<Vec<_>>(),
        vec!["humidity", "temp"]
    );

    cleanup(&client).await;
}

#[tokio::test]
#[serial]
async fn test_rollup_and_single_value() {
    let Some(client) = live_client() else {
        eprintln!("Skipping test: TempoIQ not configured");
        return;
    };
    cleanup(&client).await;

    client
        .create_device(&make_device("stream-rollup", &["temp"]))
        .await
        .unwrap();
    client
        .write_data_points(&WriteRequest::new().add_all(
            "stream-rollup",
            "temp",
            generate_points(24),
        ))
        .await
        .unwrap();

    let selection = Selection::new().devices(Selector::key("stream-rollup"));
    let pipeline = Pipeline::new().rollup(Period::hours(12), Fold::Sum, hour(0));
    let sums: Vec<f64> = client
        .read(&selection, Some(&pipeline), hour(0), hour(23) + chrono::Duration::hours(1), None)
        .await
        .unwrap()
        .into_point_stream("stream-rollup", "temp")
        .map(|p| p.unwrap().value.as_f64())
        .collect()
        .await;
    assert_eq!(sums, vec![66.0, 210.0]);

    let latest = collect_points(
        client
            .single(&selection, None, SingleValue::latest())
            .await
            .unwrap(),
        "stream-rollup",
        "temp",
    )
    .await;
    assert_eq!(latest, vec![23.0]);

    let before = SingleValue::new(Direction::Before, Some(hour(5))).unwrap();
    let mut rows = client.single(&selection, None, before).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    assert_eq!(row.value("stream-rollup", "temp").map(|v| v.as_f64()), Some(4.0));

    let deleted = client
        .delete_data_points("stream-rollup", "temp", hour(0), hour(12))
        .await
        .unwrap();
    assert_eq!(deleted.deleted, 12);

    cleanup(&client).await;
}

/// Drain one stream of a row cursor into plain values
async fn collect_points(mut rows: RowCursor, device: &str, sensor: &str) -> Vec<f64> {
    rows.points_for_stream(device, sensor)
        .collect_all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.value.as_f64())
        .collect()
}
