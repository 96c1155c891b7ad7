//! Station map task behaviour under a paused clock.

mod common;

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tokio_test::assert_ok;

use airwatch_stations::refresh::RefreshPhase;
use airwatch_stations::service::{self, LocationContext, StationMapSettings};
use airwatch_stations::Coordinates;

use common::{abc_records, bbox, station, RecordingSource};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn settings() -> StationMapSettings {
    StationMapSettings {
        debounce: DEBOUNCE,
        ..StationMapSettings::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_fetches_once_for_last_viewport() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    for i in 0..8 {
        map.viewport_changed(bbox(0.0, 0.0, 10.0 + i as f64, 10.0)).await?;
        sleep(ms(100)).await;
    }
    sleep(ms(1000)).await;

    assert_eq!(source.calls(), vec![bbox(0.0, 0.0, 17.0, 10.0)]);
    let status = map.status().await?;
    assert_eq!(status.fetches_issued, 1);
    assert_eq!(status.fetches_succeeded, 1);
    assert_eq!(status.phase, RefreshPhase::Idle);
    assert_eq!(status.stations, 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn separated_changes_fetch_twice() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(0.0, 0.0, 30.0, 30.0)).await?;
    sleep(ms(500)).await;
    map.viewport_changed(bbox(40.0, 40.0, 60.0, 60.0)).await?;
    sleep(ms(500)).await;

    assert_eq!(
        source.calls(),
        vec![bbox(0.0, 0.0, 30.0, 30.0), bbox(40.0, 40.0, 60.0, 60.0)]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn nothing_fetched_inside_the_window() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(0.0, 0.0, 30.0, 30.0)).await?;
    sleep(ms(250)).await;
    assert!(source.calls().is_empty());
    assert_eq!(map.status().await?.phase, RefreshPhase::PendingDebounce);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn change_during_fetch_is_fetched_afterwards() -> Result<()> {
    // ---
    let source = RecordingSource {
        delay: ms(2000),
        ..RecordingSource::with_records(abc_records())
    };
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(0.0, 0.0, 30.0, 30.0)).await?;
    sleep(ms(400)).await;
    assert_eq!(map.status().await?.phase, RefreshPhase::Fetching);

    // Two changes while the first fetch is still running
    map.viewport_changed(bbox(1.0, 1.0, 31.0, 31.0)).await?;
    map.viewport_changed(bbox(2.0, 2.0, 32.0, 32.0)).await?;
    sleep(ms(500)).await;
    assert_eq!(source.calls().len(), 1);

    // Queries still answer while the fetch is outstanding
    assert!(map.query(bbox(0.0, 0.0, 90.0, 90.0)).await?.is_empty());

    sleep(ms(5000)).await;
    assert_eq!(
        source.calls(),
        vec![bbox(0.0, 0.0, 30.0, 30.0), bbox(2.0, 2.0, 32.0, 32.0)]
    );
    assert_eq!(map.status().await?.phase, RefreshPhase::Idle);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_leaves_index_and_does_not_retry() -> Result<()> {
    // ---
    let source = RecordingSource {
        fail: true,
        ..RecordingSource::with_records(abc_records())
    };
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(0.0, 0.0, 30.0, 30.0)).await?;
    sleep(ms(10_000)).await;

    let status = map.status().await?;
    assert_eq!(status.fetches_failed, 1);
    assert_eq!(status.fetches_succeeded, 0);
    assert_eq!(status.stations, 0);
    assert_eq!(status.phase, RefreshPhase::Idle);
    assert_eq!(source.calls().len(), 1);

    // Next viewport change is the retry
    map.viewport_changed(bbox(0.0, 0.0, 30.0, 30.0)).await?;
    sleep(ms(500)).await;
    assert_eq!(source.calls().len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn merge_drops_bad_records_and_replaces_duplicates() -> Result<()> {
    // ---
    let mut records = abc_records();
    records.push(station("bad-lat", 95.0, 10.0, 10, "Nowhere"));
    records.push(serde_json::json!({ "uid": "no-aqi", "lat": 1.0, "lon": 1.0, "aqi": "-" }));
    records.push(station("A", 10.0, 10.0, 45, "Station A"));

    let source = RecordingSource::with_records(records);
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(-90.0, -180.0, 90.0, 180.0)).await?;
    sleep(ms(500)).await;

    let status = map.status().await?;
    assert_eq!(status.stations, 3);
    let merge = status.last_merge.unwrap();
    assert_eq!(merge.inserted, 3);
    assert_eq!(merge.replaced, 1);
    assert_eq!(merge.rejected, 2);
    assert!(status.last_refresh.is_some());

    assert!(map.lookup("bad-lat").await?.is_none());
    assert_eq!(map.lookup("A").await?.unwrap().aqi, 45);

    let in_box: Vec<String> = map
        .query(bbox(0.0, 0.0, 30.0, 30.0))
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(in_box, vec!["A", "B"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn refetching_same_data_changes_nothing() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    map.viewport_changed(bbox(0.0, 0.0, 60.0, 60.0)).await?;
    sleep(ms(500)).await;
    let first = map.query(bbox(0.0, 0.0, 60.0, 60.0)).await?;

    map.viewport_changed(bbox(0.0, 0.0, 60.0, 60.0)).await?;
    sleep(ms(500)).await;
    let second = map.query(bbox(0.0, 0.0, 60.0, 60.0)).await?;

    assert_eq!(first, second);
    let merge = map.status().await?.last_merge.unwrap();
    assert_eq!(merge.unchanged, 3);
    assert_eq!(merge.inserted, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn home_location_primes_first_fetch() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let home = LocationContext {
        home: Coordinates::new(20.0, 20.0),
        name: "Home".to_string(),
    };
    let (map, _task) = service::spawn(source.clone(), settings(), Some(home.clone()))?;

    sleep(ms(500)).await;

    assert_eq!(source.calls(), vec![bbox(15.0, 15.0, 25.0, 25.0)]);
    let status = map.status().await?;
    assert_eq!(status.location, Some(home));
    assert_eq!(status.latest_viewport, Some(bbox(15.0, 15.0, 25.0, 25.0)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_viewport_is_rejected_by_handle() -> Result<()> {
    // ---
    let source = RecordingSource::with_records(abc_records());
    let (map, _task) = service::spawn(source.clone(), settings(), None)?;

    let bad = airwatch_stations::BoundingBox {
        south: 10.0,
        west: 0.0,
        north: 0.0,
        east: 10.0,
    };
    assert!(map.viewport_changed(bad).await.is_err());
    assert!(map.query(bad).await.is_err());
    sleep(ms(500)).await;
    assert!(source.calls().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn task_stops_when_handles_dropped() -> Result<()> {
    // ---
    let source = RecordingSource::default();
    let (map, task) = service::spawn(source, settings(), None)?;
    let clone = map.clone();
    drop(map);
    assert_ok!(clone.status().await);
    drop(clone);
    task.await?;
    Ok(())
}
