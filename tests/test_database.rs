mod common;
use common::*;

use chrono::NaiveDate;
use indevolt_bridge::database::CounterStore;
use indevolt_bridge::prelude::*;
use std::collections::HashMap;

fn state(value: f64, day: u32) -> CounterTrackState {
    CounterTrackState {
        last_valid_value: Some(value),
        last_update_date: NaiveDate::from_ymd_opt(2024, 6, day),
    }
}

async fn store(dir: &tempfile::TempDir) -> CounterStore {
    let url = format!("sqlite://{}", dir.path().join("state.db").display());
    CounterStore::connect(&url).await.unwrap()
}

#[tokio::test]
async fn counters_survive_reconnect() {
    common_setup();

    let dir = tempfile::tempdir().unwrap();

    let mut states = HashMap::new();
    states.insert(6004, state(3.2, 1));
    states.insert(6006, state(812.5, 1));
    states.insert(
        6007,
        CounterTrackState {
            last_valid_value: None,
            last_update_date: None,
        },
    );

    store(&dir).await.save("garage", &states).await.unwrap();

    let loaded = store(&dir).await.load("garage").await.unwrap();
    assert_eq!(loaded, states);
}

#[tokio::test]
async fn save_updates_existing_rows() {
    common_setup();

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let mut states = HashMap::new();
    states.insert(6004, state(3.2, 1));
    store.save("garage", &states).await.unwrap();

    states.insert(6004, state(0.1, 2));
    store.save("garage", &states).await.unwrap();

    let loaded = store.load("garage").await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[&6004], state(0.1, 2));
}

#[tokio::test]
async fn devices_are_kept_apart() {
    common_setup();

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let mut garage = HashMap::new();
    garage.insert(6004, state(3.2, 1));
    store.save("garage", &garage).await.unwrap();

    let mut shed = HashMap::new();
    shed.insert(6004, state(7.7, 1));
    store.save("shed", &shed).await.unwrap();

    assert_eq!(store.load("garage").await.unwrap(), garage);
    assert_eq!(store.load("shed").await.unwrap(), shed);
    assert!(store.load("attic").await.unwrap().is_empty());
}
