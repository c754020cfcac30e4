// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, NaiveDateTime};
use landwatch_db::Store;
use landwatch_state::{CachedLandState, LandUpdate};
use serde_json::json;

fn base_time() -> NaiveDateTime {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc()
}

pub fn snapshot(ttl_secs: i64) -> CachedLandState {
    CachedLandState {
        created_at: base_time(),
        expires_at: base_time() + TimeDelta::seconds(ttl_secs),
        state: json!({ "entities": {}, "players": [] }),
    }
}

pub async fn put_get_roundtrip(store: &impl Store) {
    let snap = snapshot(120);
    store.put(7, &snap, Duration::from_secs(120)).await.unwrap();
    let restored = store.get(7).await.unwrap().unwrap();
    assert_eq!(restored, snap);
}

/// Sub-second precision survives only up to the documented microsecond
/// encoding.
pub async fn datetime_truncates_to_micros(store: &impl Store) {
    let mut snap = snapshot(120);
    snap.created_at += TimeDelta::nanoseconds(1_234_567);
    store.put(7, &snap, Duration::from_secs(120)).await.unwrap();
    let restored = store.get(7).await.unwrap().unwrap();
    assert_eq!(
        restored.created_at,
        base_time() + TimeDelta::microseconds(1_234)
    );
}

pub async fn put_replaces(store: &impl Store) {
    store.put(7, &snapshot(60), Duration::from_secs(60)).await.unwrap();
    let newer = snapshot(600);
    store.put(7, &newer, Duration::from_secs(600)).await.unwrap();
    assert_eq!(store.get(7).await.unwrap().unwrap(), newer);
    assert_eq!(store.keys().await.unwrap(), vec![7]);
}

pub async fn ttl_expires(store: &impl Store) {
    store.put(7, &snapshot(1), Duration::from_millis(40)).await.unwrap();
    assert!(store.get(7).await.unwrap().is_some());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(store.get(7).await.unwrap().is_none());
    assert!(store.keys().await.unwrap().is_empty());
}

pub async fn keys_are_sorted(store: &impl Store) {
    for land in [42, 7, 19] {
        store.put(land, &snapshot(60), Duration::from_secs(60)).await.unwrap();
    }
    assert_eq!(store.keys().await.unwrap(), vec![7, 19, 42]);
}

pub async fn read_all_returns_every_land(store: &impl Store) {
    store.put(1, &snapshot(60), Duration::from_secs(60)).await.unwrap();
    store.put(2, &snapshot(60), Duration::from_secs(60)).await.unwrap();
    let all = store.read_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key(&1) && all.contains_key(&2));
}

pub async fn publish_is_fifo_per_subscriber(store: &impl Store) {
    let rx = store.subscribe().await.unwrap();
    for land in 1..=5u64 {
        let update = LandUpdate::new(land, &snapshot(60));
        store.publish(&update).await.unwrap();
    }
    for land in 1..=5u64 {
        let update = rx.recv_async().await.unwrap();
        assert_eq!(update.land_number, land);
    }
}

pub async fn late_subscriber_sees_no_history(store: &impl Store) {
    store
        .publish(&LandUpdate::new(1, &snapshot(60)))
        .await
        .unwrap();
    let rx = store.subscribe().await.unwrap();
    store
        .publish(&LandUpdate::new(2, &snapshot(60)))
        .await
        .unwrap();
    assert_eq!(rx.recv_async().await.unwrap().land_number, 2);
    assert!(rx.try_recv().is_err());
}
