//! Engine Tests
//!
//! Covers startup ordering, operator actions and teardown of the assembled
//! engine.

mod common;

use std::sync::Arc;

use beacon::app::persistence::{decode, encode, MemorySlot};
use beacon::app::reconnect::ConnectionPhase;
use common::{eventually, ids, notification, order_record, FakeSeedSource, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn startup_hydrates_then_merges_seed() {
    let mut read = notification("persisted-read", -5);
    read.read = true;
    let payload = encode(&[notification("persisted", 100), read]).unwrap();
    let slot = Arc::new(MemorySlot::with_payload(payload));

    let order_id = Uuid::new_v4();
    let seed = FakeSeedSource {
        orders: vec![order_record(order_id, 80.0, "paid", 50)],
        ..FakeSeedSource::default()
    };

    let app = TestApp::spawn_with(seed, slot).await;
    eventually(|| app.engine.snapshot().notifications.len() == 3).await;

    let state = app.engine.snapshot();
    assert_eq!(
        ids(&state.notifications),
        vec![
            "persisted".to_string(),
            format!("seed-order-{}", order_id),
            "persisted-read".to_string(),
        ]
    );
    assert_eq!(app.engine.unread_count(), 1);

    app.engine.shutdown().await;
}

#[tokio::test]
async fn engine_connects_against_healthy_feed() {
    let app = TestApp::spawn(FakeSeedSource::default()).await;

    eventually(|| app.engine.is_connected()).await;
    assert_eq!(app.engine.phase(), ConnectionPhase::Connected);
    assert!(app.engine.connection_error().is_none());
    assert_eq!(app.feed.open_subscriptions(), 3);

    app.engine.shutdown().await;
    assert_eq!(app.engine.phase(), ConnectionPhase::Idle);
    eventually(|| app.feed.open_subscriptions() == 0).await;
}

#[tokio::test]
async fn operator_actions_update_feed() {
    let slot = Arc::new(MemorySlot::with_payload(
        encode(&[notification("a", 0), notification("b", 1)]).unwrap(),
    ));
    let app = TestApp::spawn_with(FakeSeedSource::default(), slot).await;

    assert!(app.engine.mark_as_read("a"));
    assert!(!app.engine.mark_as_read("a"));
    assert!(!app.engine.mark_as_read("missing"));
    assert_eq!(app.engine.unread_count(), 1);

    assert!(app.engine.mark_all_as_read());
    assert_eq!(app.engine.unread_count(), 0);

    assert!(app.engine.clear_all());
    assert!(app.engine.snapshot().notifications.is_empty());
    assert!(!app.engine.clear_all());

    app.engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_flushes_read_flags() {
    let slot = Arc::new(MemorySlot::with_payload(
        encode(&[notification("a", 0)]).unwrap(),
    ));
    let app = TestApp::spawn_with(FakeSeedSource::default(), slot.clone()).await;

    app.engine.mark_all_as_read();
    app.engine.shutdown().await;

    let saved = decode(&slot.payload().await.unwrap());
    assert_eq!(ids(&saved), vec!["a"]);
    assert!(saved[0].read);
}

#[tokio::test]
async fn actions_after_shutdown_are_dropped() {
    let slot = Arc::new(MemorySlot::with_payload(
        encode(&[notification("a", 0)]).unwrap(),
    ));
    let app = TestApp::spawn_with(FakeSeedSource::default(), slot).await;

    app.engine.shutdown().await;
    app.engine.shutdown().await;

    assert!(!app.engine.mark_as_read("a"));
    assert!(!app.engine.clear_all());
    assert_eq!(app.engine.unread_count(), 1);
}
