#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use beacon::app::alerts::Alerter;
use beacon::app::engine::{EngineDeps, NotificationEngine};
use beacon::app::persistence::MemorySlot;
use beacon::app::seed::SeedSource;
use beacon::app::subscriber::{
    ChangeFeed, FeedSignal, SignalSender, Subscription, SubscriptionStatus,
};
use beacon::config::policy::FeedPolicy;
use beacon::domain::change::{
    AccountRecord, ChangeEvent, InventoryRecord, Operation, OrderRecord, Source,
};
use beacon::domain::notification::{Notification, NotificationType};
use beacon::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Fixed reference instant so ordering assertions are deterministic.
pub fn base_time() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

pub fn at(offset_seconds: i64) -> OffsetDateTime {
    base_time() + time::Duration::seconds(offset_seconds)
}

pub fn notification(id: &str, offset_seconds: i64) -> Notification {
    Notification {
        id: id.to_string(),
        notification_type: NotificationType::OrderPlaced,
        title: format!("title {}", id),
        message: format!("message {}", id),
        timestamp: at(offset_seconds),
        read: false,
        data: None,
    }
}

pub fn typed(id: &str, kind: NotificationType, offset_seconds: i64, read: bool) -> Notification {
    Notification {
        notification_type: kind,
        read,
        ..notification(id, offset_seconds)
    }
}

pub fn ids(notifications: &[Notification]) -> Vec<String> {
    notifications.iter().map(|n| n.id.clone()).collect()
}

pub fn order_record(id: Uuid, total: f64, status: &str, created_offset: i64) -> OrderRecord {
    OrderRecord {
        id,
        total,
        status: status.to_string(),
        customer_name: Some("Ada Lovelace".to_string()),
        created_at: at(created_offset),
        updated_at: None,
    }
}

pub fn account_record(id: Uuid, created_offset: i64) -> AccountRecord {
    AccountRecord {
        id,
        email: Some("grace@example.com".to_string()),
        full_name: Some("Grace Hopper".to_string()),
        role: Some("customer".to_string()),
        created_at: at(created_offset),
    }
}

pub fn inventory_record(id: Uuid, name: &str, stock: i64) -> InventoryRecord {
    InventoryRecord {
        id,
        name: name.to_string(),
        stock,
        updated_at: Some(at(0)),
    }
}

pub fn change(operation: Operation, source: Source, record: Value) -> ChangeEvent {
    ChangeEvent {
        operation,
        table: source.table().to_string(),
        record,
    }
}

pub fn order_json(id: Uuid, total: f64, status: &str) -> Value {
    json!({
        "id": id,
        "total": total,
        "status": status,
        "customer_name": "Ada Lovelace",
        "created_at": "2024-03-01T10:00:00+00:00",
        "updated_at": null,
    })
}

/// Polls `condition` while letting spawned tasks (and paused time) advance.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..4000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Change feed fake
// ---------------------------------------------------------------------------

/// How the fake answers one `subscribe` call.
#[derive(Debug, Clone)]
pub enum Script {
    Establish,
    Fail(String),
    /// `subscribe` itself returns an error.
    Refuse,
    /// Never reports a status.
    Silent,
    /// `subscribe` itself never returns.
    Hang,
}

#[derive(Default)]
pub struct FakeFeed {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Mutex<Option<Script>>,
    senders: Mutex<HashMap<Source, SignalSender>>,
    calls: Mutex<Vec<Source>>,
    open: Arc<AtomicUsize>,
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call not covered by a queued script behaves like this.
    pub fn always(script: Script) -> Arc<Self> {
        let feed = Self::default();
        *feed.fallback.lock().unwrap() = Some(script);
        Arc::new(feed)
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn subscribe_calls(&self, source: Source) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| **called == source)
            .count()
    }

    pub fn open_subscriptions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn emit(&self, source: Source, event: ChangeEvent) {
        let senders = self.senders.lock().unwrap();
        let sender = senders.get(&source).expect("source never subscribed");
        let _ = sender.send(FeedSignal::Change { source, event });
    }

    pub fn report(&self, source: Source, status: SubscriptionStatus) {
        let senders = self.senders.lock().unwrap();
        let sender = senders.get(&source).expect("source never subscribed");
        let _ = sender.send(FeedSignal::Status { source, status });
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, source: Source, signals: SignalSender) -> Result<Subscription> {
        self.calls.lock().unwrap().push(source);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(Script::Establish);

        match script {
            Script::Refuse => return Err(anyhow!("subscribe refused")),
            Script::Hang => std::future::pending::<()>().await,
            Script::Establish => {
                let _ = signals.send(FeedSignal::Status {
                    source,
                    status: SubscriptionStatus::Established,
                });
            }
            Script::Fail(reason) => {
                let _ = signals.send(FeedSignal::Status {
                    source,
                    status: SubscriptionStatus::Errored(reason),
                });
            }
            Script::Silent => {}
        }

        self.senders.lock().unwrap().insert(source, signals.clone());
        self.open.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(self.open.clone());
        let task = tokio::spawn(async move {
            let _guard = guard;
            let _signals = signals;
            std::future::pending::<()>().await;
        });
        Ok(Subscription::new(task))
    }
}

// ---------------------------------------------------------------------------
// Seed source fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSeedSource {
    pub orders: Vec<OrderRecord>,
    pub accounts: Vec<AccountRecord>,
    pub products: Vec<InventoryRecord>,
    pub fail_orders: bool,
    pub fail_accounts: bool,
    pub fail_stock: bool,
    pub limits_seen: Mutex<Vec<(&'static str, i64)>>,
}

#[async_trait]
impl SeedSource for FakeSeedSource {
    async fn recent_orders(&self, limit: i64) -> Result<Vec<OrderRecord>> {
        self.limits_seen.lock().unwrap().push(("orders", limit));
        if self.fail_orders {
            return Err(anyhow!("orders query failed"));
        }
        Ok(self.orders.iter().take(limit as usize).cloned().collect())
    }

    async fn recent_accounts(&self, limit: i64) -> Result<Vec<AccountRecord>> {
        self.limits_seen.lock().unwrap().push(("accounts", limit));
        if self.fail_accounts {
            return Err(anyhow!("accounts query failed"));
        }
        Ok(self.accounts.iter().take(limit as usize).cloned().collect())
    }

    async fn low_stock(&self, threshold: i64) -> Result<Vec<InventoryRecord>> {
        self.limits_seen.lock().unwrap().push(("stock", threshold));
        if self.fail_stock {
            return Err(anyhow!("inventory query failed"));
        }
        Ok(self
            .products
            .iter()
            .filter(|product| product.stock <= threshold)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Alerter fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingAlerter {
    pub alerted: Mutex<Vec<String>>,
    pub fail: bool,
}

impl Alerter for RecordingAlerter {
    fn alert(&self, notification: &Notification) -> Result<()> {
        self.alerted.lock().unwrap().push(notification.id.clone());
        if self.fail {
            return Err(anyhow!("alert permission revoked"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestApp: engine wired to fakes plus the operator router
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub engine: Arc<NotificationEngine>,
    pub feed: Arc<FakeFeed>,
    pub slot: Arc<MemorySlot>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: axum::body::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

impl TestApp {
    pub async fn spawn(seed: FakeSeedSource) -> Self {
        Self::spawn_with(seed, Arc::new(MemorySlot::new())).await
    }

    pub async fn spawn_with(seed: FakeSeedSource, slot: Arc<MemorySlot>) -> Self {
        Self::spawn_configured(seed, slot, FeedPolicy::default()).await
    }

    pub async fn spawn_configured(
        seed: FakeSeedSource,
        slot: Arc<MemorySlot>,
        feed_policy: FeedPolicy,
    ) -> Self {
        let feed = FakeFeed::new();
        let mut deps = EngineDeps::new(feed.clone(), Arc::new(seed), slot.clone());
        deps.feed_policy = feed_policy;
        let engine = Arc::new(NotificationEngine::start(deps).await);

        let state = AppState {
            engine: engine.clone(),
            admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        };
        let router = beacon::http::router(state);

        TestApp {
            router,
            engine,
            feed,
            slot,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");
        if let Some(token) = admin_token {
            builder = builder.header("x-admin-token", token);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get_admin(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, Some(TEST_ADMIN_TOKEN)).await
    }

    pub async fn post_admin(&self, path: &str) -> TestResponse {
        self.request(Method::POST, path, Some(TEST_ADMIN_TOKEN)).await
    }

    pub async fn delete_admin(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, Some(TEST_ADMIN_TOKEN)).await
    }
}
