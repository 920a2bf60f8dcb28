//! Test fixtures: a fault-injecting store and seed helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mycoerp_core::ServiceError;
use mycoerp_docstore::{
    Document, DocumentStore, ErrorHandler, Filter, LiveStore, Record, SnapshotHandler,
    Subscription,
};
use mycoerp_kv::{KVError, KVStore, MemoryStore};
use serde_json::Value;

pub(crate) const ORDERS: &str = "mn_delivery_orders";
pub(crate) const BATCHES: &str = "inventory_batches";

/// 2025-03-01 08:00 UTC.
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub(crate) fn doc(v: Value) -> Document {
    v.as_object().cloned().unwrap()
}

/// In-memory KV whose scans can be switched to fail.
#[derive(Default)]
pub(crate) struct FlakyKv {
    inner: MemoryStore,
    fail_scan: AtomicBool,
}

impl KVStore for FlakyKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.inner.set(key, value)
    }
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(KVError::Storage("replica unreachable".into()));
        }
        self.inner.scan(prefix)
    }
}

/// [`LiveStore`] wrapper that can fail creates, updates and scans on demand.
pub(crate) struct FlakyStore {
    pub(crate) inner: LiveStore,
    kv: Arc<FlakyKv>,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Arc<Self> {
        let kv = Arc::new(FlakyKv::default());
        Arc::new(Self {
            inner: LiveStore::new(kv.clone()),
            kv,
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
        })
    }

    pub(crate) fn fail_creates(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_updates(&self, on: bool) {
        self.fail_update.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_scans(&self, on: bool) {
        self.kv.fail_scan.store(on, Ordering::SeqCst);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Insert an `IN_TRANSIT` order; `fields` may override anything.
    pub(crate) async fn seed_order(&self, fields: Value) -> String {
        let mut body = doc(serde_json::json!({ "status": "IN_TRANSIT" }));
        body.extend(doc(fields));
        self.inner.create_record(ORDERS, body).await.unwrap()
    }

    pub(crate) async fn order_status(&self, id: &str) -> Option<String> {
        self.inner
            .get_record(ORDERS, id)
            .await
            .unwrap()
            .and_then(|r| r.get("status").and_then(Value::as_str).map(str::to_string))
    }

    pub(crate) async fn batches(&self) -> Vec<Record> {
        self.inner.list_records(BATCHES).await.unwrap()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_record(&self, collection: &str, fields: Document) -> Result<String, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::Storage("insert timed out".into()));
        }
        self.inner.create_record(collection, fields).await
    }

    async fn update_record(&self, collection: &str, id: &str, fields: Document) -> Result<(), ServiceError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ServiceError::Storage("update timed out".into()));
        }
        self.inner.update_record(collection, id, fields).await
    }

    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, ServiceError> {
        self.inner.get_record(collection, id).await
    }

    async fn list_records(&self, collection: &str) -> Result<Vec<Record>, ServiceError> {
        self.inner.list_records(collection).await
    }

    fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        on_snapshot: SnapshotHandler,
        on_error: ErrorHandler,
    ) -> Subscription {
        self.inner.subscribe(collection, filter, on_snapshot, on_error)
    }
}
