use std::sync::Arc;

use async_trait::async_trait;
use mycoerp_core::{merge_patch, new_id, ServiceError};
use mycoerp_kv::{KVError, KVStore};
use serde_json::Value;
use tracing::{debug, error};

use crate::document::{Document, Filter, Record};
use crate::subscription::{ErrorHandler, Registry, SnapshotHandler, Subscriber, Subscription};
use crate::timestamp::{stamp_create, stamp_update};

/// Real-time document store contract.
///
/// Writes return typed results; subscriptions are push-based and always
/// carry the full current result set of their filter.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its generated id.
    async fn create_record(&self, collection: &str, fields: Document) -> Result<String, ServiceError>;

    /// Merge `fields` into an existing document. `NotFound` if it does not exist.
    async fn update_record(&self, collection: &str, id: &str, fields: Document) -> Result<(), ServiceError>;

    /// Read one document.
    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, ServiceError>;

    /// Read every document of a collection, ordered by id.
    async fn list_records(&self, collection: &str) -> Result<Vec<Record>, ServiceError>;

    /// Register a filtered subscription.
    ///
    /// The current result set is delivered once before this returns, then
    /// again after every write to `collection`.
    fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        on_snapshot: SnapshotHandler,
        on_error: ErrorHandler,
    ) -> Subscription;
}

/// [`DocumentStore`] backed by any [`KVStore`].
///
/// Documents live under `doc:{collection}:{id}` as JSON objects. Scans
/// are key-ordered, so snapshots come out ordered by id.
pub struct LiveStore {
    kv: Arc<dyn KVStore>,
    registry: Arc<Registry>,
}

impl LiveStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Number of live subscriptions across all collections.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    fn prefix(collection: &str) -> String {
        format!("doc:{}:", collection)
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("doc:{}:{}", collection, id)
    }

    fn kv_err(e: KVError) -> ServiceError {
        ServiceError::Storage(e.to_string())
    }

    fn check_name(kind: &str, name: &str) -> Result<(), ServiceError> {
        if name.is_empty() || name.contains(':') {
            return Err(ServiceError::Validation(format!(
                "invalid {} name '{}'",
                kind, name
            )));
        }
        Ok(())
    }

    fn decode(key: &str, prefix: &str, bytes: &[u8]) -> Result<Record, ServiceError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e)))?;
        let fields = match value {
            Value::Object(map) => map,
            _ => {
                return Err(ServiceError::Internal(format!(
                    "document {} is not an object",
                    key
                )))
            }
        };
        Ok(Record {
            id: key[prefix.len()..].to_string(),
            fields,
        })
    }

    fn write(&self, key: &str, fields: &Document) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec(fields)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
        self.kv.set(key, &bytes).map_err(Self::kv_err)
    }

    fn load(&self, collection: &str, id: &str) -> Result<Option<Record>, ServiceError> {
        let key = Self::make_key(collection, id);
        match self.kv.get(&key).map_err(Self::kv_err)? {
            Some(bytes) => Self::decode(&key, &Self::prefix(collection), &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn scan(&self, collection: &str) -> Result<Vec<Record>, ServiceError> {
        let prefix = Self::prefix(collection);
        let entries = self.kv.scan(&prefix).map_err(Self::kv_err)?;
        entries
            .iter()
            .map(|(key, bytes)| Self::decode(key, &prefix, bytes))
            .collect()
    }

    fn deliver(subscriber: &Subscriber, all: &Result<Vec<Record>, ServiceError>) {
        match all {
            Ok(records) => {
                let matching: Vec<Record> = records
                    .iter()
                    .filter(|r| subscriber.filter.matches(&r.fields))
                    .cloned()
                    .collect();
                (subscriber.on_snapshot)(&matching);
            }
            Err(e) => {
                error!(
                    "snapshot for subscription {:?} on '{}' failed: {}",
                    subscriber.id, subscriber.collection, e
                );
                (subscriber.on_error)(e);
            }
        }
    }

    /// Push a fresh snapshot to every subscriber of `collection`.
    fn notify(&self, collection: &str) {
        let subscribers = self.registry.for_collection(collection);
        if subscribers.is_empty() {
            return;
        }
        let all = self.scan(collection);
        for subscriber in &subscribers {
            // A handler earlier in this loop may have cancelled a later one.
            if self.registry.contains(subscriber.id) {
                Self::deliver(subscriber, &all);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for LiveStore {
    async fn create_record(&self, collection: &str, mut fields: Document) -> Result<String, ServiceError> {
        Self::check_name("collection", collection)?;
        let id = new_id();
        // The id is the key, never a field.
        fields.remove("id");
        stamp_create(&mut fields);
        self.write(&Self::make_key(collection, &id), &fields)?;
        debug!("created {}/{}", collection, id);
        self.notify(collection);
        Ok(id)
    }

    async fn update_record(&self, collection: &str, id: &str, fields: Document) -> Result<(), ServiceError> {
        Self::check_name("collection", collection)?;
        Self::check_name("record id", id)?;
        let existing = self.load(collection, id)?.ok_or_else(|| {
            ServiceError::NotFound(format!("{}/{} not found", collection, id))
        })?;

        let mut merged = Value::Object(existing.fields);
        let mut patch = fields;
        patch.remove("id");
        merge_patch(&mut merged, &Value::Object(patch));
        let mut merged = match merged {
            Value::Object(map) => map,
            _ => return Err(ServiceError::Internal("merge produced a non-object".into())),
        };
        stamp_update(&mut merged);

        self.write(&Self::make_key(collection, id), &merged)?;
        debug!("updated {}/{}", collection, id);
        self.notify(collection);
        Ok(())
    }

    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, ServiceError> {
        Self::check_name("collection", collection)?;
        Self::check_name("record id", id)?;
        self.load(collection, id)
    }

    async fn list_records(&self, collection: &str) -> Result<Vec<Record>, ServiceError> {
        Self::check_name("collection", collection)?;
        self.scan(collection)
    }

    fn subscribe(
        &self,
        collection: &str,
        filter: Filter,
        on_snapshot: SnapshotHandler,
        on_error: ErrorHandler,
    ) -> Subscription {
        let id = self.registry.next_id();
        let subscriber = Subscriber {
            id,
            collection: collection.to_string(),
            filter,
            on_snapshot,
            on_error,
        };

        let handle = Subscription::new(id, &self.registry);
        if let Err(e) = Self::check_name("collection", collection) {
            // Never registered; the handle is inert.
            (subscriber.on_error)(&e);
            return handle;
        }

        self.registry.insert(subscriber.clone());
        debug!("subscription {:?} registered on '{}'", id, collection);

        Self::deliver(&subscriber, &self.scan(collection));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycoerp_kv::{MemoryStore, RedbStore};
    use serde_json::json;
    use std::sync::Mutex;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn mem_store() -> LiveStore {
        LiveStore::new(Arc::new(MemoryStore::new()))
    }

    /// Records every snapshot (as sorted id lists) and every error message.
    #[derive(Default)]
    struct Probe {
        snapshots: Mutex<Vec<Vec<String>>>,
        errors: Mutex<Vec<String>>,
    }

    impl Probe {
        fn handlers(self: &Arc<Self>) -> (SnapshotHandler, ErrorHandler) {
            let a = Arc::clone(self);
            let b = Arc::clone(self);
            (
                Arc::new(move |records: &[Record]| {
                    let ids = records.iter().map(|r| r.id.clone()).collect();
                    a.snapshots.lock().unwrap().push(ids);
                }),
                Arc::new(move |e: &ServiceError| {
                    b.errors.lock().unwrap().push(e.to_string());
                }),
            )
        }

        fn last(&self) -> Vec<String> {
            self.snapshots.lock().unwrap().last().cloned().unwrap_or_default()
        }

        fn count(&self) -> usize {
            self.snapshots.lock().unwrap().len()
        }
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    #[tokio::test]
    async fn create_then_get() {
        let store = mem_store();
        let id = store
            .create_record("orders", doc(json!({"species": "Oyster", "id": "ignored"})))
            .await
            .unwrap();

        let rec = store.get_record("orders", &id).await.unwrap().unwrap();
        assert_eq!(rec.id, id);
        assert_eq!(rec.fields["species"], "Oyster");
        assert!(rec.fields.get("id").is_none());
        assert!(rec.fields["createdAt"].is_string());
        assert!(rec.fields["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = mem_store();
        let id = store
            .create_record("orders", doc(json!({"status": "IN_TRANSIT", "species": "Oyster"})))
            .await
            .unwrap();

        store
            .update_record("orders", &id, doc(json!({"status": "DELIVERED"})))
            .await
            .unwrap();

        let rec = store.get_record("orders", &id).await.unwrap().unwrap();
        assert_eq!(rec.fields["status"], "DELIVERED");
        assert_eq!(rec.fields["species"], "Oyster");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = mem_store();
        let err = store
            .update_record("orders", "nope", doc(json!({"status": "DELIVERED"})))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn list_is_scoped_to_collection() {
        let store = mem_store();
        store.create_record("orders", doc(json!({"n": 1}))).await.unwrap();
        store.create_record("orders", doc(json!({"n": 2}))).await.unwrap();
        store.create_record("batches", doc(json!({"n": 3}))).await.unwrap();

        assert_eq!(store.list_records("orders").await.unwrap().len(), 2);
        assert_eq!(store.list_records("batches").await.unwrap().len(), 1);
        assert!(store.list_records("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_colon_in_collection() {
        let store = mem_store();
        let err = store.create_record("a:b", Document::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn works_over_redb() {
        let dir = tempfile::tempdir().unwrap();
        let kv = RedbStore::open(&dir.path().join("docs.redb")).unwrap();
        let store = LiveStore::new(Arc::new(kv));

        let id = store.create_record("orders", doc(json!({"x": 1}))).await.unwrap();
        store.update_record("orders", &id, doc(json!({"x": 2}))).await.unwrap();
        let rec = store.get_record("orders", &id).await.unwrap().unwrap();
        assert_eq!(rec.fields["x"], 2);
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    #[tokio::test]
    async fn subscribe_delivers_initial_snapshot() {
        let store = mem_store();
        let id = store
            .create_record("orders", doc(json!({"status": "IN_TRANSIT"})))
            .await
            .unwrap();

        let probe = Arc::new(Probe::default());
        let (on_snap, on_err) = probe.handlers();
        let _sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);

        assert_eq!(probe.count(), 1);
        assert_eq!(probe.last(), vec![id]);
    }

    #[tokio::test]
    async fn every_write_pushes_full_filtered_set() {
        let store = mem_store();
        let probe = Arc::new(Probe::default());
        let (on_snap, on_err) = probe.handlers();
        let _sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);
        assert!(probe.last().is_empty());

        let a = store
            .create_record("orders", doc(json!({"status": "IN_TRANSIT"})))
            .await
            .unwrap();
        let b = store
            .create_record("orders", doc(json!({"status": "IN_TRANSIT"})))
            .await
            .unwrap();
        let mut both = vec![a.clone(), b.clone()];
        both.sort();
        assert_eq!(probe.last(), both);

        store
            .update_record("orders", &a, doc(json!({"status": "DELIVERED"})))
            .await
            .unwrap();
        assert_eq!(probe.last(), vec![b]);
        assert_eq!(probe.count(), 4);
    }

    #[tokio::test]
    async fn other_collections_do_not_notify() {
        let store = mem_store();
        let probe = Arc::new(Probe::default());
        let (on_snap, on_err) = probe.handlers();
        let _sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);

        store.create_record("batches", doc(json!({"status": "IN_TRANSIT"}))).await.unwrap();
        assert_eq!(probe.count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_and_drop_stop_delivery() {
        let store = mem_store();
        let probe = Arc::new(Probe::default());

        let (on_snap, on_err) = probe.handlers();
        let sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        {
            let (on_snap, on_err) = probe.handlers();
            let _scoped = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);
        }
        assert_eq!(store.subscriber_count(), 0);

        let before = probe.count();
        store.create_record("orders", doc(json!({"status": "IN_TRANSIT"}))).await.unwrap();
        assert_eq!(probe.count(), before);
    }

    #[tokio::test]
    async fn handle_outlives_store() {
        let store = mem_store();
        let probe = Arc::new(Probe::default());
        let (on_snap, on_err) = probe.handlers();
        let sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);
        drop(store);
        // Unsubscribing after the store is gone is a no-op.
        sub.unsubscribe();
    }

    // ========================================================================
    // Failure path
    // ========================================================================

    /// KV backend whose scans always fail.
    struct BrokenScan(MemoryStore);

    impl KVStore for BrokenScan {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
            self.0.set(key, value)
        }
        fn scan(&self, _prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
            Err(KVError::Storage("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn scan_failure_goes_to_on_error() {
        let store = LiveStore::new(Arc::new(BrokenScan(MemoryStore::new())));
        let probe = Arc::new(Probe::default());
        let (on_snap, on_err) = probe.handlers();
        let _sub = store.subscribe("orders", Filter::eq("status", "IN_TRANSIT"), on_snap, on_err);

        assert_eq!(probe.count(), 0);
        let errors = probe.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("disk on fire"));
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("doc:orders:bad", b"not json").unwrap();
        let store = LiveStore::new(kv);
        let err = store.get_record("orders", "bad").await.unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL");
    }
}
