//! Docstore: a real-time document store over a KV backend.
//!
//! Collections of JSON documents with push-based, filtered subscriptions.
//! Every write to a collection re-evaluates each subscriber's filter and
//! pushes the **full** current result set, never a diff.
//!
//! # Primitives
//!
//! - `create_record(collection, fields)`: insert with a generated id
//! - `update_record(collection, id, fields)`: RFC 7386 merge patch
//! - `subscribe(collection, filter, on_snapshot, on_error)`: returns a
//!   [`Subscription`] handle; dropping it unsubscribes
//!
//! # Example
//!
//! ```ignore
//! use mycoerp_docstore::{DocumentStore, Filter, LiveStore};
//!
//! let store = LiveStore::new(Arc::new(MemoryStore::new()));
//!
//! let sub = store.subscribe(
//!     "mn_delivery_orders",
//!     Filter::eq("status", "IN_TRANSIT"),
//!     Arc::new(|records| println!("{} in transit", records.len())),
//!     Arc::new(|err| eprintln!("feed error: {err}")),
//! );
//!
//! store.create_record("mn_delivery_orders", fields).await?;
//! sub.unsubscribe();
//! ```

pub mod document;
pub mod store;
pub mod subscription;
mod timestamp;

pub use document::{Document, Filter, Record};
pub use store::{DocumentStore, LiveStore};
pub use subscription::{ErrorHandler, SnapshotHandler, Subscription, SubscriptionId};
