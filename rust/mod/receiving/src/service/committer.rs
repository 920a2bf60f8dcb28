use std::sync::Arc;

use mycoerp_core::ServiceError;
use mycoerp_docstore::{Document, DocumentStore};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ReceivingConfig;
use crate::error::CommitError;
use crate::model::DeliveryStatus;
use crate::service::intake::SubmitRequest;

/// What happened to the linked delivery order after the batch was committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Manual intake; no order to reconcile.
    NotLinked,
    /// Order marked `DELIVERED`.
    Delivered { order_id: String },
    /// Status update failed. The batch stands; the order may still read
    /// `IN_TRANSIT` in the store.
    Stale { order_id: String, error: ServiceError },
}

impl Reconciliation {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Reconciliation::NotLinked => None,
            Reconciliation::Delivered { order_id } | Reconciliation::Stale { order_id, .. } => {
                Some(order_id.as_str())
            }
        }
    }
}

/// Result of a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub batch_record_id: String,
    pub net_weight: f64,
    pub reconciliation: Reconciliation,
}

/// Two-step commit: create the inventory batch, then mark the source
/// delivery order `DELIVERED`.
///
/// Only step 1 can fail the commit. Step 2 runs only after step 1
/// succeeded and only for linked drafts; its failure is logged and
/// reported as [`Reconciliation::Stale`]. Nothing is rolled back.
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    batch_collection: String,
    delivery_collection: String,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ReceivingConfig) -> Self {
        Self {
            store,
            batch_collection: config.batch_collection.clone(),
            delivery_collection: config.delivery_collection.clone(),
        }
    }

    pub async fn commit(&self, request: &SubmitRequest) -> Result<CommitOutcome, CommitError> {
        let batch = &request.batch;
        let fields = batch
            .to_fields()
            .map_err(|e| CommitError::Encode(e.to_string()))?;

        let batch_record_id = self
            .store
            .create_record(&self.batch_collection, fields)
            .await
            .map_err(CommitError::BatchCreate)?;
        info!(
            "batch {} committed: {} from {} ({} kg net)",
            batch_record_id, batch.batch_id, batch.source_farm, batch.net_weight
        );

        let reconciliation = match &request.linked_alert_id {
            None => Reconciliation::NotLinked,
            Some(order_id) => self.mark_delivered(order_id).await,
        };

        Ok(CommitOutcome {
            batch_record_id,
            net_weight: batch.net_weight,
            reconciliation,
        })
    }

    async fn mark_delivered(&self, order_id: &str) -> Reconciliation {
        let mut patch = Document::new();
        patch.insert(
            "status".to_string(),
            Value::String(DeliveryStatus::Delivered.as_str().to_string()),
        );

        match self
            .store
            .update_record(&self.delivery_collection, order_id, patch)
            .await
        {
            Ok(()) => {
                info!("delivery order {} marked DELIVERED", order_id);
                Reconciliation::Delivered {
                    order_id: order_id.to_string(),
                }
            }
            Err(error) => {
                warn!(
                    "delivery order {} left unreconciled after batch commit: {} (code={}, transient={})",
                    order_id,
                    error,
                    error.error_code(),
                    error.is_transient()
                );
                Reconciliation::Stale {
                    order_id: order_id.to_string(),
                    error,
                }
            }
        }
    }
}
