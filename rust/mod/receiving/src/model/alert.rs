use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::farms::FarmDirectory;
use crate::model::delivery_order::DeliveryOrder;
use crate::service::time_window::sent_time_and_deadline;

/// Flush number shown when an order does not carry one.
pub const DEFAULT_FLUSH_NUMBER: &str = "1";

/// Alert: display projection of an in-transit delivery order.
///
/// Derived on every feed snapshot and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Id of the source delivery order.
    pub id: String,
    pub batch_id: Option<String>,
    pub entity_id: Option<String>,
    pub farm_name: String,
    pub estimated_weight_kg: Option<f64>,
    pub species: Option<String>,
    pub flush_number: String,
    /// Normalized `createdAt` of the order.
    pub sent_at: DateTime<Utc>,
    /// `sent_at` plus the transit window.
    pub arrival_deadline: DateTime<Utc>,
}

impl Alert {
    /// Project an order. `now` stands in for an unreadable `createdAt`.
    pub fn project(
        order: &DeliveryOrder,
        farms: &FarmDirectory,
        transit_window: TimeDelta,
        now: DateTime<Utc>,
    ) -> Self {
        let (sent_at, arrival_deadline) =
            sent_time_and_deadline(order.created_at.as_ref(), transit_window, now);
        Self {
            id: order.id.clone(),
            batch_id: order.batch_id.clone(),
            entity_id: order.entity_id.clone(),
            farm_name: farms.display_name(order.entity_id.as_deref(), order.source_farm.as_deref()),
            estimated_weight_kg: order.estimated_yield,
            species: order.species.clone(),
            flush_number: order
                .flush_number
                .clone()
                .unwrap_or_else(|| DEFAULT_FLUSH_NUMBER.to_string()),
            sent_at,
            arrival_deadline,
        }
    }
}
