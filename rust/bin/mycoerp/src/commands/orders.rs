//! Delivery order commands: `dispatch`, `alerts`, `watch`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mycoerp_docstore::{DocumentStore, LiveStore};
use receiving::service::time_window::parse_timestamp_text;
use receiving::{Alert, DeliveryOrder, DeliveryStatus, ReceivingView};
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;

/// Fields of a new delivery order, as given on the command line.
#[derive(Debug, Default)]
pub struct NewOrder {
    pub batch_id: Option<String>,
    pub entity_id: Option<String>,
    pub source_farm: Option<String>,
    pub species: Option<String>,
    pub flush_number: Option<String>,
    pub estimated_yield: Option<f64>,
    pub sent_at: Option<String>,
}

impl NewOrder {
    fn into_order(self) -> Result<DeliveryOrder> {
        if let Some(s) = &self.sent_at {
            if parse_timestamp_text(s).is_none() {
                anyhow::bail!("--sent-at '{}' is not a timestamp", s);
            }
        }
        if let Some(kg) = self.estimated_yield {
            if !kg.is_finite() || kg < 0.0 {
                anyhow::bail!("--yield must be a non-negative number");
            }
        }
        Ok(DeliveryOrder {
            id: String::new(),
            batch_id: self.batch_id,
            entity_id: self.entity_id,
            source_farm: self.source_farm,
            species: self.species,
            flush_number: self.flush_number,
            estimated_yield: self.estimated_yield,
            created_at: self.sent_at.map(Value::String),
            status: DeliveryStatus::InTransit,
        })
    }
}

/// DISPATCH: create an `IN_TRANSIT` delivery order.
pub async fn dispatch(store: &dyn DocumentStore, app: &AppConfig, order: NewOrder) -> Result<()> {
    let order = order.into_order()?;
    let id = store
        .create_record(&app.receiving.delivery_collection, order.to_fields())
        .await?;
    println!("delivery order {} dispatched.", id);
    Ok(())
}

#[derive(Serialize)]
struct AlertRow {
    #[serde(flatten)]
    alert: Alert,
    countdown: String,
}

fn rows(view: &ReceivingView) -> Vec<AlertRow> {
    view.alerts()
        .into_iter()
        .map(|alert| {
            let countdown = view.countdown_label(&alert.id).unwrap_or_default();
            AlertRow { alert, countdown }
        })
        .collect()
}

fn print_table(rows: &[AlertRow]) {
    if rows.is_empty() {
        println!("No deliveries in transit.");
        return;
    }
    println!(
        "{:<36}  {:<12} {:<22} {:>8}  {:<10} {:<5} {}",
        "ID", "BATCH", "FARM", "EST KG", "SPECIES", "FLUSH", "ARRIVAL"
    );
    for row in rows {
        let a = &row.alert;
        println!(
            "{:<36}  {:<12} {:<22} {:>8}  {:<10} {:<5} {}",
            a.id,
            a.batch_id.as_deref().unwrap_or("-"),
            a.farm_name,
            a.estimated_weight_kg
                .map(|kg| kg.to_string())
                .unwrap_or_else(|| "-".to_string()),
            a.species.as_deref().unwrap_or("-"),
            a.flush_number,
            row.countdown
        );
    }
}

/// ALERTS: one snapshot of the in-transit feed.
pub fn alerts(store: Arc<LiveStore>, app: &AppConfig, output_json: bool) -> Result<()> {
    let view = ReceivingView::mount(store, &app.receiving, app.farms.clone());
    if let Some(err) = view.feed_error() {
        anyhow::bail!("feed unavailable: {}", err);
    }
    let rows = rows(&view);
    if output_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&rows);
    }
    view.teardown();
    Ok(())
}

/// WATCH: reprint the feed whenever alerts or countdowns change.
pub async fn watch(store: Arc<LiveStore>, app: &AppConfig) -> Result<()> {
    let view = ReceivingView::mount(store, &app.receiving, app.farms.clone());
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last: Option<Vec<(String, String)>> = None;
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            _ = interval.tick() => {
                let rows = rows(&view);
                let key: Vec<(String, String)> = rows
                    .iter()
                    .map(|r| (r.alert.id.clone(), r.countdown.clone()))
                    .collect();
                if last.as_ref() != Some(&key) {
                    if let Some(err) = view.feed_error() {
                        eprintln!("feed error: {}", err);
                    }
                    print_table(&rows);
                    println!();
                    last = Some(key);
                }
            }
        }
    }

    view.teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycoerp_kv::MemoryStore;

    fn store() -> Arc<LiveStore> {
        Arc::new(LiveStore::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_bad_sent_at_rejected() {
        let order = NewOrder {
            sent_at: Some("yesterday-ish".into()),
            ..Default::default()
        };
        assert!(order.into_order().is_err());
    }

    #[test]
    fn test_negative_yield_rejected() {
        let order = NewOrder {
            estimated_yield: Some(-3.0),
            ..Default::default()
        };
        assert!(order.into_order().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_creates_in_transit_order() {
        let store = store();
        let app = AppConfig::default();
        let order = NewOrder {
            batch_id: Some("B-77".into()),
            entity_id: Some("ent_001".into()),
            estimated_yield: Some(40.0),
            sent_at: Some("2025-03-01T08:00:00Z".into()),
            ..Default::default()
        };
        dispatch(store.as_ref(), &app, order).await.unwrap();

        let records = store.list_records("mn_delivery_orders").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["status"], "IN_TRANSIT");
        assert_eq!(records[0].fields["createdAt"], "2025-03-01T08:00:00Z");

        let view = ReceivingView::mount(store, &app.receiving, app.farms.clone());
        let rows = rows(&view);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].alert.farm_name, "Green Spore Co-op");
        assert_eq!(rows[0].countdown, "Arriving now / Overdue");
    }
}
