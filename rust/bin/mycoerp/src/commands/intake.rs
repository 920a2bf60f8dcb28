//! Intake commands: `intake`, `batches`.

use std::sync::Arc;

use anyhow::Result;
use mycoerp_docstore::{DocumentStore, LiveStore};
use receiving::{Batch, DraftField, ReceivingView, Reconciliation};
use serde_json::json;
use tracing::warn;

use crate::config::AppConfig;

/// Intake form input, as given on the command line.
#[derive(Debug, Default)]
pub struct IntakeArgs {
    pub alert: Option<String>,
    pub batch_id: Option<String>,
    pub source_farm: Option<String>,
    pub species: Option<String>,
    pub flush_number: Option<String>,
    pub raw: Option<String>,
    pub spoiled: Option<String>,
}

impl IntakeArgs {
    fn edits(&self) -> Vec<(DraftField, &str)> {
        [
            (DraftField::BatchId, &self.batch_id),
            (DraftField::SourceFarm, &self.source_farm),
            (DraftField::Species, &self.species),
            (DraftField::FlushNumber, &self.flush_number),
            (DraftField::RawWeight, &self.raw),
            (DraftField::SpoiledWeight, &self.spoiled),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }
}

/// INTAKE: fill the form, submit it, report the outcome.
pub async fn intake(
    store: Arc<LiveStore>,
    app: &AppConfig,
    args: IntakeArgs,
    output_json: bool,
) -> Result<()> {
    let view = ReceivingView::mount(store, &app.receiving, app.farms.clone());

    if let Some(id) = &args.alert {
        let alert = view.select_alert(id)?;
        println!(
            "Claimed {} from {}.",
            alert.batch_id.as_deref().unwrap_or("Unknown Batch"),
            alert.farm_name
        );
    }
    for (field, value) in args.edits() {
        view.edit(field, value)
            .map_err(|e| anyhow::anyhow!("--{}: {}", field.name(), e))?;
    }

    println!("Net weight: {} kg", view.net_weight_label());
    if let Some(spoilage) = view.spoilage_label() {
        println!("{}", spoilage);
    }
    if let Err(e) = view.validate() {
        anyhow::bail!("nothing submitted: {}", e);
    }

    let Some(outcome) = view.submit().await? else {
        anyhow::bail!("nothing submitted");
    };

    if output_json {
        let reconciliation = match &outcome.reconciliation {
            Reconciliation::NotLinked => json!(null),
            Reconciliation::Delivered { order_id } => json!({"orderId": order_id, "status": "DELIVERED"}),
            Reconciliation::Stale { order_id, error } => {
                json!({"orderId": order_id, "error": error.to_string(), "code": error.error_code()})
            }
        };
        let body = json!({
            "batchRecordId": outcome.batch_record_id,
            "netWeight": outcome.net_weight,
            "reconciliation": reconciliation,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Batch {} committed ({:.2} kg net).", outcome.batch_record_id, outcome.net_weight);
        match &outcome.reconciliation {
            Reconciliation::NotLinked => {}
            Reconciliation::Delivered { order_id } => {
                println!("Delivery order {} marked DELIVERED.", order_id);
            }
            Reconciliation::Stale { order_id, error } => {
                println!("Delivery order {} not updated: {}", order_id, error);
            }
        }
    }

    view.teardown();
    Ok(())
}

/// BATCHES: list committed inventory batches.
pub async fn batches(store: &dyn DocumentStore, app: &AppConfig, output_json: bool) -> Result<()> {
    let records = store.list_records(&app.receiving.batch_collection).await?;
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        match Batch::from_record(record) {
            Ok(batch) => rows.push((record.id.clone(), batch)),
            Err(e) => warn!("skipping unreadable batch {}: {}", record.id, e),
        }
    }

    if output_json {
        let body: Vec<_> = rows
            .iter()
            .map(|(id, batch)| json!({"id": id, "batch": batch}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No batches received.");
        return Ok(());
    }
    println!(
        "{:<36}  {:<12} {:<22} {:<10} {:<5} {:>8} {:>8} {:>8}",
        "ID", "BATCH", "FARM", "SPECIES", "FLUSH", "RAW", "SPOILED", "NET"
    );
    for (id, b) in &rows {
        println!(
            "{:<36}  {:<12} {:<22} {:<10} {:<5} {:>8.2} {:>8.2} {:>8.2}",
            id, b.batch_id, b.source_farm, b.species, b.flush_number, b.raw_weight, b.spoiled_weight, b.net_weight
        );
    }
    Ok(())
}
