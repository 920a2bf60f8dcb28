use mycoerp_core::ServiceError;
use mycoerp_docstore::{Document, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Batch: one received lot of raw material, as committed to inventory.
///
/// `net_weight` is computed once by [`Batch::new`] and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub source_farm: String,
    pub raw_weight: f64,
    pub spoiled_weight: f64,
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub flush_number: String,
    #[serde(default)]
    pub net_weight: f64,
}

impl Batch {
    pub fn new(
        source_farm: impl Into<String>,
        raw_weight: f64,
        spoiled_weight: f64,
        batch_id: impl Into<String>,
        species: impl Into<String>,
        flush_number: impl Into<String>,
    ) -> Self {
        Self {
            source_farm: source_farm.into(),
            raw_weight,
            spoiled_weight,
            batch_id: batch_id.into(),
            species: species.into(),
            flush_number: flush_number.into(),
            net_weight: raw_weight - spoiled_weight,
        }
    }

    /// Document body for the inventory collection.
    pub fn to_fields(&self) -> Result<Document, ServiceError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ServiceError::Internal("batch did not encode to an object".into())),
            Err(e) => Err(ServiceError::Internal(format!("serialize batch: {}", e))),
        }
    }

    /// Read a committed batch back from the inventory collection.
    pub fn from_record(record: &Record) -> Result<Self, ServiceError> {
        serde_json::from_value(Value::Object(record.fields.clone())).map_err(|e| {
            ServiceError::Internal(format!("deserialize batch {}: {}", record.id, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_weight_fixed_at_construction() {
        let b = Batch::new("Hilltop Myco", 12.0, 1.5, "", "", "");
        assert_eq!(b.net_weight, 10.5);
    }

    #[test]
    fn fields_use_store_names() {
        let b = Batch::new("Green Spore Co-op", 38.5, 0.0, "B-77", "Oyster", "2");
        let f = b.to_fields().unwrap();
        assert_eq!(f["sourceFarm"], "Green Spore Co-op");
        assert_eq!(f["rawWeight"], 38.5);
        assert_eq!(f["spoiledWeight"], 0.0);
        assert_eq!(f["batchId"], "B-77");
        assert_eq!(f["flushNumber"], "2");
        assert_eq!(f["netWeight"], 38.5);
    }

    #[test]
    fn reads_record_with_store_stamps() {
        let b = Batch::new("Hilltop Myco", 5.0, 1.0, "X", "Shiitake", "1");
        let mut fields = b.to_fields().unwrap();
        fields.insert("createdAt".into(), serde_json::json!("2025-03-01T08:00:00Z"));
        let back = Batch::from_record(&Record { id: "r1".into(), fields }).unwrap();
        assert_eq!(back, b);
    }
}
