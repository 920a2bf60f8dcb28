use mycoerp_docstore::{Document, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delivery order lifecycle. `InTransit → Delivered` is the only
/// transition this module performs, and it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    InTransit,
    Delivered,
    /// Any status this module does not act on.
    #[serde(other)]
    Unknown,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IN_TRANSIT" => DeliveryStatus::InTransit,
            "DELIVERED" => DeliveryStatus::Delivered,
            _ => DeliveryStatus::Unknown,
        }
    }
}

/// DeliveryOrder: a shipment from a farm to the facility.
///
/// Owned by the store. Fields are read leniently: numbers where text is
/// expected are stringified, numeric strings are accepted as numbers, and
/// anything unusable becomes `None`. `createdAt` is kept raw (native
/// timestamp object or string) and normalized by the time window code.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOrder {
    #[serde(skip)]
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_farm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_number: Option<String>,

    /// Expected weight in kilograms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_yield: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,

    pub status: DeliveryStatus,
}

impl DeliveryOrder {
    /// Read an order out of a store record. Never fails.
    pub fn from_record(record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id: record.id.clone(),
            batch_id: text(f, "batchId"),
            entity_id: text(f, "entityId"),
            source_farm: text(f, "sourceFarm"),
            species: text(f, "species"),
            flush_number: text(f, "flushNumber"),
            estimated_yield: number(f, "estimatedYield"),
            created_at: f.get("createdAt").filter(|v| !v.is_null()).cloned(),
            status: f
                .get("status")
                .and_then(Value::as_str)
                .map(DeliveryStatus::parse)
                .unwrap_or(DeliveryStatus::Unknown),
        }
    }

    /// Document body for `create_record`.
    pub fn to_fields(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        }
    }
}

/// Non-empty text, or a number rendered as text.
fn text(fields: &Document, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A finite number, or a string that parses as one.
fn number(fields: &Document, key: &str) -> Option<f64> {
    let value = match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        Record {
            id: "ord1".into(),
            fields: v.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn reads_full_order() {
        let o = DeliveryOrder::from_record(&record(json!({
            "batchId": "B-77",
            "entityId": "ent_001",
            "species": "Oyster",
            "flushNumber": "2",
            "estimatedYield": 40,
            "createdAt": "2025-03-01T08:00:00Z",
            "status": "IN_TRANSIT"
        })));
        assert_eq!(o.id, "ord1");
        assert_eq!(o.batch_id.as_deref(), Some("B-77"));
        assert_eq!(o.flush_number.as_deref(), Some("2"));
        assert_eq!(o.estimated_yield, Some(40.0));
        assert_eq!(o.status, DeliveryStatus::InTransit);
        assert_eq!(o.source_farm, None);
    }

    #[test]
    fn lenient_field_types() {
        let o = DeliveryOrder::from_record(&record(json!({
            "batchId": "",
            "flushNumber": 3,
            "estimatedYield": "12.5",
            "species": null,
            "status": "LOST"
        })));
        assert_eq!(o.batch_id, None);
        assert_eq!(o.flush_number.as_deref(), Some("3"));
        assert_eq!(o.estimated_yield, Some(12.5));
        assert_eq!(o.species, None);
        assert_eq!(o.status, DeliveryStatus::Unknown);
        assert_eq!(o.created_at, None);
    }

    #[test]
    fn to_fields_uses_store_names() {
        let o = DeliveryOrder {
            batch_id: Some("B-1".into()),
            estimated_yield: Some(10.0),
            ..Default::default()
        };
        let f = o.to_fields();
        assert_eq!(f["batchId"], "B-1");
        assert_eq!(f["status"], "IN_TRANSIT");
        assert!(f.get("species").is_none());
        assert!(f.get("id").is_none());
    }
}
