use serde::{Deserialize, Serialize};

use crate::model::alert::{Alert, DEFAULT_FLUSH_NUMBER};

/// Batch id used when a prefill carries none.
pub const UNKNOWN_BATCH_ID: &str = "Unknown Batch";

/// Editable draft of a new batch, exactly as typed into the form.
///
/// Weights stay text until submit; see `service::intake` for parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeDraft {
    pub batch_id: String,
    pub entity_id: String,
    pub source_farm: String,
    pub species: String,
    pub flush_number: String,
    pub raw_weight: String,
    pub spoiled_weight: String,
    /// Delivery order this draft was prefilled from, if any.
    pub linked_alert_id: Option<String>,
}

impl Default for IntakeDraft {
    fn default() -> Self {
        Self {
            batch_id: String::new(),
            entity_id: String::new(),
            source_farm: String::new(),
            species: String::new(),
            flush_number: String::new(),
            raw_weight: String::new(),
            spoiled_weight: "0".to_string(),
            linked_alert_id: None,
        }
    }
}

impl IntakeDraft {
    /// Linked-mode draft mirroring `prefill`.
    pub fn from_prefill(prefill: &Prefill) -> Self {
        Self {
            batch_id: prefill
                .batch_id
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_BATCH_ID.to_string()),
            entity_id: prefill.entity_id.clone().unwrap_or_default(),
            source_farm: prefill.farm_name.clone(),
            species: prefill.species.clone().unwrap_or_default(),
            flush_number: prefill
                .flush_number
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_FLUSH_NUMBER.to_string()),
            // A zero estimate prefills nothing, like a missing one.
            raw_weight: prefill
                .estimated_weight_kg
                .filter(|w| w.is_finite() && *w != 0.0)
                .map(|w| w.to_string())
                .unwrap_or_default(),
            spoiled_weight: "0".to_string(),
            linked_alert_id: Some(prefill.id.clone()),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked_alert_id.is_some()
    }

    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::BatchId => &self.batch_id,
            DraftField::EntityId => &self.entity_id,
            DraftField::SourceFarm => &self.source_farm,
            DraftField::Species => &self.species,
            DraftField::FlushNumber => &self.flush_number,
            DraftField::RawWeight => &self.raw_weight,
            DraftField::SpoiledWeight => &self.spoiled_weight,
        }
    }

    pub(crate) fn slot(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::BatchId => &mut self.batch_id,
            DraftField::EntityId => &mut self.entity_id,
            DraftField::SourceFarm => &mut self.source_farm,
            DraftField::Species => &mut self.species,
            DraftField::FlushNumber => &mut self.flush_number,
            DraftField::RawWeight => &mut self.raw_weight,
            DraftField::SpoiledWeight => &mut self.spoiled_weight,
        }
    }
}

/// Editable draft fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    BatchId,
    EntityId,
    SourceFarm,
    Species,
    FlushNumber,
    RawWeight,
    SpoiledWeight,
}

impl DraftField {
    pub const ALL: [DraftField; 7] = [
        DraftField::BatchId,
        DraftField::EntityId,
        DraftField::SourceFarm,
        DraftField::Species,
        DraftField::FlushNumber,
        DraftField::RawWeight,
        DraftField::SpoiledWeight,
    ];

    /// Store-side field name.
    pub fn name(&self) -> &'static str {
        match self {
            DraftField::BatchId => "batchId",
            DraftField::EntityId => "entityId",
            DraftField::SourceFarm => "sourceFarm",
            DraftField::Species => "species",
            DraftField::FlushNumber => "flushNumber",
            DraftField::RawWeight => "rawWeight",
            DraftField::SpoiledWeight => "spoiledWeight",
        }
    }

    /// Only the two weights stay editable while a draft is linked.
    pub fn editable_when_linked(&self) -> bool {
        matches!(self, DraftField::RawWeight | DraftField::SpoiledWeight)
    }
}

/// Typed prefill payload: an alert as handed over by a hosting page.
///
/// Same field set as [`Alert`] minus the derived times; applying it
/// follows the same locking rules as selecting an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefill {
    pub id: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub farm_name: String,
    #[serde(default)]
    pub estimated_weight_kg: Option<f64>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub flush_number: Option<String>,
}

impl From<&Alert> for Prefill {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id.clone(),
            batch_id: alert.batch_id.clone(),
            entity_id: alert.entity_id.clone(),
            farm_name: alert.farm_name.clone(),
            estimated_weight_kg: alert.estimated_weight_kg,
            species: alert.species.clone(),
            flush_number: Some(alert.flush_number.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_default_shape() {
        let d = IntakeDraft::default();
        assert_eq!(d.spoiled_weight, "0");
        assert!(d.raw_weight.is_empty());
        assert!(!d.is_linked());
    }

    #[test]
    fn prefill_fills_gaps() {
        let p = Prefill {
            id: "o9".into(),
            batch_id: None,
            entity_id: None,
            farm_name: "Hilltop Myco".into(),
            estimated_weight_kg: None,
            species: None,
            flush_number: None,
        };
        let d = IntakeDraft::from_prefill(&p);
        assert_eq!(d.batch_id, "Unknown Batch");
        assert_eq!(d.flush_number, "1");
        assert_eq!(d.raw_weight, "");
        assert_eq!(d.spoiled_weight, "0");
        assert_eq!(d.linked_alert_id.as_deref(), Some("o9"));
    }

    #[test]
    fn whole_kilograms_render_without_decimals() {
        let p = Prefill {
            id: "o1".into(),
            batch_id: Some("B-77".into()),
            entity_id: Some("ent_001".into()),
            farm_name: "Green Spore Co-op".into(),
            estimated_weight_kg: Some(40.0),
            species: Some("Oyster".into()),
            flush_number: Some("2".into()),
        };
        assert_eq!(IntakeDraft::from_prefill(&p).raw_weight, "40");
    }

    #[test]
    fn zero_estimate_leaves_raw_weight_blank() {
        let p = Prefill {
            id: "o4".into(),
            batch_id: Some("B-4".into()),
            entity_id: None,
            farm_name: "Hilltop Myco".into(),
            estimated_weight_kg: Some(0.0),
            species: None,
            flush_number: None,
        };
        assert_eq!(IntakeDraft::from_prefill(&p).raw_weight, "");

        let negative_zero = Prefill {
            estimated_weight_kg: Some(-0.0),
            ..p
        };
        assert_eq!(IntakeDraft::from_prefill(&negative_zero).raw_weight, "");
    }

    #[test]
    fn prefill_accepts_partial_json() {
        let p: Prefill = serde_json::from_str(r#"{"id":"o3","farmName":"Hilltop Myco"}"#).unwrap();
        assert_eq!(p.farm_name, "Hilltop Myco");
        assert_eq!(p.batch_id, None);
    }
}
