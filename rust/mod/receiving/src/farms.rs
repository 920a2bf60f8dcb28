use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Known supplier farms.
///
/// - `known`: allow-list for manual intake (`sourceFarm` must be one of these).
/// - `fallback`: name used when an order carries neither a mapped entity nor a farm.
/// - `entities`: entity id → display name, consulted first when projecting alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmDirectory {
    pub known: Vec<String>,
    pub fallback: String,
    pub entities: BTreeMap<String, String>,
}

impl Default for FarmDirectory {
    fn default() -> Self {
        Self {
            known: vec![
                "Green Valley Farms".to_string(),
                "Hilltop Myco".to_string(),
                "Forest Floor Organics".to_string(),
            ],
            fallback: "MyceliumNexus Farm".to_string(),
            entities: BTreeMap::from([(
                "ent_001".to_string(),
                "Green Spore Co-op".to_string(),
            )]),
        }
    }
}

impl FarmDirectory {
    /// Whether `name` may be picked in manual mode.
    pub fn is_known(&self, name: &str) -> bool {
        self.known.iter().any(|k| k == name)
    }

    /// Resolve the farm shown for an order.
    pub fn display_name(&self, entity_id: Option<&str>, source_farm: Option<&str>) -> String {
        if let Some(name) = entity_id.and_then(|e| self.entities.get(e)) {
            return name.clone();
        }
        match source_farm {
            Some(farm) if !farm.trim().is_empty() => farm.to_string(),
            _ => self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_entity_wins_over_source_farm() {
        let farms = FarmDirectory::default();
        assert_eq!(
            farms.display_name(Some("ent_001"), Some("Somewhere Else")),
            "Green Spore Co-op"
        );
    }

    #[test]
    fn falls_back_to_source_farm_then_default() {
        let farms = FarmDirectory::default();
        assert_eq!(farms.display_name(Some("ent_999"), Some("Hilltop Myco")), "Hilltop Myco");
        assert_eq!(farms.display_name(None, Some("  ")), "MyceliumNexus Farm");
        assert_eq!(farms.display_name(None, None), "MyceliumNexus Farm");
    }

    #[test]
    fn allow_list() {
        let farms = FarmDirectory::default();
        assert!(farms.is_known("Hilltop Myco"));
        assert!(!farms.is_known("hilltop myco"));
        assert!(!farms.is_known(""));
    }
}
