pub mod engine;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use engine::diff_ir;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    ObjectAdded,
    ObjectRemoved,
    ObjectDescriptionChanged,
    IdentifierAdded,
    IdentifierRemoved,
    IdentifierReplaced,
    PropertyAdded,
    PropertyRemoved,
    PropertyTypeChanged,
    PropertyDescriptionChanged,
    RelationshipAdded,
    RelationshipRemoved,
    RelationshipEndpointsChanged,
    RelationshipJoinKeysChanged,
    RelationshipCardinalityTightened,
    RelationshipCardinalityRelaxed,
    RelationshipDescriptionChanged,
    MetricAdded,
    MetricRemoved,
    MetricExpressionChanged,
    MetricGrainChanged,
    MetricDescriptionChanged,
    DimensionAdded,
    DimensionRemoved,
    DimensionDescriptionChanged,
}

impl ChangeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectAdded => "object_added",
            Self::ObjectRemoved => "object_removed",
            Self::ObjectDescriptionChanged => "object_description_changed",
            Self::IdentifierAdded => "identifier_added",
            Self::IdentifierRemoved => "identifier_removed",
            Self::IdentifierReplaced => "identifier_replaced",
            Self::PropertyAdded => "property_added",
            Self::PropertyRemoved => "property_removed",
            Self::PropertyTypeChanged => "property_type_changed",
            Self::PropertyDescriptionChanged => "property_description_changed",
            Self::RelationshipAdded => "relationship_added",
            Self::RelationshipRemoved => "relationship_removed",
            Self::RelationshipEndpointsChanged => "relationship_endpoints_changed",
            Self::RelationshipJoinKeysChanged => "relationship_join_keys_changed",
            Self::RelationshipCardinalityTightened => "relationship_cardinality_tightened",
            Self::RelationshipCardinalityRelaxed => "relationship_cardinality_relaxed",
            Self::RelationshipDescriptionChanged => "relationship_description_changed",
            Self::MetricAdded => "metric_added",
            Self::MetricRemoved => "metric_removed",
            Self::MetricExpressionChanged => "metric_expression_changed",
            Self::MetricGrainChanged => "metric_grain_changed",
            Self::MetricDescriptionChanged => "metric_description_changed",
            Self::DimensionAdded => "dimension_added",
            Self::DimensionRemoved => "dimension_removed",
            Self::DimensionDescriptionChanged => "dimension_description_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Breaking,
    NonBreaking,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub category: ChangeCategory,
    pub classification: Classification,
    pub element: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub details: Value,
}

impl Change {
    pub fn is_breaking(&self) -> bool {
        self.classification == Classification::Breaking
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiffSummary {
    pub breaking: usize,
    pub non_breaking: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiffResult {
    pub breaking_changes: Vec<Change>,
    pub non_breaking_changes: Vec<Change>,
    pub summary: DiffSummary,
}

impl DiffResult {
    pub fn push(&mut self, change: Change) {
        match change.classification {
            Classification::Breaking => self.breaking_changes.push(change),
            Classification::NonBreaking => self.non_breaking_changes.push(change),
        }
    }

    pub fn recompute_summary(&mut self) {
        self.summary = DiffSummary {
            breaking: self.breaking_changes.len(),
            non_breaking: self.non_breaking_changes.len(),
            total: self.breaking_changes.len() + self.non_breaking_changes.len(),
        };
    }

    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.breaking_changes.is_empty() && self.non_breaking_changes.is_empty()
    }

    pub fn all_changes(&self) -> impl Iterator<Item = &Change> {
        self.breaking_changes
            .iter()
            .chain(self.non_breaking_changes.iter())
    }

    pub fn find(&self, category: ChangeCategory, element: &str) -> Option<&Change> {
        self.all_changes()
            .find(|c| c.category == category && c.element == element)
    }
}
