pub mod mapping;
pub mod semantic_view;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::compiler::ViewTarget;
use crate::ir::OdlIr;
use crate::provider::{ProviderError, SchemaProvider};

pub use mapping::detect_mapping_drift;
pub use semantic_view::detect_semantic_view_drift;

/// Differences beyond this count add a summary "manual edit" event.
pub const DEFAULT_MANUAL_EDIT_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DriftEventType {
    ColumnMissing,
    ColumnRenamed,
    ColumnAdded,
    TableMissing,
    YamlDivergence,
    ManualEditDetected,
}

impl DriftEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnMissing => "column_missing",
            Self::ColumnRenamed => "column_renamed",
            Self::ColumnAdded => "column_added",
            Self::TableMissing => "table_missing",
            Self::YamlDivergence => "yaml_divergence",
            Self::ManualEditDetected => "manual_edit_detected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Mapping,
    SemanticView,
}

impl DriftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapping => "mapping",
            Self::SemanticView => "semantic_view",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftEvent {
    pub event_type: DriftEventType,
    pub drift_type: DriftType,
    pub element: String,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriftDetectionResult {
    pub ontology: String,
    pub events: Vec<DriftEvent>,
}

impl DriftDetectionResult {
    pub fn has_drift(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn count(&self, event_type: DriftEventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn of_type(&self, drift_type: DriftType) -> impl Iterator<Item = &DriftEvent> {
        self.events.iter().filter(move |e| e.drift_type == drift_type)
    }
}

#[derive(Debug, Clone)]
pub struct DriftOptions {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub semantic_view: Option<ViewTarget>,
    pub manual_edit_threshold: usize,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            database: None,
            schema: None,
            semantic_view: None,
            manual_edit_threshold: DEFAULT_MANUAL_EDIT_THRESHOLD,
        }
    }
}

/// Mapping drift, then semantic-view drift when a view target is given.
/// Drift is advisory; only provider failures are errors.
pub fn detect_drift(
    ir: &OdlIr,
    provider: &dyn SchemaProvider,
    options: &DriftOptions,
) -> Result<DriftDetectionResult, ProviderError> {
    let mut events = detect_mapping_drift(ir, provider, options)?;
    if let Some(target) = &options.semantic_view {
        events.extend(detect_semantic_view_drift(
            ir,
            provider,
            target,
            options.manual_edit_threshold,
        )?);
    }
    info!(
        ontology = %ir.name,
        provider = provider.name(),
        events = events.len(),
        "drift detection finished"
    );
    Ok(DriftDetectionResult {
        ontology: ir.name.clone(),
        events,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compiler::{compile_for_target, ViewTarget};
    use crate::normalizer::normalize;
    use crate::provider::MockProvider;

    #[test]
    fn combines_mapping_and_semantic_view_events() {
        let ir = normalize(&json!({
            "version": "1",
            "objects": [{"name": "Customer", "identifiers": ["id"], "properties": [
                {"name": "id", "type": "string"}, {"name": "email", "type": "string"}
            ]}],
            "snowflake": {"database": "DB", "schema": "S"}
        }));
        let target = ViewTarget {
            database: "DB".to_string(),
            schema: "S".to_string(),
            view_name: "v".to_string(),
        };
        let deployed = compile_for_target(&ir, &target, None).unwrap().yaml;
        let provider = MockProvider::new()
            .with_table("DB", "S", "customer", &[("ID", "VARCHAR"), ("EMAIL_ADDRESS", "VARCHAR")])
            .with_view("DB", "S", "v", &deployed);

        let result = detect_drift(
            &ir,
            &provider,
            &DriftOptions {
                semantic_view: Some(target),
                ..DriftOptions::default()
            },
        )
        .unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.count(DriftEventType::ColumnRenamed), 1);
        assert_eq!(result.of_type(DriftType::SemanticView).count(), 0);
    }

    #[test]
    fn provider_failure_propagates() {
        let ir = normalize(&json!({"version": "1", "objects": [{"name": "A"}],
            "snowflake": {"database": "DB", "schema": "S"}}));
        let err = detect_drift(&ir, &MockProvider::unavailable("offline"), &DriftOptions::default())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
