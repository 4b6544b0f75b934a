use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, warn};

use crate::compiler::semantic_model::{self, RelationshipColumn, SemanticModel};
use crate::compiler::{compile_for_target, ViewTarget};
use crate::drift::{DriftEvent, DriftEventType, DriftType};
use crate::ir::OdlIr;
use crate::provider::{ProviderError, SchemaProvider};

fn event(event_type: DriftEventType, element: String, message: String, details: serde_json::Value) -> DriftEvent {
    DriftEvent {
        event_type,
        drift_type: DriftType::SemanticView,
        element,
        message,
        details,
    }
}

/// Compares a fresh compilation of `ir` with the deployed view. Anything
/// missing from the deployed side is divergence; anything extra or
/// different there is treated as a manual edit.
pub fn detect_semantic_view_drift(
    ir: &OdlIr,
    provider: &dyn SchemaProvider,
    target: &ViewTarget,
    manual_edit_threshold: usize,
) -> Result<Vec<DriftEvent>, ProviderError> {
    let view = target.qualified_view();
    let expected = match compile_for_target(ir, target, None) {
        Ok(compiled) => compiled,
        Err(err) => {
            warn!(view = %view, error = %err, "could not compile expected semantic view");
            return Ok(vec![event(
                DriftEventType::YamlDivergence,
                target.view_name.clone(),
                format!("Could not compile expected semantic view {view}: {err}"),
                json!({ "error": err.to_string() }),
            )]);
        }
    };

    let Some(deployed) =
        provider.get_semantic_view_yaml(&target.database, &target.schema, &target.view_name)?
    else {
        return Ok(vec![event(
            DriftEventType::YamlDivergence,
            target.view_name.clone(),
            format!("Semantic view {view} is not deployed"),
            json!({ "deployed": false }),
        )]);
    };

    let deployed_model = match semantic_model::parse_yaml(&deployed.yaml_content) {
        Ok(model) => model,
        Err(err) => {
            return Ok(vec![event(
                DriftEventType::YamlDivergence,
                target.view_name.clone(),
                format!("Deployed definition of {view} is not a readable semantic model: {err}"),
                json!({ "error": err.to_string() }),
            )]);
        }
    };

    let mut events = compare_models(&expected.model, &deployed_model);
    debug!(view = %view, events = events.len(), "semantic view compared");

    let differences = events.len();
    if differences > manual_edit_threshold {
        events.push(event(
            DriftEventType::ManualEditDetected,
            target.view_name.clone(),
            format!(
                "Deployed semantic view {view} diverges significantly ({differences} differences)"
            ),
            json!({
                "differences": differences,
                "threshold": manual_edit_threshold,
                "diff": textual_diff(&expected.yaml, &deployed.yaml_content),
            }),
        ));
    }
    Ok(events)
}

pub fn compare_models(expected: &SemanticModel, deployed: &SemanticModel) -> Vec<DriftEvent> {
    let mut events = Vec::new();

    let old_tables: BTreeMap<&str, _> = expected.tables.iter().map(|t| (t.name.as_str(), t)).collect();
    let new_tables: BTreeMap<&str, _> = deployed.tables.iter().map(|t| (t.name.as_str(), t)).collect();
    for name in union(&old_tables, &new_tables) {
        match (old_tables.get(name), new_tables.get(name)) {
            (Some(_), None) => events.push(event(
                DriftEventType::YamlDivergence,
                format!("table:{name}"),
                format!("Logical table '{name}' is missing from the deployed view"),
                json!({ "kind": "table" }),
            )),
            (None, Some(_)) => events.push(event(
                DriftEventType::ManualEditDetected,
                format!("table:{name}"),
                format!("Logical table '{name}' exists only in the deployed view"),
                json!({ "kind": "table" }),
            )),
            (Some(exp), Some(dep)) if exp.base_table != dep.base_table => events.push(event(
                DriftEventType::ManualEditDetected,
                format!("table:{name}"),
                format!("Logical table '{name}' points at a different base table"),
                json!({ "expected": exp.base_table, "deployed": dep.base_table }),
            )),
            _ => {}
        }
    }

    let old_rels: BTreeMap<&str, _> = expected
        .relationships
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    let new_rels: BTreeMap<&str, _> = deployed
        .relationships
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    for name in union(&old_rels, &new_rels) {
        match (old_rels.get(name), new_rels.get(name)) {
            (Some(_), None) => events.push(event(
                DriftEventType::YamlDivergence,
                format!("relationship:{name}"),
                format!("Relationship '{name}' is missing from the deployed view"),
                json!({ "kind": "relationship" }),
            )),
            (None, Some(_)) => events.push(event(
                DriftEventType::ManualEditDetected,
                format!("relationship:{name}"),
                format!("Relationship '{name}' exists only in the deployed view"),
                json!({ "kind": "relationship" }),
            )),
            (Some(exp), Some(dep)) => {
                let exp_keys: BTreeSet<&RelationshipColumn> = exp.relationship_columns.iter().collect();
                let dep_keys: BTreeSet<&RelationshipColumn> = dep.relationship_columns.iter().collect();
                if exp_keys != dep_keys {
                    events.push(event(
                        DriftEventType::ManualEditDetected,
                        format!("relationship:{name}"),
                        format!("Relationship '{name}' joins on different columns when deployed"),
                        json!({
                            "expected": exp.relationship_columns,
                            "deployed": dep.relationship_columns,
                        }),
                    ));
                }
            }
            (None, None) => {}
        }
    }

    let old_facts: BTreeMap<&str, _> = expected.facts.iter().map(|f| (f.name.as_str(), f)).collect();
    let new_facts: BTreeMap<&str, _> = deployed.facts.iter().map(|f| (f.name.as_str(), f)).collect();
    for name in union(&old_facts, &new_facts) {
        match (old_facts.get(name), new_facts.get(name)) {
            (Some(_), None) => events.push(event(
                DriftEventType::YamlDivergence,
                format!("fact:{name}"),
                format!("Fact '{name}' is missing from the deployed view"),
                json!({ "kind": "fact" }),
            )),
            (None, Some(_)) => events.push(event(
                DriftEventType::ManualEditDetected,
                format!("fact:{name}"),
                format!("Fact '{name}' exists only in the deployed view"),
                json!({ "kind": "fact" }),
            )),
            (Some(exp), Some(dep)) if exp.expr.trim() != dep.expr.trim() => events.push(event(
                DriftEventType::ManualEditDetected,
                format!("fact:{name}"),
                format!("Fact '{name}' has a different expression when deployed"),
                json!({ "expected": exp.expr, "deployed": dep.expr }),
            )),
            _ => {}
        }
    }

    events
}

fn union<'a, V>(old: &BTreeMap<&'a str, V>, new: &BTreeMap<&'a str, V>) -> BTreeSet<&'a str> {
    old.keys().chain(new.keys()).copied().collect()
}

pub fn textual_diff(expected: &str, deployed: &str) -> String {
    let diff = TextDiff::from_lines(expected, deployed);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let symbol = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        out.push_str(symbol);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}
