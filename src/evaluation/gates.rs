//! Individual gate checks. Each returns a raw [`GateOutcome`]; the engine
//! applies thresholds afterwards.

use serde_json::{json, Value};

use crate::compiler::{self, CompileOptions};
use crate::evaluation::graph::{JoinGraph, MAX_PATH_DEPTH};
use crate::ir::OdlIr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub outcome: Outcome,
    pub message: String,
    pub details: Value,
}

impl GateOutcome {
    fn pass(message: impl Into<String>, details: Value) -> Self {
        Self {
            outcome: Outcome::Pass,
            message: message.into(),
            details,
        }
    }

    fn fail(message: impl Into<String>, details: Value) -> Self {
        Self {
            outcome: Outcome::Fail,
            message: message.into(),
            details,
        }
    }

    fn warning(message: impl Into<String>, details: Value) -> Self {
        Self {
            outcome: Outcome::Warning,
            message: message.into(),
            details,
        }
    }
}

pub fn odl_valid(ir: &OdlIr) -> GateOutcome {
    GateOutcome::pass(
        format!("IR produced for ontology '{}' version {}", ir.name, ir.version),
        json!({
            "objects": ir.objects.len(),
            "relationships": ir.relationships.len(),
            "metrics": ir.metrics.len(),
            "dimensions": ir.dimensions.len(),
        }),
    )
}

pub fn no_unresolved_references(ir: &OdlIr) -> GateOutcome {
    let mut unresolved = Vec::new();

    for rel in &ir.relationships {
        for (side, object) in [("from", &rel.from), ("to", &rel.to)] {
            if ir.object(object).is_none() {
                unresolved.push(format!(
                    "relationship '{}' {side} object '{object}'",
                    rel.name
                ));
            }
        }
    }
    for metric in &ir.metrics {
        for object in &metric.grain {
            if ir.object(object).is_none() {
                unresolved.push(format!("metric '{}' grain object '{object}'", metric.name));
            }
        }
    }
    for dim in &ir.dimensions {
        match dim.source_parts() {
            Some((object, property)) => match ir.object(object) {
                None => unresolved.push(format!("dimension '{}' object '{object}'", dim.name)),
                Some(o) if !o.has_property(property) => unresolved.push(format!(
                    "dimension '{}' property '{object}.{property}'",
                    dim.name
                )),
                Some(_) => {}
            },
            None => unresolved.push(format!(
                "dimension '{}' source '{}'",
                dim.name, dim.source_property
            )),
        }
    }

    if unresolved.is_empty() {
        GateOutcome::pass("all references resolve", json!({}))
    } else {
        GateOutcome::fail(
            format!("{} unresolved reference(s)", unresolved.len()),
            json!({ "unresolved": unresolved }),
        )
    }
}

/// With a mapping block every object resolves, falling back to its
/// lowercased name. Without one, objects that rely on that fallback are a
/// warning because nothing confirms the table exists.
pub fn mapping_complete(ir: &OdlIr) -> GateOutcome {
    let tables: Vec<Value> = ir
        .objects
        .iter()
        .map(|o| json!({ "object": o.name, "table": ir.physical_table(o) }))
        .collect();

    if ir.snowflake.is_some() {
        return GateOutcome::pass(
            "every object resolves to a physical table",
            json!({ "tables": tables }),
        );
    }

    let defaulted: Vec<&str> = ir
        .objects
        .iter()
        .filter(|o| o.table.as_deref().map_or(true, |t| t.trim().is_empty()))
        .map(|o| o.name.as_str())
        .collect();
    if defaulted.is_empty() {
        GateOutcome::pass(
            "every object declares an explicit table",
            json!({ "tables": tables }),
        )
    } else {
        GateOutcome::warning(
            format!(
                "no mapping block; {} object(s) default to their lowercased name",
                defaulted.len()
            ),
            json!({ "defaulted": defaulted, "tables": tables }),
        )
    }
}

pub fn connected_join_graph(ir: &OdlIr) -> GateOutcome {
    if ir.objects.is_empty() {
        return GateOutcome::pass("no objects declared", json!({ "components": 0 }));
    }
    let graph = JoinGraph::from_ir(ir);

    if ir.relationships.is_empty() {
        let names: Vec<&str> = ir.object_names();
        return GateOutcome::fail(
            "no relationships declared; every object is disconnected",
            json!({ "components": names.len(), "disconnected": names }),
        );
    }

    let components = graph.connected_components();
    if components.len() <= 1 {
        return GateOutcome::pass(
            format!("all {} object(s) form one join graph", graph.node_count()),
            json!({ "components": 1 }),
        );
    }

    let largest = components.iter().map(Vec::len).max().unwrap_or(0);
    let disconnected: Vec<&Vec<String>> =
        components.iter().filter(|c| c.len() < largest).collect();
    GateOutcome::fail(
        format!(
            "join graph has {} components; disconnected: {}",
            components.len(),
            disconnected
                .iter()
                .map(|c| c.join(", "))
                .collect::<Vec<_>>()
                .join(" | ")
        ),
        json!({ "components": components.len(), "disconnected": disconnected }),
    )
}

/// Join-key mismatches are reported first; paths are only searched once
/// every relationship's keys exist on its endpoints.
pub fn no_ambiguous_join_paths(ir: &OdlIr) -> GateOutcome {
    let mismatches = join_key_mismatches(ir);
    if !mismatches.is_empty() {
        return GateOutcome::fail(
            format!("{} join key(s) missing on their endpoint", mismatches.len()),
            json!({ "join_key_mismatches": mismatches }),
        );
    }

    let ambiguous = JoinGraph::from_ir(ir).ambiguous_pairs(MAX_PATH_DEPTH);
    if ambiguous.is_empty() {
        GateOutcome::pass(
            "every object pair has at most one join path",
            json!({ "max_depth": MAX_PATH_DEPTH }),
        )
    } else {
        let summary = ambiguous
            .iter()
            .map(|p| format!("{}-{} ({} paths)", p.from, p.to, p.path_count))
            .collect::<Vec<_>>()
            .join(", ");
        GateOutcome::fail(
            format!("ambiguous join paths: {summary}"),
            json!({ "max_depth": MAX_PATH_DEPTH, "ambiguous": ambiguous }),
        )
    }
}

fn join_key_mismatches(ir: &OdlIr) -> Vec<Value> {
    let mut mismatches = Vec::new();
    for rel in &ir.relationships {
        let (Some(from), Some(to)) = (ir.object(&rel.from), ir.object(&rel.to)) else {
            continue;
        };
        for (left, right) in &rel.join_keys {
            for (object, property) in [(from, left), (to, right)] {
                if !object.has_property(property) {
                    mismatches.push(json!({
                        "relationship": rel.name,
                        "object": object.name,
                        "property": property,
                    }));
                }
            }
        }
    }
    mismatches
}

pub fn metric_grain_consistency(ir: &OdlIr) -> GateOutcome {
    let mut violations = Vec::new();
    for metric in &ir.metrics {
        if metric.grain.is_empty() {
            violations.push(json!({ "metric": metric.name, "reason": "empty grain" }));
            continue;
        }
        for object in &metric.grain {
            if ir.object(object).is_none() {
                violations.push(json!({
                    "metric": metric.name,
                    "reason": format!("unknown grain object '{object}'"),
                }));
            }
        }
    }

    if violations.is_empty() {
        GateOutcome::pass(
            format!("{} metric grain(s) consistent", ir.metrics.len()),
            json!({}),
        )
    } else {
        GateOutcome::fail(
            format!("{} metric grain violation(s)", violations.len()),
            json!({ "violations": violations }),
        )
    }
}

pub fn yaml_verify_passes(ir: &OdlIr, options: &CompileOptions) -> GateOutcome {
    match compiler::compile_model(ir, options) {
        Ok(compiled) if compiled.verify_sql.contains("verify_only => TRUE") => GateOutcome::pass(
            format!("verify script rendered for {}", compiled.target.qualified_view()),
            json!({ "target": compiled.target.qualified_view(), "yaml_bytes": compiled.yaml.len() }),
        ),
        Ok(compiled) => GateOutcome::fail(
            "compiled output has no dry-run verify call",
            json!({ "target": compiled.target.qualified_view() }),
        ),
        Err(err) => GateOutcome::fail(
            format!("compilation failed: {err}"),
            json!({ "error": err.to_string() }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::normalizer::normalize;

    fn base() -> Value {
        json!({
            "version": "1.0.0",
            "objects": [
                {"name": "Order", "identifiers": ["id"], "properties": [
                    {"name": "id"}, {"name": "customer_id"}
                ]},
                {"name": "Customer", "identifiers": ["id"], "properties": [{"name": "id"}]}
            ],
            "relationships": [
                {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"]]}
            ],
            "snowflake": {"database": "TEST_DB", "schema": "PUBLIC"}
        })
    }

    #[test]
    fn valid_document_passes_structural_and_semantic_gates() {
        let ir = normalize(&base());
        assert_eq!(no_unresolved_references(&ir).outcome, Outcome::Pass);
        assert_eq!(mapping_complete(&ir).outcome, Outcome::Pass);
        assert_eq!(connected_join_graph(&ir).outcome, Outcome::Pass);
        assert_eq!(no_ambiguous_join_paths(&ir).outcome, Outcome::Pass);
        assert_eq!(metric_grain_consistency(&ir).outcome, Outcome::Pass);
        assert_eq!(
            yaml_verify_passes(&ir, &CompileOptions::default()).outcome,
            Outcome::Pass
        );
    }

    #[test]
    fn no_relationships_means_everything_disconnected() {
        let ir = normalize(&json!({
            "version": "1",
            "objects": [{"name": "A"}, {"name": "B"}, {"name": "C"}]
        }));
        let outcome = connected_join_graph(&ir);
        assert_eq!(outcome.outcome, Outcome::Fail);
        assert_eq!(outcome.details["disconnected"], json!(["A", "B", "C"]));
    }

    #[test]
    fn smaller_components_are_named() {
        let ir = normalize(&json!({
            "version": "1",
            "objects": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
            "relationships": [{"name": "ab", "from": "A", "to": "B", "joinKeys": []}]
        }));
        let outcome = connected_join_graph(&ir);
        assert_eq!(outcome.outcome, Outcome::Fail);
        assert_eq!(outcome.details["disconnected"], json!([["C"]]));
    }

    #[test]
    fn join_key_mismatch_reported_before_path_search() {
        let mut doc = base();
        doc["relationships"][0]["joinKeys"] = json!([["cust_id", "id"]]);
        let outcome = no_ambiguous_join_paths(&normalize(&doc));
        assert_eq!(outcome.outcome, Outcome::Fail);
        assert_eq!(outcome.details["join_key_mismatches"][0]["property"], "cust_id");
        assert!(outcome.details.get("ambiguous").is_none());
    }

    #[test]
    fn unmapped_objects_warn() {
        let mut doc = base();
        doc.as_object_mut().unwrap().remove("snowflake");
        doc["objects"][0]["table"] = json!("FACT_ORDERS");
        let outcome = mapping_complete(&normalize(&doc));
        assert_eq!(outcome.outcome, Outcome::Warning);
        assert_eq!(outcome.details["defaulted"], json!(["Customer"]));
    }

    #[test]
    fn grain_violations() {
        let mut doc = base();
        doc["metrics"] = json!([
            {"name": "orders", "expression": "COUNT(*)", "grain": []},
            {"name": "ghosts", "expression": "COUNT(*)", "grain": ["Ghost"]}
        ]);
        let ir = normalize(&doc);
        let outcome = metric_grain_consistency(&ir);
        assert_eq!(outcome.outcome, Outcome::Fail);
        assert_eq!(outcome.details["violations"].as_array().unwrap().len(), 2);
        assert_eq!(no_unresolved_references(&ir).outcome, Outcome::Fail);
    }

    #[test]
    fn compile_failure_fails_yaml_gate() {
        let mut doc = base();
        doc.as_object_mut().unwrap().remove("snowflake");
        let outcome = yaml_verify_passes(&normalize(&doc), &CompileOptions::default());
        assert_eq!(outcome.outcome, Outcome::Fail);
        assert!(outcome.message.contains("compilation failed"));
    }
}
