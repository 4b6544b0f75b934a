use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use tracing::debug;

use crate::diff::Classification::{Breaking, NonBreaking};
use crate::diff::{Change, ChangeCategory, Classification, DiffResult};
use crate::ir::{DimensionIr, MetricIr, ObjectIr, OdlIr, RelationshipIr};

pub fn diff_ir(old: &OdlIr, new: &OdlIr) -> DiffResult {
    let mut result = DiffResult::default();

    diff_objects(old, new, &mut result);
    diff_relationships(old, new, &mut result);
    diff_metrics(old, new, &mut result);
    diff_dimensions(old, new, &mut result);

    result.recompute_summary();
    debug!(
        breaking = result.summary.breaking,
        non_breaking = result.summary.non_breaking,
        "diffed IR versions"
    );
    result
}

fn change(
    category: ChangeCategory,
    classification: Classification,
    element: impl Into<String>,
    old_value: Option<Value>,
    new_value: Option<Value>,
) -> Change {
    Change {
        category,
        classification,
        element: element.into(),
        old_value,
        new_value,
        details: Value::Object(Default::default()),
    }
}

/// First occurrence wins when a name is duplicated.
fn index_by_name<'a, T>(
    items: &'a [T],
    name: impl Fn(&'a T) -> &'a str,
) -> BTreeMap<&'a str, &'a T> {
    let mut map = BTreeMap::new();
    for item in items {
        map.entry(name(item)).or_insert(item);
    }
    map
}

fn union_names<'a, T, U>(a: &BTreeMap<&'a str, T>, b: &BTreeMap<&'a str, U>) -> BTreeSet<&'a str> {
    a.keys().chain(b.keys()).copied().collect()
}

fn diff_objects(old: &OdlIr, new: &OdlIr, result: &mut DiffResult) {
    let old_map = index_by_name(&old.objects, |o| o.name.as_str());
    let new_map = index_by_name(&new.objects, |o| o.name.as_str());

    for name in union_names(&old_map, &new_map) {
        match (old_map.get(name), new_map.get(name)) {
            (None, Some(_)) => result.push(change(
                ChangeCategory::ObjectAdded,
                NonBreaking,
                name,
                None,
                Some(json!(name)),
            )),
            (Some(_), None) => result.push(change(
                ChangeCategory::ObjectRemoved,
                Breaking,
                name,
                Some(json!(name)),
                None,
            )),
            (Some(old_obj), Some(new_obj)) => {
                if old_obj.description != new_obj.description {
                    result.push(change(
                        ChangeCategory::ObjectDescriptionChanged,
                        NonBreaking,
                        name,
                        Some(json!(old_obj.description)),
                        Some(json!(new_obj.description)),
                    ));
                }
                diff_identifiers(old_obj, new_obj, result);
                diff_properties(old_obj, new_obj, result);
            }
            (None, None) => {}
        }
    }
}

fn diff_identifiers(old: &ObjectIr, new: &ObjectIr, result: &mut DiffResult) {
    let old_ids: BTreeSet<&str> = old.identifiers.iter().map(String::as_str).collect();
    let new_ids: BTreeSet<&str> = new.identifiers.iter().map(String::as_str).collect();
    if old_ids == new_ids {
        return;
    }
    let removed: Vec<&str> = old_ids.difference(&new_ids).copied().collect();
    let added: Vec<&str> = new_ids.difference(&old_ids).copied().collect();
    let retained = old_ids.intersection(&new_ids).count();

    if !old_ids.is_empty() && !new_ids.is_empty() && retained == 0 {
        let mut replaced = change(
            ChangeCategory::IdentifierReplaced,
            Breaking,
            &old.name,
            Some(json!(old.identifiers)),
            Some(json!(new.identifiers)),
        );
        replaced.details = json!({"removed": removed, "added": added});
        result.push(replaced);
        return;
    }

    for id in removed {
        result.push(change(
            ChangeCategory::IdentifierRemoved,
            Breaking,
            format!("{}.{id}", old.name),
            Some(json!(id)),
            None,
        ));
    }
    for id in added {
        result.push(change(
            ChangeCategory::IdentifierAdded,
            NonBreaking,
            format!("{}.{id}", new.name),
            None,
            Some(json!(id)),
        ));
    }
}

fn diff_properties(old: &ObjectIr, new: &ObjectIr, result: &mut DiffResult) {
    let old_map = index_by_name(&old.properties, |p| p.name.as_str());
    let new_map = index_by_name(&new.properties, |p| p.name.as_str());

    for name in union_names(&old_map, &new_map) {
        let element = format!("{}.{name}", new.name);
        match (old_map.get(name), new_map.get(name)) {
            (None, Some(p)) => result.push(change(
                ChangeCategory::PropertyAdded,
                NonBreaking,
                element,
                None,
                Some(json!(p.property_type)),
            )),
            (Some(p), None) => result.push(change(
                ChangeCategory::PropertyRemoved,
                Breaking,
                element,
                Some(json!(p.property_type)),
                None,
            )),
            (Some(old_p), Some(new_p)) => {
                if old_p.property_type != new_p.property_type {
                    result.push(change(
                        ChangeCategory::PropertyTypeChanged,
                        Breaking,
                        element.clone(),
                        Some(json!(old_p.property_type)),
                        Some(json!(new_p.property_type)),
                    ));
                }
                if old_p.description != new_p.description {
                    result.push(change(
                        ChangeCategory::PropertyDescriptionChanged,
                        NonBreaking,
                        element,
                        Some(json!(old_p.description)),
                        Some(json!(new_p.description)),
                    ));
                }
            }
            (None, None) => {}
        }
    }
}

fn diff_relationships(old: &OdlIr, new: &OdlIr, result: &mut DiffResult) {
    let old_map = index_by_name(&old.relationships, |r| r.name.as_str());
    let new_map = index_by_name(&new.relationships, |r| r.name.as_str());

    for name in union_names(&old_map, &new_map) {
        match (old_map.get(name), new_map.get(name)) {
            (None, Some(r)) => result.push(change(
                ChangeCategory::RelationshipAdded,
                NonBreaking,
                name,
                None,
                Some(json!(format!("{} -> {}", r.from, r.to))),
            )),
            (Some(r), None) => result.push(change(
                ChangeCategory::RelationshipRemoved,
                Breaking,
                name,
                Some(json!(format!("{} -> {}", r.from, r.to))),
                None,
            )),
            (Some(old_r), Some(new_r)) => diff_relationship_pair(name, old_r, new_r, result),
            (None, None) => {}
        }
    }
}

fn diff_relationship_pair(
    name: &str,
    old: &RelationshipIr,
    new: &RelationshipIr,
    result: &mut DiffResult,
) {
    if old.from != new.from || old.to != new.to {
        result.push(change(
            ChangeCategory::RelationshipEndpointsChanged,
            Breaking,
            name,
            Some(json!([old.from, old.to])),
            Some(json!([new.from, new.to])),
        ));
    }

    let old_keys: BTreeSet<&(String, String)> = old.join_keys.iter().collect();
    let new_keys: BTreeSet<&(String, String)> = new.join_keys.iter().collect();
    if old_keys != new_keys {
        result.push(change(
            ChangeCategory::RelationshipJoinKeysChanged,
            Breaking,
            name,
            Some(json!(old.join_keys)),
            Some(json!(new.join_keys)),
        ));
    }

    let (old_rank, new_rank) = (old.cardinality.rank(), new.cardinality.rank());
    if new_rank != old_rank {
        let (category, classification) = if new_rank > old_rank {
            (ChangeCategory::RelationshipCardinalityTightened, Breaking)
        } else {
            (ChangeCategory::RelationshipCardinalityRelaxed, NonBreaking)
        };
        result.push(change(
            category,
            classification,
            name,
            Some(json!(old.cardinality)),
            Some(json!(new.cardinality)),
        ));
    }

    if old.description != new.description {
        result.push(change(
            ChangeCategory::RelationshipDescriptionChanged,
            NonBreaking,
            name,
            Some(json!(old.description)),
            Some(json!(new.description)),
        ));
    }
}

fn diff_metrics(old: &OdlIr, new: &OdlIr, result: &mut DiffResult) {
    let old_map = index_by_name(&old.metrics, |m| m.name.as_str());
    let new_map = index_by_name(&new.metrics, |m| m.name.as_str());

    for name in union_names(&old_map, &new_map) {
        match (old_map.get(name), new_map.get(name)) {
            (None, Some(m)) => result.push(change(
                ChangeCategory::MetricAdded,
                NonBreaking,
                name,
                None,
                Some(json!(m.expression)),
            )),
            (Some(m), None) => result.push(change(
                ChangeCategory::MetricRemoved,
                Breaking,
                name,
                Some(json!(m.expression)),
                None,
            )),
            (Some(old_m), Some(new_m)) => diff_metric_pair(name, old_m, new_m, result),
            (None, None) => {}
        }
    }
}

fn diff_metric_pair(name: &str, old: &MetricIr, new: &MetricIr, result: &mut DiffResult) {
    if old.expression != new.expression {
        result.push(change(
            ChangeCategory::MetricExpressionChanged,
            Breaking,
            name,
            Some(json!(old.expression)),
            Some(json!(new.expression)),
        ));
    }
    let old_grain: BTreeSet<&str> = old.grain.iter().map(String::as_str).collect();
    let new_grain: BTreeSet<&str> = new.grain.iter().map(String::as_str).collect();
    if old_grain != new_grain {
        result.push(change(
            ChangeCategory::MetricGrainChanged,
            Breaking,
            name,
            Some(json!(old.grain)),
            Some(json!(new.grain)),
        ));
    }
    if old.description != new.description {
        result.push(change(
            ChangeCategory::MetricDescriptionChanged,
            NonBreaking,
            name,
            Some(json!(old.description)),
            Some(json!(new.description)),
        ));
    }
}

fn diff_dimensions(old: &OdlIr, new: &OdlIr, result: &mut DiffResult) {
    let old_map = index_by_name(&old.dimensions, |d| d.name.as_str());
    let new_map = index_by_name(&new.dimensions, |d| d.name.as_str());

    for name in union_names(&old_map, &new_map) {
        match (old_map.get(name), new_map.get(name)) {
            (None, Some(d)) => result.push(change(
                ChangeCategory::DimensionAdded,
                NonBreaking,
                name,
                None,
                Some(json!(d.source_property)),
            )),
            (Some(d), None) => result.push(change(
                ChangeCategory::DimensionRemoved,
                Breaking,
                name,
                Some(json!(d.source_property)),
                None,
            )),
            (Some(old_d), Some(new_d)) => diff_dimension_pair(name, old_d, new_d, result),
            (None, None) => {}
        }
    }
}

fn diff_dimension_pair(name: &str, old: &DimensionIr, new: &DimensionIr, result: &mut DiffResult) {
    if old.source_property != new.source_property {
        let mut moved = change(
            ChangeCategory::DimensionRemoved,
            Breaking,
            name,
            Some(json!(old.source_property)),
            Some(json!(new.source_property)),
        );
        moved.details = json!({"source_changed": true});
        result.push(moved);
    }
    if old.description != new.description {
        result.push(change(
            ChangeCategory::DimensionDescriptionChanged,
            NonBreaking,
            name,
            Some(json!(old.description)),
            Some(json!(new.description)),
        ));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ir::Cardinality;
    use crate::normalizer::normalize;

    fn base_doc() -> Value {
        json!({
            "version": "1.0.0",
            "objects": [
                {"name": "Order", "identifiers": ["id"], "properties": [
                    {"name": "id", "type": "string"},
                    {"name": "customer_id", "type": "string"},
                    {"name": "amount", "type": "decimal", "description": "Order total"}
                ]},
                {"name": "Customer", "identifiers": ["id"], "properties": [
                    {"name": "id", "type": "string"},
                    {"name": "segment", "type": "string"}
                ]}
            ],
            "relationships": [
                {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"]], "cardinality": "many_to_one"}
            ],
            "metrics": [
                {"name": "revenue", "expression": "SUM(amount)", "grain": ["Order"], "type": "sum"}
            ],
            "dimensions": [
                {"name": "customer_segment", "sourceProperty": "Customer.segment"}
            ]
        })
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let ir = normalize(&base_doc());
        let result = diff_ir(&ir, &ir);
        assert!(result.is_empty());
        assert_eq!(result.summary.total, 0);
    }

    #[test]
    fn object_add_and_remove_are_symmetric() {
        let old = normalize(&base_doc());
        let mut doc = base_doc();
        doc["objects"].as_array_mut().unwrap().push(json!({
            "name": "Store", "identifiers": ["id"], "properties": [{"name": "id", "type": "string"}]
        }));
        let new = normalize(&doc);

        let forward = diff_ir(&old, &new);
        let added = forward.find(ChangeCategory::ObjectAdded, "Store").unwrap();
        assert!(!added.is_breaking());

        let backward = diff_ir(&new, &old);
        let removed = backward.find(ChangeCategory::ObjectRemoved, "Store").unwrap();
        assert!(removed.is_breaking());
    }

    #[test]
    fn identifier_changes() {
        let old = normalize(&base_doc());

        let mut extended = base_doc();
        extended["objects"][0]["identifiers"] = json!(["id", "customer_id"]);
        let result = diff_ir(&old, &normalize(&extended));
        let added = result
            .find(ChangeCategory::IdentifierAdded, "Order.customer_id")
            .unwrap();
        assert!(!added.is_breaking());
        assert!(!result.has_breaking_changes());

        let mut replaced = base_doc();
        replaced["objects"][0]["identifiers"] = json!(["customer_id"]);
        let result = diff_ir(&old, &normalize(&replaced));
        assert_eq!(result.summary.breaking, 1);
        assert_eq!(result.breaking_changes[0].category, ChangeCategory::IdentifierReplaced);

        let result = diff_ir(&normalize(&extended), &old);
        let removed = result
            .find(ChangeCategory::IdentifierRemoved, "Order.customer_id")
            .unwrap();
        assert!(removed.is_breaking());
    }

    #[test]
    fn property_changes() {
        let old = normalize(&base_doc());
        let mut doc = base_doc();
        doc["objects"][0]["properties"] = json!([
            {"name": "id", "type": "string"},
            {"name": "customer_id", "type": "integer"},
            {"name": "amount", "type": "decimal", "description": "Gross order total"},
            {"name": "placed_at", "type": "timestamp"}
        ]);
        doc["objects"][1]["properties"] = json!([{"name": "id", "type": "string"}]);
        doc["dimensions"] = json!([]);
        let result = diff_ir(&old, &normalize(&doc));

        assert!(result
            .find(ChangeCategory::PropertyTypeChanged, "Order.customer_id")
            .unwrap()
            .is_breaking());
        assert!(!result
            .find(ChangeCategory::PropertyDescriptionChanged, "Order.amount")
            .unwrap()
            .is_breaking());
        assert!(!result
            .find(ChangeCategory::PropertyAdded, "Order.placed_at")
            .unwrap()
            .is_breaking());
        assert!(result
            .find(ChangeCategory::PropertyRemoved, "Customer.segment")
            .unwrap()
            .is_breaking());
    }

    #[test]
    fn cardinality_tightening_is_breaking_and_reverse_relaxes() {
        let old = normalize(&base_doc());
        let mut doc = base_doc();
        doc["relationships"][0]["cardinality"] = json!("one_to_one");
        let new = normalize(&doc);

        let forward = diff_ir(&old, &new);
        let tightened = forward
            .find(ChangeCategory::RelationshipCardinalityTightened, "placed_by")
            .unwrap();
        assert!(tightened.is_breaking());

        let backward = diff_ir(&new, &old);
        let relaxed = backward
            .find(ChangeCategory::RelationshipCardinalityRelaxed, "placed_by")
            .unwrap();
        assert!(!relaxed.is_breaking());
    }

    #[test]
    fn many_to_one_to_one_to_many_is_not_reported() {
        let old = normalize(&base_doc());
        let mut new = old.clone();
        new.relationships[0].cardinality = Cardinality::OneToMany;
        assert!(diff_ir(&old, &new).is_empty());
    }

    #[test]
    fn join_key_and_metric_changes_are_breaking() {
        let old = normalize(&base_doc());
        let mut doc = base_doc();
        doc["relationships"][0]["joinKeys"] = json!([["customer_id", "id"], ["id", "segment"]]);
        doc["metrics"][0]["expression"] = json!("SUM(amount) - SUM(discount)");
        doc["metrics"][0]["grain"] = json!(["Order", "Customer"]);
        let result = diff_ir(&old, &normalize(&doc));
        assert!(result
            .find(ChangeCategory::RelationshipJoinKeysChanged, "placed_by")
            .is_some());
        assert!(result
            .find(ChangeCategory::MetricExpressionChanged, "revenue")
            .is_some());
        assert!(result.find(ChangeCategory::MetricGrainChanged, "revenue").is_some());
        assert_eq!(result.summary.breaking, 3);
        assert_eq!(result.summary.non_breaking, 0);
    }

    #[test]
    fn dimension_source_change_is_flagged_removal() {
        let old = normalize(&base_doc());
        let mut doc = base_doc();
        doc["dimensions"][0]["sourceProperty"] = json!("Customer.id");
        let result = diff_ir(&old, &normalize(&doc));
        let change = result
            .find(ChangeCategory::DimensionRemoved, "customer_segment")
            .unwrap();
        assert!(change.is_breaking());
        assert_eq!(change.details["source_changed"], json!(true));
    }

    #[test]
    fn single_edits_classify_per_rule() {
        let cases: [(fn(&mut Value), ChangeCategory, &str, bool); 11] = [
            (
                |d| {
                    d["relationships"].as_array_mut().unwrap().push(json!(
                        {"name": "billed_to", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"]]}
                    ))
                },
                ChangeCategory::RelationshipAdded,
                "billed_to",
                false,
            ),
            (
                |d| d["relationships"] = json!([]),
                ChangeCategory::RelationshipRemoved,
                "placed_by",
                true,
            ),
            (
                |d| d["relationships"][0]["to"] = json!("Order"),
                ChangeCategory::RelationshipEndpointsChanged,
                "placed_by",
                true,
            ),
            (
                |d| d["relationships"][0]["description"] = json!("Who placed the order"),
                ChangeCategory::RelationshipDescriptionChanged,
                "placed_by",
                false,
            ),
            (
                |d| {
                    d["metrics"].as_array_mut().unwrap().push(json!(
                        {"name": "order_count", "expression": "COUNT(*)", "grain": ["Order"]}
                    ))
                },
                ChangeCategory::MetricAdded,
                "order_count",
                false,
            ),
            (
                |d| d["metrics"] = json!([]),
                ChangeCategory::MetricRemoved,
                "revenue",
                true,
            ),
            (
                |d| d["metrics"][0]["description"] = json!("Gross revenue"),
                ChangeCategory::MetricDescriptionChanged,
                "revenue",
                false,
            ),
            (
                |d| {
                    d["dimensions"].as_array_mut().unwrap().push(json!(
                        {"name": "customer_key", "sourceProperty": "Customer.id"}
                    ))
                },
                ChangeCategory::DimensionAdded,
                "customer_key",
                false,
            ),
            (
                |d| d["dimensions"] = json!([]),
                ChangeCategory::DimensionRemoved,
                "customer_segment",
                true,
            ),
            (
                |d| d["dimensions"][0]["description"] = json!("Marketing segment"),
                ChangeCategory::DimensionDescriptionChanged,
                "customer_segment",
                false,
            ),
            (
                |d| d["objects"][0]["description"] = json!("A placed order"),
                ChangeCategory::ObjectDescriptionChanged,
                "Order",
                false,
            ),
        ];

        let old = normalize(&base_doc());
        for (edit, category, element, breaking) in cases {
            let mut doc = base_doc();
            edit(&mut doc);
            let result = diff_ir(&old, &normalize(&doc));
            assert_eq!(result.summary.total, 1, "{category:?} on {element}");
            let change = result
                .find(category, element)
                .unwrap_or_else(|| panic!("missing {category:?} on {element}"));
            assert_eq!(change.is_breaking(), breaking, "{category:?} on {element}");
        }
    }
}
