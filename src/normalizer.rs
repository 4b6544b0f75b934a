//! Raw document → canonical IR.
//!
//! Total over any JSON value: missing or mistyped fields fall back to
//! defaults so an invalid document can still be inspected. Validation is a
//! separate concern (see `validator`).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::ir::{
    Cardinality, DimensionIr, DimensionType, MetricIr, MetricType, ObjectIr, OdlIr, PropertyIr,
    PropertyType, RelationshipIr, SnowflakeMappingIr, DEFAULT_ONTOLOGY_NAME, DEFAULT_VERSION,
};
use crate::validator::{array_field, str_field};

pub fn normalize(root: &Value) -> OdlIr {
    let mut objects: Vec<ObjectIr> = array_field(root, "objects")
        .iter()
        .filter(|v| v.is_object())
        .map(normalize_object)
        .collect();
    objects.sort_by_cached_key(|o| (o.name.clone(), canonical(o)));

    let mut relationships: Vec<RelationshipIr> = array_field(root, "relationships")
        .iter()
        .filter(|v| v.is_object())
        .map(normalize_relationship)
        .collect();
    relationships.sort_by_cached_key(|r| (r.name.clone(), canonical(r)));

    let mut metrics: Vec<MetricIr> = array_field(root, "metrics")
        .iter()
        .filter(|v| v.is_object())
        .map(normalize_metric)
        .collect();
    metrics.sort_by_cached_key(|m| (m.name.clone(), canonical(m)));

    let mut dimensions: Vec<DimensionIr> = array_field(root, "dimensions")
        .iter()
        .filter(|v| v.is_object())
        .map(normalize_dimension)
        .collect();
    dimensions.sort_by_cached_key(|d| (d.name.clone(), canonical(d)));

    let snowflake = root
        .get("snowflake")
        .filter(|v| v.is_object())
        .map(|mapping| normalize_mapping(mapping, &objects));

    debug!(
        objects = objects.len(),
        relationships = relationships.len(),
        metrics = metrics.len(),
        dimensions = dimensions.len(),
        "normalized ODL document"
    );

    OdlIr {
        version: string_or(root, "version", DEFAULT_VERSION),
        name: string_or(root, "name", DEFAULT_ONTOLOGY_NAME),
        description: string_or(root, "description", ""),
        objects,
        relationships,
        metrics,
        dimensions,
        snowflake,
    }
}

fn normalize_object(raw: &Value) -> ObjectIr {
    let mut identifiers = string_list(raw, "identifiers");
    identifiers.sort();
    identifiers.dedup();

    let mut properties: Vec<PropertyIr> = array_field(raw, "properties")
        .iter()
        .filter(|v| v.is_object())
        .map(normalize_property)
        .collect();
    properties.sort_by_cached_key(|p| (p.name.clone(), canonical(p)));

    ObjectIr {
        name: string_or(raw, "name", ""),
        description: string_or(raw, "description", ""),
        identifiers,
        properties,
        table: optional_string(raw, "table"),
        schema: optional_string(raw, "schema"),
        database: optional_string(raw, "database"),
    }
}

fn normalize_property(raw: &Value) -> PropertyIr {
    PropertyIr {
        name: string_or(raw, "name", ""),
        property_type: str_field(raw, "type")
            .and_then(|t| t.parse::<PropertyType>().ok())
            .unwrap_or(PropertyType::String),
        description: string_or(raw, "description", ""),
        nullable: raw.get("nullable").and_then(Value::as_bool).unwrap_or(true),
        required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn normalize_relationship(raw: &Value) -> RelationshipIr {
    let mut join_keys: Vec<(String, String)> = array_field(raw, "joinKeys")
        .iter()
        .filter_map(|pair| {
            let from = pair.get(0).and_then(Value::as_str)?;
            let to = pair.get(1).and_then(Value::as_str)?;
            Some((from.to_string(), to.to_string()))
        })
        .collect();
    join_keys.sort();

    RelationshipIr {
        name: string_or(raw, "name", ""),
        from: string_or(raw, "from", ""),
        to: string_or(raw, "to", ""),
        join_keys,
        cardinality: str_field(raw, "cardinality")
            .and_then(|c| c.parse::<Cardinality>().ok())
            .unwrap_or_default(),
        description: string_or(raw, "description", ""),
    }
}

fn normalize_metric(raw: &Value) -> MetricIr {
    let mut grain = string_list(raw, "grain");
    grain.sort();
    grain.dedup();

    MetricIr {
        name: string_or(raw, "name", ""),
        expression: string_or(raw, "expression", ""),
        grain,
        metric_type: str_field(raw, "type")
            .and_then(MetricType::parse)
            .unwrap_or_default(),
        format: optional_string(raw, "format"),
        description: string_or(raw, "description", ""),
    }
}

fn normalize_dimension(raw: &Value) -> DimensionIr {
    DimensionIr {
        name: string_or(raw, "name", ""),
        source_property: string_or(raw, "sourceProperty", ""),
        dimension_type: str_field(raw, "type")
            .and_then(DimensionType::parse)
            .unwrap_or_default(),
        description: string_or(raw, "description", ""),
    }
}

/// Explicit `tableMappings` entries win; per-object `table` overrides fill
/// in objects the block does not mention.
fn normalize_mapping(raw: &Value, objects: &[ObjectIr]) -> SnowflakeMappingIr {
    let mut table_mappings: BTreeMap<String, String> = raw
        .get("tableMappings")
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|t| (k.clone(), t.to_string())))
                .collect()
        })
        .unwrap_or_default();
    for object in objects {
        if let Some(table) = &object.table {
            table_mappings
                .entry(object.name.clone())
                .or_insert_with(|| table.clone());
        }
    }

    SnowflakeMappingIr {
        database: string_or(raw, "database", ""),
        schema: string_or(raw, "schema", ""),
        warehouse: optional_string(raw, "warehouse"),
        table_mappings,
    }
}

fn canonical<T: Serialize>(entry: &T) -> String {
    serde_json::to_string(entry).unwrap_or_default()
}

fn string_or(value: &Value, key: &str, default: &str) -> String {
    str_field(value, key).unwrap_or(default).to_string()
}

fn optional_string(value: &Value, key: &str) -> Option<String> {
    str_field(value, key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    array_field(value, key)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc_a() -> Value {
        json!({
            "version": "1.0.0",
            "name": "sales",
            "objects": [
                {"name": "Order", "identifiers": ["id", "line"], "properties": [
                    {"name": "id", "type": "string"},
                    {"name": "line", "type": "integer"},
                    {"name": "customer_id", "type": "string"}
                ], "table": "FACT_ORDERS"},
                {"name": "Customer", "identifiers": ["id"], "properties": [{"name": "id", "type": "string"}]}
            ],
            "relationships": [
                {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"], ["a", "b"]]}
            ],
            "metrics": [
                {"name": "revenue", "expression": "SUM(amount)", "grain": ["Order", "Customer"], "type": "sum"},
                {"name": "orders", "expression": "COUNT(*)", "grain": ["Order"]}
            ],
            "snowflake": {"database": "DB", "schema": "PUBLIC", "tableMappings": {"Customer": "DIM_CUSTOMER"}}
        })
    }

    fn doc_b() -> Value {
        json!({
            "snowflake": {"tableMappings": {"Customer": "DIM_CUSTOMER"}, "schema": "PUBLIC", "database": "DB"},
            "metrics": [
                {"grain": ["Customer", "Order"], "name": "revenue", "type": "sum", "expression": "SUM(amount)"},
                {"name": "orders", "expression": "COUNT(*)", "grain": ["Order"]}
            ],
            "relationships": [
                {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["a", "b"], ["customer_id", "id"]]}
            ],
            "objects": [
                {"name": "Customer", "identifiers": ["id"], "properties": [{"name": "id", "type": "string"}]},
                {"table": "FACT_ORDERS", "name": "Order", "identifiers": ["line", "id"], "properties": [
                    {"name": "customer_id", "type": "string"},
                    {"name": "line", "type": "integer"},
                    {"name": "id", "type": "string"}
                ]}
            ],
            "name": "sales",
            "version": "1.0.0"
        })
    }

    #[test]
    fn ordering_differences_normalize_identically() {
        let a = normalize(&doc_a());
        let b = normalize(&doc_b());
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn sorts_every_collection() {
        let ir = normalize(&doc_a());
        assert_eq!(ir.object_names(), vec!["Customer", "Order"]);
        let order = ir.object("Order").unwrap();
        assert_eq!(order.identifiers, vec!["id", "line"]);
        let names: Vec<&str> = order.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["customer_id", "id", "line"]);
        assert_eq!(
            ir.relationships[0].join_keys,
            vec![
                ("a".to_string(), "b".to_string()),
                ("customer_id".to_string(), "id".to_string())
            ]
        );
        assert_eq!(ir.metrics[0].name, "orders");
        assert_eq!(ir.metrics[1].grain, vec!["Customer", "Order"]);
    }

    #[test]
    fn table_overrides_populate_mapping() {
        let ir = normalize(&doc_a());
        let mapping = ir.snowflake.unwrap();
        assert_eq!(mapping.table_mappings.get("Order").map(String::as_str), Some("FACT_ORDERS"));
        assert_eq!(
            mapping.table_mappings.get("Customer").map(String::as_str),
            Some("DIM_CUSTOMER")
        );
    }

    #[test]
    fn applies_defaults_for_missing_fields() {
        let ir = normalize(&json!({
            "objects": [{"name": "Thing", "properties": [{"name": "x", "type": "blob"}]}],
            "relationships": [{"name": "r", "from": "Thing", "to": "Thing", "cardinality": "weird"}],
            "metrics": [{"name": "m"}]
        }));
        assert_eq!(ir.version, DEFAULT_VERSION);
        assert_eq!(ir.name, DEFAULT_ONTOLOGY_NAME);
        let prop = &ir.objects[0].properties[0];
        assert_eq!(prop.property_type, PropertyType::String);
        assert!(prop.nullable);
        assert!(!prop.required);
        assert_eq!(ir.relationships[0].cardinality, Cardinality::ManyToOne);
        assert!(ir.relationships[0].join_keys.is_empty());
        assert_eq!(ir.metrics[0].metric_type, MetricType::Custom);
        assert!(ir.snowflake.is_none());
    }

    #[test]
    fn duplicate_names_normalize_identically() {
        let a = normalize(&json!({"objects": [
            {"name": "Order", "properties": [
                {"name": "id", "type": "string"},
                {"name": "id", "type": "integer"}
            ]},
            {"name": "Order", "description": "second"}
        ]}));
        let b = normalize(&json!({"objects": [
            {"name": "Order", "description": "second"},
            {"name": "Order", "properties": [
                {"name": "id", "type": "integer"},
                {"name": "id", "type": "string"}
            ]}
        ]}));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn never_panics_on_garbage() {
        for doc in [json!(null), json!(42), json!("odl"), json!([1, 2, 3]), json!({"objects": "nope"})] {
            let ir = normalize(&doc);
            assert!(ir.objects.is_empty());
        }
    }
}
