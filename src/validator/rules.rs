use std::collections::BTreeMap;

use serde_json::Value;

use crate::ir::{Cardinality, MetricType, PropertyType};
use crate::validator::{array_field, join_or_none, str_field, ValidationError};

pub fn check(root: &Value, errors: &mut Vec<ValidationError>) {
    duplicate_names(root, "objects", "object", errors);
    duplicate_names(root, "relationships", "relationship", errors);
    duplicate_names(root, "metrics", "metric", errors);
    duplicate_names(root, "dimensions", "dimension", errors);

    for (idx, object) in array_field(root, "objects").iter().enumerate() {
        check_object(object, idx, errors);
    }

    for (idx, rel) in array_field(root, "relationships").iter().enumerate() {
        let Some(raw) = str_field(rel, "cardinality") else {
            continue;
        };
        if raw.parse::<Cardinality>().is_err() {
            let allowed = join_or_none(Cardinality::ALL.iter().map(|c| c.as_str()));
            errors.push(
                ValidationError::new(
                    format!(
                        "Invalid cardinality '{raw}' for relationship '{}'. Allowed values: {allowed}",
                        str_field(rel, "name").unwrap_or("?")
                    ),
                    format!("/relationships/{idx}/cardinality"),
                )
                .with_value(Value::String(raw.to_string())),
            );
        }
    }

    for (idx, metric) in array_field(root, "metrics").iter().enumerate() {
        let name = str_field(metric, "name").unwrap_or("?");
        if metric.get("grain").and_then(Value::as_array).map(Vec::is_empty) == Some(true) {
            errors.push(ValidationError::new(
                format!("Metric '{name}' must declare at least one grain object"),
                format!("/metrics/{idx}/grain"),
            ));
        }
        if let Some(raw) = str_field(metric, "type") {
            if MetricType::parse(raw).is_none() {
                errors.push(
                    ValidationError::new(
                        format!(
                            "Unknown metric type '{raw}' for metric '{name}'. Allowed types: sum, count, count_distinct, average, min, max, custom"
                        ),
                        format!("/metrics/{idx}/type"),
                    )
                    .with_value(Value::String(raw.to_string())),
                );
            }
        }
    }
}

fn check_object(object: &Value, idx: usize, errors: &mut Vec<ValidationError>) {
    let name = str_field(object, "name").unwrap_or("?");
    let properties = array_field(object, "properties");
    let property_names: Vec<&str> = properties
        .iter()
        .filter_map(|p| str_field(p, "name"))
        .collect();

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (p_idx, property) in properties.iter().enumerate() {
        let Some(p_name) = str_field(property, "name") else {
            continue;
        };
        if let Some(first) = seen.get(p_name) {
            errors.push(
                ValidationError::new(
                    format!(
                        "Duplicate property name '{p_name}' on object '{name}' (first defined at index {first})"
                    ),
                    format!("/objects/{idx}/properties/{p_idx}/name"),
                )
                .with_value(Value::String(p_name.to_string())),
            );
        } else {
            seen.insert(p_name, p_idx);
        }

        if let Some(raw) = str_field(property, "type") {
            if raw.parse::<PropertyType>().is_err() {
                let allowed = join_or_none(PropertyType::ALL.iter().map(|t| t.as_str()));
                errors.push(
                    ValidationError::new(
                        format!("Unknown type '{raw}' for property '{name}.{p_name}'. Allowed types: {allowed}"),
                        format!("/objects/{idx}/properties/{p_idx}/type"),
                    )
                    .with_value(Value::String(raw.to_string())),
                );
            }
        }
    }

    for (i_idx, identifier) in array_field(object, "identifiers").iter().enumerate() {
        let Some(identifier) = identifier.as_str() else {
            continue;
        };
        if !property_names.contains(&identifier) {
            errors.push(
                ValidationError::new(
                    format!(
                        "Identifier '{identifier}' is not a declared property of object '{name}'. Available properties: {}",
                        join_or_none(property_names.iter().copied())
                    ),
                    format!("/objects/{idx}/identifiers/{i_idx}"),
                )
                .with_value(Value::String(identifier.to_string())),
            );
        }
    }
}

fn duplicate_names(root: &Value, key: &str, kind: &str, errors: &mut Vec<ValidationError>) {
    let mut first_seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (idx, entry) in array_field(root, key).iter().enumerate() {
        let Some(name) = str_field(entry, "name") else {
            continue;
        };
        match first_seen.get(name) {
            Some(first) => errors.push(
                ValidationError::new(
                    format!("Duplicate {kind} name '{name}' (first defined at index {first})"),
                    format!("/{key}/{idx}/name"),
                )
                .with_value(Value::String(name.to_string())),
            ),
            None => {
                first_seen.insert(name, idx);
            }
        }
    }
}
