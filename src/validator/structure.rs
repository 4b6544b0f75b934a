use serde_json::Value;

use crate::validator::{array_field, pointer_segment, ValidationError};

pub fn check(root: &Value, errors: &mut Vec<ValidationError>) {
    let Some(map) = root.as_object() else {
        errors.push(
            ValidationError::new("Document must be a JSON object", "")
                .with_value(Value::String(type_name(root).to_string())),
        );
        return;
    };

    match map.get("version") {
        None => errors.push(ValidationError::new(
            "Missing required field 'version'",
            "/version",
        )),
        Some(v) if !v.is_string() => errors.push(
            ValidationError::new("Field 'version' must be a string", "/version")
                .with_value(v.clone()),
        ),
        Some(_) => {}
    }
    optional_string(root, "name", "", errors);
    optional_string(root, "description", "", errors);

    match map.get("objects") {
        None => errors.push(ValidationError::new(
            "Missing required field 'objects'",
            "/objects",
        )),
        Some(Value::Array(objects)) if objects.is_empty() => errors.push(ValidationError::new(
            "Field 'objects' must contain at least one object",
            "/objects",
        )),
        Some(Value::Array(objects)) => {
            for (idx, object) in objects.iter().enumerate() {
                check_object(object, &format!("/objects/{idx}"), errors);
            }
        }
        Some(other) => errors.push(
            ValidationError::new("Field 'objects' must be an array", "/objects")
                .with_value(Value::String(type_name(other).to_string())),
        ),
    }

    if let Some(relationships) = optional_array(root, "relationships", "", errors) {
        for (idx, rel) in relationships.iter().enumerate() {
            check_relationship(rel, &format!("/relationships/{idx}"), errors);
        }
    }
    if let Some(metrics) = optional_array(root, "metrics", "", errors) {
        for (idx, metric) in metrics.iter().enumerate() {
            check_metric(metric, &format!("/metrics/{idx}"), errors);
        }
    }
    if let Some(dimensions) = optional_array(root, "dimensions", "", errors) {
        for (idx, dim) in dimensions.iter().enumerate() {
            check_dimension(dim, &format!("/dimensions/{idx}"), errors);
        }
    }
    if let Some(mapping) = map.get("snowflake") {
        check_mapping(mapping, errors);
    }
}

fn check_object(object: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if !object.is_object() {
        errors.push(
            ValidationError::new("Object entry must be a JSON object", path)
                .with_value(Value::String(type_name(object).to_string())),
        );
        return;
    }
    required_name(object, "Object", path, errors);
    optional_string(object, "description", path, errors);
    optional_string(object, "table", path, errors);
    optional_string(object, "schema", path, errors);
    optional_string(object, "database", path, errors);

    if let Some(identifiers) = optional_array(object, "identifiers", path, errors) {
        for (idx, identifier) in identifiers.iter().enumerate() {
            if !identifier.is_string() {
                errors.push(
                    ValidationError::new(
                        "Identifier must be a string",
                        format!("{path}/identifiers/{idx}"),
                    )
                    .with_value(identifier.clone()),
                );
            }
        }
    }

    match object.get("properties") {
        None => errors.push(ValidationError::new(
            format!(
                "Object '{}' is missing required field 'properties'",
                object.get("name").and_then(Value::as_str).unwrap_or("?")
            ),
            format!("{path}/properties"),
        )),
        Some(Value::Array(properties)) => {
            for (idx, property) in properties.iter().enumerate() {
                check_property(property, &format!("{path}/properties/{idx}"), errors);
            }
        }
        Some(other) => errors.push(
            ValidationError::new(
                "Field 'properties' must be an array",
                format!("{path}/properties"),
            )
            .with_value(Value::String(type_name(other).to_string())),
        ),
    }
}

fn check_property(property: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if !property.is_object() {
        errors.push(
            ValidationError::new("Property entry must be a JSON object", path)
                .with_value(Value::String(type_name(property).to_string())),
        );
        return;
    }
    required_name(property, "Property", path, errors);
    match property.get("type") {
        None => errors.push(ValidationError::new(
            "Property is missing required field 'type'",
            format!("{path}/type"),
        )),
        Some(v) if !v.is_string() => errors.push(
            ValidationError::new("Property type must be a string", format!("{path}/type"))
                .with_value(v.clone()),
        ),
        Some(_) => {}
    }
    optional_string(property, "description", path, errors);
    optional_bool(property, "nullable", path, errors);
    optional_bool(property, "required", path, errors);
}

fn check_relationship(rel: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if !rel.is_object() {
        errors.push(
            ValidationError::new("Relationship entry must be a JSON object", path)
                .with_value(Value::String(type_name(rel).to_string())),
        );
        return;
    }
    required_name(rel, "Relationship", path, errors);
    required_string(rel, "from", path, errors);
    required_string(rel, "to", path, errors);
    optional_string(rel, "cardinality", path, errors);
    optional_string(rel, "description", path, errors);

    match rel.get("joinKeys") {
        None => errors.push(ValidationError::new(
            "Relationship is missing required field 'joinKeys'",
            format!("{path}/joinKeys"),
        )),
        Some(Value::Array(keys)) => {
            for (idx, pair) in keys.iter().enumerate() {
                let is_pair = pair
                    .as_array()
                    .map(|items| items.len() == 2 && items.iter().all(Value::is_string))
                    .unwrap_or(false);
                if !is_pair {
                    errors.push(
                        ValidationError::new(
                            "Join key must be a [fromProperty, toProperty] pair of strings",
                            format!("{path}/joinKeys/{idx}"),
                        )
                        .with_value(pair.clone()),
                    );
                }
            }
        }
        Some(other) => errors.push(
            ValidationError::new("Field 'joinKeys' must be an array", format!("{path}/joinKeys"))
                .with_value(Value::String(type_name(other).to_string())),
        ),
    }
}

fn check_metric(metric: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if !metric.is_object() {
        errors.push(
            ValidationError::new("Metric entry must be a JSON object", path)
                .with_value(Value::String(type_name(metric).to_string())),
        );
        return;
    }
    required_name(metric, "Metric", path, errors);
    required_string(metric, "expression", path, errors);
    optional_string(metric, "type", path, errors);
    optional_string(metric, "format", path, errors);
    optional_string(metric, "description", path, errors);

    match metric.get("grain") {
        None => errors.push(ValidationError::new(
            "Metric is missing required field 'grain'",
            format!("{path}/grain"),
        )),
        Some(Value::Array(grain)) => {
            for (idx, entry) in grain.iter().enumerate() {
                if !entry.is_string() {
                    errors.push(
                        ValidationError::new(
                            "Grain entry must be an object name",
                            format!("{path}/grain/{idx}"),
                        )
                        .with_value(entry.clone()),
                    );
                }
            }
        }
        Some(other) => errors.push(
            ValidationError::new("Field 'grain' must be an array", format!("{path}/grain"))
                .with_value(Value::String(type_name(other).to_string())),
        ),
    }
}

fn check_dimension(dim: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if !dim.is_object() {
        errors.push(
            ValidationError::new("Dimension entry must be a JSON object", path)
                .with_value(Value::String(type_name(dim).to_string())),
        );
        return;
    }
    required_name(dim, "Dimension", path, errors);
    optional_string(dim, "type", path, errors);
    optional_string(dim, "description", path, errors);
    match dim.get("sourceProperty") {
        None => errors.push(ValidationError::new(
            "Dimension is missing required field 'sourceProperty'",
            format!("{path}/sourceProperty"),
        )),
        Some(Value::String(raw)) if crate::ir::split_property_ref(raw).is_none() => errors.push(
            ValidationError::new(
                "Field 'sourceProperty' must have the form 'Object.property'",
                format!("{path}/sourceProperty"),
            )
            .with_value(Value::String(raw.clone())),
        ),
        Some(Value::String(_)) => {}
        Some(other) => errors.push(
            ValidationError::new(
                "Field 'sourceProperty' must be a string",
                format!("{path}/sourceProperty"),
            )
            .with_value(other.clone()),
        ),
    }
}

fn check_mapping(mapping: &Value, errors: &mut Vec<ValidationError>) {
    if !mapping.is_object() {
        errors.push(
            ValidationError::new("Field 'snowflake' must be an object", "/snowflake")
                .with_value(Value::String(type_name(mapping).to_string())),
        );
        return;
    }
    required_string(mapping, "database", "/snowflake", errors);
    required_string(mapping, "schema", "/snowflake", errors);
    optional_string(mapping, "warehouse", "/snowflake", errors);
    match mapping.get("tableMappings") {
        None => {}
        Some(Value::Object(entries)) => {
            for (key, table) in entries {
                if !table.is_string() {
                    errors.push(
                        ValidationError::new(
                            "Table mapping value must be a table name",
                            format!("/snowflake/tableMappings/{}", pointer_segment(key)),
                        )
                        .with_value(table.clone()),
                    );
                }
            }
        }
        Some(other) => errors.push(
            ValidationError::new(
                "Field 'tableMappings' must be an object",
                "/snowflake/tableMappings",
            )
            .with_value(Value::String(type_name(other).to_string())),
        ),
    }
}

fn required_name(value: &Value, kind: &str, path: &str, errors: &mut Vec<ValidationError>) {
    match value.get("name") {
        None => errors.push(ValidationError::new(
            format!("{kind} is missing required field 'name'"),
            format!("{path}/name"),
        )),
        Some(Value::String(name)) if name.trim().is_empty() => errors.push(
            ValidationError::new(format!("{kind} name must not be empty"), format!("{path}/name"))
                .with_value(Value::String(name.clone())),
        ),
        Some(Value::String(_)) => {}
        Some(other) => errors.push(
            ValidationError::new(format!("{kind} name must be a string"), format!("{path}/name"))
                .with_value(other.clone()),
        ),
    }
}

fn required_string(value: &Value, key: &str, path: &str, errors: &mut Vec<ValidationError>) {
    match value.get(key) {
        None => errors.push(ValidationError::new(
            format!("Missing required field '{key}'"),
            format!("{path}/{key}"),
        )),
        Some(v) if !v.is_string() => errors.push(
            ValidationError::new(format!("Field '{key}' must be a string"), format!("{path}/{key}"))
                .with_value(v.clone()),
        ),
        Some(_) => {}
    }
}

fn optional_string(value: &Value, key: &str, path: &str, errors: &mut Vec<ValidationError>) {
    if let Some(v) = value.get(key) {
        if !v.is_string() && !v.is_null() {
            errors.push(
                ValidationError::new(
                    format!("Field '{key}' must be a string"),
                    format!("{path}/{key}"),
                )
                .with_value(v.clone()),
            );
        }
    }
}

fn optional_bool(value: &Value, key: &str, path: &str, errors: &mut Vec<ValidationError>) {
    if let Some(v) = value.get(key) {
        if !v.is_boolean() && !v.is_null() {
            errors.push(
                ValidationError::new(
                    format!("Field '{key}' must be a boolean"),
                    format!("{path}/{key}"),
                )
                .with_value(v.clone()),
            );
        }
    }
}

fn optional_array<'a>(
    value: &'a Value,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a [Value]> {
    match value.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Array(_)) => Some(array_field(value, key)),
        Some(other) => {
            errors.push(
                ValidationError::new(
                    format!("Field '{key}' must be an array"),
                    format!("{path}/{key}"),
                )
                .with_value(Value::String(type_name(other).to_string())),
            );
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn errors_for(doc: Value) -> Vec<String> {
        let mut errors = Vec::new();
        check(&doc, &mut errors);
        errors.into_iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn rejects_non_object_root() {
        let errors = errors_for(json!([1, 2]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must be a JSON object"));
    }

    #[test]
    fn requires_version_and_non_empty_objects() {
        let errors = errors_for(json!({"objects": []}));
        assert!(errors.iter().any(|e| e.contains("'version'")));
        assert!(errors.iter().any(|e| e.contains("at least one object")));
    }

    #[test]
    fn flags_wrongly_typed_fields_with_paths() {
        let errors = errors_for(json!({
            "version": 1,
            "objects": [{"name": "Order", "properties": [{"name": "id"}]}],
            "relationships": [{"name": "r", "from": "Order", "to": "Order", "joinKeys": [["id"]]}]
        }));
        assert!(errors.iter().any(|e| e.contains("(path: /version)")));
        assert!(errors
            .iter()
            .any(|e| e.contains("(path: /objects/0/properties/0/type)")));
        assert!(errors
            .iter()
            .any(|e| e.contains("(path: /relationships/0/joinKeys/0)")));
    }

    #[test]
    fn dimension_source_must_be_dotted() {
        let errors = errors_for(json!({
            "version": "1",
            "objects": [{"name": "Order", "properties": []}],
            "dimensions": [{"name": "d", "sourceProperty": "Order"}]
        }));
        assert!(errors.iter().any(|e| e.contains("'Object.property'")));
    }
}
