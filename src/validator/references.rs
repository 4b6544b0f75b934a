use serde_json::Value;

use crate::ir::split_property_ref;
use crate::validator::{array_field, str_field, DeclaredObjects, ValidationError};

pub fn check(root: &Value, declared: &DeclaredObjects, errors: &mut Vec<ValidationError>) {
    for (idx, rel) in array_field(root, "relationships").iter().enumerate() {
        let name = str_field(rel, "name").unwrap_or("?");
        for (key, role) in [("from", "source"), ("to", "target")] {
            let Some(object) = str_field(rel, key) else {
                continue;
            };
            if !declared.contains(object) {
                errors.push(
                    ValidationError::new(
                        format!(
                            "Relationship '{name}' references unknown {role} object '{object}'. Available objects: {}",
                            declared.available_objects()
                        ),
                        format!("/relationships/{idx}/{key}"),
                    )
                    .with_value(Value::String(object.to_string())),
                );
            }
        }
    }

    for (idx, metric) in array_field(root, "metrics").iter().enumerate() {
        let name = str_field(metric, "name").unwrap_or("?");
        for (g, entry) in array_field(metric, "grain").iter().enumerate() {
            let Some(object) = entry.as_str() else {
                continue;
            };
            if !declared.contains(object) {
                errors.push(
                    ValidationError::new(
                        format!(
                            "Metric '{name}' grain references unknown object '{object}'. Available objects: {}",
                            declared.available_objects()
                        ),
                        format!("/metrics/{idx}/grain/{g}"),
                    )
                    .with_value(Value::String(object.to_string())),
                );
            }
        }
    }

    for (idx, dim) in array_field(root, "dimensions").iter().enumerate() {
        let name = str_field(dim, "name").unwrap_or("?");
        let Some(source) = str_field(dim, "sourceProperty") else {
            continue;
        };
        let Some((object, property)) = split_property_ref(source) else {
            continue;
        };
        let path = format!("/dimensions/{idx}/sourceProperty");
        if !declared.contains(object) {
            errors.push(
                ValidationError::new(
                    format!(
                        "Dimension '{name}' references unknown object '{object}'. Available objects: {}",
                        declared.available_objects()
                    ),
                    path,
                )
                .with_value(Value::String(source.to_string())),
            );
        } else if !declared.has_property(object, property) {
            errors.push(
                ValidationError::new(
                    format!(
                        "Dimension '{name}' references unknown property '{property}' on object '{object}'. Available properties: {}",
                        declared.available_properties(object)
                    ),
                    path,
                )
                .with_value(Value::String(source.to_string())),
            );
        }
    }
}
