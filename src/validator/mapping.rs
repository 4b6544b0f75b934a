use serde_json::Value;

use crate::validator::{array_field, pointer_segment, str_field, DeclaredObjects, ValidationError};

pub fn check(root: &Value, declared: &DeclaredObjects, errors: &mut Vec<ValidationError>) {
    let Some(mapping) = root.get("snowflake").filter(|m| m.is_object()) else {
        return;
    };

    for (idx, rel) in array_field(root, "relationships").iter().enumerate() {
        let name = str_field(rel, "name").unwrap_or("?");
        let (Some(from), Some(to)) = (str_field(rel, "from"), str_field(rel, "to")) else {
            continue;
        };
        for (k, pair) in array_field(rel, "joinKeys").iter().enumerate() {
            let (Some(from_prop), Some(to_prop)) = (
                pair.get(0).and_then(Value::as_str),
                pair.get(1).and_then(Value::as_str),
            ) else {
                continue;
            };
            for (side, object, property) in [(0, from, from_prop), (1, to, to_prop)] {
                if !declared.contains(object) || declared.has_property(object, property) {
                    continue;
                }
                errors.push(
                    ValidationError::new(
                        format!(
                            "Join key '{property}' not found on object '{object}' for relationship '{name}'. Available properties on {object}: {}",
                            declared.available_properties(object)
                        ),
                        format!("/relationships/{idx}/joinKeys/{k}/{side}"),
                    )
                    .with_value(Value::String(property.to_string())),
                );
            }
        }
    }

    if let Some(entries) = mapping.get("tableMappings").and_then(Value::as_object) {
        for key in entries.keys() {
            if !declared.contains(key) {
                errors.push(
                    ValidationError::new(
                        format!(
                            "Table mapping references unknown object '{key}'. Available objects: {}",
                            declared.available_objects()
                        ),
                        format!("/snowflake/tableMappings/{}", pointer_segment(key)),
                    )
                    .with_value(Value::String(key.clone())),
                );
            }
        }
    }
}
