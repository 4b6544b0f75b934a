use serde_json::json;
use tracing::debug;

use crate::drift::{DriftEvent, DriftEventType, DriftOptions, DriftType};
use crate::ir::{ObjectIr, OdlIr, PropertyIr, PropertyType};
use crate::provider::{ColumnSchema, ProviderError, SchemaProvider};

/// Coarse type family of a live column type, by prefix. `timestamp` and
/// `datetime` are checked before `time` and `date`.
pub fn live_type_family(live_type: &str) -> Option<PropertyType> {
    let lowered = live_type.trim().to_ascii_lowercase();
    const PREFIXES: &[(&str, PropertyType)] = &[
        ("timestamp", PropertyType::Timestamp),
        ("datetime", PropertyType::Timestamp),
        ("time", PropertyType::Time),
        ("date", PropertyType::Date),
        ("varchar", PropertyType::String),
        ("nvarchar", PropertyType::String),
        ("char", PropertyType::String),
        ("string", PropertyType::String),
        ("text", PropertyType::String),
        ("bigint", PropertyType::Integer),
        ("smallint", PropertyType::Integer),
        ("tinyint", PropertyType::Integer),
        ("byteint", PropertyType::Integer),
        ("int", PropertyType::Integer),
        ("number", PropertyType::Decimal),
        ("numeric", PropertyType::Decimal),
        ("decimal", PropertyType::Decimal),
        ("float", PropertyType::Number),
        ("double", PropertyType::Number),
        ("real", PropertyType::Number),
        ("bool", PropertyType::Boolean),
    ];
    PREFIXES
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix))
        .map(|(_, family)| *family)
}

/// `NUMBER` holds integers as well as decimals; float and fixed-point
/// columns are interchangeable for rename matching.
fn type_compatible(declared: PropertyType, live: PropertyType) -> bool {
    use PropertyType::{Decimal, Integer, Number};
    declared == live
        || matches!(
            (declared, live),
            (Integer, Decimal) | (Number, Decimal) | (Decimal, Number)
        )
}

pub fn detect_mapping_drift(
    ir: &OdlIr,
    provider: &dyn SchemaProvider,
    options: &DriftOptions,
) -> Result<Vec<DriftEvent>, ProviderError> {
    let mut events = Vec::new();
    for object in &ir.objects {
        events.extend(object_drift(ir, object, provider, options)?);
    }
    debug!(events = events.len(), "mapping drift compared");
    Ok(events)
}

fn object_drift(
    ir: &OdlIr,
    object: &ObjectIr,
    provider: &dyn SchemaProvider,
    options: &DriftOptions,
) -> Result<Vec<DriftEvent>, ProviderError> {
    let table = ir.physical_table(object);
    let database = ir.physical_database(object).or(options.database.as_deref());
    let schema = ir.physical_schema(object).or(options.schema.as_deref());

    let (Some(database), Some(schema)) = (database, schema) else {
        return Ok(vec![DriftEvent {
            event_type: DriftEventType::TableMissing,
            drift_type: DriftType::Mapping,
            element: object.name.clone(),
            message: format!(
                "Object '{}' has no database/schema to look up table '{table}'",
                object.name
            ),
            details: json!({ "table": table, "reason": "unresolved_location" }),
        }]);
    };

    let Some(live) = provider.get_table_schema(database, schema, &table)? else {
        return Ok(vec![DriftEvent {
            event_type: DriftEventType::TableMissing,
            drift_type: DriftType::Mapping,
            element: object.name.clone(),
            message: format!(
                "Table {database}.{schema}.{table} for object '{}' does not exist",
                object.name
            ),
            details: json!({ "database": database, "schema": schema, "table": table }),
        }]);
    };

    let mut unmatched_declared: Vec<&PropertyIr> = Vec::new();
    for property in &object.properties {
        if live.column(&property.name).is_none() {
            unmatched_declared.push(property);
        }
    }
    let mut unmatched_live: Vec<(&ColumnSchema, bool)> = live
        .columns
        .iter()
        .filter(|c| object.properties.iter().all(|p| !p.name.eq_ignore_ascii_case(&c.name)))
        .map(|c| (c, false))
        .collect();

    let mut events = Vec::new();
    for property in unmatched_declared {
        let candidates: Vec<usize> = unmatched_live
            .iter()
            .enumerate()
            .filter(|(_, (column, consumed))| {
                !consumed
                    && live_type_family(&column.column_type)
                        .is_some_and(|family| type_compatible(property.property_type, family))
            })
            .map(|(i, _)| i)
            .collect();

        if let [only] = candidates.as_slice() {
            let column = unmatched_live[*only].0;
            unmatched_live[*only].1 = true;
            events.push(DriftEvent {
                event_type: DriftEventType::ColumnRenamed,
                drift_type: DriftType::Mapping,
                element: format!("{}.{}", object.name, property.name),
                message: format!(
                    "Column for '{}.{}' appears renamed to '{}' in {table}",
                    object.name, property.name, column.name
                ),
                details: json!({
                    "table": table,
                    "declared": property.name,
                    "live_column": column.name,
                    "live_type": column.column_type,
                    "candidates": 1,
                }),
            });
        } else {
            events.push(DriftEvent {
                event_type: DriftEventType::ColumnMissing,
                drift_type: DriftType::Mapping,
                element: format!("{}.{}", object.name, property.name),
                message: format!(
                    "Column '{}' declared on '{}' is missing from {table}",
                    property.name, object.name
                ),
                details: json!({
                    "table": table,
                    "declared_type": property.property_type.as_str(),
                    "rename_candidates": candidates.len(),
                }),
            });
        }
    }

    for (column, consumed) in unmatched_live {
        if consumed {
            continue;
        }
        events.push(DriftEvent {
            event_type: DriftEventType::ColumnAdded,
            drift_type: DriftType::Mapping,
            element: format!("{}.{}", object.name, column.name),
            message: format!(
                "Column '{}' in {table} is not declared on '{}'",
                column.name, object.name
            ),
            details: json!({ "table": table, "live_type": column.column_type }),
        });
    }
    Ok(events)
}
