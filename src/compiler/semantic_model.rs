//! Semantic-view model rendered from the IR. The same types parse a
//! deployed YAML export back for drift comparison, so every collection
//! defaults to empty on input.

use serde::{Deserialize, Serialize};

use crate::compiler::ViewTarget;
use crate::ir::{Cardinality, MetricType, OdlIr};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub tables: Vec<LogicalTable>,
    #[serde(default)]
    pub relationships: Vec<ModelRelationship>,
    #[serde(default)]
    pub facts: Vec<ModelFact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub base_table: BaseTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default)]
    pub dimensions: Vec<ModelDimension>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BaseTable {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDimension {
    pub name: String,
    pub expr: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRelationship {
    pub name: String,
    pub left_table: String,
    pub right_table: String,
    #[serde(default)]
    pub relationship_columns: Vec<RelationshipColumn>,
    #[serde(default)]
    pub join_type: String,
    #[serde(default)]
    pub relationship_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationshipColumn {
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelFact {
    pub name: String,
    pub expr: String,
    #[serde(default)]
    pub aggregation: String,
    #[serde(default)]
    pub grain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// `one_to_one` joins are inner; every other cardinality keeps unmatched
/// rows from the left side.
pub fn join_type(cardinality: Cardinality) -> &'static str {
    match cardinality {
        Cardinality::OneToOne => "inner",
        Cardinality::OneToMany | Cardinality::ManyToOne | Cardinality::ManyToMany => "left_outer",
    }
}

pub fn aggregation(metric_type: MetricType) -> &'static str {
    match metric_type {
        MetricType::Sum => "sum",
        MetricType::Count => "count",
        MetricType::CountDistinct => "count_distinct",
        MetricType::Average => "avg",
        MetricType::Min => "min",
        MetricType::Max => "max",
        MetricType::Custom => "custom",
    }
}

pub fn build_semantic_model(ir: &OdlIr, target: &ViewTarget) -> SemanticModel {
    let tables = ir
        .objects
        .iter()
        .map(|object| {
            let mut dimensions: Vec<ModelDimension> = object
                .properties
                .iter()
                .filter(|p| !object.is_identifier(&p.name))
                .map(|p| ModelDimension {
                    name: p.name.clone(),
                    expr: p.name.clone(),
                    data_type: p.property_type.warehouse_type().to_string(),
                    description: p.description.clone(),
                })
                .collect();

            for dim in &ir.dimensions {
                let Some((source_object, source_property)) = dim.source_parts() else {
                    continue;
                };
                if source_object != object.name || dimensions.iter().any(|d| d.name == dim.name) {
                    continue;
                }
                let data_type = object
                    .property(source_property)
                    .map(|p| p.property_type.warehouse_type())
                    .unwrap_or("VARCHAR");
                dimensions.push(ModelDimension {
                    name: dim.name.clone(),
                    expr: source_property.to_string(),
                    data_type: data_type.to_string(),
                    description: dim.description.clone(),
                });
            }
            dimensions.sort_by(|a, b| a.name.cmp(&b.name));

            LogicalTable {
                name: object.name.clone(),
                description: object.description.clone(),
                base_table: BaseTable {
                    database: ir
                        .physical_database(object)
                        .unwrap_or(target.database.as_str())
                        .to_string(),
                    schema: ir
                        .physical_schema(object)
                        .unwrap_or(target.schema.as_str())
                        .to_string(),
                    table: ir.physical_table(object),
                },
                primary_key: (!object.identifiers.is_empty()).then(|| PrimaryKey {
                    columns: object.identifiers.clone(),
                }),
                dimensions,
            }
        })
        .collect();

    let relationships = ir
        .relationships
        .iter()
        .map(|rel| ModelRelationship {
            name: rel.name.clone(),
            left_table: rel.from.clone(),
            right_table: rel.to.clone(),
            relationship_columns: rel
                .join_keys
                .iter()
                .map(|(left, right)| RelationshipColumn {
                    left_column: left.clone(),
                    right_column: right.clone(),
                })
                .collect(),
            join_type: join_type(rel.cardinality).to_string(),
            relationship_type: rel.cardinality.as_str().to_string(),
        })
        .collect();

    let facts = ir
        .metrics
        .iter()
        .map(|metric| ModelFact {
            name: metric.name.clone(),
            expr: metric.expression.clone(),
            aggregation: aggregation(metric.metric_type).to_string(),
            grain: metric.grain.clone(),
            format: metric.format.clone(),
            description: metric.description.clone(),
        })
        .collect();

    SemanticModel {
        name: target.view_name.clone(),
        description: ir.description.clone(),
        tables,
        relationships,
        facts,
    }
}

pub fn render_yaml(model: &SemanticModel) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(model)
}

pub fn parse_yaml(raw: &str) -> Result<SemanticModel, serde_yaml::Error> {
    serde_yaml::from_str(raw)
}
