use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_VERSION: &str = "0.0.0";
pub const DEFAULT_ONTOLOGY_NAME: &str = "ontology";

/// Normalized ontology. Every list is sorted by its natural key, so two
/// documents that differ only in ordering produce equal values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OdlIr {
    pub version: String,
    pub name: String,
    pub description: String,
    pub objects: Vec<ObjectIr>,
    pub relationships: Vec<RelationshipIr>,
    pub metrics: Vec<MetricIr>,
    pub dimensions: Vec<DimensionIr>,
    pub snowflake: Option<SnowflakeMappingIr>,
}

impl OdlIr {
    pub fn object(&self, name: &str) -> Option<&ObjectIr> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_names(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Physical table for an object: explicit override, then the mapping
    /// block entry, then the lowercase object name.
    pub fn physical_table(&self, object: &ObjectIr) -> String {
        if let Some(table) = &object.table {
            return table.clone();
        }
        if let Some(table) = self
            .snowflake
            .as_ref()
            .and_then(|m| m.table_mappings.get(&object.name))
        {
            return table.clone();
        }
        object.name.to_lowercase()
    }

    pub fn physical_database<'a>(&'a self, object: &'a ObjectIr) -> Option<&'a str> {
        object
            .database
            .as_deref()
            .or_else(|| self.snowflake.as_ref().map(|m| m.database.as_str()))
            .filter(|db| !db.is_empty())
    }

    pub fn physical_schema<'a>(&'a self, object: &'a ObjectIr) -> Option<&'a str> {
        object
            .schema
            .as_deref()
            .or_else(|| self.snowflake.as_ref().map(|m| m.schema.as_str()))
            .filter(|schema| !schema.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectIr {
    pub name: String,
    pub description: String,
    pub identifiers: Vec<String>,
    pub properties: Vec<PropertyIr>,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub database: Option<String>,
}

impl ObjectIr {
    pub fn property(&self, name: &str) -> Option<&PropertyIr> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifiers.iter().any(|id| id == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyIr {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub description: String,
    pub nullable: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Time,
}

impl PropertyType {
    pub const ALL: [PropertyType; 8] = [
        PropertyType::String,
        PropertyType::Integer,
        PropertyType::Number,
        PropertyType::Decimal,
        PropertyType::Boolean,
        PropertyType::Date,
        PropertyType::Timestamp,
        PropertyType::Time,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
        }
    }

    pub fn warehouse_type(&self) -> &'static str {
        match self {
            Self::String => "VARCHAR",
            Self::Integer => "NUMBER(38,0)",
            Self::Number => "FLOAT",
            Self::Decimal => "NUMBER(38,9)",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP_NTZ",
            Self::Time => "TIME",
        }
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown property type: {0}")]
pub struct PropertyTypeParseError(pub String);

impl FromStr for PropertyType {
    type Err = PropertyTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PropertyTypeParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipIr {
    pub name: String,
    pub from: String,
    pub to: String,
    pub join_keys: Vec<(String, String)>,
    pub cardinality: Cardinality,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::OneToOne,
        Cardinality::OneToMany,
        Cardinality::ManyToOne,
        Cardinality::ManyToMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    /// Strictness rank: higher means fewer rows may match on either side.
    /// `one_to_many` and `many_to_one` share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::ManyToMany => 0,
            Self::ManyToOne | Self::OneToMany => 1,
            Self::OneToOne => 2,
        }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::ManyToOne
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown cardinality: {0}")]
pub struct CardinalityParseError(pub String);

impl FromStr for Cardinality {
    type Err = CardinalityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| CardinalityParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricIr {
    pub name: String,
    pub expression: String,
    pub grain: Vec<String>,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub format: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Sum,
    Count,
    CountDistinct,
    Average,
    Min,
    Max,
    Custom,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let parsed = match normalized.as_str() {
            "sum" => Self::Sum,
            "count" => Self::Count,
            "count_distinct" | "distinct_count" => Self::CountDistinct,
            "average" | "avg" | "mean" => Self::Average,
            "min" | "minimum" => Self::Min,
            "max" | "maximum" => Self::Max,
            "custom" | "derived" | "ratio" => Self::Custom,
            _ => return None,
        };
        Some(parsed)
    }
}

impl Default for MetricType {
    fn default() -> Self {
        Self::Custom
    }
}

impl Display for MetricType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionIr {
    pub name: String,
    pub source_property: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    pub description: String,
}

impl DimensionIr {
    pub fn source_parts(&self) -> Option<(&str, &str)> {
        split_property_ref(&self.source_property)
    }
}

pub fn split_property_ref(raw: &str) -> Option<(&str, &str)> {
    let (object, property) = raw.split_once('.')?;
    if object.is_empty() || property.is_empty() {
        return None;
    }
    Some((object, property))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Categorical,
    Temporal,
    Numeric,
}

impl DimensionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "categorical" | "category" | "string" => Some(Self::Categorical),
            "temporal" | "time" | "date" => Some(Self::Temporal),
            "numeric" | "number" => Some(Self::Numeric),
            _ => None,
        }
    }
}

impl Default for DimensionType {
    fn default() -> Self {
        Self::Categorical
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnowflakeMappingIr {
    pub database: String,
    pub schema: String,
    pub warehouse: Option<String>,
    pub table_mappings: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, table: Option<&str>) -> ObjectIr {
        ObjectIr {
            name: name.to_string(),
            description: String::new(),
            identifiers: vec![],
            properties: vec![],
            table: table.map(str::to_string),
            schema: None,
            database: None,
        }
    }

    fn ir_with(objects: Vec<ObjectIr>, snowflake: Option<SnowflakeMappingIr>) -> OdlIr {
        OdlIr {
            version: "1.0.0".to_string(),
            name: "test".to_string(),
            description: String::new(),
            objects,
            relationships: vec![],
            metrics: vec![],
            dimensions: vec![],
            snowflake,
        }
    }

    #[test]
    fn physical_table_prefers_override_then_mapping_then_lowercase() {
        let mut mappings = BTreeMap::new();
        mappings.insert("Customer".to_string(), "DIM_CUSTOMER".to_string());
        let ir = ir_with(
            vec![
                object("Order", Some("FACT_ORDERS")),
                object("Customer", None),
                object("LineItem", None),
            ],
            Some(SnowflakeMappingIr {
                database: "DB".to_string(),
                schema: "PUBLIC".to_string(),
                warehouse: None,
                table_mappings: mappings,
            }),
        );
        assert_eq!(ir.physical_table(&ir.objects[0]), "FACT_ORDERS");
        assert_eq!(ir.physical_table(&ir.objects[1]), "DIM_CUSTOMER");
        assert_eq!(ir.physical_table(&ir.objects[2]), "lineitem");
    }

    #[test]
    fn cardinality_rank_groups_one_to_many_and_many_to_one() {
        assert_eq!(Cardinality::OneToMany.rank(), Cardinality::ManyToOne.rank());
        assert!(Cardinality::OneToOne.rank() > Cardinality::ManyToOne.rank());
        assert!(Cardinality::ManyToOne.rank() > Cardinality::ManyToMany.rank());
    }

    #[test]
    fn parses_vocabularies() {
        assert_eq!("Timestamp".parse::<PropertyType>().unwrap(), PropertyType::Timestamp);
        assert!("blob".parse::<PropertyType>().is_err());
        assert_eq!("many_to_many".parse::<Cardinality>().unwrap(), Cardinality::ManyToMany);
        assert_eq!(MetricType::parse("avg"), Some(MetricType::Average));
        assert_eq!(MetricType::parse("median"), None);
    }

    #[test]
    fn splits_property_reference() {
        assert_eq!(split_property_ref("Order.id"), Some(("Order", "id")));
        assert_eq!(split_property_ref("Order"), None);
        assert_eq!(split_property_ref(".id"), None);
    }
}
