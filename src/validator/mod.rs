//! Validation of raw ODL documents.
//!
//! Four passes run in order over the untyped tree and append to one error
//! list: structure, references, business rules, target mapping. No pass
//! short-circuits another; a document with a broken `objects` array still
//! gets its relationships and metrics checked against whatever objects could
//! be read.

pub mod mapping;
pub mod references;
pub mod rules;
pub mod structure;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    pub message: String,
    pub path: String,
    pub value: Option<Value>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (path: {})", self.message, self.path)?;
        if let Some(value) = &self.value {
            write!(f, " (value: {value})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

pub fn validate(root: &Value) -> ValidationReport {
    let declared = DeclaredObjects::collect(root);
    let mut errors = Vec::new();

    structure::check(root, &mut errors);
    references::check(root, &declared, &mut errors);
    rules::check(root, &mut errors);
    mapping::check(root, &declared, &mut errors);

    debug!(errors = errors.len(), "validation finished");
    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[derive(Debug, Default)]
pub struct DeclaredObjects {
    objects: BTreeMap<String, Vec<String>>,
}

impl DeclaredObjects {
    pub fn collect(root: &Value) -> Self {
        let mut objects = BTreeMap::new();
        for object in array_field(root, "objects") {
            let Some(name) = str_field(object, "name") else {
                continue;
            };
            let properties = array_field(object, "properties")
                .iter()
                .filter_map(|p| str_field(p, "name"))
                .map(str::to_string)
                .collect();
            objects.entry(name.to_string()).or_insert(properties);
        }
        Self { objects }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn properties(&self, object: &str) -> Option<&[String]> {
        self.objects.get(object).map(Vec::as_slice)
    }

    pub fn has_property(&self, object: &str, property: &str) -> bool {
        self.properties(object)
            .map(|props| props.iter().any(|p| p == property))
            .unwrap_or(false)
    }

    pub fn available_objects(&self) -> String {
        join_or_none(self.objects.keys().map(String::as_str))
    }

    pub fn available_properties(&self, object: &str) -> String {
        join_or_none(
            self.properties(object)
                .unwrap_or_default()
                .iter()
                .map(String::as_str),
        )
    }
}

pub(crate) fn join_or_none<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let joined = names.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
