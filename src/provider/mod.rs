pub mod mock;
pub mod snapshot;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::MockProvider;
pub use snapshot::SnapshotProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    pub database: String,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticViewExport {
    pub view_name: String,
    pub yaml_content: String,
}

/// Live target-system introspection. `Ok(None)` means the table or view
/// does not exist; `Err` is reserved for failing to ask.
pub trait SchemaProvider: Send + Sync {
    fn name(&self) -> &str;

    fn get_table_schema(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, ProviderError>;

    fn get_semantic_view_yaml(
        &self,
        database: &str,
        schema: &str,
        view: &str,
    ) -> Result<Option<SemanticViewExport>, ProviderError>;
}

pub(crate) fn object_key(database: &str, schema: &str, name: &str) -> String {
    format!(
        "{}.{}.{}",
        database.to_ascii_uppercase(),
        schema.to_ascii_uppercase(),
        name.to_ascii_uppercase()
    )
}
