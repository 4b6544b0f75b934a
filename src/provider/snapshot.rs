//! File-backed provider over exported warehouse metadata.
//!
//! Layout under the root directory:
//!
//! ```text
//! {DATABASE}/{SCHEMA}/{TABLE}.json        table export (TableSchema JSON)
//! {DATABASE}/{SCHEMA}/views/{VIEW}.yaml   semantic view export
//! ```
//!
//! Directory and file names are matched case-insensitively.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::provider::{ProviderError, SchemaProvider, SemanticViewExport, TableSchema};

const VIEWS_DIR: &str = "views";

#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    root: PathBuf,
}

impl SnapshotProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn schema_dir(&self, database: &str, schema: &str) -> Result<Option<PathBuf>, ProviderError> {
        let Some(db_dir) = find_entry(&self.root, database)? else {
            return Ok(None);
        };
        find_entry(&db_dir, schema)
    }
}

fn find_entry(dir: &Path, name: &str) -> Result<Option<PathBuf>, ProviderError> {
    let exact = dir.join(name);
    if exact.exists() {
        return Ok(Some(exact));
    }
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = fs::read_dir(dir).map_err(|source| ProviderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ProviderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn read(path: &Path) -> Result<String, ProviderError> {
    fs::read_to_string(path).map_err(|source| ProviderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl SchemaProvider for SnapshotProvider {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn get_table_schema(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, ProviderError> {
        let Some(dir) = self.schema_dir(database, schema)? else {
            return Ok(None);
        };
        let Some(path) = find_entry(&dir, &format!("{table}.json"))? else {
            debug!(database, schema, table, "no table snapshot");
            return Ok(None);
        };
        let raw = read(&path)?;
        let parsed: TableSchema =
            serde_json::from_str(&raw).map_err(|e| ProviderError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(Some(parsed))
    }

    fn get_semantic_view_yaml(
        &self,
        database: &str,
        schema: &str,
        view: &str,
    ) -> Result<Option<SemanticViewExport>, ProviderError> {
        let Some(dir) = self.schema_dir(database, schema)? else {
            return Ok(None);
        };
        let Some(views) = find_entry(&dir, VIEWS_DIR)? else {
            return Ok(None);
        };
        let Some(path) = find_entry(&views, &format!("{view}.yaml"))? else {
            return Ok(None);
        };
        Ok(Some(SemanticViewExport {
            view_name: view.to_string(),
            yaml_content: read(&path)?,
        }))
    }
}
