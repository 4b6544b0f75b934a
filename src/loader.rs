use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Text(String),
    Value(Value),
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<Value> for DocumentSource {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed document {source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },
    #[error("failed reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn load(source: &DocumentSource) -> Result<Value, LoadError> {
    match source {
        DocumentSource::Path(path) => load_path(path),
        DocumentSource::Text(text) => parse_json("<string>", text),
        DocumentSource::Value(value) => Ok(value.clone()),
    }
}

pub fn load_path(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source_name = path.display().to_string();
    debug!(path = %source_name, bytes = text.len(), "loading ODL document");
    if is_yaml_path(path) {
        parse_yaml(&source_name, &text)
    } else {
        parse_json(&source_name, &text)
    }
}

fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn parse_json(source_name: &str, text: &str) -> Result<Value, LoadError> {
    serde_json::from_str(text).map_err(|e| LoadError::Malformed {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

fn parse_yaml(source_name: &str, text: &str) -> Result<Value, LoadError> {
    serde_yaml::from_str(text).map_err(|e| LoadError::Malformed {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
