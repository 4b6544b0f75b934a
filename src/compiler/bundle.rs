//! Checksummed artifact bundles.
//!
//! The checksum is SHA-256 over `"path:content"` entries of every file
//! except `metadata.json`, sorted by path and joined by `\n`. It ignores the
//! generation timestamp, so it identifies the bundle's deployable content.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub const INSTRUCTIONS_FILE: &str = "instructions.md";
pub const ROLLBACK_FILE: &str = "rollback.md";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle is missing mandatory file {0}")]
    MissingMember(&'static str),
    #[error("failed writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed writing zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed encoding bundle metadata: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFile {
    pub path: String,
    pub content: String,
}

impl ArtifactFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleMetadata {
    pub target: String,
    pub timestamp: String,
    pub version_id: Option<i64>,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactBundle {
    pub name: String,
    pub files: Vec<ArtifactFile>,
    pub metadata: BundleMetadata,
}

impl ArtifactBundle {
    /// Adds `metadata.json` to `files` and computes the checksum. The
    /// instructions and rollback members must already be present.
    pub fn assemble(
        name: impl Into<String>,
        mut files: Vec<ArtifactFile>,
        target: impl Into<String>,
        version_id: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, BundleError> {
        for required in [INSTRUCTIONS_FILE, ROLLBACK_FILE] {
            if !files.iter().any(|f| f.path == required) {
                return Err(BundleError::MissingMember(required));
            }
        }
        files.retain(|f| f.path != METADATA_FILE);
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let metadata = BundleMetadata {
            target: target.into(),
            timestamp: format_timestamp(timestamp),
            version_id,
            checksum: compute_checksum(&files),
        };
        let encoded = serde_json::to_string_pretty(&metadata)?;
        files.push(ArtifactFile::new(METADATA_FILE, format!("{encoded}\n")));
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Self {
            name: name.into(),
            files,
            metadata,
        })
    }

    pub fn checksum(&self) -> &str {
        &self.metadata.checksum
    }

    pub fn file(&self, path: &str) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    pub fn verify_checksum(&self) -> bool {
        let content: Vec<ArtifactFile> = self
            .files
            .iter()
            .filter(|f| f.path != METADATA_FILE)
            .cloned()
            .collect();
        compute_checksum(&content) == self.metadata.checksum
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| BundleError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, &file.content).map_err(|source| BundleError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        info!(
            bundle = %self.name,
            dir = %dir.display(),
            files = written.len(),
            checksum = %self.metadata.checksum,
            "wrote artifact bundle"
        );
        Ok(written)
    }

    pub fn write_zip(&self, path: &Path) -> Result<(), BundleError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BundleError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = fs::File::create(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for entry in &self.files {
            archive.start_file(entry.path.as_str(), options)?;
            archive
                .write_all(entry.content.as_bytes())
                .map_err(|source| BundleError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        archive.finish()?;
        info!(
            bundle = %self.name,
            zip = %path.display(),
            checksum = %self.metadata.checksum,
            "wrote zipped artifact bundle"
        );
        Ok(())
    }
}

pub fn compute_checksum(files: &[ArtifactFile]) -> String {
    let mut sorted: Vec<&ArtifactFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let joined = sorted
        .iter()
        .map(|f| format!("{}:{}", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
