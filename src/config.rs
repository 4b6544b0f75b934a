use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::{CompileOptions, ViewTarget};
use crate::drift::{DriftOptions, DEFAULT_MANUAL_EDIT_THRESHOLD};
use crate::evaluation::{Gate, Profile, Threshold, ThresholdProfile};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub environments: BTreeMap<String, ViewTarget>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TargetConfig {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub view_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub profile: Profile,
    /// gate name -> required | warning | skip
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default = "default_manual_edit_threshold")]
    pub manual_edit_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: String,
    #[serde(default)]
    pub zip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub snapshot_dir: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub view_name: Option<String>,
    pub profile: Option<Profile>,
    pub bundle_dir: Option<String>,
    pub zip: Option<bool>,
    pub snapshot_dir: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/odl-governance/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database) = overrides.database {
            self.target.database = database;
        }
        if let Some(schema) = overrides.schema {
            self.target.schema = schema;
        }
        if let Some(view_name) = overrides.view_name {
            self.target.view_name = view_name;
        }
        if let Some(profile) = overrides.profile {
            self.evaluation.profile = profile;
        }
        if let Some(bundle_dir) = overrides.bundle_dir {
            self.output.bundle_dir = bundle_dir;
        }
        if let Some(zip) = overrides.zip {
            self.output.zip = zip;
        }
        if let Some(snapshot_dir) = overrides.snapshot_dir {
            self.provider.snapshot_dir = snapshot_dir;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn threshold_profile(&self) -> Result<ThresholdProfile> {
        let mut profile = ThresholdProfile::new(self.evaluation.profile);
        for (gate, threshold) in &self.evaluation.overrides {
            let gate: Gate = gate
                .parse()
                .with_context(|| format!("invalid [evaluation.overrides] key '{gate}'"))?;
            let threshold: Threshold = threshold
                .parse()
                .with_context(|| format!("invalid threshold for gate '{gate}'"))?;
            profile = profile.with_override(gate, threshold);
        }
        Ok(profile)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            view_name: non_empty(&self.target.view_name),
            database: non_empty(&self.target.database),
            schema: non_empty(&self.target.schema),
            ..CompileOptions::default()
        }
    }

    pub fn drift_options(&self) -> DriftOptions {
        DriftOptions {
            database: non_empty(&self.target.database),
            schema: non_empty(&self.target.schema),
            semantic_view: None,
            manual_edit_threshold: self.drift.manual_edit_threshold,
        }
    }

    pub fn resolved_bundle_dir(&self) -> PathBuf {
        expand_tilde(&self.output.bundle_dir)
    }

    pub fn resolved_snapshot_dir(&self) -> Option<PathBuf> {
        non_empty(&self.provider.snapshot_dir).map(|dir| expand_tilde(&dir))
    }

    pub fn default_template() -> String {
        let template = r#"# Fallback target when a document has no snowflake block
[target]
database = ""
schema = ""
view_name = ""

[evaluation]
profile = "strict"

# Per-gate thresholds on top of the profile: required | warning | skip
[evaluation.overrides]
# connected_join_graph = "warning"

[drift]
manual_edit_threshold = 5

[output]
bundle_dir = "./bundles"
zip = false

[provider]
# Exported table and semantic view definitions
snapshot_dir = ""

# Promotion targets, promoted dev first and prod last
# [environments.dev]
# database = "DEV_DB"
# schema = "SEMANTIC"
# view_name = "sales_semantic_view"
#
# [environments.prod]
# database = "PROD_DB"
# schema = "SEMANTIC"
# view_name = "sales_semantic_view"
"#;
        template.to_string()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            manual_edit_threshold: default_manual_edit_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bundle_dir: default_bundle_dir(),
            zip: false,
        }
    }
}

fn default_manual_edit_threshold() -> usize {
    DEFAULT_MANUAL_EDIT_THRESHOLD
}

fn default_bundle_dir() -> String {
    "./bundles".to_string()
}
