pub mod bundle;
pub mod semantic_model;
pub mod sql;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ir::OdlIr;

pub use bundle::{ArtifactBundle, ArtifactFile, BundleError, BundleMetadata};
pub use semantic_model::{build_semantic_model, SemanticModel};

pub const SEMANTIC_MODEL_FILE: &str = "semantic_model.yaml";
pub const VERIFY_FILE: &str = "verify.sql";
pub const DEPLOY_FILE: &str = "deploy.sql";
pub const TARGET_PLATFORM: &str = "snowflake";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no target {0} given and the document declares no mapping block for it")]
    MissingTarget(&'static str),
    #[error("semantic view name must not be empty")]
    EmptyViewName,
    #[error("failed rendering semantic model: {0}")]
    Render(#[from] serde_yaml::Error),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewTarget {
    pub database: String,
    pub schema: String,
    pub view_name: String,
}

impl ViewTarget {
    pub fn qualified_schema(&self) -> String {
        format!("{}.{}", self.database, self.schema)
    }

    pub fn qualified_view(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.view_name)
    }

    pub fn identifier(&self) -> String {
        format!("{TARGET_PLATFORM}:{}", self.qualified_view())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub view_name: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub version_id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CompileOptions {
    pub fn with_view_name(mut self, view_name: impl Into<String>) -> Self {
        self.view_name = Some(view_name.into());
        self
    }

    pub fn with_version_id(mut self, version_id: i64) -> Self {
        self.version_id = Some(version_id);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub target: ViewTarget,
    pub model: SemanticModel,
    pub yaml: String,
    pub verify_sql: String,
    pub deploy_sql: String,
}

/// `{ontology name}_semantic_view`, lowercased with anything outside
/// `[a-z0-9_]` replaced by `_`.
pub fn default_view_name(ir: &OdlIr) -> String {
    let base: String = ir
        .name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if base.is_empty() {
        "semantic_view".to_string()
    } else {
        format!("{base}_semantic_view")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn resolve_target(ir: &OdlIr, options: &CompileOptions) -> Result<ViewTarget, CompileError> {
    let mapping = ir.snowflake.as_ref();
    let database = non_empty(options.database.as_deref())
        .or_else(|| non_empty(mapping.map(|m| m.database.as_str())))
        .ok_or(CompileError::MissingTarget("database"))?;
    let schema = non_empty(options.schema.as_deref())
        .or_else(|| non_empty(mapping.map(|m| m.schema.as_str())))
        .ok_or(CompileError::MissingTarget("schema"))?;
    let view_name = match options.view_name.as_deref() {
        Some(name) => non_empty(Some(name))
            .ok_or(CompileError::EmptyViewName)?
            .to_string(),
        None => default_view_name(ir),
    };

    Ok(ViewTarget {
        database: database.to_string(),
        schema: schema.to_string(),
        view_name,
    })
}

pub fn compile_for_target(
    ir: &OdlIr,
    target: &ViewTarget,
    version_id: Option<i64>,
) -> Result<CompiledModel, CompileError> {
    if target.view_name.trim().is_empty() {
        return Err(CompileError::EmptyViewName);
    }
    let model = build_semantic_model(ir, target);
    let yaml = semantic_model::render_yaml(&model)?;
    let verify_sql = sql::render_verify_sql(target, &yaml, version_id);
    let deploy_sql = sql::render_deploy_sql(target, &yaml, version_id);
    debug!(
        view = %target.qualified_view(),
        tables = model.tables.len(),
        facts = model.facts.len(),
        "rendered semantic model"
    );
    Ok(CompiledModel {
        target: target.clone(),
        model,
        yaml,
        verify_sql,
        deploy_sql,
    })
}

pub fn compile_model(ir: &OdlIr, options: &CompileOptions) -> Result<CompiledModel, CompileError> {
    let target = resolve_target(ir, options)?;
    compile_for_target(ir, &target, options.version_id)
}

pub fn compile(ir: &OdlIr, options: &CompileOptions) -> Result<ArtifactBundle, CompileError> {
    let compiled = compile_model(ir, options)?;
    let files = vec![
        ArtifactFile::new(SEMANTIC_MODEL_FILE, compiled.yaml.clone()),
        ArtifactFile::new(VERIFY_FILE, compiled.verify_sql.clone()),
        ArtifactFile::new(DEPLOY_FILE, compiled.deploy_sql.clone()),
        ArtifactFile::new(bundle::INSTRUCTIONS_FILE, render_instructions(&compiled, options.version_id)),
        ArtifactFile::new(bundle::ROLLBACK_FILE, render_rollback(&compiled.target)),
    ];
    let bundle = ArtifactBundle::assemble(
        compiled.target.view_name.clone(),
        files,
        compiled.target.identifier(),
        options.version_id,
        options.timestamp.unwrap_or_else(Utc::now),
    )?;
    info!(
        view = %compiled.target.qualified_view(),
        checksum = %bundle.checksum(),
        "compiled artifact bundle"
    );
    Ok(bundle)
}

fn render_instructions(compiled: &CompiledModel, version_id: Option<i64>) -> String {
    let target = &compiled.target;
    let version = version_id
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string());
    format!(
        "# Deploy semantic view `{view}`\n\n\
         Target: `{qualified}`  \n\
         Version: {version}  \n\
         Logical tables: {tables}, relationships: {relationships}, facts: {facts}\n\n\
         ## Steps\n\n\
         1. Run `{verify}`. The call validates `{model}` without creating the view.\n\
         2. If verification succeeds, run `{deploy}`.\n\
         3. Confirm the final exact-name lookup after `SHOW SEMANTIC VIEWS` returns one row.\n\n\
         Compare the checksum in `metadata.json` against the reviewed bundle before deploying.\n",
        view = target.view_name,
        qualified = target.qualified_view(),
        tables = compiled.model.tables.len(),
        relationships = compiled.model.relationships.len(),
        facts = compiled.model.facts.len(),
        verify = VERIFY_FILE,
        deploy = DEPLOY_FILE,
        model = SEMANTIC_MODEL_FILE,
    )
}

fn render_rollback(target: &ViewTarget) -> String {
    format!(
        "# Roll back semantic view `{view}`\n\n\
         This bundle carries no exported previous definition. To remove the view:\n\n\
         ```sql\n{sql}```\n\n\
         To restore an earlier definition, redeploy the `{deploy}` of the previous bundle.\n",
        view = target.view_name,
        sql = sql::render_drop_sql(target),
        deploy = DEPLOY_FILE,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::normalizer::normalize;

    fn ir() -> OdlIr {
        normalize(&json!({
            "version": "1.0.0",
            "name": "Sales Ontology",
            "objects": [
                {"name": "Order", "identifiers": ["id"], "properties": [
                    {"name": "id", "type": "string"},
                    {"name": "customer_id", "type": "string"}
                ]},
                {"name": "Customer", "identifiers": ["id"], "properties": [{"name": "id", "type": "string"}]}
            ],
            "relationships": [
                {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"]]}
            ],
            "snowflake": {"database": "TEST_DB", "schema": "PUBLIC"}
        }))
    }

    #[test]
    fn resolves_target_from_mapping_and_defaults_view_name() {
        let target = resolve_target(&ir(), &CompileOptions::default()).unwrap();
        assert_eq!(target.qualified_view(), "TEST_DB.PUBLIC.sales_ontology_semantic_view");
        assert_eq!(target.identifier(), "snowflake:TEST_DB.PUBLIC.sales_ontology_semantic_view");
    }

    #[test]
    fn options_override_mapping() {
        let options = CompileOptions {
            database: Some("PROD_DB".to_string()),
            ..CompileOptions::default()
        }
        .with_view_name("orders_view");
        let target = resolve_target(&ir(), &options).unwrap();
        assert_eq!(target.qualified_view(), "PROD_DB.PUBLIC.orders_view");
    }

    #[test]
    fn missing_target_and_empty_view_are_errors() {
        let mut unmapped = ir();
        unmapped.snowflake = None;
        let err = compile(&unmapped, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::MissingTarget("database")));

        let err = compile(&ir(), &CompileOptions::default().with_view_name("  ")).unwrap_err();
        assert!(matches!(err, CompileError::EmptyViewName));
    }

    #[test]
    fn bundle_has_scripts_and_mandatory_members() {
        let bundle = compile(&ir(), &CompileOptions::default().with_version_id(3)).unwrap();
        assert_eq!(
            bundle.paths(),
            vec![
                DEPLOY_FILE,
                bundle::INSTRUCTIONS_FILE,
                bundle::METADATA_FILE,
                bundle::ROLLBACK_FILE,
                SEMANTIC_MODEL_FILE,
                VERIFY_FILE
            ]
        );
        assert!(bundle.file(VERIFY_FILE).unwrap().content.contains("verify_only => TRUE"));
        assert_eq!(bundle.metadata.version_id, Some(3));
        assert!(bundle.verify_checksum());
    }

    #[test]
    fn compilation_is_deterministic() {
        let first = compile(
            &ir(),
            &CompileOptions {
                timestamp: Utc.timestamp_opt(0, 0).single(),
                ..CompileOptions::default()
            },
        )
        .unwrap();
        let second = compile(&ir(), &CompileOptions::default()).unwrap();
        assert_eq!(first.checksum(), second.checksum());
    }
}
