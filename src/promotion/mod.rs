pub mod rollback;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::compiler::bundle::{INSTRUCTIONS_FILE, ROLLBACK_FILE};
use crate::compiler::{
    compile_for_target, ArtifactBundle, ArtifactFile, BundleError, CompileError, ViewTarget,
    DEPLOY_FILE, SEMANTIC_MODEL_FILE, TARGET_PLATFORM, VERIFY_FILE,
};
use crate::ir::{OdlIr, SnowflakeMappingIr};
use crate::provider::SchemaProvider;

pub use rollback::{plan_rollback, RollbackPlan};

pub const ROLLBACK_SQL_FILE: &str = "rollback.sql";
pub const ROLLBACK_MODEL_FILE: &str = "rollback_semantic_model.yaml";

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("no promotion environments configured")]
    NoEnvironments,
    #[error("environment '{env}': {source}")]
    Compile {
        env: String,
        #[source]
        source: CompileError,
    },
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

#[derive(Debug, Clone, Default)]
pub struct PromotionOptions {
    pub version_id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Development stages come first and production last; unknown names sit
/// between staging and production.
pub fn environment_rank(name: &str) -> u8 {
    match name.trim().to_ascii_lowercase().as_str() {
        "dev" | "development" | "local" => 0,
        "test" | "qa" | "ci" => 1,
        "staging" | "stage" | "uat" | "preprod" => 2,
        "prod" | "production" | "live" => 4,
        _ => 3,
    }
}

pub fn ordered_environments(environments: &BTreeMap<String, ViewTarget>) -> Vec<(&str, &ViewTarget)> {
    let mut ordered: Vec<(&str, &ViewTarget)> = environments
        .iter()
        .map(|(name, target)| (name.as_str(), target))
        .collect();
    ordered.sort_by(|a, b| {
        environment_rank(a.0)
            .cmp(&environment_rank(b.0))
            .then_with(|| a.0.cmp(b.0))
    });
    ordered
}

fn retarget(ir: &OdlIr, target: &ViewTarget) -> OdlIr {
    let mut ir = ir.clone();
    let mapping = ir.snowflake.get_or_insert_with(|| SnowflakeMappingIr {
        database: String::new(),
        schema: String::new(),
        warehouse: None,
        table_mappings: BTreeMap::new(),
    });
    mapping.database = target.database.clone();
    mapping.schema = target.schema.clone();
    ir
}

struct EnvironmentArtifacts<'a> {
    name: &'a str,
    target: &'a ViewTarget,
    yaml: String,
    rollback: RollbackPlan,
}

pub fn generate_promotion_bundle(
    ir: &OdlIr,
    environments: &BTreeMap<String, ViewTarget>,
    provider: Option<&dyn SchemaProvider>,
    options: &PromotionOptions,
) -> Result<ArtifactBundle, PromotionError> {
    let ordered = ordered_environments(environments);
    let Some((_, first_target)) = ordered.first().copied() else {
        return Err(PromotionError::NoEnvironments);
    };

    let mut files = Vec::new();
    let mut rendered = Vec::with_capacity(ordered.len());
    for &(name, target) in &ordered {
        let compiled = compile_for_target(&retarget(ir, target), target, options.version_id)
            .map_err(|source| PromotionError::Compile {
                env: name.to_string(),
                source,
            })?;
        let rollback = plan_rollback(target, provider);

        files.push(ArtifactFile::new(format!("{name}/{VERIFY_FILE}"), compiled.verify_sql));
        files.push(ArtifactFile::new(format!("{name}/{DEPLOY_FILE}"), compiled.deploy_sql));
        files.push(ArtifactFile::new(format!("{name}/{ROLLBACK_SQL_FILE}"), rollback.sql.clone()));
        if let Some(exported) = &rollback.exported_yaml {
            files.push(ArtifactFile::new(format!("{name}/{ROLLBACK_MODEL_FILE}"), exported.clone()));
        }
        rendered.push(EnvironmentArtifacts {
            name,
            target,
            yaml: compiled.yaml,
            rollback,
        });
    }

    if let Some(first) = rendered.first() {
        files.push(ArtifactFile::new(SEMANTIC_MODEL_FILE, first.yaml.clone()));
    }
    files.push(ArtifactFile::new(INSTRUCTIONS_FILE, render_instructions(&rendered, options.version_id)));
    files.push(ArtifactFile::new(ROLLBACK_FILE, render_rollback(&rendered)));

    let target_id = format!(
        "{TARGET_PLATFORM}:{}",
        rendered
            .iter()
            .map(|env| format!("{}={}", env.name, env.target.qualified_view()))
            .collect::<Vec<_>>()
            .join(",")
    );
    let bundle = ArtifactBundle::assemble(
        format!("{}_promotion", first_target.view_name),
        files,
        target_id,
        options.version_id,
        options.timestamp.unwrap_or_else(Utc::now),
    )?;
    info!(
        environments = rendered.len(),
        checksum = %bundle.checksum(),
        "generated promotion bundle"
    );
    Ok(bundle)
}

fn render_instructions(envs: &[EnvironmentArtifacts<'_>], version_id: Option<i64>) -> String {
    let version = version_id
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string());
    let mut out = format!(
        "# Promotion workflow\n\n\
         Version: {version}\n\n\
         Promote one environment at a time in the order below, starting with the first.\n\
         Move on only after the current environment's deploy check returns the view.\n\
         `{SEMANTIC_MODEL_FILE}` is the model as rendered for the first environment; each\n\
         environment's scripts embed the model with its own database and schema.\n\n"
    );
    for (i, env) in envs.iter().enumerate() {
        out.push_str(&format!(
            "## {step}. {name} (`{view}`)\n\n\
             1. Run `{name}/{VERIFY_FILE}` and confirm it succeeds.\n\
             2. Run `{name}/{DEPLOY_FILE}`.\n\
             3. Confirm the exact-name lookup after `SHOW SEMANTIC VIEWS` returns the view.\n\n",
            step = i + 1,
            name = env.name,
            view = env.target.qualified_view(),
        ));
    }
    out.push_str("Compare the checksum in `metadata.json` with the reviewed bundle before each step.\n");
    out
}

fn render_rollback(envs: &[EnvironmentArtifacts<'_>]) -> String {
    let mut out = String::from(
        "# Rollback\n\n\
         Roll back in reverse promotion order, starting with the last environment deployed.\n\n",
    );
    for env in envs.iter().rev() {
        let strategy = if env.rollback.restores_previous() {
            format!(
                "restores the previously deployed definition (saved as `{}/{ROLLBACK_MODEL_FILE}`)",
                env.name
            )
        } else {
            "drops the view; no previous definition was exported".to_string()
        };
        out.push_str(&format!(
            "- **{name}** (`{view}`): run `{name}/{ROLLBACK_SQL_FILE}`, which {strategy}.\n",
            name = env.name,
            view = env.target.qualified_view(),
        ));
    }
    out
}
