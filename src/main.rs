use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use odl_governance::compiler::{self, ArtifactBundle};
use odl_governance::config::{Config, ConfigOverrides};
use odl_governance::diff::diff_ir;
use odl_governance::drift::detect_drift;
use odl_governance::evaluation::{evaluate_with, Profile};
use odl_governance::loader::DocumentSource;
use odl_governance::output::csv::{diff_to_csv, drift_to_csv, evaluation_to_csv, validation_to_csv};
use odl_governance::output::json::render_json;
use odl_governance::output::table::{
    render_bundle_table, render_diff_table, render_drift_table, render_evaluation_table,
    render_validation_table,
};
use odl_governance::pipeline::{load_valid_ir, process};
use odl_governance::promotion::{generate_promotion_bundle, PromotionOptions};
use odl_governance::provider::{SchemaProvider, SnapshotProvider};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "odlc", about = "Ontology governance: validate, diff, evaluate, compile, promote")]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Fallback database when the document has no mapping block
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    schema: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Validate {
        doc: PathBuf,
    },
    Normalize {
        doc: PathBuf,
    },
    Diff {
        old: PathBuf,
        new: PathBuf,
    },
    Evaluate {
        doc: PathBuf,
        #[arg(long)]
        profile: Option<Profile>,
        #[arg(long = "version-id", default_value_t = 1)]
        version_id: i64,
    },
    Compile {
        doc: PathBuf,
        #[arg(long)]
        view: Option<String>,
        #[arg(long)]
        out: Option<String>,
        #[arg(long)]
        zip: bool,
        #[arg(long = "version-id")]
        version_id: Option<i64>,
    },
    Promote {
        doc: PathBuf,
        #[arg(long)]
        out: Option<String>,
        #[arg(long)]
        zip: bool,
        #[arg(long = "version-id")]
        version_id: Option<i64>,
    },
    Drift {
        doc: PathBuf,
        #[arg(long = "snapshot-dir")]
        snapshot_dir: Option<String>,
        /// Also compare the deployed semantic view with the compiled one
        #[arg(long = "semantic-view")]
        semantic_view: bool,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(overrides_from_cli(&cli));

    match &cli.command {
        Commands::Validate { doc } => {
            let processed = process(&source(doc))?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_validation_table(&processed.report)),
                OutputFormat::Json => println!("{}", render_json(&processed.report)?),
                OutputFormat::Csv => print!("{}", validation_to_csv(&processed.report)?),
            }
            if !processed.is_valid() {
                bail!(
                    "{} failed validation with {} error(s)",
                    doc.display(),
                    processed.report.errors.len()
                );
            }
        }
        Commands::Normalize { doc } => {
            let processed = process(&source(doc))?;
            if !processed.is_valid() {
                warn!(
                    errors = processed.report.errors.len(),
                    "normalizing a document that failed validation"
                );
            }
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_json(&processed.ir)?);
                    println!("Fingerprint: {}", processed.ir.fingerprint());
                }
                OutputFormat::Json => println!("{}", render_json(&processed.ir)?),
                OutputFormat::Csv => {
                    warn!("CSV output for normalize not implemented, using JSON");
                    println!("{}", render_json(&processed.ir)?);
                }
            }
        }
        Commands::Diff { old, new } => {
            let old_ir = process(&source(old))?.ir;
            let new_ir = process(&source(new))?.ir;
            let result = diff_ir(&old_ir, &new_ir);
            match cli.output {
                OutputFormat::Table => println!("{}", render_diff_table(&result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
                OutputFormat::Csv => print!("{}", diff_to_csv(&result)?),
            }
        }
        Commands::Evaluate {
            doc,
            profile,
            version_id,
        } => {
            if let Some(profile) = profile {
                config.evaluation.profile = *profile;
            }
            let thresholds = config.threshold_profile()?;
            let ir = process(&source(doc))?.ir;
            let result = evaluate_with(&ir, *version_id, &thresholds, &config.compile_options());
            match cli.output {
                OutputFormat::Table => println!("{}", render_evaluation_table(&result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
                OutputFormat::Csv => print!("{}", evaluation_to_csv(&result)?),
            }
            if !result.passed {
                bail!(
                    "evaluation failed: {} blocking gate(s)",
                    result.blocking_gates().len()
                );
            }
        }
        Commands::Compile {
            doc,
            view,
            out,
            zip,
            version_id,
        } => {
            let ir = load_valid_ir(&source(doc))?;
            let mut options = config.compile_options();
            if let Some(view) = view {
                options = options.with_view_name(view.clone());
            }
            if let Some(version_id) = version_id {
                options = options.with_version_id(*version_id);
            }
            let bundle = compiler::compile(&ir, &options)?;
            let written = write_bundle(&bundle, &config, out.as_deref(), *zip)?;
            print_bundle(&bundle, &written, cli.output)?;
        }
        Commands::Promote {
            doc,
            out,
            zip,
            version_id,
        } => {
            if config.environments.is_empty() {
                bail!(
                    "no [environments] configured in {}; run `odlc config --init` for a template",
                    config_path.display()
                );
            }
            let ir = load_valid_ir(&source(doc))?;
            let snapshot = config.resolved_snapshot_dir().map(SnapshotProvider::new);
            if snapshot.is_none() {
                info!("no snapshot directory configured; rollback scripts will drop new views");
            }
            let options = PromotionOptions {
                version_id: *version_id,
                timestamp: None,
            };
            let bundle = generate_promotion_bundle(
                &ir,
                &config.environments,
                snapshot.as_ref().map(|p| p as &dyn SchemaProvider),
                &options,
            )?;
            let written = write_bundle(&bundle, &config, out.as_deref(), *zip)?;
            print_bundle(&bundle, &written, cli.output)?;
        }
        Commands::Drift {
            doc,
            snapshot_dir,
            semantic_view,
        } => {
            if let Some(dir) = snapshot_dir {
                config.provider.snapshot_dir = dir.clone();
            }
            let root = config
                .resolved_snapshot_dir()
                .ok_or_else(|| anyhow!("drift needs --snapshot-dir or [provider] snapshot_dir"))?;
            let provider = SnapshotProvider::new(root);
            let ir = load_valid_ir(&source(doc))?;
            let mut options = config.drift_options();
            if *semantic_view {
                let target = compiler::resolve_target(&ir, &config.compile_options())
                    .context("cannot locate the semantic view to compare against")?;
                options.semantic_view = Some(target);
            }
            let result = detect_drift(&ir, &provider, &options)?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_drift_table(&result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
                OutputFormat::Csv => print!("{}", drift_to_csv(&result)?),
            }
        }
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
    }

    Ok(())
}

fn overrides_from_cli(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        database: cli.database.clone(),
        schema: cli.schema.clone(),
        ..ConfigOverrides::default()
    }
}

fn source(path: &Path) -> DocumentSource {
    DocumentSource::Path(path.to_path_buf())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn write_bundle(
    bundle: &ArtifactBundle,
    config: &Config,
    out: Option<&str>,
    zip: bool,
) -> Result<Vec<PathBuf>> {
    let base = out
        .map(odl_governance::config::expand_tilde)
        .unwrap_or_else(|| config.resolved_bundle_dir());
    if zip || config.output.zip {
        let path = base.join(format!("{}.zip", bundle.name));
        bundle
            .write_zip(&path)
            .with_context(|| format!("failed writing bundle archive: {}", path.display()))?;
        info!(path = %path.display(), "wrote bundle archive");
        Ok(vec![path])
    } else {
        let dir = base.join(&bundle.name);
        let written = bundle
            .write_to_dir(&dir)
            .with_context(|| format!("failed writing bundle directory: {}", dir.display()))?;
        info!(dir = %dir.display(), files = written.len(), "wrote bundle");
        Ok(written)
    }
}

fn print_bundle(bundle: &ArtifactBundle, written: &[PathBuf], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_bundle_table(bundle));
            for path in written {
                println!("  {}", path.display());
            }
        }
        OutputFormat::Json => println!("{}", render_json(&bundle.metadata)?),
        OutputFormat::Csv => {
            warn!("CSV output for bundles not implemented, using JSON");
            println!("{}", render_json(&bundle.metadata)?);
        }
    }
    Ok(())
}
