//! Load, then validate and normalize independently, then compile.
//!
//! An invalid document still yields its IR for inspection; only
//! [`compile_document`] refuses to go further when validation failed.

use serde_json::Value;
use tracing::{info, warn};

use crate::compiler::{self, ArtifactBundle, CompileOptions};
use crate::error::OdlError;
use crate::ir::OdlIr;
use crate::loader::{self, DocumentSource};
use crate::normalizer::normalize;
use crate::validator::{validate, ValidationReport};

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document: Value,
    pub report: ValidationReport,
    pub ir: OdlIr,
}

impl ProcessedDocument {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid
    }

    pub fn ensure_valid(&self) -> Result<&OdlIr, OdlError> {
        if self.report.is_valid {
            Ok(&self.ir)
        } else {
            Err(OdlError::ValidationFailed(self.report.errors.clone()))
        }
    }
}

pub fn process(source: &DocumentSource) -> Result<ProcessedDocument, OdlError> {
    let document = loader::load(source)?;
    let report = validate(&document);
    let ir = normalize(&document);

    if report.is_valid {
        info!(
            ontology = %ir.name,
            version = %ir.version,
            objects = ir.objects.len(),
            "document is valid"
        );
    } else {
        warn!(
            ontology = %ir.name,
            errors = report.errors.len(),
            "document failed validation"
        );
    }
    Ok(ProcessedDocument {
        document,
        report,
        ir,
    })
}

pub fn load_valid_ir(source: &DocumentSource) -> Result<OdlIr, OdlError> {
    let processed = process(source)?;
    processed.ensure_valid()?;
    Ok(processed.ir)
}

pub fn compile_document(
    source: &DocumentSource,
    options: &CompileOptions,
) -> Result<ArtifactBundle, OdlError> {
    let ir = load_valid_ir(source)?;
    Ok(compiler::compile(&ir, options)?)
}
