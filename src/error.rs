use thiserror::Error;

use crate::compiler::{BundleError, CompileError};
use crate::loader::LoadError;
use crate::promotion::PromotionError;
use crate::provider::ProviderError;
use crate::validator::ValidationError;

#[derive(Debug, Error)]
pub enum OdlError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("document is invalid: {} error(s)", .0.len())]
    ValidationFailed(Vec<ValidationError>),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Promotion(#[from] PromotionError),
}

impl OdlError {
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::ValidationFailed(errors) => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn validation_failure_reports_count() {
        let err = OdlError::ValidationFailed(vec![
            ValidationError::new("a", "/objects"),
            ValidationError::new("b", "/version"),
        ]);
        assert_eq!(err.to_string(), "document is invalid: 2 error(s)");
        assert_eq!(err.validation_errors().len(), 2);
    }

    #[test]
    fn wraps_component_errors() {
        let err: OdlError = LoadError::NotFound(PathBuf::from("missing.json")).into();
        assert!(err.to_string().contains("missing.json"));
        assert!(err.validation_errors().is_empty());
    }
}
