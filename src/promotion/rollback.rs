use tracing::{debug, warn};

use crate::compiler::{sql, ViewTarget};
use crate::provider::SchemaProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackPlan {
    pub sql: String,
    pub exported_yaml: Option<String>,
}

impl RollbackPlan {
    pub fn restores_previous(&self) -> bool {
        self.exported_yaml.is_some()
    }
}

/// Restores the currently deployed definition when the provider can export
/// it; otherwise drops the view. Provider failures degrade to the drop
/// plan.
pub fn plan_rollback(target: &ViewTarget, provider: Option<&dyn SchemaProvider>) -> RollbackPlan {
    let exported = match provider {
        Some(provider) => {
            match provider.get_semantic_view_yaml(&target.database, &target.schema, &target.view_name) {
                Ok(found) => found,
                Err(err) => {
                    warn!(
                        view = %target.qualified_view(),
                        error = %err,
                        "could not export deployed semantic view; rollback will drop it"
                    );
                    None
                }
            }
        }
        None => None,
    };

    match exported {
        Some(export) => {
            debug!(view = %target.qualified_view(), "exported previous semantic view");
            RollbackPlan {
                sql: sql::render_restore_sql(target, &export.yaml_content),
                exported_yaml: Some(export.yaml_content),
            }
        }
        None => RollbackPlan {
            sql: sql::render_drop_sql(target),
            exported_yaml: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn target() -> ViewTarget {
        ViewTarget {
            database: "PROD_DB".to_string(),
            schema: "SEM".to_string(),
            view_name: "sales_view".to_string(),
        }
    }

    #[test]
    fn restores_exported_definition() {
        let provider = MockProvider::new().with_view("PROD_DB", "SEM", "sales_view", "name: old_view\n");
        let plan = plan_rollback(&target(), Some(&provider));
        assert!(plan.restores_previous());
        assert!(plan.sql.contains("name: old_view"));
        assert!(plan.sql.contains("DROP SEMANTIC VIEW IF EXISTS PROD_DB.SEM.sales_view;"));
    }

    #[test]
    fn drops_when_nothing_exported() {
        let plan = plan_rollback(&target(), Some(&MockProvider::new()));
        assert!(!plan.restores_previous());
        assert!(plan.sql.contains("Expect zero rows"));

        assert_eq!(plan_rollback(&target(), None), plan);
    }

    #[test]
    fn provider_failure_degrades_to_drop() {
        let provider = MockProvider::unavailable("timeout");
        let plan = plan_rollback(&target(), Some(&provider));
        assert!(!plan.restores_previous());
    }
}
