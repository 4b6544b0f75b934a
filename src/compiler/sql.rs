use crate::compiler::ViewTarget;

const CREATE_FROM_YAML: &str = "SYSTEM$CREATE_SEMANTIC_VIEW_FROM_YAML";

fn version_label(version_id: Option<i64>) -> String {
    version_id
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string())
}

fn create_call(target: &ViewTarget, yaml: &str, verify_only: bool) -> String {
    let flag = if verify_only { "TRUE" } else { "FALSE" };
    format!(
        "CALL {CREATE_FROM_YAML}(\n  {},\n  {},\n  verify_only => {flag}\n);\n",
        quote_literal(&target.qualified_schema()),
        yaml_literal(yaml)
    )
}

fn yaml_literal(yaml: &str) -> String {
    let body = ensure_trailing_newline(yaml);
    if body.contains("$$") {
        quote_literal(&format!("\n{body}"))
    } else {
        format!("$$\n{body}$$")
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
}

fn ensure_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

// LIKE treats `_` and `%` as wildcards, so the listing is filtered again
// on the exact name.
fn existence_check(target: &ViewTarget) -> String {
    let pattern = target
        .view_name
        .replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('%', "\\%");
    format!(
        "SHOW SEMANTIC VIEWS LIKE {} IN SCHEMA {};\n\
         SELECT \"name\" FROM TABLE(RESULT_SCAN(LAST_QUERY_ID())) WHERE \"name\" = {};\n",
        quote_literal(&pattern),
        target.qualified_schema(),
        quote_literal(&target.view_name)
    )
}

pub fn render_verify_sql(target: &ViewTarget, yaml: &str, version_id: Option<i64>) -> String {
    let mut sql = format!(
        "-- Verify semantic view {} (version {})\n",
        target.qualified_view(),
        version_label(version_id)
    );
    sql.push_str(&create_call(target, yaml, true));
    sql
}

pub fn render_deploy_sql(target: &ViewTarget, yaml: &str, version_id: Option<i64>) -> String {
    let mut sql = format!(
        "-- Deploy semantic view {} (version {})\n",
        target.qualified_view(),
        version_label(version_id)
    );
    sql.push_str(&create_call(target, yaml, false));
    sql.push('\n');
    sql.push_str("-- Post-deploy check: the view must exist\n");
    sql.push_str(&existence_check(target));
    sql
}

pub fn render_restore_sql(target: &ViewTarget, exported_yaml: &str) -> String {
    let mut sql = format!(
        "-- Roll back semantic view {} to the previously deployed definition\n",
        target.qualified_view()
    );
    sql.push_str(&format!(
        "DROP SEMANTIC VIEW IF EXISTS {};\n\n",
        target.qualified_view()
    ));
    sql.push_str(&create_call(target, exported_yaml, false));
    sql.push('\n');
    sql.push_str(&existence_check(target));
    sql
}

pub fn render_drop_sql(target: &ViewTarget) -> String {
    let mut sql = format!(
        "-- Roll back semantic view {} (no previous definition exported)\n",
        target.qualified_view()
    );
    sql.push_str(&format!(
        "DROP SEMANTIC VIEW IF EXISTS {};\n\n",
        target.qualified_view()
    ));
    sql.push_str("-- Expect zero rows\n");
    sql.push_str(&existence_check(target));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ViewTarget {
        ViewTarget {
            database: "TEST_DB".to_string(),
            schema: "PUBLIC".to_string(),
            view_name: "sales_view".to_string(),
        }
    }

    #[test]
    fn verify_uses_dry_run_flag() {
        let sql = render_verify_sql(&target(), "name: sales_view\n", Some(7));
        assert!(sql.contains("verify_only => TRUE"));
        assert!(sql.contains("'TEST_DB.PUBLIC'"));
        assert!(sql.contains("(version 7)"));
        assert!(!sql.contains("SHOW SEMANTIC VIEWS"));
    }

    #[test]
    fn deploy_creates_and_checks_existence() {
        let sql = render_deploy_sql(&target(), "name: sales_view", None);
        assert!(sql.contains("verify_only => FALSE"));
        assert!(sql.contains("name: sales_view\n$$"));
        assert!(sql.contains(r"SHOW SEMANTIC VIEWS LIKE 'sales\\_view' IN SCHEMA TEST_DB.PUBLIC;"));
        assert!(sql.contains(r#"WHERE "name" = 'sales_view';"#));
    }

    #[test]
    fn rollback_variants() {
        let restore = render_restore_sql(&target(), "name: sales_view\n");
        assert!(restore.contains("DROP SEMANTIC VIEW IF EXISTS TEST_DB.PUBLIC.sales_view;"));
        assert!(restore.contains("verify_only => FALSE"));

        let drop = render_drop_sql(&target());
        assert!(drop.contains("DROP SEMANTIC VIEW IF EXISTS"));
        assert!(!drop.contains(CREATE_FROM_YAML));
    }

    #[test]
    fn yaml_with_dollar_quotes_falls_back_to_single_quotes() {
        let yaml = "name: sales_view\ndescription: price in $$ terms, customer's view\n";
        let sql = render_deploy_sql(&target(), yaml, None);
        assert_eq!(sql.matches("$$").count(), 1);
        assert!(sql.contains("'\nname: sales_view\ndescription: price in $$ terms, customer''s view\n',"));
    }

    #[test]
    fn quotes_in_view_name_are_doubled() {
        let mut odd = target();
        odd.view_name = "o'brien_view".to_string();
        let sql = render_drop_sql(&odd);
        assert!(sql.contains(r#"WHERE "name" = 'o''brien_view';"#));
        assert!(sql.contains(r"LIKE 'o''brien\\_view'"));
    }
}
