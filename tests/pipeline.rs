use std::collections::BTreeMap;
use std::fs;

use chrono::{TimeZone, Utc};
use odl_governance::compiler::{
    compile, CompileOptions, ViewTarget, DEPLOY_FILE, SEMANTIC_MODEL_FILE, VERIFY_FILE,
};
use odl_governance::diff::{diff_ir, ChangeCategory};
use odl_governance::drift::{detect_drift, DriftEventType, DriftOptions};
use odl_governance::evaluation::{evaluate, GateStatus, ThresholdProfile};
use odl_governance::loader::DocumentSource;
use odl_governance::normalizer::normalize;
use odl_governance::pipeline::{compile_document, process};
use odl_governance::promotion::{generate_promotion_bundle, PromotionOptions};
use odl_governance::provider::MockProvider;
use odl_governance::validator::validate;
use serde_json::{json, Value};

fn orders_document() -> Value {
    json!({
        "version": "1.0.0",
        "objects": [
            {
                "name": "Order",
                "identifiers": ["id"],
                "properties": [
                    {"name": "id", "type": "string"},
                    {"name": "customer_id", "type": "string"}
                ]
            },
            {
                "name": "Customer",
                "identifiers": ["id"],
                "properties": [{"name": "id", "type": "string"}]
            }
        ],
        "relationships": [
            {"name": "placed_by", "from": "Order", "to": "Customer", "joinKeys": [["customer_id", "id"]]}
        ],
        "snowflake": {"database": "TEST_DB", "schema": "PUBLIC"}
    })
}

fn options() -> CompileOptions {
    CompileOptions {
        timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        ..CompileOptions::default()
    }
    .with_view_name("orders_view")
}

#[test]
fn end_to_end_document_compiles() {
    let source = DocumentSource::Value(orders_document());
    let processed = process(&source).unwrap();
    assert!(processed.is_valid());
    assert!(processed.report.errors.is_empty());
    assert_eq!(processed.ir.object_names(), vec!["Customer", "Order"]);

    let bundle = compile_document(&source, &options()).unwrap();
    let verify = &bundle.file(VERIFY_FILE).unwrap().content;
    let deploy = &bundle.file(DEPLOY_FILE).unwrap().content;
    assert!(verify.contains("verify_only => TRUE"));
    assert!(deploy.contains("verify_only => FALSE"));
    assert!(deploy.contains("orders_view"));
    assert!(deploy.contains("TEST_DB.PUBLIC"));
    assert!(bundle.file(SEMANTIC_MODEL_FILE).is_some());
    assert!(bundle.verify_checksum());
}

#[test]
fn yaml_file_loads_like_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.yaml");
    fs::write(&path, serde_yaml::to_string(&orders_document()).unwrap()).unwrap();

    let from_yaml = process(&DocumentSource::Path(path)).unwrap();
    let from_value = process(&DocumentSource::Value(orders_document())).unwrap();
    assert!(from_yaml.is_valid());
    assert_eq!(from_yaml.ir.fingerprint(), from_value.ir.fingerprint());
}

#[test]
fn checksum_is_stable_across_runs() {
    let ir = normalize(&orders_document());
    let first = compile(&ir, &options()).unwrap();
    let later = compile(
        &ir,
        &CompileOptions {
            timestamp: Some(Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap()),
            ..options()
        },
    )
    .unwrap();
    assert_eq!(first.checksum(), later.checksum());
    assert_ne!(first.metadata.timestamp, later.metadata.timestamp);
}

#[test]
fn normalization_ignores_declaration_order() {
    let mut shuffled = orders_document();
    shuffled["objects"].as_array_mut().unwrap().reverse();
    shuffled["objects"][1]["properties"]
        .as_array_mut()
        .unwrap()
        .reverse();

    let a = normalize(&orders_document());
    let b = normalize(&shuffled);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert!(diff_ir(&a, &b).is_empty());
}

#[test]
fn diff_is_symmetric_for_additions() {
    let old = normalize(&orders_document());
    let mut grown = orders_document();
    grown["objects"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "Store", "properties": [{"name": "id", "type": "string"}]}));
    let new = normalize(&grown);

    let forward = diff_ir(&old, &new);
    let backward = diff_ir(&new, &old);
    assert!(!forward
        .find(ChangeCategory::ObjectAdded, "Store")
        .unwrap()
        .is_breaking());
    assert!(backward
        .find(ChangeCategory::ObjectRemoved, "Store")
        .unwrap()
        .is_breaking());
    assert_eq!(forward.summary.total, backward.summary.total);
}

#[test]
fn valid_document_passes_strict_gates() {
    let ir = normalize(&orders_document());
    let result = evaluate(&ir, 7, &ThresholdProfile::strict());
    assert!(result.passed);
    assert_eq!(result.version_id, 7);
    assert!(result.gates.iter().all(|g| g.status == GateStatus::Pass));
}

#[test]
fn invalid_document_is_reported_not_compiled() {
    let mut broken = orders_document();
    broken["relationships"][0]["to"] = json!("Ghost");
    let report = validate(&broken);
    assert!(!report.is_valid);
    assert!(report
        .errors
        .iter()
        .any(|e| e.path == "/relationships/0/to" && e.message.contains("Available objects")));

    let err = compile_document(&DocumentSource::Value(broken), &options()).unwrap_err();
    assert!(!err.validation_errors().is_empty());
}

#[test]
fn drift_against_live_schema() {
    let ir = normalize(&orders_document());
    let provider = MockProvider::new()
        .with_table("TEST_DB", "PUBLIC", "order", &[("ID", "VARCHAR"), ("CUSTOMER_ID", "VARCHAR")])
        .with_table("TEST_DB", "PUBLIC", "customer", &[("ID", "VARCHAR"), ("EMAIL", "VARCHAR")]);

    let result = detect_drift(&ir, &provider, &DriftOptions::default()).unwrap();
    assert_eq!(result.count(DriftEventType::ColumnAdded), 1);
    assert_eq!(result.count(DriftEventType::TableMissing), 0);
}

#[test]
fn promotion_bundle_covers_every_environment() {
    let ir = normalize(&orders_document());
    let mut environments = BTreeMap::new();
    for (env, db) in [("prod", "PROD_DB"), ("dev", "DEV_DB")] {
        environments.insert(
            env.to_string(),
            ViewTarget {
                database: db.to_string(),
                schema: "SEM".to_string(),
                view_name: "orders_view".to_string(),
            },
        );
    }
    let bundle =
        generate_promotion_bundle(&ir, &environments, None, &PromotionOptions::default()).unwrap();
    let dev_deploy = &bundle.file("dev/deploy.sql").unwrap().content;
    let prod_deploy = &bundle.file("prod/deploy.sql").unwrap().content;
    assert!(dev_deploy.contains("DEV_DB.SEM"));
    assert!(prod_deploy.contains("PROD_DB.SEM"));
    assert!(bundle.file("prod/rollback.sql").is_some());
    assert!(bundle.verify_checksum());
}
