use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde_json::Value;

use crate::compiler::ArtifactBundle;
use crate::diff::{Change, DiffResult};
use crate::drift::{DriftDetectionResult, DriftEventType};
use crate::evaluation::{EvaluationResult, GateStatus};
use crate::validator::ValidationReport;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn compact(value: &Option<Value>) -> String {
    match value {
        None => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_validation_table(report: &ValidationReport) -> String {
    if report.is_valid {
        return "Document is valid (0 errors)".to_string();
    }
    let mut table = new_table();
    table.set_header(vec!["#", "Path", "Message", "Value"]);
    for (idx, err) in report.errors.iter().enumerate() {
        table.add_row(vec![
            (idx + 1).to_string(),
            err.path.clone(),
            err.message.clone(),
            compact(&err.value),
        ]);
    }
    format!("{table}\n{} error(s)", report.errors.len())
}

fn change_row(change: &Change) -> Row {
    let class_cell = if change.is_breaking() {
        Cell::new("BREAKING").fg(Color::Red)
    } else {
        Cell::new("non-breaking").fg(Color::Green)
    };
    Row::from(vec![
        class_cell,
        Cell::new(change.category.as_str()),
        Cell::new(&change.element),
        Cell::new(compact(&change.old_value)),
        Cell::new(compact(&change.new_value)),
    ])
}

pub fn render_diff_table(diff: &DiffResult) -> String {
    if diff.is_empty() {
        return "No changes".to_string();
    }
    let mut table = new_table();
    table.set_header(vec!["Class", "Category", "Element", "Old", "New"]);
    for change in diff.all_changes() {
        table.add_row(change_row(change));
    }
    format!(
        "{table}\nBreaking: {}  Non-breaking: {}  Total: {}",
        diff.summary.breaking, diff.summary.non_breaking, diff.summary.total
    )
}

pub fn render_evaluation_table(result: &EvaluationResult) -> String {
    let mut table = new_table();
    table.set_header(vec!["Gate", "Category", "Threshold", "Status", "Message"]);
    for gate in &result.gates {
        let color = match gate.status {
            GateStatus::Pass => Color::Green,
            GateStatus::Fail => Color::Red,
            GateStatus::Warning => Color::Yellow,
            GateStatus::Skip => Color::DarkGrey,
        };
        table.add_row(Row::from(vec![
            Cell::new(gate.gate.as_str()),
            Cell::new(gate.category.as_str()),
            Cell::new(gate.threshold.as_str()),
            Cell::new(gate.status.as_str().to_uppercase()).fg(color),
            Cell::new(&gate.message),
        ]));
    }
    let counts = &result.summary.overall;
    format!(
        "{table}\nProfile: {}  Version: {}  Verdict: {}\nPassed: {}  Failed: {}  Warnings: {}  Skipped: {}",
        result.profile,
        result.version_id,
        if result.passed { "PASS" } else { "FAIL" },
        counts.passed,
        counts.failed,
        counts.warnings,
        counts.skipped
    )
}

pub fn render_drift_table(result: &DriftDetectionResult) -> String {
    if !result.has_drift() {
        return format!("No drift detected for {}", result.ontology);
    }
    let mut table = new_table();
    table.set_header(vec!["Drift", "Event", "Element", "Message"]);
    for event in &result.events {
        let color = match event.event_type {
            DriftEventType::TableMissing | DriftEventType::ColumnMissing => Color::Red,
            DriftEventType::ManualEditDetected | DriftEventType::YamlDivergence => Color::Yellow,
            DriftEventType::ColumnRenamed | DriftEventType::ColumnAdded => Color::Cyan,
        };
        table.add_row(Row::from(vec![
            Cell::new(event.drift_type.as_str()),
            Cell::new(event.event_type.as_str()).fg(color),
            Cell::new(&event.element),
            Cell::new(&event.message),
        ]));
    }
    format!("{table}\n{} event(s)", result.events.len())
}

pub fn render_bundle_table(bundle: &ArtifactBundle) -> String {
    let mut table = new_table();
    table.set_header(vec!["File", "Bytes"]);
    for file in &bundle.files {
        table.add_row(vec![file.path.clone(), file.content.len().to_string()]);
    }
    format!(
        "{table}\nBundle: {}\nTarget: {}\nChecksum: {}",
        bundle.name, bundle.metadata.target, bundle.metadata.checksum
    )
}
