use anyhow::Result;

use crate::diff::DiffResult;
use crate::drift::DriftDetectionResult;
use crate::evaluation::EvaluationResult;
use crate::validator::ValidationReport;

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn validation_to_csv(report: &ValidationReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["path", "message", "value"])?;
    for err in &report.errors {
        writer.write_record([
            err.path.clone(),
            err.message.clone(),
            err.value.as_ref().map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn diff_to_csv(diff: &DiffResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["classification", "category", "element", "old_value", "new_value"])?;
    for change in diff.all_changes() {
        writer.write_record([
            if change.is_breaking() { "breaking" } else { "non_breaking" }.to_string(),
            change.category.as_str().to_string(),
            change.element.clone(),
            change.old_value.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            change.new_value.as_ref().map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn evaluation_to_csv(result: &EvaluationResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["gate", "category", "threshold", "status", "message"])?;
    for gate in &result.gates {
        writer.write_record([
            gate.gate.as_str(),
            gate.category.as_str(),
            gate.threshold.as_str(),
            gate.status.as_str(),
            gate.message.as_str(),
        ])?;
    }
    finish(writer)
}

pub fn drift_to_csv(result: &DriftDetectionResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["drift_type", "event_type", "element", "message"])?;
    for event in &result.events {
        writer.write_record([
            event.drift_type.as_str(),
            event.event_type.as_str(),
            event.element.as_str(),
            event.message.as_str(),
        ])?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::evaluation::{evaluate, ThresholdProfile};
    use crate::normalizer::normalize;
    use crate::validator::validate;

    #[test]
    fn validation_rows_carry_path_and_json_value() {
        let report = validate(&json!({"version": "1", "objects": [{"name": "A", "properties": []}],
            "relationships": [{"name": "r", "from": "A", "to": "Ghost", "joinKeys": []}]}));
        let csv = validation_to_csv(&report).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("path,message,value"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("/relationships/0/to,Relationship 'r' references unknown target object 'Ghost'"));
        assert!(row.ends_with(r#","""Ghost""""#));
    }

    #[test]
    fn evaluation_has_one_row_per_gate() {
        let ir = normalize(&json!({"version": "1", "objects": [{"name": "A"}]}));
        let result = evaluate(&ir, 1, &ThresholdProfile::strict());
        let csv = evaluation_to_csv(&result).unwrap();
        assert_eq!(csv.lines().count(), result.gates.len() + 1);
    }
}
