use serde_json::json;
use tracing::{debug, info};

use crate::compiler::CompileOptions;
use crate::evaluation::gates::{self, GateOutcome, Outcome};
use crate::evaluation::{
    EvaluationResult, EvaluationSummary, Gate, GateResult, GateStatus, Threshold, ThresholdProfile,
};
use crate::ir::OdlIr;

pub fn evaluate(ir: &OdlIr, version_id: i64, profile: &ThresholdProfile) -> EvaluationResult {
    let options = CompileOptions {
        version_id: Some(version_id),
        ..CompileOptions::default()
    };
    evaluate_with(ir, version_id, profile, &options)
}

pub fn evaluate_with(
    ir: &OdlIr,
    version_id: i64,
    profile: &ThresholdProfile,
    compile: &CompileOptions,
) -> EvaluationResult {
    let gates: Vec<GateResult> = Gate::ALL
        .iter()
        .map(|gate| run_gate(*gate, ir, profile, compile))
        .collect();

    let passed = !gates.iter().any(|g| g.is_blocking(profile.profile));
    let summary = EvaluationSummary::from_gates(&gates);
    info!(
        ontology = %ir.name,
        version_id,
        profile = %profile.profile,
        passed,
        failed = summary.overall.failed,
        warnings = summary.overall.warnings,
        "evaluation finished"
    );

    EvaluationResult {
        profile: profile.profile,
        version_id,
        passed,
        gates,
        summary,
    }
}

fn run_gate(
    gate: Gate,
    ir: &OdlIr,
    profile: &ThresholdProfile,
    compile: &CompileOptions,
) -> GateResult {
    let threshold = profile.threshold(gate);
    if threshold == Threshold::Skip {
        return GateResult {
            gate,
            category: gate.category(),
            threshold,
            status: GateStatus::Skip,
            message: "skipped by threshold".to_string(),
            details: json!({}),
        };
    }

    let GateOutcome {
        outcome,
        message,
        details,
    } = match gate {
        Gate::OdlValid => gates::odl_valid(ir),
        Gate::NoUnresolvedReferences => gates::no_unresolved_references(ir),
        Gate::MappingComplete => gates::mapping_complete(ir),
        Gate::ConnectedJoinGraph => gates::connected_join_graph(ir),
        Gate::NoAmbiguousJoinPaths => gates::no_ambiguous_join_paths(ir),
        Gate::MetricGrainConsistency => gates::metric_grain_consistency(ir),
        Gate::YamlVerifyPasses => gates::yaml_verify_passes(ir, compile),
    };

    let status = match (outcome, threshold) {
        (Outcome::Pass, _) => GateStatus::Pass,
        (Outcome::Warning, _) => GateStatus::Warning,
        (Outcome::Fail, Threshold::Warning) => GateStatus::Warning,
        (Outcome::Fail, _) => GateStatus::Fail,
    };
    debug!(gate = %gate, status = status.as_str(), threshold = threshold.as_str(), "gate evaluated");

    GateResult {
        gate,
        category: gate.category(),
        threshold,
        status,
        message,
        details,
    }
}
