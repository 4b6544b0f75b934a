pub mod engine;
pub mod gates;
pub mod graph;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use engine::{evaluate, evaluate_with};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    Structural,
    Semantic,
    Deployability,
}

impl GateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Deployability => "deployability",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    OdlValid,
    NoUnresolvedReferences,
    MappingComplete,
    ConnectedJoinGraph,
    NoAmbiguousJoinPaths,
    MetricGrainConsistency,
    YamlVerifyPasses,
}

impl Gate {
    pub const ALL: [Gate; 7] = [
        Gate::OdlValid,
        Gate::NoUnresolvedReferences,
        Gate::MappingComplete,
        Gate::ConnectedJoinGraph,
        Gate::NoAmbiguousJoinPaths,
        Gate::MetricGrainConsistency,
        Gate::YamlVerifyPasses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OdlValid => "odl_valid",
            Self::NoUnresolvedReferences => "no_unresolved_references",
            Self::MappingComplete => "mapping_complete",
            Self::ConnectedJoinGraph => "connected_join_graph",
            Self::NoAmbiguousJoinPaths => "no_ambiguous_join_paths",
            Self::MetricGrainConsistency => "metric_grain_consistency",
            Self::YamlVerifyPasses => "yaml_verify_passes",
        }
    }

    pub fn category(&self) -> GateCategory {
        match self {
            Self::OdlValid | Self::NoUnresolvedReferences | Self::MappingComplete => {
                GateCategory::Structural
            }
            Self::ConnectedJoinGraph | Self::NoAmbiguousJoinPaths | Self::MetricGrainConsistency => {
                GateCategory::Semantic
            }
            Self::YamlVerifyPasses => GateCategory::Deployability,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown gate: {0}")]
pub struct GateParseError(pub String);

impl FromStr for Gate {
    type Err = GateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gate::ALL
            .into_iter()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| GateParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Fail,
    Warning,
    Skip,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
            Self::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Required,
    Warning,
    Skip,
}

impl Threshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Warning => "warning",
            Self::Skip => "skip",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown threshold: {0}")]
pub struct ThresholdParseError(pub String);

impl FromStr for Threshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "warning" => Ok(Self::Warning),
            "skip" => Ok(Self::Skip),
            _ => Err(ThresholdParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Strict,
    Relaxed,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Relaxed => "relaxed",
        }
    }

    fn default_threshold(&self, gate: Gate) -> Threshold {
        match (self, gate) {
            (Self::Strict, _) => Threshold::Required,
            (
                Self::Relaxed,
                Gate::MappingComplete | Gate::ConnectedJoinGraph | Gate::NoAmbiguousJoinPaths,
            ) => Threshold::Warning,
            (Self::Relaxed, _) => Threshold::Required,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown profile: {0}")]
pub struct ProfileParseError(pub String);

impl FromStr for Profile {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "relaxed" => Ok(Self::Relaxed),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdProfile {
    pub profile: Profile,
    overrides: BTreeMap<Gate, Threshold>,
}

impl ThresholdProfile {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            overrides: BTreeMap::new(),
        }
    }

    pub fn strict() -> Self {
        Self::new(Profile::Strict)
    }

    pub fn relaxed() -> Self {
        Self::new(Profile::Relaxed)
    }

    pub fn with_override(mut self, gate: Gate, threshold: Threshold) -> Self {
        self.overrides.insert(gate, threshold);
        self
    }

    pub fn threshold(&self, gate: Gate) -> Threshold {
        self.overrides
            .get(&gate)
            .copied()
            .unwrap_or_else(|| self.profile.default_threshold(gate))
    }
}

impl Default for ThresholdProfile {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    pub gate: Gate,
    pub category: GateCategory,
    pub threshold: Threshold,
    pub status: GateStatus,
    pub message: String,
    pub details: Value,
}

impl GateResult {
    pub fn is_blocking(&self, profile: Profile) -> bool {
        if self.threshold != Threshold::Required {
            return false;
        }
        match self.status {
            GateStatus::Fail => true,
            GateStatus::Warning => profile == Profile::Strict,
            GateStatus::Pass | GateStatus::Skip => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub skipped: usize,
}

impl GateCounts {
    fn record(&mut self, status: GateStatus) {
        self.total += 1;
        match status {
            GateStatus::Pass => self.passed += 1,
            GateStatus::Fail => self.failed += 1,
            GateStatus::Warning => self.warnings += 1,
            GateStatus::Skip => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub overall: GateCounts,
    pub by_category: BTreeMap<GateCategory, GateCounts>,
}

impl EvaluationSummary {
    pub fn from_gates(gates: &[GateResult]) -> Self {
        let mut summary = Self::default();
        for gate in gates {
            summary.overall.record(gate.status);
            summary
                .by_category
                .entry(gate.category)
                .or_default()
                .record(gate.status);
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub profile: Profile,
    pub version_id: i64,
    pub passed: bool,
    pub gates: Vec<GateResult>,
    pub summary: EvaluationSummary,
}

impl EvaluationResult {
    pub fn gate(&self, gate: Gate) -> Option<&GateResult> {
        self.gates.iter().find(|g| g.gate == gate)
    }

    pub fn blocking_gates(&self) -> Vec<&GateResult> {
        self.gates
            .iter()
            .filter(|g| g.is_blocking(self.profile))
            .collect()
    }
}
