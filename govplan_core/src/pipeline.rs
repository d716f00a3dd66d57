//! Pipeline Orchestrator
//!
//! The single entry point that runs the decision engine in its fixed
//! stage order: canonicalizer → dependency engine → risk/impact →
//! optimizer → validator. Later stages must see the effects of
//! earlier ones, so stages are never invoked ad hoc - everything goes
//! through `run_pipeline`.
//!
//! No stage in this core is fatal: bad upstream data degrades into
//! pruning, clamping, and violation strings that travel with the run.

use crate::canonicalizer::{normalize_control_ids, resolve_checklist_ids};
use crate::dependency_engine::{
    build_item_dependency_graph, reorder_roadmap_phases, ItemDependencyGraph,
};
use crate::integrity::{
    clamp_readiness_score, patch_blocker_resolutions, validate_relationship_integrity,
};
use crate::risk_impact::{build_risk_impact_model, RiskImpactModel};
use crate::transform_optimizer::{build_transformation_plan, TransformationPlan};
use crate::types::{
    AssessmentResult, BusinessRisk, ControlCatalogue, ControlPrerequisites, DecisionImpact,
    Readiness, RemediationItem, RoadmapPhases, RunMeta, RunScoring,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors at the JSON input boundary. The decision engine itself never
/// fails; this only covers documents that cannot be deserialized at
/// all.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input document: {0}")]
    InvalidInput(#[from] serde_json::Error),
}

/// Everything one pipeline execution consumes. The upstream generator
/// produced most of it, so none of it is trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentBundle {
    #[serde(default)]
    pub items: Vec<RemediationItem>,
    #[serde(default)]
    pub roadmap: RoadmapPhases,
    #[serde(default)]
    pub results: Vec<AssessmentResult>,
    #[serde(default)]
    pub top_risks: Vec<BusinessRisk>,
    #[serde(default)]
    pub scoring: RunScoring,
    #[serde(default)]
    pub decision_impacts: Vec<DecisionImpact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    /// Lowercase blocker category → resolving checklist identifiers.
    #[serde(default)]
    pub blocker_resolutions: BTreeMap<String, Vec<String>>,
}

impl AssessmentBundle {
    /// Deserialize a bundle from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// The complete output of one pipeline execution. Immutable once
/// persisted; the delta/trend engine reads pairs of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub meta: RunMeta,
    pub items: Vec<RemediationItem>,
    pub results: Vec<AssessmentResult>,
    pub scoring: RunScoring,
    pub roadmap: RoadmapPhases,
    pub normalization_log: Vec<String>,
    pub checklist_resolution_log: Vec<String>,
    #[serde(flatten)]
    pub dependency_graph: ItemDependencyGraph,
    pub risk_impact: RiskImpactModel,
    #[serde(flatten)]
    pub optimization: TransformationPlan,
    pub validation_violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
}

/// Run the full pipeline over one assessment bundle.
///
/// The bundle is consumed: the canonicalizer rewrites items and
/// roadmap entries in place before any downstream stage sees them.
pub fn run_pipeline(
    catalogue: &ControlCatalogue,
    control_prereqs: Option<&ControlPrerequisites>,
    mut bundle: AssessmentBundle,
) -> RunRecord {
    let canonical_keys: BTreeSet<String> = catalogue.keys().cloned().collect();

    // Stage 1: canonicalization. Prunes ungrounded items and rewrites
    // every downstream reference consistently.
    let normalization_log = normalize_control_ids(&mut bundle.items, &canonical_keys);
    let checklist_resolution_log =
        resolve_checklist_ids(&mut bundle.items, &mut bundle.roadmap, catalogue);

    // Stage 2: dependency engine. Owns ordering; nothing after this
    // may change it.
    let dependency_graph = build_item_dependency_graph(&bundle.items, control_prereqs);
    let roadmap = reorder_roadmap_phases(&bundle.roadmap, &dependency_graph);

    // Stage 3: risk/impact annotation (narrative only).
    let risk_impact = build_risk_impact_model(
        &bundle.items,
        &bundle.results,
        &bundle.top_risks,
        &bundle.scoring.section_scores,
    );

    // Stage 4: optimizer annotation within the fixed order.
    let optimization = build_transformation_plan(&bundle.items, &dependency_graph, &risk_impact);

    // Stage 5: readiness guardrails, then cross-checks over the union
    // of all outputs.
    let mut readiness = bundle.readiness;
    if let Some(r) = readiness.as_mut() {
        patch_blocker_resolutions(r, &bundle.blocker_resolutions);
        clamp_readiness_score(r);
    }
    let blockers = readiness
        .as_ref()
        .map(|r| r.blockers.as_slice())
        .unwrap_or(&[]);
    let validation_violations = validate_relationship_integrity(
        &bundle.items,
        blockers,
        &bundle.decision_impacts,
        &roadmap,
    );

    RunRecord {
        meta: new_run_meta(&bundle.results),
        items: bundle.items,
        results: bundle.results,
        scoring: bundle.scoring,
        roadmap,
        normalization_log,
        checklist_resolution_log,
        dependency_graph,
        risk_impact,
        optimization,
        validation_violations,
        readiness,
    }
}

/// Fresh run metadata: random identity, wall-clock timestamp, and a
/// deterministic fingerprint over the canonically sorted results.
fn new_run_meta(results: &[AssessmentResult]) -> RunMeta {
    RunMeta {
        run_id: format!("run-{}", uuid::Uuid::new_v4()),
        timestamp: chrono::Utc::now().to_rfc3339(),
        fingerprint: Some(fingerprint_results(results)),
    }
}

/// Sha256 over the results sorted by (control id, serialized form):
/// two runs over byte-identical assessment data carry the same
/// fingerprint regardless of input order.
pub fn fingerprint_results(results: &[AssessmentResult]) -> String {
    let mut serialized: Vec<String> = results
        .iter()
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .collect();
    serialized.sort();

    let mut hasher = Sha256::new();
    for line in &serialized {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
