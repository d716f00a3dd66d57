//! Structural Integrity Validator
//!
//! Cross-checks referential consistency across the pipeline output and
//! flags violations without repairing them. Referential faults never
//! block output production; the violation list travels with the run.
//!
//! Also carries the readiness-score clamp guardrail against
//! out-of-range generated scores, and the deterministic blocker
//! patcher.

use crate::canonicalizer::is_checklist_id;
use crate::types::{
    Blocker, DecisionImpact, Readiness, RemediationItem, Phase, RoadmapPhases,
};
use std::collections::{BTreeMap, BTreeSet};

/// Upper bound of the readiness score contract.
pub const READINESS_SCORE_MAX: i64 = 100;

/// Validate all cross-references in the pipeline output.
///
/// Returns human-readable violation strings; an empty list means every
/// check passed. Nothing is repaired here.
pub fn validate_relationship_integrity(
    items: &[RemediationItem],
    blockers: &[Blocker],
    decision_impacts: &[DecisionImpact],
    roadmap: &RoadmapPhases,
) -> Vec<String> {
    let mut violations: Vec<String> = Vec::new();

    let item_ids: BTreeSet<&str> = items
        .iter()
        .filter(|i| !i.checklist_id.is_empty())
        .map(|i| i.checklist_id.as_str())
        .collect();

    // Blocker → remediation item references. An empty resolving set is
    // legal: it means no deterministic mapping exists.
    for blocker in blockers {
        for reference in &blocker.resolving_checklist_ids {
            if !item_ids.contains(reference.as_str()) {
                violations.push(format!(
                    "BLOCKER_REF: blocker '{}' references '{}' which does not exist in remediation items.",
                    blocker.category, reference
                ));
            }
            if !is_checklist_id(reference) {
                violations.push(format!(
                    "BLOCKER_INVALID_ID: blocker '{}' references '{}' which is not a valid checklist id.",
                    blocker.category, reference
                ));
            }
        }
    }

    // Decision impacts that cite evidence must carry confidence.
    for impact in decision_impacts {
        if !impact.evidence_controls.is_empty() && impact.confidence <= 0.0 {
            violations.push(format!(
                "IMPACT_NO_CONFIDENCE: decision impact '{}' cites {} evidence control(s) but carries zero confidence.",
                impact.checklist_id,
                impact.evidence_controls.len()
            ));
        }
    }

    // Item identifiers and grounding.
    for item in items {
        if !is_checklist_id(&item.checklist_id) {
            violations.push(format!(
                "ITEM_INVALID_ID: remediation item '{}' does not match the checklist id format (e.g. A01.01).",
                item.checklist_id
            ));
        }
        if item.controls.is_empty() {
            violations.push(format!(
                "ITEM_NO_CONTROLS: remediation item '{}' has no controls.",
                item.checklist_id
            ));
        }
    }

    // Roadmap entries must reference existing items.
    for phase in Phase::ALL {
        for entry in roadmap.bucket(phase) {
            if entry.checklist_id.is_empty() {
                violations.push(format!(
                    "ROADMAP_NO_ID: roadmap entry in {} has no checklist id.",
                    phase.as_str()
                ));
            } else if !item_ids.contains(entry.checklist_id.as_str()) {
                violations.push(format!(
                    "ROADMAP_REF: roadmap entry '{}' in {} does not exist in remediation items.",
                    entry.checklist_id,
                    phase.as_str()
                ));
            }
        }
    }

    violations
}

/// Clamp the readiness score to `[0, READINESS_SCORE_MAX]`.
///
/// Float scores are truncated to integers; non-numeric scores are left
/// untouched. An assumption note is appended iff clamping changed the
/// value.
pub fn clamp_readiness_score(readiness: &mut Readiness) {
    let Some(value) = readiness.readiness_score.as_ref() else {
        return;
    };
    let original = if let Some(n) = value.as_i64() {
        n
    } else if let Some(f) = value.as_f64() {
        f as i64
    } else {
        return;
    };

    let clamped = original.clamp(0, READINESS_SCORE_MAX);
    readiness.readiness_score = Some(serde_json::Value::from(clamped));
    if clamped != original {
        readiness.assumptions.push(format!(
            "readiness_score clamped from {} to {} (valid range 0-{})",
            original, clamped, READINESS_SCORE_MAX
        ));
    }
}

/// Patch blockers with deterministic resolving checklist identifiers
/// from a lowercase category → checklist-id mapping. Blockers without
/// a mapping get an empty set and an assumption note: an empty set
/// means "no deterministic mapping exists", never a guess.
pub fn patch_blocker_resolutions(
    readiness: &mut Readiness,
    mapping: &BTreeMap<String, Vec<String>>,
) {
    let mut unmapped: Vec<String> = Vec::new();

    for blocker in &mut readiness.blockers {
        let key = blocker.category.to_lowercase();
        match mapping.get(&key) {
            Some(ids) => blocker.resolving_checklist_ids = ids.clone(),
            None => {
                blocker.resolving_checklist_ids.clear();
                unmapped.push(blocker.category.clone());
            }
        }
    }

    for category in unmapped {
        readiness.assumptions.push(format!(
            "No deterministic mapping for blocker '{}' - resolving checklist ids left empty.",
            category
        ));
    }
}
