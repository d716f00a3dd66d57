//! Risk Impact Layer
//!
//! Per-item risk/impact metrics for NARRATIVE and EXECUTIVE FRAMING
//! only. These metrics MUST NOT influence sequencing - ordering is
//! owned exclusively by the dependency engine.

use crate::types::{
    AssessmentResult, BusinessRisk, RemediationItem, SectionScore,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Severity weights for blast-radius scoring (deterministic).
const WEIGHT_CRITICAL: f64 = 10.0;
const WEIGHT_HIGH: f64 = 6.0;
const WEIGHT_MEDIUM: f64 = 3.0;
const WEIGHT_LOW: f64 = 1.0;
const WEIGHT_INFO: f64 = 0.0;

/// Partial controls count at a reduced multiplier.
const PARTIAL_MULTIPLIER: f64 = 0.6;

/// Maturity lift estimate for one section touched by an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionImpact {
    pub section: String,
    pub current_maturity_percent: f64,
    pub controls_resolved: usize,
    pub maturity_lift_percent: f64,
}

/// Per-item risk/impact record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskImpactItem {
    pub checklist_id: String,
    pub title: String,
    /// Fail + Partial controls owned by this item.
    pub controls_resolved: usize,
    pub fail_controls: Vec<String>,
    pub partial_controls: Vec<String>,
    /// Top business risks whose affected controls intersect this item's.
    pub risks_reduced: usize,
    pub risk_titles: Vec<String>,
    pub blast_radius_score: f64,
    pub blast_radius_label: String,
    pub section_impact: Vec<SectionImpact>,
    pub total_maturity_lift_percent: f64,
}

/// Aggregate stats over the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskImpactSummary {
    pub total_items: usize,
    pub total_controls_resolved: usize,
    pub total_risks_addressed: usize,
    pub total_fail_controls: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskImpactModel {
    pub items: Vec<RiskImpactItem>,
    pub summary: RiskImpactSummary,
}

fn severity_weight(result: &AssessmentResult) -> f64 {
    match result.severity {
        crate::types::Severity::Critical => WEIGHT_CRITICAL,
        crate::types::Severity::High => WEIGHT_HIGH,
        crate::types::Severity::Medium => WEIGHT_MEDIUM,
        crate::types::Severity::Low => WEIGHT_LOW,
        crate::types::Severity::Info => WEIGHT_INFO,
    }
}

/// Blast radius label thresholds.
fn blast_label(score: f64) -> &'static str {
    if score >= 15.0 {
        "High"
    } else if score >= 5.0 {
        "Medium"
    } else {
        "Low"
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Build the per-item risk impact model.
///
/// The returned item list is sorted for display by (risks reduced,
/// controls resolved, blast radius) descending with ascending checklist
/// identifier as the final tie-break. Display order only - it never
/// feeds back into sequencing.
pub fn build_risk_impact_model(
    items: &[RemediationItem],
    results: &[AssessmentResult],
    top_risks: &[BusinessRisk],
    section_scores: &[SectionScore],
) -> RiskImpactModel {
    let mut results_by_id: BTreeMap<&str, &AssessmentResult> = BTreeMap::new();
    for r in results {
        if !r.control_id.is_empty() {
            results_by_id.entry(r.control_id.as_str()).or_insert(r);
        }
    }
    let section_maturity: BTreeMap<&str, f64> = section_scores
        .iter()
        .map(|s| (s.section.as_str(), s.maturity_percent))
        .collect();
    let total_fail_controls = results.iter().filter(|r| r.status.is_open()).count();
    let total_assessed = results.iter().filter(|r| r.status.is_assessed()).count();

    let mut out: Vec<RiskImpactItem> = Vec::new();

    for item in items {
        if item.checklist_id.is_empty() {
            continue;
        }

        let mut fail_controls: Vec<String> = Vec::new();
        let mut partial_controls: Vec<String> = Vec::new();
        for ctrl in &item.controls {
            match results_by_id.get(ctrl.as_str()).map(|r| r.status) {
                Some(crate::types::ControlStatus::Fail) => fail_controls.push(ctrl.clone()),
                Some(crate::types::ControlStatus::Partial) => partial_controls.push(ctrl.clone()),
                _ => {}
            }
        }
        let controls_resolved = fail_controls.len() + partial_controls.len();

        let item_controls: BTreeSet<&str> = item.controls.iter().map(String::as_str).collect();
        let mut risk_titles: Vec<String> = Vec::new();
        for risk in top_risks {
            let overlaps = risk
                .affected_controls
                .iter()
                .any(|c| item_controls.contains(c.as_str()));
            if overlaps {
                risk_titles.push(if risk.title.is_empty() {
                    "unnamed".to_string()
                } else {
                    risk.title.clone()
                });
            }
        }

        let blast_radius_score = compute_blast_radius(&item.controls, &results_by_id);
        let section_impact =
            compute_section_impact(&item.controls, &results_by_id, &section_maturity, total_assessed);
        let total_lift = round1(section_impact.iter().map(|s| s.maturity_lift_percent).sum());

        out.push(RiskImpactItem {
            checklist_id: item.checklist_id.clone(),
            title: item.title.clone(),
            controls_resolved,
            fail_controls,
            partial_controls,
            risks_reduced: risk_titles.len(),
            risk_titles,
            blast_radius_score,
            blast_radius_label: blast_label(blast_radius_score).to_string(),
            section_impact,
            total_maturity_lift_percent: total_lift,
        });
    }

    // Display ordering only.
    out.sort_by(|a, b| {
        b.risks_reduced
            .cmp(&a.risks_reduced)
            .then(b.controls_resolved.cmp(&a.controls_resolved))
            .then(
                b.blast_radius_score
                    .partial_cmp(&a.blast_radius_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.checklist_id.cmp(&b.checklist_id))
    });

    let total_controls_resolved = out.iter().map(|i| i.controls_resolved).sum();
    let distinct_risks: BTreeSet<&str> = out
        .iter()
        .flat_map(|i| i.risk_titles.iter().map(String::as_str))
        .collect();

    RiskImpactModel {
        summary: RiskImpactSummary {
            total_items: out.len(),
            total_controls_resolved,
            total_risks_addressed: distinct_risks.len(),
            total_fail_controls,
        },
        items: out,
    }
}

/// Blast radius = Σ over Fail/Partial owned controls of
/// severity weight × (1.0 if Fail else 0.6).
fn compute_blast_radius(
    controls: &[String],
    results_by_id: &BTreeMap<&str, &AssessmentResult>,
) -> f64 {
    let mut score = 0.0;
    for ctrl in controls {
        if let Some(result) = results_by_id.get(ctrl.as_str()) {
            if result.status.is_open() {
                let multiplier = if result.status == crate::types::ControlStatus::Fail {
                    1.0
                } else {
                    PARTIAL_MULTIPLIER
                };
                score += severity_weight(result) * multiplier;
            }
        }
    }
    round1(score)
}

/// Per-section maturity lift, approximated as resolved controls in the
/// section over total assessed controls.
fn compute_section_impact(
    controls: &[String],
    results_by_id: &BTreeMap<&str, &AssessmentResult>,
    section_maturity: &BTreeMap<&str, f64>,
    total_assessed: usize,
) -> Vec<SectionImpact> {
    let mut by_section: BTreeMap<&str, usize> = BTreeMap::new();
    for ctrl in controls {
        if let Some(result) = results_by_id.get(ctrl.as_str()) {
            if result.status.is_open() {
                let section = if result.section.is_empty() {
                    "Unknown"
                } else {
                    result.section.as_str()
                };
                *by_section.entry(section).or_default() += 1;
            }
        }
    }

    by_section
        .into_iter()
        .map(|(section, resolved)| {
            let lift = if total_assessed > 0 {
                round1(resolved as f64 / total_assessed as f64 * 100.0)
            } else {
                0.0
            };
            SectionImpact {
                section: section.to_string(),
                current_maturity_percent: section_maturity.get(section).copied().unwrap_or(0.0),
                controls_resolved: resolved,
                maturity_lift_percent: lift,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ControlStatus, Severity};

    fn result(id: &str, status: ControlStatus, severity: Severity, section: &str) -> AssessmentResult {
        AssessmentResult {
            control_id: id.to_string(),
            status,
            severity,
            section: section.to_string(),
        }
    }

    fn item(id: &str, controls: &[&str]) -> RemediationItem {
        RemediationItem {
            checklist_id: id.to_string(),
            controls: controls.iter().map(|s| s.to_string()).collect(),
            title: format!("Item {}", id),
            ..Default::default()
        }
    }

    #[test]
    fn test_blast_radius_weights_and_multipliers() {
        let items = vec![item("A01.01", &["c1", "c2", "c3"])];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::Critical, "Security"),
            result("c2", ControlStatus::Partial, Severity::High, "Security"),
            result("c3", ControlStatus::Pass, Severity::Critical, "Security"),
        ];

        let model = build_risk_impact_model(&items, &results, &[], &[]);

        // 10×1.0 + 6×0.6 = 13.6; Pass contributes nothing.
        assert_eq!(model.items[0].blast_radius_score, 13.6);
        assert_eq!(model.items[0].blast_radius_label, "Medium");
        assert_eq!(model.items[0].controls_resolved, 2);
        assert_eq!(model.items[0].fail_controls, vec!["c1"]);
        assert_eq!(model.items[0].partial_controls, vec!["c2"]);
    }

    #[test]
    fn test_blast_label_thresholds() {
        let items = vec![
            item("A01.01", &["c1", "c2"]),
            item("A01.02", &["c3"]),
            item("A01.03", &["c4"]),
        ];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::Critical, "S"),
            result("c2", ControlStatus::Fail, Severity::High, "S"),
            result("c3", ControlStatus::Fail, Severity::High, "S"),
            result("c4", ControlStatus::Fail, Severity::Low, "S"),
        ];

        let model = build_risk_impact_model(&items, &results, &[], &[]);
        let by_id: BTreeMap<&str, &RiskImpactItem> = model
            .items
            .iter()
            .map(|i| (i.checklist_id.as_str(), i))
            .collect();

        assert_eq!(by_id["A01.01"].blast_radius_label, "High"); // 16
        assert_eq!(by_id["A01.02"].blast_radius_label, "Medium"); // 6
        assert_eq!(by_id["A01.03"].blast_radius_label, "Low"); // 1
    }

    #[test]
    fn test_risks_reduced_counts_intersections() {
        let items = vec![item("A01.01", &["c1"]), item("A01.02", &["c2"])];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::High, "S"),
            result("c2", ControlStatus::Fail, Severity::High, "S"),
        ];
        let risks = vec![
            BusinessRisk {
                title: "Data exposure".to_string(),
                affected_controls: vec!["c1".to_string(), "c9".to_string()],
            },
            BusinessRisk {
                title: "Privilege sprawl".to_string(),
                affected_controls: vec!["c1".to_string()],
            },
        ];

        let model = build_risk_impact_model(&items, &results, &risks, &[]);

        assert_eq!(model.items[0].checklist_id, "A01.01");
        assert_eq!(model.items[0].risks_reduced, 2);
        assert_eq!(model.items[1].risks_reduced, 0);
        assert_eq!(model.summary.total_risks_addressed, 2);
    }

    #[test]
    fn test_section_lift_uses_assessed_total() {
        let items = vec![item("A01.01", &["c1", "c2"])];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::High, "Security"),
            result("c2", ControlStatus::Partial, Severity::Medium, "Governance"),
            result("c3", ControlStatus::Pass, Severity::Low, "Security"),
            result("c4", ControlStatus::Manual, Severity::Low, "Security"),
        ];
        let scores = vec![SectionScore {
            section: "Security".to_string(),
            maturity_percent: 40.0,
        }];

        let model = build_risk_impact_model(&items, &results, &[], &scores);
        let impact = &model.items[0].section_impact;

        // 3 assessed controls (Manual excluded); one resolved per section.
        assert_eq!(impact.len(), 2);
        assert_eq!(impact[0].section, "Governance");
        assert_eq!(impact[0].maturity_lift_percent, 33.3);
        assert_eq!(impact[1].section, "Security");
        assert_eq!(impact[1].current_maturity_percent, 40.0);
        assert_eq!(model.items[0].total_maturity_lift_percent, 66.6);
    }

    #[test]
    fn test_display_sort_with_id_tie_break() {
        let items = vec![
            item("B01.01", &["c1"]),
            item("A01.01", &["c2"]),
            item("C01.01", &["c3", "c4"]),
        ];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::Medium, "S"),
            result("c2", ControlStatus::Fail, Severity::Medium, "S"),
            result("c3", ControlStatus::Fail, Severity::Medium, "S"),
            result("c4", ControlStatus::Fail, Severity::Medium, "S"),
        ];

        let model = build_risk_impact_model(&items, &results, &[], &[]);
        let order: Vec<&str> = model.items.iter().map(|i| i.checklist_id.as_str()).collect();

        // C01.01 resolves the most controls; A before B on the tie.
        assert_eq!(order, vec!["C01.01", "A01.01", "B01.01"]);
    }

    #[test]
    fn test_summary_totals() {
        let items = vec![item("A01.01", &["c1"]), item("A01.02", &["c2"])];
        let results = vec![
            result("c1", ControlStatus::Fail, Severity::High, "S"),
            result("c2", ControlStatus::Partial, Severity::Low, "S"),
            result("c3", ControlStatus::Fail, Severity::Low, "S"),
        ];

        let model = build_risk_impact_model(&items, &results, &[], &[]);

        assert_eq!(model.summary.total_items, 2);
        assert_eq!(model.summary.total_controls_resolved, 2);
        // c3 is failing but unowned; still counted in the global total.
        assert_eq!(model.summary.total_fail_controls, 3);
    }
}
