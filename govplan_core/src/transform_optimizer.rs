//! Transformation Optimizer
//!
//! Within the dependency boundaries set by the dependency engine, this
//! layer identifies quick wins, names parallel execution tracks, and
//! builds the effort/impact matrix. It CANNOT override sequencing - it
//! only annotates and groups within existing dependency constraints.

use crate::dependency_engine::ItemDependencyGraph;
use crate::risk_impact::{RiskImpactItem, RiskImpactModel};
use crate::types::{Phase, RemediationItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effort classification from free-text duration hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effort {
    Low,
    Medium,
    High,
    Unknown,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "Low",
            Effort::Medium => "Medium",
            Effort::High => "High",
            Effort::Unknown => "Unknown",
        }
    }
}

/// Effort/impact quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quadrant {
    #[serde(rename = "Quick Win")]
    QuickWin,
    #[serde(rename = "Major Project")]
    MajorProject,
    #[serde(rename = "Fill In")]
    FillIn,
    Reconsider,
}

/// A zero-dependency, low-effort, non-zero-impact item eligible for
/// immediate execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickWin {
    pub checklist_id: String,
    pub title: String,
    pub controls_resolved: usize,
    pub risks_reduced: usize,
    pub blast_radius: String,
    pub reason: String,
}

/// A named group of items that can execute concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelTrack {
    pub track_name: String,
    pub checklist_ids: Vec<String>,
    pub titles: Vec<String>,
    pub total_controls_resolved: usize,
    pub total_risks_reduced: usize,
}

/// One row of the effort/impact matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffortMatrixEntry {
    pub checklist_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub effort: Effort,
    pub estimated_duration: String,
    pub impact_score: f64,
    pub controls_resolved: usize,
    pub risks_reduced: usize,
    pub quadrant: Quadrant,
}

/// Full optimizer output: annotations only, no reordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationPlan {
    pub quick_wins: Vec<QuickWin>,
    pub parallel_tracks: Vec<ParallelTrack>,
    pub effort_matrix: Vec<EffortMatrixEntry>,
    pub optimization_notes: Vec<String>,
}

/// Build the transformation plan over the fixed order/phases from the
/// dependency engine and the risk/impact per-item records.
pub fn build_transformation_plan(
    items: &[RemediationItem],
    graph: &ItemDependencyGraph,
    risk_impact: &RiskImpactModel,
) -> TransformationPlan {
    let item_index: BTreeMap<&str, &RemediationItem> = items
        .iter()
        .filter(|i| !i.checklist_id.is_empty())
        .map(|i| (i.checklist_id.as_str(), i))
        .collect();
    let impact_by_id: BTreeMap<&str, &RiskImpactItem> = risk_impact
        .items
        .iter()
        .map(|i| (i.checklist_id.as_str(), i))
        .collect();

    let quick_wins = identify_quick_wins(items, graph, &impact_by_id);
    let parallel_tracks = build_parallel_tracks(&graph.parallel_groups, &item_index, &impact_by_id);
    let effort_matrix = build_effort_matrix(items, graph, &impact_by_id);
    let optimization_notes =
        generate_optimization_notes(graph, risk_impact, &quick_wins);

    TransformationPlan {
        quick_wins,
        parallel_tracks,
        effort_matrix,
        optimization_notes,
    }
}

// ── Internal helpers ──────────────────────────────────────────────

/// Quick win criteria: earliest phase, no prerequisites, at least one
/// control resolved, and a short (or absent) estimated duration.
fn identify_quick_wins(
    items: &[RemediationItem],
    graph: &ItemDependencyGraph,
    impact_by_id: &BTreeMap<&str, &RiskImpactItem>,
) -> Vec<QuickWin> {
    let mut quick_wins: Vec<QuickWin> = Vec::new();

    for item in items {
        let id = item.checklist_id.as_str();
        if id.is_empty() {
            continue;
        }
        let phase = graph
            .phase_assignment
            .get(id)
            .copied()
            .unwrap_or(Phase::NinetyDays);
        if phase != Phase::ThirtyDays {
            continue;
        }
        if !graph.deps_of(id).is_empty() {
            continue;
        }
        let impact = impact_by_id.get(id);
        let controls_resolved = impact.map(|i| i.controls_resolved).unwrap_or(0);
        if controls_resolved == 0 {
            continue;
        }
        // Absent duration counts as short here; the effort matrix is
        // deliberately more conservative about unknowns.
        if !is_short_duration(item.estimated_duration()) {
            continue;
        }

        quick_wins.push(QuickWin {
            checklist_id: id.to_string(),
            title: item.title.clone(),
            controls_resolved,
            risks_reduced: impact.map(|i| i.risks_reduced).unwrap_or(0),
            blast_radius: impact
                .map(|i| i.blast_radius_label.clone())
                .unwrap_or_else(|| "Low".to_string()),
            reason: "No dependencies, immediate start, resolves failing controls".to_string(),
        });
    }

    quick_wins
}

/// Heuristic: durations under roughly two weeks are quick. An empty
/// hint counts as short.
fn is_short_duration(duration: &str) -> bool {
    if duration.is_empty() {
        return true;
    }
    let dl = duration.to_lowercase();
    [
        "1 week", "1-2 week", "1\u{2013}2 week", "< 2 week", "days", "immediate", "1 day",
        "2 day", "3 day",
    ]
    .iter()
    .any(|needle| dl.contains(needle))
}

/// Classify effort from the duration text. An empty hint is Unknown,
/// not High: the quadrant check treats Unknown like low effort, while
/// genuinely long-sounding text stays conservative.
fn classify_effort(duration: &str) -> Effort {
    if duration.is_empty() {
        return Effort::Unknown;
    }
    let dl = duration.to_lowercase();
    let low = ["1 week", "days", "immediate", "1 day", "2 day", "3 day"];
    if low.iter().any(|needle| dl.contains(needle)) {
        return Effort::Low;
    }
    let medium = ["2 week", "3 week", "1\u{2013}2 week", "1-2 week", "2-3 week"];
    if medium.iter().any(|needle| dl.contains(needle)) {
        return Effort::Medium;
    }
    Effort::High
}

fn build_parallel_tracks(
    parallel_groups: &[Vec<String>],
    item_index: &BTreeMap<&str, &RemediationItem>,
    impact_by_id: &BTreeMap<&str, &RiskImpactItem>,
) -> Vec<ParallelTrack> {
    let mut tracks: Vec<ParallelTrack> = Vec::new();

    for group in parallel_groups {
        if group.len() < 2 {
            // A single item is not a parallel track.
            continue;
        }

        let mut titles: Vec<String> = Vec::new();
        let mut total_controls = 0;
        let mut total_risks = 0;
        for id in group {
            let title = item_index
                .get(id.as_str())
                .map(|i| i.title.clone())
                .unwrap_or_else(|| id.clone());
            titles.push(title);
            if let Some(impact) = impact_by_id.get(id.as_str()) {
                total_controls += impact.controls_resolved;
                total_risks += impact.risks_reduced;
            }
        }

        tracks.push(ParallelTrack {
            track_name: format!("Parallel Track {}", tracks.len() + 1),
            checklist_ids: group.clone(),
            titles,
            total_controls_resolved: total_controls,
            total_risks_reduced: total_risks,
        });
    }

    tracks
}

fn build_effort_matrix(
    items: &[RemediationItem],
    graph: &ItemDependencyGraph,
    impact_by_id: &BTreeMap<&str, &RiskImpactItem>,
) -> Vec<EffortMatrixEntry> {
    let mut matrix: Vec<EffortMatrixEntry> = Vec::new();

    for item in items {
        let id = item.checklist_id.as_str();
        if id.is_empty() {
            continue;
        }

        let duration = item.estimated_duration();
        let effort = classify_effort(duration);

        let (controls, risks, blast) = impact_by_id
            .get(id)
            .map(|i| (i.controls_resolved, i.risks_reduced, i.blast_radius_score))
            .unwrap_or((0, 0, 0.0));
        let impact_score = controls as f64 * 2.0 + risks as f64 * 5.0 + blast;

        matrix.push(EffortMatrixEntry {
            checklist_id: id.to_string(),
            title: item.title.clone(),
            phase: graph.phase_assignment.get(id).copied(),
            effort,
            estimated_duration: duration.to_string(),
            impact_score: (impact_score * 10.0).round() / 10.0,
            controls_resolved: controls,
            risks_reduced: risks,
            quadrant: quadrant(effort, impact_score),
        });
    }

    matrix
}

fn quadrant(effort: Effort, impact_score: f64) -> Quadrant {
    let high_impact = impact_score >= 10.0;
    let low_effort = matches!(effort, Effort::Low | Effort::Unknown);

    match (high_impact, low_effort) {
        (true, true) => Quadrant::QuickWin,
        (true, false) => Quadrant::MajorProject,
        (false, true) => Quadrant::FillIn,
        (false, false) => Quadrant::Reconsider,
    }
}

fn generate_optimization_notes(
    graph: &ItemDependencyGraph,
    risk_impact: &RiskImpactModel,
    quick_wins: &[QuickWin],
) -> Vec<String> {
    let mut notes: Vec<String> = Vec::new();

    if !graph.dependency_violations.is_empty() {
        notes.push(format!(
            "Dependency engine detected {} ordering violation(s) in the generated roadmap. These have been corrected.",
            graph.dependency_violations.len()
        ));
    }

    if !quick_wins.is_empty() {
        let ids: Vec<&str> = quick_wins.iter().map(|q| q.checklist_id.as_str()).collect();
        notes.push(format!(
            "Quick wins identified: {} - no dependencies, immediate start.",
            ids.join(", ")
        ));
    }

    for item in risk_impact.items.iter().filter(|i| i.risks_reduced >= 3) {
        notes.push(format!(
            "{} resolves {} business risks - prioritize within dependency constraints.",
            item.checklist_id, item.risks_reduced
        ));
    }

    let multi_groups = graph
        .parallel_groups
        .iter()
        .filter(|g| g.len() > 1)
        .count();
    if multi_groups > 0 {
        notes.push(format!(
            "{} parallel execution group(s) identified - these can run concurrently to accelerate delivery.",
            multi_groups
        ));
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency_engine::build_item_dependency_graph;
    use crate::risk_impact::build_risk_impact_model;
    use crate::types::{
        AssessmentResult, ControlPrerequisites, ControlStatus, DeliveryModel, Severity,
    };

    fn item(id: &str, controls: &[&str], duration: Option<&str>) -> RemediationItem {
        RemediationItem {
            checklist_id: id.to_string(),
            controls: controls.iter().map(|s| s.to_string()).collect(),
            title: format!("Item {}", id),
            delivery_model: duration.map(|d| DeliveryModel {
                estimated_duration: Some(d.to_string()),
            }),
            ..Default::default()
        }
    }

    fn fail(id: &str, severity: Severity) -> AssessmentResult {
        AssessmentResult {
            control_id: id.to_string(),
            status: ControlStatus::Fail,
            severity,
            section: "Security".to_string(),
        }
    }

    fn plan_for(
        items: &[RemediationItem],
        prereqs: &ControlPrerequisites,
        results: &[AssessmentResult],
    ) -> TransformationPlan {
        let graph = build_item_dependency_graph(items, Some(prereqs));
        let risk = build_risk_impact_model(items, results, &[], &[]);
        build_transformation_plan(items, &graph, &risk)
    }

    #[test]
    fn test_quick_win_requires_zero_deps_and_resolution() {
        let items = vec![
            item("A01.01", &["a1"], Some("1 week")),
            item("A01.02", &["b1"], Some("1 week")),
            item("A01.03", &["c1"], Some("1 week")),
        ];
        let mut prereqs = ControlPrerequisites::new();
        prereqs.insert("b1".to_string(), vec!["a1".to_string()]);
        // c1 never fails, so A01.03 resolves nothing.
        let results = vec![fail("a1", Severity::High), fail("b1", Severity::High)];

        let plan = plan_for(&items, &prereqs, &results);

        let ids: Vec<&str> = plan.quick_wins.iter().map(|q| q.checklist_id.as_str()).collect();
        assert_eq!(ids, vec!["A01.01"]);
    }

    #[test]
    fn test_absent_duration_still_quick_win_eligible() {
        let items = vec![item("A01.01", &["a1"], None)];
        let prereqs = ControlPrerequisites::new();
        let results = vec![fail("a1", Severity::Medium)];

        let plan = plan_for(&items, &prereqs, &results);
        assert_eq!(plan.quick_wins.len(), 1);
    }

    #[test]
    fn test_long_duration_blocks_quick_win() {
        let items = vec![item("A01.01", &["a1"], Some("6 weeks"))];
        let prereqs = ControlPrerequisites::new();
        let results = vec![fail("a1", Severity::Medium)];

        let plan = plan_for(&items, &prereqs, &results);
        assert!(plan.quick_wins.is_empty());
    }

    #[test]
    fn test_effort_classification() {
        assert_eq!(classify_effort(""), Effort::Unknown);
        assert_eq!(classify_effort("3 days"), Effort::Low);
        assert_eq!(classify_effort("Immediate"), Effort::Low);
        assert_eq!(classify_effort("2-3 weeks"), Effort::Medium);
        assert_eq!(classify_effort("2 months"), Effort::High);
    }

    #[test]
    fn test_unknown_duration_defaults_are_asymmetric() {
        // Quick-win eligibility treats absence as short; the matrix
        // classifies it Unknown (low-equivalent in the quadrant), never High.
        assert!(is_short_duration(""));
        assert_eq!(classify_effort(""), Effort::Unknown);
        assert_eq!(quadrant(Effort::Unknown, 12.0), Quadrant::QuickWin);
    }

    #[test]
    fn test_quadrants() {
        assert_eq!(quadrant(Effort::Low, 15.0), Quadrant::QuickWin);
        assert_eq!(quadrant(Effort::High, 15.0), Quadrant::MajorProject);
        assert_eq!(quadrant(Effort::Medium, 10.0), Quadrant::MajorProject);
        assert_eq!(quadrant(Effort::Low, 4.0), Quadrant::FillIn);
        assert_eq!(quadrant(Effort::High, 4.0), Quadrant::Reconsider);
    }

    #[test]
    fn test_impact_score_formula() {
        let items = vec![item("A01.01", &["a1", "a2"], Some("1 week"))];
        let prereqs = ControlPrerequisites::new();
        let results = vec![fail("a1", Severity::Critical), fail("a2", Severity::Low)];

        let plan = plan_for(&items, &prereqs, &results);

        // controls×2 + risks×5 + blast = 2×2 + 0 + 11.0 = 15.0
        assert_eq!(plan.effort_matrix[0].impact_score, 15.0);
        assert_eq!(plan.effort_matrix[0].quadrant, Quadrant::QuickWin);
    }

    #[test]
    fn test_parallel_tracks_skip_singletons() {
        let items = vec![
            item("A01.01", &["a1"], None),
            item("A01.02", &["b1"], None),
            item("A01.03", &["c1"], None),
        ];
        let mut prereqs = ControlPrerequisites::new();
        prereqs.insert("c1".to_string(), vec!["a1".to_string()]);
        let results = vec![fail("a1", Severity::High), fail("b1", Severity::High)];

        let plan = plan_for(&items, &prereqs, &results);

        assert_eq!(plan.parallel_tracks.len(), 1);
        let track = &plan.parallel_tracks[0];
        assert_eq!(track.track_name, "Parallel Track 1");
        assert_eq!(track.checklist_ids, vec!["A01.01", "A01.02"]);
        assert_eq!(track.total_controls_resolved, 2);
    }

    #[test]
    fn test_notes_mention_violations_and_groups() {
        let items = vec![
            item("A01.01", &["a1"], Some("1 week")),
            item("A01.02", &["b1"], Some("1 week")),
            item("A01.03", &["c1"], Some("1 week")),
        ];
        let mut prereqs = ControlPrerequisites::new();
        prereqs.insert("b1".to_string(), vec!["a1".to_string()]);
        let results = vec![
            fail("a1", Severity::High),
            fail("b1", Severity::High),
            fail("c1", Severity::High),
        ];

        let plan = plan_for(&items, &prereqs, &results);

        assert!(plan
            .optimization_notes
            .iter()
            .any(|n| n.contains("ordering violation")));
        assert!(plan
            .optimization_notes
            .iter()
            .any(|n| n.contains("Quick wins identified")));
        assert!(plan
            .optimization_notes
            .iter()
            .any(|n| n.contains("parallel execution group")));
    }
}
