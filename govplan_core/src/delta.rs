//! Delta / Trend Engine
//!
//! Compares two persisted runs and produces a canonical,
//! order-independent diff: permuting the results or section scores of
//! either input yields byte-identical output.

use crate::types::{AssessmentResult, ControlStatus, RunSnapshot, SectionScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One control whose status changed between two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedControl {
    pub control_id: String,
    pub previous: ControlStatus,
    pub current: ControlStatus,
}

/// Diff between two runs, sorted ascending by control id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaReport {
    pub has_previous: bool,
    pub changed_controls: Vec<ChangedControl>,
    pub count: usize,
}

/// Maturity movement between two runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendReport {
    pub has_previous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_run_id: Option<String>,
    pub maturity_delta: f64,
    /// Section → maturity delta, over sections present in either run
    /// (missing values treated as 0).
    pub domain_deltas: BTreeMap<String, f64>,
}

/// Canonical control-id → result map. Results are sorted by
/// (control id, serialized form) before insertion and the first
/// occurrence wins, so duplicate ids resolve identically no matter how
/// the input was ordered.
fn canonical_result_map(results: &[AssessmentResult]) -> BTreeMap<&str, &AssessmentResult> {
    let mut sorted: Vec<&AssessmentResult> = results
        .iter()
        .filter(|r| !r.control_id.is_empty())
        .collect();
    sorted.sort_by(|a, b| {
        a.control_id.cmp(&b.control_id).then_with(|| {
            serde_json::to_string(a)
                .unwrap_or_default()
                .cmp(&serde_json::to_string(b).unwrap_or_default())
        })
    });

    let mut map: BTreeMap<&str, &AssessmentResult> = BTreeMap::new();
    for r in sorted {
        map.entry(r.control_id.as_str()).or_insert(r);
    }
    map
}

/// Report, per control present in both runs, a status change when the
/// statuses differ. Output is sorted ascending by control id.
pub fn compute_delta(prev: Option<&RunSnapshot>, curr: &RunSnapshot) -> DeltaReport {
    let Some(prev) = prev else {
        return DeltaReport::default();
    };

    let prev_map = canonical_result_map(&prev.results);
    let curr_map = canonical_result_map(&curr.results);

    let mut changed: Vec<ChangedControl> = Vec::new();
    for (control_id, curr_result) in &curr_map {
        if let Some(prev_result) = prev_map.get(control_id) {
            if prev_result.status != curr_result.status {
                changed.push(ChangedControl {
                    control_id: control_id.to_string(),
                    previous: prev_result.status,
                    current: curr_result.status,
                });
            }
        }
    }

    DeltaReport {
        has_previous: true,
        count: changed.len(),
        changed_controls: changed,
    }
}

/// Canonical section → maturity map, same first-wins discipline as the
/// result map.
fn canonical_section_map(sections: &[SectionScore]) -> BTreeMap<&str, f64> {
    let mut sorted: Vec<&SectionScore> = sections
        .iter()
        .filter(|s| !s.section.is_empty())
        .collect();
    sorted.sort_by(|a, b| {
        a.section.cmp(&b.section).then_with(|| {
            serde_json::to_string(a)
                .unwrap_or_default()
                .cmp(&serde_json::to_string(b).unwrap_or_default())
        })
    });

    let mut map: BTreeMap<&str, f64> = BTreeMap::new();
    for s in sorted {
        map.entry(s.section.as_str()).or_insert(s.maturity_percent);
    }
    map
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Overall-maturity delta plus per-section deltas over the union of
/// sections present in either run.
pub fn compute_trend(prev: Option<&RunSnapshot>, curr: &RunSnapshot) -> TrendReport {
    let Some(prev) = prev else {
        return TrendReport::default();
    };

    let prev_sections = canonical_section_map(&prev.scoring.section_scores);
    let curr_sections = canonical_section_map(&curr.scoring.section_scores);

    let mut domain_deltas: BTreeMap<String, f64> = BTreeMap::new();
    for section in prev_sections.keys().chain(curr_sections.keys()) {
        let before = prev_sections.get(section).copied().unwrap_or(0.0);
        let after = curr_sections.get(section).copied().unwrap_or(0.0);
        domain_deltas
            .entry(section.to_string())
            .or_insert_with(|| round1(after - before));
    }

    TrendReport {
        has_previous: true,
        previous_run_id: Some(prev.meta.run_id.clone()),
        maturity_delta: round1(
            curr.scoring.overall_maturity_percent - prev.scoring.overall_maturity_percent,
        ),
        domain_deltas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunMeta, RunScoring, Severity};

    fn result(id: &str, status: ControlStatus) -> AssessmentResult {
        AssessmentResult {
            control_id: id.to_string(),
            status,
            severity: Severity::Medium,
            section: String::new(),
        }
    }

    fn run(run_id: &str, results: Vec<AssessmentResult>) -> RunSnapshot {
        RunSnapshot {
            meta: RunMeta {
                run_id: run_id.to_string(),
                timestamp: "2026-01-01T00:00:00Z".to_string(),
                fingerprint: None,
            },
            results,
            scoring: RunScoring::default(),
        }
    }

    #[test]
    fn test_delta_reports_status_changes() {
        let prev = run("r1", vec![result("C1", ControlStatus::Fail)]);
        let curr = run("r2", vec![result("C1", ControlStatus::Pass)]);

        let delta = compute_delta(Some(&prev), &curr);

        assert!(delta.has_previous);
        assert_eq!(delta.count, 1);
        assert_eq!(
            delta.changed_controls,
            vec![ChangedControl {
                control_id: "C1".to_string(),
                previous: ControlStatus::Fail,
                current: ControlStatus::Pass,
            }]
        );
    }

    #[test]
    fn test_delta_ignores_input_order() {
        let prev = run(
            "r1",
            vec![
                result("A01.01", ControlStatus::Fail),
                result("B01.01", ControlStatus::Pass),
            ],
        );
        let curr_one = run(
            "r2",
            vec![
                result("A01.01", ControlStatus::Pass),
                result("B01.01", ControlStatus::Fail),
            ],
        );
        let curr_two = run(
            "r2",
            vec![
                result("B01.01", ControlStatus::Fail),
                result("A01.01", ControlStatus::Pass),
            ],
        );

        let one = serde_json::to_string(&compute_delta(Some(&prev), &curr_one)).unwrap();
        let two = serde_json::to_string(&compute_delta(Some(&prev), &curr_two)).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_delta_output_sorted_by_control_id() {
        let prev = run(
            "r1",
            vec![
                result("Z01", ControlStatus::Fail),
                result("A01", ControlStatus::Fail),
                result("M01", ControlStatus::Fail),
            ],
        );
        let curr = run(
            "r2",
            vec![
                result("M01", ControlStatus::Pass),
                result("Z01", ControlStatus::Pass),
                result("A01", ControlStatus::Pass),
            ],
        );

        let delta = compute_delta(Some(&prev), &curr);
        let ids: Vec<&str> = delta
            .changed_controls
            .iter()
            .map(|c| c.control_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A01", "M01", "Z01"]);
    }

    #[test]
    fn test_delta_duplicate_ids_first_occurrence_wins() {
        // Same duplicate pair, permuted: the canonical sort makes the
        // same occurrence win both times.
        let prev = run("r1", vec![result("C1", ControlStatus::Fail)]);
        let curr_one = run(
            "r2",
            vec![
                result("C1", ControlStatus::Pass),
                result("C1", ControlStatus::Partial),
            ],
        );
        let curr_two = run(
            "r2",
            vec![
                result("C1", ControlStatus::Partial),
                result("C1", ControlStatus::Pass),
            ],
        );

        let one = serde_json::to_string(&compute_delta(Some(&prev), &curr_one)).unwrap();
        let two = serde_json::to_string(&compute_delta(Some(&prev), &curr_two)).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_delta_without_previous_run() {
        let curr = run("r2", vec![result("C1", ControlStatus::Pass)]);
        let delta = compute_delta(None, &curr);
        assert!(!delta.has_previous);
        assert_eq!(delta.count, 0);
        assert!(delta.changed_controls.is_empty());
    }

    #[test]
    fn test_delta_empty_inputs() {
        let delta = compute_delta(Some(&run("r1", vec![])), &run("r2", vec![]));
        assert!(delta.has_previous);
        assert_eq!(delta.count, 0);
    }

    fn scored_run(run_id: &str, overall: f64, sections: &[(&str, f64)]) -> RunSnapshot {
        RunSnapshot {
            meta: RunMeta {
                run_id: run_id.to_string(),
                timestamp: String::new(),
                fingerprint: None,
            },
            results: vec![],
            scoring: RunScoring {
                overall_maturity_percent: overall,
                section_scores: sections
                    .iter()
                    .map(|(s, m)| SectionScore {
                        section: s.to_string(),
                        maturity_percent: *m,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_trend_deltas() {
        let prev = scored_run("run-prev", 55.0, &[("Security", 60.0), ("Governance", 50.0)]);
        let curr = scored_run("run-curr", 60.0, &[("Security", 62.0), ("Cost", 40.0)]);

        let trend = compute_trend(Some(&prev), &curr);

        assert!(trend.has_previous);
        assert_eq!(trend.previous_run_id.as_deref(), Some("run-prev"));
        assert_eq!(trend.maturity_delta, 5.0);
        assert_eq!(trend.domain_deltas.get("Security"), Some(&2.0));
        // Present only in prev: treated as dropping to 0.
        assert_eq!(trend.domain_deltas.get("Governance"), Some(&-50.0));
        // Present only in curr: treated as rising from 0.
        assert_eq!(trend.domain_deltas.get("Cost"), Some(&40.0));
    }

    #[test]
    fn test_trend_is_order_independent() {
        let prev = scored_run("p", 55.0, &[("Security", 60.0), ("Governance", 50.0)]);
        let curr_one = scored_run("c", 60.0, &[("Governance", 55.0), ("Security", 62.0)]);
        let curr_two = scored_run("c", 60.0, &[("Security", 62.0), ("Governance", 55.0)]);

        let one = serde_json::to_string(&compute_trend(Some(&prev), &curr_one)).unwrap();
        let two = serde_json::to_string(&compute_trend(Some(&prev), &curr_two)).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_trend_without_previous_run() {
        let curr = scored_run("c", 60.0, &[("Security", 62.0)]);
        let trend = compute_trend(None, &curr);
        assert!(!trend.has_previous);
        assert!(trend.previous_run_id.is_none());
        assert_eq!(trend.maturity_delta, 0.0);
        assert!(trend.domain_deltas.is_empty());
    }
}
