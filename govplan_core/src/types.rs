//! Shared data model for the decision-engine pipeline.
//!
//! Everything here is a plain JSON-serializable record. Controls are
//! read-only reference data loaded once per process; remediation items
//! are mutated in place by the canonicalizer and consumed read-only by
//! every later stage.
//!
//! Ordered collections (`BTreeMap`/`BTreeSet`) are used wherever
//! iteration order can reach serialized output: two runs over
//! byte-identical input must produce byte-identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Control severity from the reference catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

/// Assessed status of a control when bound to an assessment result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlStatus {
    Pass,
    Fail,
    Partial,
    Manual,
    #[serde(rename = "Not-Applicable")]
    NotApplicable,
}

impl ControlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlStatus::Pass => "Pass",
            ControlStatus::Fail => "Fail",
            ControlStatus::Partial => "Partial",
            ControlStatus::Manual => "Manual",
            ControlStatus::NotApplicable => "Not-Applicable",
        }
    }

    /// Fail and Partial controls are the ones a remediation item can resolve.
    pub fn is_open(&self) -> bool {
        matches!(self, ControlStatus::Fail | ControlStatus::Partial)
    }

    /// Statuses that count toward the assessed-control total.
    pub fn is_assessed(&self) -> bool {
        matches!(
            self,
            ControlStatus::Pass | ControlStatus::Fail | ControlStatus::Partial
        )
    }
}

/// Catalogue entry for one canonical control key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlInfo {
    pub severity: Severity,
    pub section: String,
    /// Canonical checklist identifiers this control maps to.
    #[serde(default)]
    pub checklist_ids: Vec<String>,
}

/// The canonical control catalogue: 8-character key → control metadata.
/// Loaded once per process and shared read-only by all items.
pub type ControlCatalogue = BTreeMap<String, ControlInfo>;

/// Control-level prerequisite graph: control key → architecturally
/// required control keys. Static per run.
pub type ControlPrerequisites = BTreeMap<String, Vec<String>>;

/// Delivery-model hint attached to a remediation item by the upstream
/// generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
}

/// The unit of planning. Produced by the canonicalizer from raw
/// upstream output; consumed read-only downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationItem {
    /// Checklist identifier, pattern `A01.01` once canonicalized.
    pub checklist_id: String,
    /// Owned set of canonical control keys (unique, first-seen order).
    #[serde(default)]
    pub controls: Vec<String>,
    /// Upstream-declared prerequisite checklist identifiers. Possibly
    /// wrong; informational once a control prerequisite source exists.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_model: Option<DeliveryModel>,
}

impl RemediationItem {
    /// Free-text estimated duration, empty string when absent.
    pub fn estimated_duration(&self) -> &str {
        self.delivery_model
            .as_ref()
            .and_then(|d| d.estimated_duration.as_deref())
            .unwrap_or("")
    }
}

/// One control evaluation from the assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub control_id: String,
    pub status: ControlStatus,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub section: String,
}

/// Execution phase bucket, assigned by dependency depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "30_days")]
    ThirtyDays,
    #[serde(rename = "60_days")]
    SixtyDays,
    #[serde(rename = "90_days")]
    NinetyDays,
}

impl Phase {
    /// Depth 0 → 30 days, depth 1 → 60 days, depth 2+ collapses into
    /// the 90-day bucket.
    pub fn from_depth(depth: usize) -> Self {
        match depth {
            0 => Phase::ThirtyDays,
            1 => Phase::SixtyDays,
            _ => Phase::NinetyDays,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::ThirtyDays => "30_days",
            Phase::SixtyDays => "60_days",
            Phase::NinetyDays => "90_days",
        }
    }

    pub const ALL: [Phase; 3] = [Phase::ThirtyDays, Phase::SixtyDays, Phase::NinetyDays];
}

/// One roadmap entry as supplied by the upstream generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapEntry {
    pub checklist_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Externally supplied 30/60/90 roadmap buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapPhases {
    #[serde(rename = "30_days", default)]
    pub thirty_days: Vec<RoadmapEntry>,
    #[serde(rename = "60_days", default)]
    pub sixty_days: Vec<RoadmapEntry>,
    #[serde(rename = "90_days", default)]
    pub ninety_days: Vec<RoadmapEntry>,
}

impl RoadmapPhases {
    pub fn bucket(&self, phase: Phase) -> &Vec<RoadmapEntry> {
        match phase {
            Phase::ThirtyDays => &self.thirty_days,
            Phase::SixtyDays => &self.sixty_days,
            Phase::NinetyDays => &self.ninety_days,
        }
    }

    pub fn bucket_mut(&mut self, phase: Phase) -> &mut Vec<RoadmapEntry> {
        match phase {
            Phase::ThirtyDays => &mut self.thirty_days,
            Phase::SixtyDays => &mut self.sixty_days,
            Phase::NinetyDays => &mut self.ninety_days,
        }
    }

    /// Total entry count across all buckets.
    pub fn len(&self) -> usize {
        self.thirty_days.len() + self.sixty_days.len() + self.ninety_days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A top business risk from the executive framing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessRisk {
    pub title: String,
    #[serde(default)]
    pub affected_controls: Vec<String>,
}

/// Per-section maturity score from the scoring pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: String,
    #[serde(default)]
    pub maturity_percent: f64,
}

/// An enterprise-readiness obstacle. After processing it carries the
/// checklist identifiers that resolve it; an empty set means no
/// deterministic mapping exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blocker {
    pub category: String,
    #[serde(default)]
    pub resolving_checklist_ids: Vec<String>,
}

/// Enterprise-scale readiness block from the upstream generator.
/// `readiness_score` is kept as a raw JSON scalar because the
/// generator has emitted strings and out-of-range numbers here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Readiness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_score: Option<serde_json::Value>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
}

/// A decision-impact record: a derived conclusion that must cite the
/// controls it is grounded on and carry a computed confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionImpact {
    pub checklist_id: String,
    #[serde(default)]
    pub evidence_controls: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Run metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub timestamp: String,
    /// Deterministic content fingerprint over the canonically sorted
    /// assessment results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Maturity scoring attached to a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunScoring {
    #[serde(default)]
    pub overall_maturity_percent: f64,
    #[serde(default)]
    pub section_scores: Vec<SectionScore>,
}

/// The slice of a persisted run the delta/trend engine reads. A full
/// pipeline run record deserializes into this (extra fields ignored).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSnapshot {
    #[serde(default)]
    pub meta: RunMeta,
    #[serde(default)]
    pub results: Vec<AssessmentResult>,
    #[serde(default)]
    pub scoring: RunScoring,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_depth_collapses() {
        assert_eq!(Phase::from_depth(0), Phase::ThirtyDays);
        assert_eq!(Phase::from_depth(1), Phase::SixtyDays);
        assert_eq!(Phase::from_depth(2), Phase::NinetyDays);
        assert_eq!(Phase::from_depth(7), Phase::NinetyDays);
    }

    #[test]
    fn test_phase_serde_names() {
        assert_eq!(
            serde_json::to_string(&Phase::ThirtyDays).unwrap(),
            "\"30_days\""
        );
        let p: Phase = serde_json::from_str("\"90_days\"").unwrap();
        assert_eq!(p, Phase::NinetyDays);
    }

    #[test]
    fn test_status_is_open() {
        assert!(ControlStatus::Fail.is_open());
        assert!(ControlStatus::Partial.is_open());
        assert!(!ControlStatus::Pass.is_open());
        assert!(!ControlStatus::Manual.is_open());
        assert!(!ControlStatus::NotApplicable.is_open());
    }

    #[test]
    fn test_not_applicable_rename() {
        let s = serde_json::to_string(&ControlStatus::NotApplicable).unwrap();
        assert_eq!(s, "\"Not-Applicable\"");
    }

    #[test]
    fn test_item_duration_helper() {
        let mut item = RemediationItem {
            checklist_id: "A01.01".to_string(),
            ..Default::default()
        };
        assert_eq!(item.estimated_duration(), "");
        item.delivery_model = Some(DeliveryModel {
            estimated_duration: Some("1 week".to_string()),
        });
        assert_eq!(item.estimated_duration(), "1 week");
    }
}
