//! Identifier Canonicalizer
//!
//! Resolves raw, possibly truncated or mutated identifiers emitted by
//! the upstream generator into the fixed control/checklist namespace,
//! and prunes items with zero grounding.
//!
//! The upstream source is untrusted: bad identifiers degrade to
//! pruning and log entries, never to a pipeline failure. All rewrites
//! happen in place and every applied action is returned as an ordered
//! audit log.

use crate::types::{ControlCatalogue, RemediationItem, RoadmapPhases};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical checklist identifier pattern: one uppercase letter, two
/// digits, a dot, two digits (e.g. `A01.01`).
static CHECKLIST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\d{2}\.\d{2}$").expect("checklist id pattern is valid"));

/// True when `id` already matches the canonical checklist pattern.
pub fn is_checklist_id(id: &str) -> bool {
    CHECKLIST_ID_RE.is_match(id)
}

/// Outcome of resolving a single raw control identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlIdResolution {
    /// Raw identifier is already a canonical key.
    Exact(String),
    /// Raw identifier starts with exactly one canonical key.
    Prefix(String),
    /// No match, ambiguous match, or empty input.
    Reject,
}

impl ControlIdResolution {
    pub fn status(&self) -> &'static str {
        match self {
            ControlIdResolution::Exact(_) => "exact",
            ControlIdResolution::Prefix(_) => "prefix",
            ControlIdResolution::Reject => "reject",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            ControlIdResolution::Exact(k) | ControlIdResolution::Prefix(k) => Some(k),
            ControlIdResolution::Reject => None,
        }
    }
}

/// Resolve one raw control identifier against the canonical key set.
///
/// Exact: the raw identifier is already canonical (idempotent).
/// Prefix: the raw identifier starts with exactly one canonical key -
/// a unique match is required, an ambiguous prefix rejects.
pub fn resolve_control_id(raw: &str, canonical: &BTreeSet<String>) -> ControlIdResolution {
    if raw.is_empty() {
        return ControlIdResolution::Reject;
    }
    if canonical.contains(raw) {
        return ControlIdResolution::Exact(raw.to_string());
    }

    let mut matched: Option<&String> = None;
    for key in canonical {
        if !key.is_empty() && raw.starts_with(key.as_str()) {
            if matched.is_some() {
                // Two canonical keys prefix the same raw id: never guess.
                return ControlIdResolution::Reject;
            }
            matched = Some(key);
        }
    }

    match matched {
        Some(key) => ControlIdResolution::Prefix(key.clone()),
        None => ControlIdResolution::Reject,
    }
}

/// Rewrite every item's control set in place through the resolver.
///
/// Rejected entries are dropped, resolved entries are deduplicated
/// preserving first-seen order. Returns an ordered audit log of every
/// normalization and rejection.
pub fn normalize_control_ids(
    items: &mut [RemediationItem],
    canonical: &BTreeSet<String>,
) -> Vec<String> {
    let mut audit: Vec<String> = Vec::new();

    for item in items.iter_mut() {
        if item.controls.is_empty() {
            continue;
        }

        let mut resolved: Vec<String> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for raw in &item.controls {
            match resolve_control_id(raw, canonical) {
                ControlIdResolution::Exact(key) => {
                    if seen.insert(key.clone()) {
                        resolved.push(key);
                    }
                }
                ControlIdResolution::Prefix(key) => {
                    audit.push(format!(
                        "NORMALIZED: item '{}' control '{}' -> '{}'",
                        item.checklist_id, raw, key
                    ));
                    log::debug!(
                        "normalized control id '{}' -> '{}' on item {}",
                        raw,
                        key,
                        item.checklist_id
                    );
                    if seen.insert(key.clone()) {
                        resolved.push(key);
                    }
                }
                ControlIdResolution::Reject => {
                    audit.push(format!(
                        "REJECTED: item '{}' control '{}' not in canonical catalogue, dropped",
                        item.checklist_id, raw
                    ));
                    log::debug!(
                        "rejected control id '{}' on item {}",
                        raw,
                        item.checklist_id
                    );
                }
            }
        }

        item.controls = resolved;
    }

    audit
}

/// Resolve non-canonical checklist identifiers via each item's
/// (already-normalized) controls, prune zero-grounding items, and
/// remap declared dependencies and external roadmap entries
/// consistently.
///
/// Resolution walks the item's controls in order and takes the first
/// checklist mapping the catalogue knows for any of them. Items whose
/// identifier cannot be resolved and whose control set is empty are
/// pruned entirely. Roadmap entries are rewritten through the same
/// id map; entries that map to no surviving item and do not themselves
/// match the canonical pattern are removed.
pub fn resolve_checklist_ids(
    items: &mut Vec<RemediationItem>,
    roadmap: &mut RoadmapPhases,
    catalogue: &ControlCatalogue,
) -> Vec<String> {
    let mut audit: Vec<String> = Vec::new();
    let mut id_map: BTreeMap<String, String> = BTreeMap::new();

    items.retain_mut(|item| {
        if item.checklist_id.is_empty() {
            // Structural fault: no identity at all, skip the item.
            audit.push("PRUNED: item with no checklist id skipped".to_string());
            return false;
        }
        if is_checklist_id(&item.checklist_id) {
            return true;
        }

        for ctrl in &item.controls {
            if let Some(info) = catalogue.get(ctrl) {
                if let Some(resolved) = info.checklist_ids.first() {
                    audit.push(format!(
                        "RESOLVED: item '{}' -> checklist id '{}' via control '{}'",
                        item.checklist_id, resolved, ctrl
                    ));
                    id_map.insert(item.checklist_id.clone(), resolved.clone());
                    item.checklist_id = resolved.clone();
                    return true;
                }
            }
        }

        if item.controls.is_empty() {
            audit.push(format!(
                "PRUNED: item '{}' has a non-canonical checklist id and no grounded controls",
                item.checklist_id
            ));
            return false;
        }

        // Grounded but unresolvable: keep it and let the integrity
        // validator flag the malformed identifier.
        audit.push(format!(
            "UNRESOLVED: item '{}' keeps a non-canonical checklist id",
            item.checklist_id
        ));
        true
    });

    // Rewritten identifiers must reach every downstream reference, so
    // declared dependency lists go through the same map.
    for item in items.iter_mut() {
        for dep in &mut item.dependencies {
            if let Some(new_id) = id_map.get(dep) {
                *dep = new_id.clone();
            }
        }
    }

    let surviving: BTreeSet<&str> = items.iter().map(|i| i.checklist_id.as_str()).collect();

    for phase in crate::types::Phase::ALL {
        let phase_name = phase.as_str();
        roadmap.bucket_mut(phase).retain_mut(|entry| {
            if let Some(new_id) = id_map.get(&entry.checklist_id) {
                entry.checklist_id = new_id.clone();
            }
            if surviving.contains(entry.checklist_id.as_str())
                || is_checklist_id(&entry.checklist_id)
            {
                true
            } else {
                audit.push(format!(
                    "REMOVED: roadmap entry '{}' in {} maps to no surviving item",
                    entry.checklist_id, phase_name
                ));
                false
            }
        });
    }

    audit
}
