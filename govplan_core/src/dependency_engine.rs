//! Dependency Engine
//!
//! Derives item-level execution order ENTIRELY from the control-level
//! prerequisite graph (Kahn's topological sort). No risk weighting, no
//! ease-of-implementation bias - pure architectural prerequisite
//! enforcement.
//!
//! Rules:
//! - An item cannot start before every item whose controls are
//!   prerequisites of its own controls.
//! - Ties among ready nodes break by ascending checklist identifier;
//!   this is what makes two runs over identical input byte-identical.
//! - Residual cycle members are appended in ascending-identifier order
//!   after the main sort rather than failing the run.
//! - Phase assignment (30/60/90) follows dependency depth.

use crate::types::{ControlPrerequisites, Phase, RemediationItem, RoadmapPhases};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The derived item-level dependency structure. Field names on the
/// wire follow the run-record contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDependencyGraph {
    /// Topologically sorted checklist identifiers.
    #[serde(rename = "initiative_order")]
    pub order: Vec<String>,
    /// Checklist identifier → prerequisite checklist identifiers.
    #[serde(rename = "initiative_deps")]
    pub deps: BTreeMap<String, Vec<String>>,
    /// Checklist identifier → 30/60/90 bucket.
    pub phase_assignment: BTreeMap<String, Phase>,
    /// Groups of items that can run concurrently within a phase.
    pub parallel_groups: Vec<Vec<String>>,
    /// Declared orderings that contradict the architectural graph.
    pub dependency_violations: Vec<String>,
}

impl ItemDependencyGraph {
    /// Direct prerequisites of one item (empty when unknown).
    pub fn deps_of(&self, id: &str) -> &[String] {
        self.deps.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Build the item dependency graph, topological order, phase
/// assignment, parallel groups, and violation report.
///
/// When `control_prereqs` is supplied the graph is projected from it
/// through the control→owning-item map (first claim wins). Without it,
/// each item's declared dependencies are used, intersected with the
/// set of items that actually exist.
pub fn build_item_dependency_graph(
    items: &[RemediationItem],
    control_prereqs: Option<&ControlPrerequisites>,
) -> ItemDependencyGraph {
    let ids: Vec<&str> = items
        .iter()
        .filter(|i| !i.checklist_id.is_empty())
        .map(|i| i.checklist_id.as_str())
        .collect();
    let id_set: BTreeSet<&str> = ids.iter().copied().collect();

    let ownership = map_controls_to_items(items);

    let deps = match control_prereqs {
        Some(prereqs) => derive_deps_from_controls(items, prereqs, &ownership),
        None => declared_deps_fallback(items, &id_set),
    };

    let order = topo_sort(&ids, &deps);
    let phase_assignment = assign_phases(&order, &deps);
    let parallel_groups = build_parallel_groups(&order, &deps, &phase_assignment);
    let dependency_violations = detect_violations(items, &deps);

    ItemDependencyGraph {
        order,
        deps,
        phase_assignment,
        parallel_groups,
        dependency_violations,
    }
}

/// Redistribute externally supplied roadmap entries into the buckets
/// chosen by the dependency engine. Entries are moved, never added or
/// removed: items the engine knows nothing about stay in their
/// original bucket, items with no assignment default to the last one.
pub fn reorder_roadmap_phases(
    roadmap: &RoadmapPhases,
    graph: &ItemDependencyGraph,
) -> RoadmapPhases {
    let mut by_id = BTreeMap::new();
    for phase in Phase::ALL {
        for entry in roadmap.bucket(phase) {
            if !entry.checklist_id.is_empty() {
                by_id.entry(entry.checklist_id.clone()).or_insert(entry);
            }
        }
    }

    let mut out = RoadmapPhases::default();
    for id in &graph.order {
        let target = graph
            .phase_assignment
            .get(id)
            .copied()
            .unwrap_or(Phase::NinetyDays);
        if let Some(entry) = by_id.get(id.as_str()) {
            out.bucket_mut(target).push((*entry).clone());
        }
    }

    // Preserve entries the dependency graph does not know about.
    let known: BTreeSet<&str> = graph.order.iter().map(String::as_str).collect();
    for phase in Phase::ALL {
        for entry in roadmap.bucket(phase) {
            if !entry.checklist_id.is_empty() && !known.contains(entry.checklist_id.as_str()) {
                out.bucket_mut(phase).push(entry.clone());
            }
        }
    }

    out
}

// ── Internal helpers ──────────────────────────────────────────────

/// Map each control to its owning item. First claim wins; later claims
/// are logged as overlaps so upstream clustering problems stay visible.
fn map_controls_to_items(items: &[RemediationItem]) -> BTreeMap<String, String> {
    let mut ownership: BTreeMap<String, String> = BTreeMap::new();
    for item in items {
        if item.checklist_id.is_empty() {
            continue;
        }
        for ctrl in &item.controls {
            if let Some(owner) = ownership.get(ctrl) {
                log::warn!(
                    "control {} appears in multiple items: {} and {}; first claim ({}) wins for dependency derivation",
                    ctrl,
                    owner,
                    item.checklist_id,
                    owner
                );
            } else {
                ownership.insert(ctrl.clone(), item.checklist_id.clone());
            }
        }
    }
    ownership
}

/// Project control-level prerequisites onto items. If control C1 in
/// item B requires control C2 owned by item A, then B depends on A.
/// Self-dependencies are excluded.
fn derive_deps_from_controls(
    items: &[RemediationItem],
    prereqs: &ControlPrerequisites,
    ownership: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<String>> {
    let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for item in items {
        if item.checklist_id.is_empty() {
            continue;
        }
        let mut derived: BTreeSet<String> = BTreeSet::new();
        for ctrl in &item.controls {
            for prereq in prereqs.get(ctrl).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(owner) = ownership.get(prereq) {
                    if owner != &item.checklist_id {
                        derived.insert(owner.clone());
                    }
                }
            }
        }
        deps.insert(item.checklist_id.clone(), derived.into_iter().collect());
    }

    deps
}

/// Fallback when no control prerequisite source exists: declared
/// dependencies, kept only where the referenced item actually exists.
fn declared_deps_fallback(
    items: &[RemediationItem],
    id_set: &BTreeSet<&str>,
) -> BTreeMap<String, Vec<String>> {
    let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items {
        if item.checklist_id.is_empty() {
            continue;
        }
        let mut kept: BTreeSet<String> = BTreeSet::new();
        for dep in &item.dependencies {
            if dep != &item.checklist_id && id_set.contains(dep.as_str()) {
                kept.insert(dep.clone());
            }
        }
        deps.insert(item.checklist_id.clone(), kept.into_iter().collect());
    }
    deps
}

/// Kahn's algorithm. The ready set is ordered, so the smallest ready
/// identifier always runs next; nodes that never reach in-degree zero
/// (cycle members) are appended in ascending order.
fn topo_sort(ids: &[&str], deps: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let id_set: BTreeSet<&str> = ids.iter().copied().collect();

    let mut in_degree: BTreeMap<&str, usize> = id_set.iter().map(|&id| (id, 0)).collect();
    let mut adj: BTreeMap<&str, Vec<&str>> = id_set.iter().map(|&id| (id, Vec::new())).collect();

    for &id in &id_set {
        for dep in deps.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            if id_set.contains(dep.as_str()) {
                adj.entry(dep.as_str()).or_default().push(id);
                *in_degree.entry(id).or_default() += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(id_set.len());

    while let Some(&next) = ready.iter().next() {
        ready.remove(next);
        order.push(next.to_string());
        let children: Vec<&str> = adj.get(next).cloned().unwrap_or_default();
        for child in children {
            let degree = in_degree.entry(child).or_default();
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                ready.insert(child);
            }
        }
    }

    // Residual cycle members: append ascending instead of failing.
    let placed: BTreeSet<String> = order.iter().cloned().collect();
    for &id in &id_set {
        if !placed.contains(id) {
            order.push(id.to_string());
        }
    }

    order
}

/// Depth 0: no prerequisites. Otherwise 1 + max prerequisite depth.
/// Unplaced prerequisites (cycle members) count as depth 0.
fn assign_phases(
    order: &[String],
    deps: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Phase> {
    let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
    for id in order {
        let prereqs = deps.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let d = if prereqs.is_empty() {
            0
        } else {
            1 + prereqs
                .iter()
                .map(|p| depth.get(p.as_str()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0)
        };
        depth.insert(id.as_str(), d);
    }

    order
        .iter()
        .map(|id| {
            let d = depth.get(id.as_str()).copied().unwrap_or(0);
            (id.clone(), Phase::from_depth(d))
        })
        .collect()
}

/// Within each phase, walk items in topological order and start a new
/// group whenever the next item directly depends on anything already
/// placed in the current group.
fn build_parallel_groups(
    order: &[String],
    deps: &BTreeMap<String, Vec<String>>,
    phase_assignment: &BTreeMap<String, Phase>,
) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();

    for phase in Phase::ALL {
        let phase_items: Vec<&String> = order
            .iter()
            .filter(|id| phase_assignment.get(*id).copied() == Some(phase))
            .collect();
        if phase_items.is_empty() {
            continue;
        }

        let mut current: Vec<String> = Vec::new();
        for id in phase_items {
            let item_deps: BTreeSet<&str> = deps
                .get(id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(String::as_str)
                .collect();
            let conflicts = current.iter().any(|g| item_deps.contains(g.as_str()));
            if conflicts {
                groups.push(std::mem::take(&mut current));
            }
            current.push(id.clone());
        }
        if !current.is_empty() {
            groups.push(current);
        }
    }

    groups
}

/// Report control-derived prerequisites the upstream generator failed
/// to declare. Informational: the derived graph is authoritative.
fn detect_violations(
    items: &[RemediationItem],
    deps: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    let mut violations: Vec<String> = Vec::new();

    for item in items {
        if item.checklist_id.is_empty() {
            continue;
        }
        let declared: BTreeSet<&str> = item.dependencies.iter().map(String::as_str).collect();
        for dep in deps.get(&item.checklist_id).map(Vec::as_slice).unwrap_or(&[]) {
            if !declared.contains(dep.as_str()) {
                violations.push(format!(
                    "{} missing architectural dependency on {} (control prereqs require it)",
                    item.checklist_id, dep
                ));
            }
        }
    }

    violations
}
