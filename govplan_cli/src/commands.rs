//! Non-interactive commands: plan, delta, trend.
//!
//! All commands read JSON documents from disk, run the core engine,
//! and print (or write) a JSON document. Exit codes are the only
//! machine-readable status; diagnostics go to the log.

use anyhow::{Context, Result};
use govplan_core::delta::{compute_delta, compute_trend};
use govplan_core::pipeline::{run_pipeline, AssessmentBundle};
use govplan_core::types::{ControlCatalogue, ControlPrerequisites, RunSnapshot};
use std::fs;
use std::path::Path;

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))
}

fn emit<T: serde::Serialize>(value: &T, output: Option<&str>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
                }
            }
            fs::write(path, rendered).with_context(|| format!("writing {}", path))?;
            log::info!("wrote {}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Run the full decision pipeline over one assessment bundle.
pub fn run_plan(
    catalogue_path: &str,
    prereqs_path: Option<&str>,
    bundle_path: &str,
    output: Option<&str>,
) -> Result<()> {
    let catalogue: ControlCatalogue = read_json(catalogue_path)?;
    let prereqs: Option<ControlPrerequisites> =
        prereqs_path.map(read_json).transpose()?;
    let bundle: AssessmentBundle = read_json(bundle_path)?;

    log::info!(
        "planning: {} items, {} results, {} catalogue controls",
        bundle.items.len(),
        bundle.results.len(),
        catalogue.len()
    );

    let record = run_pipeline(&catalogue, prereqs.as_ref(), bundle);

    if !record.validation_violations.is_empty() {
        log::warn!(
            "{} integrity violation(s) recorded",
            record.validation_violations.len()
        );
    }

    emit(&record, output)
}

/// Control-level status changes between two runs.
pub fn run_delta(
    previous_path: Option<&str>,
    current_path: &str,
    output: Option<&str>,
) -> Result<()> {
    let previous: Option<RunSnapshot> = previous_path.map(read_json).transpose()?;
    let current: RunSnapshot = read_json(current_path)?;

    let report = compute_delta(previous.as_ref(), &current);
    emit(&report, output)
}

/// Maturity movement between two runs, overall and per section.
pub fn run_trend(
    previous_path: Option<&str>,
    current_path: &str,
    output: Option<&str>,
) -> Result<()> {
    let previous: Option<RunSnapshot> = previous_path.map(read_json).transpose()?;
    let current: RunSnapshot = read_json(current_path)?;

    let report = compute_trend(previous.as_ref(), &current);
    emit(&report, output)
}
