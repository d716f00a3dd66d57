// Core decision engine for the GovPlan remediation planner: identifier
// canonicalization, dependency ordering, risk/impact modelling, and
// cross-run comparison.

// Shared data model
pub mod types;

// Pipeline stages, in execution order
pub mod canonicalizer;
pub mod dependency_engine;
pub mod risk_impact;
pub mod transform_optimizer;
pub mod integrity;

// Orchestration and cross-run comparison
pub mod pipeline;
pub mod delta;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), "0.1.0");
    }
}
