// Command implementations for the GovPlan planner CLI.

pub mod commands;
