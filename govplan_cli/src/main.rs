use anyhow::Result;
/// GovPlan CLI - Remediation Planning Toolkit
///
/// Provides plan, delta, and trend commands over assessment JSON.
use clap::{Parser, Subcommand};
use govplan_cli::commands;

#[derive(Parser)]
#[command(name = "govplan-cli")]
#[command(about = "GovPlan Remediation Planner - Decision Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision pipeline over an assessment bundle
    Plan {
        /// Path to the control catalogue JSON
        #[arg(short, long, default_value = "catalogue.json")]
        catalogue: String,
        /// Path to the control prerequisites JSON
        #[arg(short, long)]
        prereqs: Option<String>,
        /// Path to the assessment bundle JSON
        #[arg(short, long, default_value = "bundle.json")]
        bundle: String,
        /// Write the run record here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compare control statuses between two run records
    Delta {
        /// Path to the previous run record JSON
        #[arg(short, long)]
        previous: Option<String>,
        /// Path to the current run record JSON
        #[arg(short, long)]
        current: String,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compare maturity scores between two run records
    Trend {
        /// Path to the previous run record JSON
        #[arg(short, long)]
        previous: Option<String>,
        /// Path to the current run record JSON
        #[arg(short, long)]
        current: String,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            catalogue,
            prereqs,
            bundle,
            output,
        } => {
            commands::run_plan(
                &catalogue,
                prereqs.as_deref(),
                &bundle,
                output.as_deref(),
            )?;
        }
        Commands::Delta {
            previous,
            current,
            output,
        } => {
            commands::run_delta(previous.as_deref(), &current, output.as_deref())?;
        }
        Commands::Trend {
            previous,
            current,
            output,
        } => {
            commands::run_trend(previous.as_deref(), &current, output.as_deref())?;
        }
    }

    Ok(())
}
