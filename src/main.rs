//! swarmops CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use swarmops::cli::commands::{conflicts, ledger, merge, review, run};
use swarmops::cli::types::Commands;
use swarmops::cli::{Cli, ServiceGraph};
use swarmops::infrastructure::{Config, ConfigLoader, LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config: Config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load configuration")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    let _logger = LoggerImpl::init(&LogConfig::default()).context("failed to initialize logger")?;

    let graph = ServiceGraph::build(&config).await.context("failed to build service graph")?;

    match cli.command {
        Commands::Run { run_id, repo_dir, tasks_file, base_branch } => {
            run::execute(&graph, run_id, repo_dir, tasks_file, base_branch, cli.json).await?;
        }
        Commands::Merge { run_id, phase_number, project_goal } => {
            merge::execute_merge(&graph, run_id, phase_number, project_goal, cli.json).await?;
        }
        Commands::Resume { run_id, phase_number, merged_so_far, remaining_branches, project_goal } => {
            merge::execute_resume(&graph, run_id, phase_number, merged_so_far, remaining_branches, project_goal, cli.json).await?;
        }
        Commands::Review(review_cmd) => match review_cmd {
            swarmops::cli::ReviewCommands::Decide { session_key, decision } => {
                review::execute(&graph, session_key, decision, cli.json).await?;
            }
        },
        Commands::Ledger(ledger_cmd) => match ledger_cmd {
            swarmops::cli::LedgerCommands::Tail { run_id, r#type } => {
                ledger::execute(&graph, run_id, r#type, cli.json).await?;
            }
        },
        Commands::Conflicts(conflicts_cmd) => match conflicts_cmd {
            swarmops::cli::ConflictsCommands::Detect { repo_dir, base_branch, branches } => {
                conflicts::execute(&graph, repo_dir, base_branch, branches, cli.json).await?;
            }
        },
    }

    Ok(())
}
