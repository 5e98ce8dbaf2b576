//! CLI type definitions: clap command structures for the `swarmops` binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "swarmops")]
#[command(about = "Multi-agent code-change orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format.
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to a config file, skipping the project default/local YAML layers.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the next ready phase: resolve the task graph, create worker
    /// worktrees, and dispatch an agent per task.
    Run {
        /// Orchestration run id.
        run_id: String,
        /// Path to the git repository workers operate in.
        repo_dir: String,
        /// Path to the project's task list file.
        tasks_file: String,
        /// Branch the phase's worktrees are created from.
        #[arg(short, long, default_value = "main")]
        base_branch: String,
    },

    /// Merge a phase's collected worker branches.
    Merge {
        run_id: String,
        phase_number: u32,
        /// Project goal, passed through to the merge's reviewer/fixer prompts.
        #[arg(short, long)]
        project_goal: Option<String>,
    },

    /// Resume a merge after a conflict has been resolved out of band.
    Resume {
        run_id: String,
        phase_number: u32,
        /// Branches already merged, comma-separated.
        #[arg(long, value_delimiter = ',')]
        merged_so_far: Vec<String>,
        /// Branches still to merge, comma-separated.
        #[arg(long, value_delimiter = ',')]
        remaining_branches: Vec<String>,
        #[arg(short, long)]
        project_goal: Option<String>,
    },

    /// Review chain operations.
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Event ledger operations.
    #[command(subcommand)]
    Ledger(LedgerCommands),

    /// Conflict-detection operations.
    #[command(subcommand)]
    Conflicts(ConflictsCommands),
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Route a reviewer's decision for a session into the review chain.
    Decide {
        session_key: String,
        #[command(subcommand)]
        decision: ReviewDecisionArg,
    },
}

#[derive(Subcommand)]
pub enum ReviewDecisionArg {
    /// The change is approved; advance the chain.
    Approve,
    /// The change needs fixes before re-review.
    Fix {
        /// Instructions handed to the spawned fixer.
        fix_instructions: String,
    },
    /// Escalate to a human.
    Escalate {
        /// Why this needs human attention.
        escalation_reason: String,
    },
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Print a run's ledger entries in write order.
    Tail {
        run_id: String,
        /// Restrict to one or more entry types (comma-separated).
        #[arg(short, long, value_delimiter = ',')]
        r#type: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ConflictsCommands {
    /// Dry-run a phase's merge order to flag branches likely to conflict.
    Detect {
        repo_dir: String,
        base_branch: String,
        /// Branches to check, comma-separated.
        #[arg(long, value_delimiter = ',')]
        branches: Vec<String>,
    },
}
