//! `review decide` CLI command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::context::ServiceGraph;
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ReviewDecisionArg;
use crate::domain::models::ReviewDecision;
use crate::services::review_chain::ReviewChainOutcome;

#[derive(Debug, Serialize)]
pub struct ReviewDecideOutput {
    pub outcome: String,
    pub detail: Option<String>,
}

impl CommandOutput for ReviewDecideOutput {
    fn to_human(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {detail}", self.outcome),
            None => self.outcome.clone(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<ReviewChainOutcome> for ReviewDecideOutput {
    fn from(outcome: ReviewChainOutcome) -> Self {
        match outcome {
            ReviewChainOutcome::NextReviewer { session_key, role } => {
                Self { outcome: "next-reviewer".to_string(), detail: Some(format!("{role} ({session_key})")) }
            }
            ReviewChainOutcome::ChainComplete => Self { outcome: "chain-complete".to_string(), detail: None },
            ReviewChainOutcome::FixerSpawned { session_key } => {
                Self { outcome: "fixer-spawned".to_string(), detail: Some(session_key) }
            }
            ReviewChainOutcome::Escalated { escalation_id } => {
                Self { outcome: "escalated".to_string(), detail: Some(escalation_id) }
            }
        }
    }
}

pub async fn execute(graph: &ServiceGraph, session_key: String, decision: ReviewDecisionArg, json_mode: bool) -> Result<()> {
    let decision = match decision {
        ReviewDecisionArg::Approve => ReviewDecision::Approve,
        ReviewDecisionArg::Fix { fix_instructions } => ReviewDecision::Fix { fix_instructions },
        ReviewDecisionArg::Escalate { escalation_reason } => ReviewDecision::Escalate { escalation_reason },
    };

    let outcome = graph
        .orchestrator
        .on_review_decision(&session_key, decision)
        .await
        .context("failed to route review decision")?;

    output(&ReviewDecideOutput::from(outcome), json_mode);
    Ok(())
}
