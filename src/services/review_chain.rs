//! Review Chain Engine (C10): runs an ordered sequence of reviewer roles,
//! each of which must approve before the next is invoked, with one
//! optional reviewer (`designer`) conditionally included based on diff
//! content.
//!
//! Modeled as the explicit state machine `spec.md` §9 calls for
//! (`AwaitingReviewer<idx> | AwaitingFixer | Completed`, see
//! [`crate::domain::models::ReviewChainPhase`]) rather than ambient
//! booleans; no direct teacher analogue, built fresh in the teacher's
//! struct/enum style.

use std::collections::HashMap;
use std::sync::Arc;

use regex::RegexSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Escalation, ReviewChainState, ReviewDecision, RoleRegistry};
use crate::domain::ports::gateway::CleanupPolicy;
use crate::domain::ports::{EscalationStore, VcsAdapter};
use crate::services::agent_dispatch::{AgentDispatcher, DispatchRequest};

/// Fixed base chain before the conditional `designer` reviewer, per
/// `spec.md` §4.9.
const BASE_CHAIN: &[&str] = &["reviewer", "security-reviewer"];
const DESIGNER_ROLE: &str = "designer";

/// File-name patterns that mark a changed file as frontend, per `spec.md`
/// §6's regex set: extensions `.vue`/`.tsx`/`.jsx`/`.css`/`.scss`, or a
/// path containing `components/`, `pages/`, `layouts/`, or `assets/`.
fn frontend_file_patterns() -> RegexSet {
    RegexSet::new([
        r"\.vue$",
        r"\.tsx$",
        r"\.jsx$",
        r"\.css$",
        r"\.scss$",
        r"components/",
        r"pages/",
        r"layouts/",
        r"assets/",
    ])
    .expect("static regex set is valid")
}

/// Context needed to build a reviewer/fixer prompt for one phase.
#[derive(Debug, Clone)]
pub struct PhaseReviewContext {
    pub run_id: String,
    pub phase_number: u32,
    pub repo_dir: String,
    pub base_branch: String,
    pub phase_branch: String,
    pub project_name: Option<String>,
}

/// What happened as a result of a reviewer decision or an explicit
/// `start_chain`/`advance` call.
#[derive(Debug, Clone)]
pub enum ReviewChainOutcome {
    /// The next reviewer in the chain was spawned.
    NextReviewer { session_key: String, role: String },
    /// Every chain member has approved.
    ChainComplete,
    /// A fixer was spawned in response to a `fix` decision.
    FixerSpawned { session_key: String },
    /// A reviewer escalated; an `Escalation` record was created.
    Escalated { escalation_id: String },
}

struct ActiveSession {
    run_id: String,
    phase_number: u32,
    role: String,
}

/// Runs the ordered reviewer chain for a phase.
pub struct ReviewChainEngine {
    vcs: Arc<dyn VcsAdapter>,
    dispatcher: Arc<AgentDispatcher>,
    roles: RoleRegistry,
    escalations: Arc<dyn EscalationStore>,
    frontend_patterns: RegexSet,
    chains: RwLock<HashMap<(String, u32), ReviewChainState>>,
    contexts: RwLock<HashMap<(String, u32), PhaseReviewContext>>,
    sessions: RwLock<HashMap<String, ActiveSession>>,
}

impl ReviewChainEngine {
    #[must_use]
    pub fn new(
        vcs: Arc<dyn VcsAdapter>,
        dispatcher: Arc<AgentDispatcher>,
        roles: RoleRegistry,
        escalations: Arc<dyn EscalationStore>,
    ) -> Self {
        Self {
            vcs,
            dispatcher,
            roles,
            escalations,
            frontend_patterns: frontend_file_patterns(),
            chains: RwLock::new(HashMap::new()),
            contexts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// `startChain(phase)`: builds the chain (conditionally including
    /// `designer`), spawns the first reviewer, and returns its session key.
    pub async fn start_chain(&self, ctx: PhaseReviewContext) -> DomainResult<ReviewChainOutcome> {
        let mut chain: Vec<String> = BASE_CHAIN.iter().map(|s| (*s).to_string()).collect();

        let changed = self
            .vcs
            .diff_names(std::path::Path::new(&ctx.repo_dir), &ctx.base_branch, &ctx.phase_branch)
            .await?;
        if changed.iter().any(|file| self.frontend_patterns.is_match(file)) {
            chain.push(DESIGNER_ROLE.to_string());
        }

        let state = ReviewChainState::new(ctx.run_id.clone(), ctx.phase_number, chain);
        let key = (ctx.run_id.clone(), ctx.phase_number);

        self.chains.write().await.insert(key.clone(), state.clone());
        self.contexts.write().await.insert(key, ctx.clone());

        let role = state.current_role().expect("freshly built chain is never empty").to_string();
        let session_key = self.spawn_reviewer(&ctx, &state, &role).await?;
        Ok(ReviewChainOutcome::NextReviewer { session_key, role })
    }

    /// `onDecision`: routes a reviewer's decision back into the chain.
    pub async fn on_decision(
        &self,
        session_key: &str,
        decision: ReviewDecision,
    ) -> DomainResult<ReviewChainOutcome> {
        let active = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_key)
                .map(|s| (s.run_id.clone(), s.phase_number, s.role.clone()))
                .ok_or_else(|| DomainError::ValidationFailed(format!("unknown reviewer session {session_key}")))?
        };
        let (run_id, phase_number, role) = active;

        match decision {
            ReviewDecision::Approve => self.advance(&run_id, phase_number, &role).await,
            ReviewDecision::Fix { fix_instructions } => {
                self.spawn_fixer(&run_id, phase_number, &fix_instructions).await
            }
            ReviewDecision::Escalate { escalation_reason } => {
                let escalation = Escalation::new(Uuid::new_v4().to_string(), escalation_reason);
                let id = escalation.id.clone();
                self.escalations.create(escalation).await?;
                Ok(ReviewChainOutcome::Escalated { escalation_id: id })
            }
        }
    }

    /// `advance(phase, approvedRole)`: record the approval; spawn the next
    /// reviewer, or report chain completion.
    async fn advance(&self, run_id: &str, phase_number: u32, approved_role: &str) -> DomainResult<ReviewChainOutcome> {
        let key = (run_id.to_string(), phase_number);
        let mut chains = self.chains.write().await;
        let state = chains
            .get_mut(&key)
            .ok_or_else(|| DomainError::ValidationFailed(format!("no review chain for {run_id}/{phase_number}")))?;

        let complete = state.advance(approved_role);
        if complete {
            return Ok(ReviewChainOutcome::ChainComplete);
        }

        let role = state.current_role().expect("index < len when not complete").to_string();
        let state_snapshot = state.clone();
        drop(chains);

        let ctx = self
            .contexts
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| DomainError::ValidationFailed(format!("no review context for {run_id}/{phase_number}")))?;

        let session_key = self.spawn_reviewer(&ctx, &state_snapshot, &role).await?;
        Ok(ReviewChainOutcome::NextReviewer { session_key, role })
    }

    /// `reset(phase)`: restart the chain from its first reviewer after a
    /// fixer has applied changes. Called once the external fix-complete
    /// callback reports the fixer finished.
    pub async fn on_fixer_complete(&self, run_id: &str, phase_number: u32) -> DomainResult<ReviewChainOutcome> {
        let key = (run_id.to_string(), phase_number);
        let state_snapshot = {
            let mut chains = self.chains.write().await;
            let state = chains
                .get_mut(&key)
                .ok_or_else(|| DomainError::ValidationFailed(format!("no review chain for {run_id}/{phase_number}")))?;
            state.reset();
            state.clone()
        };

        let ctx = self
            .contexts
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| DomainError::ValidationFailed(format!("no review context for {run_id}/{phase_number}")))?;

        let role = state_snapshot.current_role().expect("reset chain is never empty").to_string();
        let session_key = self.spawn_reviewer(&ctx, &state_snapshot, &role).await?;
        Ok(ReviewChainOutcome::NextReviewer { session_key, role })
    }

    async fn spawn_reviewer(&self, ctx: &PhaseReviewContext, state: &ReviewChainState, role: &str) -> DomainResult<String> {
        let prompt = self.build_review_prompt(ctx, state, role);
        let phase_name = ctx.project_name.clone().unwrap_or_else(|| ctx.run_id.clone());
        let label = format!("{role}:{phase_name}:phase-{}", ctx.phase_number);

        let result = self
            .dispatcher
            .spawn(DispatchRequest {
                task: prompt,
                label,
                model: self.roles.get(role).and_then(|r| r.model.clone()),
                thinking: self.roles.get(role).and_then(|r| r.thinking.clone()),
                cleanup: CleanupPolicy::Keep,
                run_timeout_seconds: None,
                skip_guard: false,
                skip_verify: false,
                project_name: ctx.project_name.clone(),
            })
            .await?;

        self.sessions.write().await.insert(
            result.session_key.clone(),
            ActiveSession { run_id: ctx.run_id.clone(), phase_number: ctx.phase_number, role: role.to_string() },
        );
        Ok(result.session_key)
    }

    async fn spawn_fixer(&self, run_id: &str, phase_number: u32, fix_instructions: &str) -> DomainResult<ReviewChainOutcome> {
        let key = (run_id.to_string(), phase_number);
        let ctx = self
            .contexts
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| DomainError::ValidationFailed(format!("no review context for {run_id}/{phase_number}")))?;

        let prompt = format!(
            "Apply the following requested fix to branch {} (base {}):\n\n{}",
            ctx.phase_branch, ctx.base_branch, fix_instructions
        );
        let phase_name = ctx.project_name.clone().unwrap_or_else(|| ctx.run_id.clone());
        let label = format!("fixer:{phase_name}:phase-{phase_number}");

        let result = self
            .dispatcher
            .spawn(DispatchRequest {
                task: prompt,
                label,
                model: self.roles.get("fixer").and_then(|r| r.model.clone()),
                thinking: None,
                cleanup: CleanupPolicy::Keep,
                run_timeout_seconds: None,
                skip_guard: false,
                skip_verify: false,
                project_name: ctx.project_name.clone(),
            })
            .await?;

        self.sessions.write().await.insert(
            result.session_key.clone(),
            ActiveSession { run_id: run_id.to_string(), phase_number, role: "fixer".to_string() },
        );
        Ok(ReviewChainOutcome::FixerSpawned { session_key: result.session_key })
    }

    fn build_review_prompt(&self, ctx: &PhaseReviewContext, state: &ReviewChainState, role: &str) -> String {
        let position = state
            .chain
            .iter()
            .enumerate()
            .map(|(i, r)| if i == state.current_index { format!("[{r}]") } else { r.clone() })
            .collect::<Vec<_>>()
            .join(" -> ");

        let instructions = self
            .roles
            .get(role)
            .map(|cfg| cfg.prompt_template.clone())
            .unwrap_or_else(|| format!("Review the changes on {} as a {role}.", ctx.phase_branch));

        format!(
            "{instructions}\n\nYou are reviewer {} of {}: {position}\n\nBranch: {} (base {})\n\n\
             Respond with exactly one decision: approve, fix (with fix_instructions), or escalate \
             (with escalation_reason).",
            state.current_index + 1,
            state.chain.len(),
            ctx.phase_branch,
            ctx.base_branch,
        )
    }

    /// Current state, for inspection by the orchestrator/CLI.
    pub async fn state_of(&self, run_id: &str, phase_number: u32) -> Option<ReviewChainState> {
        self.chains.read().await.get(&(run_id.to_string(), phase_number)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_patterns_match_vue_and_component_paths() {
        let set = frontend_file_patterns();
        assert!(set.is_match("src/Widget.vue"));
        assert!(set.is_match("src/components/Button.tsx"));
        assert!(set.is_match("src/styles/app.css"));
        assert!(!set.is_match("src/api.rs"));
    }
}
