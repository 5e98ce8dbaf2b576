//! Agent Dispatch (C8): a guarded client wrapping the gateway's spawn RPC
//! with circuit breaking, sliding-window rate limiting, exponential
//! backoff, unique labeling, and optional start-verification.
//!
//! Process-wide state (`circuit`, `recent_attempts`) lives behind a single
//! lock per the ownership rule in `spec.md` §3 ("the circuit state is
//! process-wide; only the agent dispatcher mutates it"), grounded on the
//! teacher's `circuit_breaker::CircuitBreakerManager` singleton pattern and
//! `infrastructure::claude::{retry, rate_limiter}`'s backoff/window shapes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ledger::entry_type;
use crate::domain::models::{CircuitState, LedgerEntry};
use crate::domain::ports::gateway::{CleanupPolicy, SpawnFailure, SpawnOutcome, SpawnParams};
use crate::domain::ports::{EventLedger, GatewayClient};
use crate::services::worker_tracker::WorkerTracker;

/// Tunables for [`AgentDispatcher`], with the defaults from `spec.md` §4.7.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_consecutive_failures: u32,
    pub circuit_open_duration: chrono::Duration,
    pub max_concurrent_spawns: usize,
    pub spawn_window: chrono::Duration,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: u64,
    pub verify_max_polls: u32,
    pub verify_poll_interval: Duration,
    pub spawn_max_retries: u32,
    pub verification_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            circuit_open_duration: chrono::Duration::milliseconds(60_000),
            max_concurrent_spawns: 5,
            spawn_window: chrono::Duration::milliseconds(20_000),
            backoff_base_ms: 2_000,
            backoff_max_ms: 60_000,
            backoff_multiplier: 2,
            verify_max_polls: 5,
            verify_poll_interval: Duration::from_secs(2),
            spawn_max_retries: 2,
            // Open Question (spec.md §9): the source disabled verification
            // via a hard-coded flag. We default to enabled, per the guidance
            // to make this configurable and default-safe, and document the
            // tradeoff in DESIGN.md rather than guess at the race it hints at.
            verification_enabled: true,
        }
    }
}

/// Request parameters for [`AgentDispatcher::spawn`].
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub task: String,
    pub label: String,
    pub model: Option<String>,
    pub thinking: Option<String>,
    pub cleanup: CleanupPolicy,
    pub run_timeout_seconds: Option<u64>,
    pub skip_guard: bool,
    pub skip_verify: bool,
    pub project_name: Option<String>,
}

/// Successful dispatch result.
#[derive(Debug, Clone)]
pub struct DispatchSuccess {
    pub session_key: String,
    pub label: String,
}

/// Guarded gateway spawn client (C8).
pub struct AgentDispatcher {
    gateway: Arc<dyn GatewayClient>,
    ledger: Arc<dyn EventLedger>,
    tracker: Arc<WorkerTracker>,
    config: DispatchConfig,
    circuit: Mutex<CircuitState>,
    recent_attempts: Mutex<VecDeque<chrono::DateTime<Utc>>>,
}

impl AgentDispatcher {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        ledger: Arc<dyn EventLedger>,
        tracker: Arc<WorkerTracker>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            gateway,
            ledger,
            tracker,
            config,
            circuit: Mutex::new(CircuitState::default()),
            recent_attempts: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether the circuit is currently open (for external inspection, e.g.
    /// by the CLI's status command).
    pub async fn circuit_open(&self) -> bool {
        self.circuit.lock().await.is_open(Utc::now())
    }

    /// Step 1: circuit + sliding-window guard.
    async fn can_spawn(&self) -> DomainResult<()> {
        let now = Utc::now();
        let circuit = self.circuit.lock().await;
        if circuit.is_open(now) {
            let residual = circuit.open_until.map(|u| (u - now).num_milliseconds()).unwrap_or(0);
            return Err(DomainError::GuardBlocked(format!("circuit open for {residual}ms more")));
        }
        drop(circuit);

        let mut attempts = self.recent_attempts.lock().await;
        let window_start = now - self.config.spawn_window;
        while attempts.front().is_some_and(|t| *t < window_start) {
            attempts.pop_front();
        }
        if attempts.len() >= self.config.max_concurrent_spawns {
            let oldest = *attempts.front().unwrap();
            let wait = (oldest + self.config.spawn_window - now).num_milliseconds().max(0);
            return Err(DomainError::GuardBlocked(format!("rate limit exceeded, retry in {wait}ms")));
        }
        Ok(())
    }

    fn record_attempt_now(attempts: &mut VecDeque<chrono::DateTime<Utc>>) {
        attempts.push_back(Utc::now());
    }

    /// Step 2: backoff proportional to the current consecutive-failure count.
    async fn backoff_if_needed(&self) {
        let failures = self.circuit.lock().await.failures;
        if failures == 0 {
            return;
        }
        let exp = self.config.backoff_multiplier.saturating_pow(failures - 1);
        let backoff_ms = self.config.backoff_base_ms.saturating_mul(exp).min(self.config.backoff_max_ms);
        sleep(Duration::from_millis(backoff_ms)).await;
    }

    /// Step 3: append `"<unixMillis>-<4 base36 random chars>"`, truncating
    /// the base label so the total stays within 64 characters.
    #[must_use]
    pub fn unique_label(base: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix_chars: String = {
            let mut rng = rand::rng();
            (0..4)
                .map(|_| {
                    let n = rng.random_range(0..36u32);
                    std::char::from_digit(n, 36).unwrap_or('0')
                })
                .collect()
        };
        let suffix = format!("-{millis}-{suffix_chars}");
        let max_base_len = 64usize.saturating_sub(suffix.len());
        let truncated_base: String = base.chars().take(max_base_len).collect();
        format!("{truncated_base}{suffix}")
    }

    async fn record_failure(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_failure(self.config.max_consecutive_failures, self.config.circuit_open_duration, Utc::now());
    }

    async fn record_success(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_success(Utc::now());
    }

    /// Full `spawn(params)` contract from `spec.md` §4.7.
    pub async fn spawn(&self, request: DispatchRequest) -> DomainResult<DispatchSuccess> {
        if !request.skip_guard {
            self.can_spawn().await?;
        }

        self.backoff_if_needed().await;

        let mut retries_left = self.config.spawn_max_retries;
        loop {
            let label = Self::unique_label(&request.label);

            {
                let mut attempts = self.recent_attempts.lock().await;
                Self::record_attempt_now(&mut attempts);
            }

            let params = SpawnParams {
                task: request.task.clone(),
                label: label.clone(),
                model: request.model.clone(),
                thinking: request.thinking.clone(),
                cleanup: request.cleanup,
                run_timeout_seconds: request.run_timeout_seconds,
            };

            let outcome = self.gateway.sessions_spawn(&params).await;
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.record_failure().await;
                    return Err(err);
                }
            };

            let session_key = match outcome {
                SpawnOutcome::Accepted { session_key, .. } => session_key,
                SpawnOutcome::Rejected(SpawnFailure::Http(code)) => {
                    self.record_failure().await;
                    return Err(DomainError::GatewayError(format!("HTTP_{code}")));
                }
                SpawnOutcome::Rejected(SpawnFailure::SpawnError(message)) => {
                    self.record_failure().await;
                    return Err(DomainError::GatewayError(format!("SPAWN_ERROR: {message}")));
                }
            };

            if request.skip_verify || !self.config.verification_enabled {
                self.finish_success(&session_key, &label, request.project_name.as_deref()).await?;
                return Ok(DispatchSuccess { session_key, label });
            }

            if self.verify_session_started(&session_key).await {
                self.finish_success(&session_key, &label, request.project_name.as_deref()).await?;
                return Ok(DispatchSuccess { session_key, label });
            }

            warn!(%session_key, %label, "spawn verification timed out, session appears to be a zombie");
            if retries_left == 0 {
                self.record_failure().await;
                return Err(DomainError::SpawnVerificationFailed(session_key));
            }
            retries_left -= 1;
        }
    }

    async fn finish_success(&self, session_key: &str, label: &str, project_name: Option<&str>) -> DomainResult<()> {
        self.record_success().await;
        self.ledger
            .append(
                "global",
                LedgerEntry::new(
                    entry_type::WORKER_SPAWNED,
                    serde_json::json!({ "sessionKey": session_key, "label": label }),
                ),
            )
            .await?;
        self.tracker.track(session_key.to_string(), label.to_string(), project_name.map(str::to_string)).await;
        info!(%session_key, %label, "agent spawned");
        Ok(())
    }

    /// Step 5: poll `sessions_list` up to `verify_max_polls` times,
    /// considering the session "running" once it reports tokens, an
    /// assigned model, or any messages.
    async fn verify_session_started(&self, session_key: &str) -> bool {
        for _ in 0..self.config.verify_max_polls {
            sleep(self.config.verify_poll_interval).await;
            let Ok(sessions) = self.gateway.sessions_list(50, 1).await else { continue };
            if let Some(session) = sessions.iter().find(|s| s.session_key == session_key) {
                if session.total_tokens > 0 || session.model.is_some() || session.message_count > 0 {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_label_respects_length_bound() {
        let long_base = "x".repeat(200);
        let label = AgentDispatcher::unique_label(&long_base);
        assert!(label.len() <= 64);
    }

    #[test]
    fn unique_labels_differ_across_calls() {
        let mut labels = std::collections::HashSet::new();
        for _ in 0..50 {
            labels.insert(AgentDispatcher::unique_label("worker"));
        }
        assert_eq!(labels.len(), 50);
    }

    #[test]
    fn unique_label_short_base_stays_under_bound() {
        let label = AgentDispatcher::unique_label("w1");
        assert!(label.starts_with("w1-"));
        assert!(label.len() <= 64);
    }
}
