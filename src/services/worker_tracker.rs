//! Worker Tracker (C9): polls the gateway for liveness of outstanding
//! workers and emits completion events into the event ledger.
//!
//! Process-wide singleton, grounded on the teacher's
//! `infrastructure::mcp::health_monitor` polling-loop shape and the
//! `circuit_breaker` singleton-state pattern for the shared map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::models::ledger::entry_type;
use crate::domain::models::LedgerEntry;
use crate::domain::ports::{EventLedger, GatewayClient};

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_TRACK_TIME: chrono::Duration = chrono::Duration::minutes(30);

#[derive(Debug, Clone)]
struct TrackedSession {
    label: String,
    start_time: DateTime<Utc>,
    project_name: Option<String>,
}

/// A read-only view of one tracked session, for `snapshot()` callers.
#[derive(Debug, Clone)]
pub struct TrackedSessionView {
    pub session_key: String,
    pub label: String,
    pub start_time: DateTime<Utc>,
    pub project_name: Option<String>,
}

/// Polls the gateway for session liveness of outstanding workers.
pub struct WorkerTracker {
    gateway: Arc<dyn GatewayClient>,
    ledger: Arc<dyn EventLedger>,
    sessions: Mutex<HashMap<String, TrackedSession>>,
    loop_running: Mutex<bool>,
}

impl WorkerTracker {
    #[must_use]
    pub fn new(gateway: Arc<dyn GatewayClient>, ledger: Arc<dyn EventLedger>) -> Self {
        Self {
            gateway,
            ledger,
            sessions: Mutex::new(HashMap::new()),
            loop_running: Mutex::new(false),
        }
    }

    /// Track `session_key`, ensuring the polling loop is running.
    pub async fn track(self: &Arc<Self>, session_key: String, label: String, project_name: Option<String>) {
        {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(
                session_key,
                TrackedSession { label, start_time: Utc::now(), project_name },
            );
        }
        self.ensure_loop_running();
    }

    /// Manually finalize a session, e.g. when the caller observes
    /// completion through a channel other than polling.
    pub async fn mark_completed(&self, session_key: &str, output: Option<String>) {
        let removed = { self.sessions.lock().await.remove(session_key) };
        if let Some(session) = removed {
            let elapsed = (Utc::now() - session.start_time).num_milliseconds();
            let _ = self
                .ledger
                .append(
                    session.project_name.as_deref().unwrap_or("global"),
                    LedgerEntry::new(
                        entry_type::WORKER_COMPLETED,
                        serde_json::json!({
                            "sessionKey": session_key,
                            "label": session.label,
                            "elapsedMs": elapsed,
                            "output": output,
                        }),
                    ),
                )
                .await;
        }
    }

    /// Observable snapshot of currently tracked sessions.
    pub async fn snapshot(&self) -> Vec<TrackedSessionView> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|(key, session)| TrackedSessionView {
                session_key: key.clone(),
                label: session.label.clone(),
                start_time: session.start_time,
                project_name: session.project_name.clone(),
            })
            .collect()
    }

    fn ensure_loop_running(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut running = this.loop_running.lock().await;
                if *running {
                    return;
                }
                *running = true;
            }
            this.poll_loop().await;
            *this.loop_running.lock().await = false;
        });
    }

    /// Runs until the tracked set is empty, then self-terminates; a
    /// subsequent `track()` call restarts it via `ensure_loop_running`.
    async fn poll_loop(self: &Arc<Self>) {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let keys: Vec<String> = { self.sessions.lock().await.keys().cloned().collect() };
            if keys.is_empty() {
                return;
            }

            let listing = match self.gateway.sessions_list(100, 1).await {
                Ok(sessions) => sessions,
                Err(err) => {
                    warn!(%err, "worker tracker: sessions_list poll failed");
                    continue;
                }
            };

            let now = Utc::now();
            let mut to_complete: Vec<(String, Option<String>)> = Vec::new();
            let mut to_drop_expired: Vec<String> = Vec::new();

            {
                let sessions = self.sessions.lock().await;
                for (key, session) in sessions.iter() {
                    if now - session.start_time > MAX_TRACK_TIME {
                        to_drop_expired.push(key.clone());
                        continue;
                    }
                    let found = listing.iter().find(|s| &s.session_key == key);
                    let terminal = found.is_none_or(|s| s.last_stop_reason.is_some());
                    if terminal {
                        to_complete.push((key.clone(), None));
                    }
                }
            }

            for key in to_drop_expired {
                self.sessions.lock().await.remove(&key);
                warn!(session_key = %key, "worker tracker: dropping session after 30-minute ceiling");
            }
            for (key, output) in to_complete {
                info!(session_key = %key, "worker tracker: observed terminal session");
                self.mark_completed(&key, output).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::ports::gateway::{SessionSummary, SpawnOutcome, SpawnParams};
    use async_trait::async_trait;

    struct FakeGateway {
        sessions: Mutex<Vec<SessionSummary>>,
    }

    #[async_trait]
    impl GatewayClient for FakeGateway {
        async fn sessions_spawn(&self, _params: &SpawnParams) -> DomainResult<SpawnOutcome> {
            unreachable!("not exercised in this test")
        }
        async fn sessions_list(&self, _limit: u32, _message_limit: u32) -> DomainResult<Vec<SessionSummary>> {
            Ok(self.sessions.lock().await.clone())
        }
    }

    struct NullLedger;
    #[async_trait]
    impl EventLedger for NullLedger {
        async fn append(&self, _run_id: &str, _entry: LedgerEntry) -> DomainResult<()> {
            Ok(())
        }
        async fn read_all(&self, _run_id: &str) -> DomainResult<Vec<LedgerEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn mark_completed_removes_the_session() {
        let gateway = Arc::new(FakeGateway { sessions: Mutex::new(Vec::new()) });
        let tracker = Arc::new(WorkerTracker::new(gateway, Arc::new(NullLedger)));
        tracker.track("s1".to_string(), "label".to_string(), None).await;
        assert_eq!(tracker.snapshot().await.len(), 1);

        tracker.mark_completed("s1", Some("done".to_string())).await;
        assert!(tracker.snapshot().await.is_empty());
    }
}
