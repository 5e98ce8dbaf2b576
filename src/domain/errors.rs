//! Domain errors for the swarmops orchestration core.

use thiserror::Error;

/// Domain-level errors that can occur while orchestrating a run.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("phase not found: run {run_id} phase {phase_number}")]
    PhaseNotFound { run_id: String, phase_number: u32 },

    #[error("task dependency cycle detected involving task: {0}")]
    DependencyCycle(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error("merge conflict on branch {branch}: {files:?}")]
    MergeConflict { branch: String, files: Vec<String> },

    #[error("merge failed fatally: {0}")]
    MergeFatal(String),

    #[error("gateway request failed: {0}")]
    GatewayError(String),

    #[error("dispatch guard blocked the spawn: {0}")]
    GuardBlocked(String),

    #[error("spawn verification failed after retries: {0}")]
    SpawnVerificationFailed(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Convenience alias used throughout the orchestration core.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
