use std::time::Duration;

/// Classified reconcile failure. The class decides who deals with it:
/// Validation, AgentFailure, and RestoreFailure end up in the object's
/// `status` as a terminal Failed phase; Transient is retried silently by
/// the queue; Internal is logged and dropped. Display carries only the
/// user-facing message; the class travels separately through [`kind`].
///
/// [`kind`]: ReconcileError::kind
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    AgentFailure(String),

    #[error("{0}")]
    RestoreFailure(String),

    #[error("{0}")]
    Internal(String),
}

impl ReconcileError {
    /// Wrap a store or I/O error for implicit retry via requeue.
    pub fn transient(e: impl std::fmt::Display) -> Self {
        ReconcileError::Transient(e.to_string())
    }

    /// Short class label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Validation(_) => "validation",
            ReconcileError::Transient(_) => "transient",
            ReconcileError::AgentFailure(_) => "agent-failure",
            ReconcileError::RestoreFailure(_) => "restore-failure",
            ReconcileError::Internal(_) => "internal",
        }
    }
}

/// What a reconcile pass wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the object (or something it watches) changes.
    Done,
    /// Re-enqueue immediately: the pass advanced the phase machine and the
    /// next step should run without waiting for a watch event.
    Requeue,
    /// Re-enqueue after a delay, waiting on someone else to make progress.
    RequeueAfter(Duration),
}
