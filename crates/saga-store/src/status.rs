//! Saga status state machine.

use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// Status transitions:
/// ```text
/// Started ──► InProgress ──┬──► Completed
///     │                    │
///     └────────────────────┴──► Compensating ──┬──► Compensated
///                                              └──► Failed
/// ```
///
/// Exactly one of the terminal statuses is ever set; `Failed` means
/// compensation itself did not fully run and manual reconciliation
/// may be needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Saga state has been created, no step executed yet.
    #[default]
    Started,

    /// Forward steps are being executed.
    InProgress,

    /// A step failed and compensating actions are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Compensated,

    /// Compensation could not fully run (terminal state).
    Failed,
}

impl SagaStatus {
    /// Returns true if forward steps may still execute.
    pub fn can_execute(&self) -> bool {
        matches!(self, SagaStatus::Started | SagaStatus::InProgress)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Started | SagaStatus::InProgress)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Returns the status name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::InProgress => "IN_PROGRESS",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Compensated => "COMPENSATED",
            SagaStatus::Failed => "FAILED",
        }
    }

    /// Parses a persisted status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STARTED" => Some(SagaStatus::Started),
            "IN_PROGRESS" => Some(SagaStatus::InProgress),
            "COMPENSATING" => Some(SagaStatus::Compensating),
            "COMPLETED" => Some(SagaStatus::Completed),
            "COMPENSATED" => Some(SagaStatus::Compensated),
            "FAILED" => Some(SagaStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
