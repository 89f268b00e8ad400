//! Batch lifecycle types shared between the worker and whoever drives it
//!
//! The worker emits [`BatchEvent`]s; the driving side renders them and never
//! mutates batch state directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// State of one batch run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchStatus {
    /// Not started
    Idle,
    /// Iterating input rows
    Running,
    /// Every row was attempted
    Completed,
    /// Cancelled between rows
    Stopped,
    /// Halted by a fatal failure
    Error,
}

impl BatchStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        match (self, next) {
            (Self::Idle, Self::Running | Self::Error | Self::Stopped) => true,
            (Self::Running, Self::Completed | Self::Stopped | Self::Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Idle => write!(f, "idle"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Stopped => write!(f, "stopped"),
            BatchStatus::Error => write!(f, "error"),
        }
    }
}

/// Event delivered from the batch worker to the driving side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum BatchEvent {
    /// `current` attempted rows out of `total` input rows
    Progress { current: usize, total: usize },
    /// Human-readable status line
    Status(String),
    /// Batch completed without being stopped
    Finished,
    /// Batch halted by a fatal failure
    Error(String),
}

impl BatchEvent {
    pub fn progress(current: usize, total: usize) -> Self {
        Self::Progress { current, total }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error(_))
    }
}

/// Outcome counters of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: BatchStatus,
    pub total_rows: usize,
    /// Rows whose fetch/extract ran to an outcome (written, not found or failed)
    pub attempted: usize,
    pub written: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Rows skipped because the identifier was empty
    pub blank: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchSummary {
    pub fn new(input_path: PathBuf, output_path: PathBuf, total_rows: usize) -> Self {
        Self {
            input_path,
            output_path,
            status: BatchStatus::Idle,
            total_rows,
            attempted: 0,
            written: 0,
            not_found: 0,
            failed: 0,
            blank: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn transition(&mut self, next: BatchStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_only_moves_forward() {
        assert!(BatchStatus::Idle.can_transition_to(BatchStatus::Running));
        assert!(BatchStatus::Running.can_transition_to(BatchStatus::Stopped));
        assert!(!BatchStatus::Completed.can_transition_to(BatchStatus::Running));
        assert!(!BatchStatus::Idle.can_transition_to(BatchStatus::Completed));
    }

    #[test]
    fn summary_records_finish_time_on_terminal_state() {
        let mut summary = BatchSummary::new("in.csv".into(), "out.xlsx".into(), 3);
        assert!(summary.transition(BatchStatus::Running));
        assert!(summary.finished_at.is_none());
        assert!(summary.transition(BatchStatus::Completed));
        assert!(summary.finished_at.is_some());
        assert!(!summary.transition(BatchStatus::Error));
        assert_eq!(summary.status, BatchStatus::Completed);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&BatchEvent::progress(2, 5)).unwrap();
        assert_eq!(json, r#"{"type":"Progress","payload":{"current":2,"total":5}}"#);
        assert!(BatchEvent::Finished.is_terminal());
    }
}
