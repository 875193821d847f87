//! Ingestion queue models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue entry lifecycle: `pending → processing → {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata supplied alongside a URL in a batch file.
///
/// When present these take precedence over extracted values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHints {
    pub title: Option<String>,
    pub publish_date: Option<String>,
    pub brand: Option<String>,
}

impl BatchHints {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.publish_date.is_none() && self.brand.is_none()
    }
}

/// A URL submitted for ingestion, with optional pre-supplied metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub hints: BatchHints,
}

impl Candidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hints: BatchHints::default(),
        }
    }
}

impl From<&str> for Candidate {
    fn from(url: &str) -> Self {
        Candidate::new(url)
    }
}

impl From<String> for Candidate {
    fn from(url: String) -> Self {
        Candidate::new(url)
    }
}

/// A durable queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    /// Normalized URL.
    pub url: String,
    pub status: QueueStatus,
    pub batch_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: String,
    pub retry_count: i32,
    pub hints: BatchHints,
}

/// Outcome of an enqueue call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueReport {
    pub batch_name: String,
    pub total_input: usize,
    pub accepted: usize,
    pub skipped_duplicate: usize,
    pub skipped_blocked: usize,
    /// Inputs that did not look like URLs.
    pub invalid: usize,
    /// Candidates whose membership check or insert failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Per-status entry counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: QueueStatus, count: u64) {
        match status {
            QueueStatus::Pending => self.pending += count,
            QueueStatus::Processing => self.processing += count,
            QueueStatus::Completed => self.completed += count,
            QueueStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in QueueStatus::ALL {
            assert_eq!(QueueStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(QueueStatus::from_str("done"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!QueueStatus::Pending.is_terminal());
        assert!(!QueueStatus::Processing.is_terminal());
        assert!(QueueStatus::Completed.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.add(QueueStatus::Pending, 3);
        counts.add(QueueStatus::Failed, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.pending, 3);
    }
}
