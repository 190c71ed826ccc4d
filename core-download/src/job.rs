//! # Download Job State Machine
//!
//! ```text
//! Pending → Running → Succeeded
//!     │         │
//!     └─────────┴───→ Failed
//! ```
//!
//! Terminal jobs carry their [`JobOutcome`]: the stored vault entry, or the
//! error text shown to the user.

use crate::error::{DownloadError, Result};
use core_library::VaultEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| DownloadError::InvalidJobId(e.to_string()))?,
        ))
    }

    /// First eight hex digits, used in thread names and logs.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded { entry: VaultEntry },
    Failed { error: String },
}

/// Title and body of the message shown when a job finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn entry(&self) -> Option<&VaultEntry> {
        match self {
            JobOutcome::Succeeded { entry } => Some(entry),
            JobOutcome::Failed { .. } => None,
        }
    }

    /// Successful jobs are named after the stored video, failed ones after
    /// their URL.
    pub fn notification(&self, url: &str) -> Notification {
        match self {
            JobOutcome::Succeeded { entry } => Notification {
                title: format!("Download succeeded: {}", entry.display_name()),
                body: None,
            },
            JobOutcome::Failed { error } => Notification {
                title: format!("Download failed: {}", url),
                body: Some(format!("Error: {}", error)),
            },
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// One download-and-ingest unit of work.
///
/// Cookies are not kept on the job; they go straight to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub outcome: Option<JobOutcome>,
    /// Unix millis
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            url: url.into(),
            status: JobStatus::Pending,
            outcome: None,
            created_at: current_timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(mut self) -> Result<Self> {
        self.validate_transition(JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(current_timestamp());
        Ok(self)
    }

    pub fn succeed(mut self, entry: VaultEntry) -> Result<Self> {
        self.validate_transition(JobStatus::Succeeded)?;
        self.status = JobStatus::Succeeded;
        self.completed_at = Some(current_timestamp());
        self.outcome = Some(JobOutcome::Succeeded { entry });
        Ok(self)
    }

    pub fn fail(mut self, error: impl Into<String>) -> Result<Self> {
        self.validate_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.completed_at = Some(current_timestamp());
        self.outcome = Some(JobOutcome::Failed {
            error: error.into(),
        });
        Ok(self)
    }

    /// Notification for a finished job; `None` while it is still active.
    pub fn notification(&self) -> Option<Notification> {
        self.outcome.as_ref().map(|o| o.notification(&self.url))
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    fn validate_transition(&self, to: JobStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        );

        if !valid {
            return Err(DownloadError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
