//! Posting run records.
//!
//! One row per (tenant, document, trigger): the idempotency guard against
//! double-posting, and the operator-visible record of runs that failed and
//! need remediation. Completed runs are terminal; failed runs may be
//! retried by invoking the engine again for the same event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Posting run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::InProgress,
        }
    }
}

/// Persisted posting run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostingRun {
    pub run_id: Uuid,
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub trigger_action: String,
    pub status: String,
    /// Structured per-rule outcome report.
    pub detail: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl PostingRun {
    pub fn parsed_status(&self) -> RunStatus {
        RunStatus::from_string(&self.status)
    }
}
