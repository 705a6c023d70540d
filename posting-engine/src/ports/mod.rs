//! Narrow read/write contracts the orchestrator depends on.
//!
//! Services depend on these traits rather than on each other's concrete
//! types; `services::Database` implements all of them against PostgreSQL,
//! and tests substitute in-memory implementations.

use async_trait::async_trait;
use engine_core::error::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    AccountingRule, GstBreakdownRow, JournalHeader, JournalLine, NewJournal, NewSubledgerEntry,
    PostingRun, SubledgerEntry, Trigger,
};

/// Read access to a tenant's rule configuration.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All active rules for the tenant, lines included, ordered by line number.
    async fn active_rules(&self, tenant_id: Uuid) -> Result<Vec<AccountingRule>, AppError>;
}

/// Journal persistence and lifecycle.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Persist a header (Draft) and its lines atomically.
    async fn create_journal(&self, journal: &NewJournal) -> Result<JournalHeader, AppError>;

    /// Draft -> Posted. Any other current status is a conflict.
    async fn post_journal(&self, tenant_id: Uuid, journal_id: Uuid)
        -> Result<JournalHeader, AppError>;

    /// Posted -> Reversed. Status flag only; no offsetting lines are
    /// generated.
    async fn reverse_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<JournalHeader, AppError>;

    async fn get_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Option<JournalHeader>, AppError>;

    async fn get_journal_lines(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<JournalLine>, AppError>;

    /// Record the back-reference from a journal line to the subledger
    /// entry it produced.
    async fn attach_subledger_entry(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
        line_no: i32,
        entry_id: Uuid,
    ) -> Result<(), AppError>;
}

/// Per-party subledger persistence.
#[async_trait]
pub trait SubledgerStore: Send + Sync {
    async fn create_entry(&self, entry: &NewSubledgerEntry) -> Result<SubledgerEntry, AppError>;

    /// Signed sum (debit - credit) of the party's entries; derived, never
    /// stored.
    async fn party_balance(&self, tenant_id: Uuid, party_id: Uuid) -> Result<Decimal, AppError>;

    async fn entries_for_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<SubledgerEntry>, AppError>;
}

/// Storage for computed GST breakdowns, keyed by document.
#[async_trait]
pub trait BreakdownStore: Send + Sync {
    /// Replace the document's breakdown wholesale; the breakdown is
    /// immutable per document version.
    async fn replace_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        rows: &[GstBreakdownRow],
    ) -> Result<(), AppError>;

    async fn get_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<GstBreakdownRow>, AppError>;
}

/// Outcome of claiming a posting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunClaim {
    /// This invocation owns the run.
    Claimed,
    /// A completed or in-flight run already exists for this event.
    AlreadyHandled,
}

/// Idempotency guard and remediation record, one run per
/// (tenant, document, trigger).
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Claim the run before any posting happens. Failed runs are
    /// reclaimed (retry); completed and in-flight runs are not.
    async fn begin_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
    ) -> Result<RunClaim, AppError>;

    async fn complete_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError>;

    async fn fail_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError>;

    /// Runs awaiting manual remediation or retry.
    async fn failed_runs(&self, tenant_id: Uuid) -> Result<Vec<PostingRun>, AppError>;
}
