//! Common test utilities: in-memory port implementations so the posting
//! sequence can be exercised end-to-end without a database.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use engine_core::error::AppError;
use posting_engine::engine::{FailurePolicy, PostingEngine};
use posting_engine::models::{
    AccountingRule, AmountSource, Category, DocumentTotals, GstBreakdownRow, JournalHeader,
    JournalLine, JournalStatus, NewJournal, NewSubledgerEntry, PostingRun, RuleLine, RunStatus,
    SourceDocument, SubledgerEntry, TaxableLine, Trigger,
};
use posting_engine::ports::{
    BreakdownStore, JournalStore, RuleStore, RunClaim, RunStore, SubledgerStore,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,posting_engine=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// -----------------------------------------------------------------------------
// In-memory stores
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRules {
    rules: Mutex<Vec<AccountingRule>>,
}

impl InMemoryRules {
    pub fn with_rules(rules: Vec<AccountingRule>) -> Arc<Self> {
        Arc::new(Self {
            rules: Mutex::new(rules),
        })
    }
}

#[async_trait]
impl RuleStore for InMemoryRules {
    async fn active_rules(&self, tenant_id: Uuid) -> Result<Vec<AccountingRule>, AppError> {
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .iter()
            .filter(|rule| rule.tenant_id == tenant_id && rule.is_active())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryJournals {
    journals: Mutex<HashMap<Uuid, (JournalHeader, Vec<JournalLine>)>>,
    pub fail_create: AtomicBool,
    pub fail_post: AtomicBool,
}

impl InMemoryJournals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.journals.lock().unwrap().len()
    }

    pub fn all_headers(&self) -> Vec<JournalHeader> {
        self.journals
            .lock()
            .unwrap()
            .values()
            .map(|(header, _)| header.clone())
            .collect()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournals {
    async fn create_journal(&self, journal: &NewJournal) -> Result<JournalHeader, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected create failure"
            )));
        }

        let journal_id = Uuid::new_v4();
        let header = JournalHeader {
            journal_id,
            tenant_id: journal.tenant_id,
            journal_date: journal.journal_date,
            transaction_type: journal.transaction_type.clone(),
            reference: journal.reference.clone(),
            status: JournalStatus::Draft.as_str().to_string(),
            created_utc: Utc::now(),
            posted_utc: None,
            reversed_utc: None,
        };
        let lines = journal
            .lines
            .iter()
            .map(|line| JournalLine {
                line_id: Uuid::new_v4(),
                journal_id,
                line_no: line.line_no,
                account_code: line.account_code.clone(),
                debit: line.debit,
                credit: line.credit,
                narration: line.narration.clone(),
                subledger_entry_id: None,
            })
            .collect();

        self.journals
            .lock()
            .unwrap()
            .insert(journal_id, (header.clone(), lines));

        Ok(header)
    }

    async fn post_journal(
        &self,
        _tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<JournalHeader, AppError> {
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected post failure"
            )));
        }

        let mut journals = self.journals.lock().unwrap();
        let (header, _) = journals
            .get_mut(&journal_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Journal {} not found", journal_id)))?;

        if header.parsed_status() != JournalStatus::Draft {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Journal {} is {}, only draft journals can be posted",
                journal_id,
                header.status
            )));
        }

        header.status = JournalStatus::Posted.as_str().to_string();
        header.posted_utc = Some(Utc::now());
        Ok(header.clone())
    }

    async fn reverse_journal(
        &self,
        _tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<JournalHeader, AppError> {
        let mut journals = self.journals.lock().unwrap();
        let (header, _) = journals
            .get_mut(&journal_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Journal {} not found", journal_id)))?;

        if header.parsed_status() != JournalStatus::Posted {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Journal {} is {}, only posted journals can be reversed",
                journal_id,
                header.status
            )));
        }

        header.status = JournalStatus::Reversed.as_str().to_string();
        header.reversed_utc = Some(Utc::now());
        Ok(header.clone())
    }

    async fn get_journal(
        &self,
        _tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Option<JournalHeader>, AppError> {
        Ok(self
            .journals
            .lock()
            .unwrap()
            .get(&journal_id)
            .map(|(header, _)| header.clone()))
    }

    async fn get_journal_lines(
        &self,
        _tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<JournalLine>, AppError> {
        Ok(self
            .journals
            .lock()
            .unwrap()
            .get(&journal_id)
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default())
    }

    async fn attach_subledger_entry(
        &self,
        _tenant_id: Uuid,
        journal_id: Uuid,
        line_no: i32,
        entry_id: Uuid,
    ) -> Result<(), AppError> {
        let mut journals = self.journals.lock().unwrap();
        if let Some((_, lines)) = journals.get_mut(&journal_id) {
            for line in lines.iter_mut() {
                if line.line_no == line_no {
                    line.subledger_entry_id = Some(entry_id);
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySubledger {
    entries: Mutex<Vec<SubledgerEntry>>,
    pub fail_create: AtomicBool,
}

impl InMemorySubledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all_entries(&self) -> Vec<SubledgerEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubledgerStore for InMemorySubledger {
    async fn create_entry(&self, entry: &NewSubledgerEntry) -> Result<SubledgerEntry, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected subledger failure"
            )));
        }

        let created = SubledgerEntry {
            entry_id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            journal_id: entry.journal_id,
            party_id: entry.party_id,
            party_contact_id: entry.party_contact_id,
            entry_date: entry.entry_date,
            amount: entry.amount,
            direction: entry.direction.as_str().to_string(),
            source_reference: entry.source_reference.clone(),
            category: entry.category.as_str().to_string(),
            trigger_action: entry.trigger.as_str().to_string(),
            created_utc: Utc::now(),
        };
        self.entries.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn party_balance(&self, tenant_id: Uuid, party_id: Uuid) -> Result<Decimal, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id && entry.party_id == party_id)
            .map(|entry| entry.signed_amount())
            .sum())
    }

    async fn entries_for_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<SubledgerEntry>, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id && entry.journal_id == journal_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBreakdowns {
    rows: Mutex<HashMap<(Uuid, Uuid), Vec<GstBreakdownRow>>>,
}

impl InMemoryBreakdowns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl BreakdownStore for InMemoryBreakdowns {
    async fn replace_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        rows: &[GstBreakdownRow],
    ) -> Result<(), AppError> {
        self.rows
            .lock()
            .unwrap()
            .insert((tenant_id, document_id), rows.to_vec());
        Ok(())
    }

    async fn get_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<GstBreakdownRow>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(tenant_id, document_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryRuns {
    runs: Mutex<HashMap<(Uuid, Uuid, String), (RunStatus, Option<serde_json::Value>)>>,
}

impl InMemoryRuns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status_of(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
    ) -> Option<RunStatus> {
        self.runs
            .lock()
            .unwrap()
            .get(&(tenant_id, document_id, trigger.as_str().to_string()))
            .map(|(status, _)| *status)
    }
}

#[async_trait]
impl RunStore for InMemoryRuns {
    async fn begin_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
    ) -> Result<RunClaim, AppError> {
        let key = (tenant_id, document_id, trigger.as_str().to_string());
        let mut runs = self.runs.lock().unwrap();
        match runs.get(&key) {
            Some((RunStatus::Failed, _)) | None => {
                runs.insert(key, (RunStatus::InProgress, None));
                Ok(RunClaim::Claimed)
            }
            Some(_) => Ok(RunClaim::AlreadyHandled),
        }
    }

    async fn complete_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError> {
        let key = (tenant_id, document_id, trigger.as_str().to_string());
        self.runs
            .lock()
            .unwrap()
            .insert(key, (RunStatus::Completed, Some(detail.clone())));
        Ok(())
    }

    async fn fail_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError> {
        let key = (tenant_id, document_id, trigger.as_str().to_string());
        self.runs
            .lock()
            .unwrap()
            .insert(key, (RunStatus::Failed, Some(detail.clone())));
        Ok(())
    }

    async fn failed_runs(&self, _tenant_id: Uuid) -> Result<Vec<PostingRun>, AppError> {
        Ok(Vec::new())
    }
}

// -----------------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------------

/// All in-memory stores plus the engine built over them.
pub struct TestHarness {
    pub engine: PostingEngine,
    pub rules: Arc<InMemoryRules>,
    pub journals: Arc<InMemoryJournals>,
    pub subledgers: Arc<InMemorySubledger>,
    pub breakdowns: Arc<InMemoryBreakdowns>,
    pub runs: Arc<InMemoryRuns>,
}

impl TestHarness {
    pub fn with_rules(rules: Vec<AccountingRule>) -> Self {
        Self::build(rules, FailurePolicy::Continue)
    }

    pub fn with_rules_and_policy(rules: Vec<AccountingRule>, policy: FailurePolicy) -> Self {
        Self::build(rules, policy)
    }

    fn build(rules: Vec<AccountingRule>, policy: FailurePolicy) -> Self {
        init_tracing();

        let rules = InMemoryRules::with_rules(rules);
        let journals = InMemoryJournals::new();
        let subledgers = InMemorySubledger::new();
        let breakdowns = InMemoryBreakdowns::new();
        let runs = InMemoryRuns::new();

        let engine = PostingEngine::new(
            rules.clone(),
            journals.clone(),
            subledgers.clone(),
            breakdowns.clone(),
            runs.clone(),
        )
        .with_failure_policy(policy);

        Self {
            engine,
            rules,
            journals,
            subledgers,
            breakdowns,
            runs,
        }
    }
}

/// Build an active rule for a tenant.
pub fn active_rule(
    tenant_id: Uuid,
    name: &str,
    category: Category,
    trigger: Trigger,
    lines: Vec<RuleLine>,
) -> AccountingRule {
    AccountingRule {
        rule_id: Uuid::new_v4(),
        tenant_id,
        name: name.to_string(),
        category: category.as_str().to_string(),
        reference_label: "document_no".to_string(),
        transaction_type: None,
        trigger_action: trigger.as_str().to_string(),
        division_id: None,
        status: "active".to_string(),
        created_utc: Utc::now(),
        lines,
    }
}

/// Build a rule line with the given accounts and source.
pub fn rule_line(
    rule_id: Uuid,
    line_no: i32,
    debit_account: Option<&str>,
    credit_account: Option<&str>,
    amount_source: AmountSource,
    track_subledger: bool,
) -> RuleLine {
    RuleLine {
        rule_line_id: Uuid::new_v4(),
        rule_id,
        line_no,
        debit_account: debit_account.map(str::to_string),
        credit_account: credit_account.map(str::to_string),
        amount_source: amount_source.as_str().to_string(),
        track_subledger,
    }
}

/// A two-line 18% invoice: taxable 1000 + 500, intra-state by default.
pub fn invoice_document(tenant_id: Uuid) -> SourceDocument {
    SourceDocument {
        document_id: Uuid::new_v4(),
        tenant_id,
        number: "INV-2026-001".to_string(),
        category: Category::Invoice,
        transaction_type: Some("standard".to_string()),
        division_id: None,
        party_id: Uuid::new_v4(),
        party_contact_id: None,
        document_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        origin_state: Some("27".to_string()),
        destination_state: Some("27".to_string()),
        lines: vec![
            TaxableLine {
                taxable_value: Decimal::from(1000),
                tax_rate: Decimal::from(18),
            },
            TaxableLine {
                taxable_value: Decimal::from(500),
                tax_rate: Decimal::from(18),
            },
        ],
    }
}

/// Totals matching `invoice_document`.
pub fn invoice_totals() -> DocumentTotals {
    DocumentTotals {
        item_value: Decimal::from(1500),
        tax_value: Decimal::from(270),
        grand_total: Decimal::from(1770),
    }
}

/// A payment document; no tax lines.
pub fn payment_document(tenant_id: Uuid) -> SourceDocument {
    SourceDocument {
        document_id: Uuid::new_v4(),
        tenant_id,
        number: "PAY-2026-042".to_string(),
        category: Category::Payment,
        transaction_type: Some("upi".to_string()),
        division_id: None,
        party_id: Uuid::new_v4(),
        party_contact_id: None,
        document_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        origin_state: None,
        destination_state: None,
        lines: Vec::new(),
    }
}

/// Totals for `payment_document`.
pub fn payment_totals(amount: i64) -> DocumentTotals {
    DocumentTotals {
        item_value: Decimal::from(amount),
        tax_value: Decimal::ZERO,
        grand_total: Decimal::from(amount),
    }
}
