//! Posting orchestration for document lifecycle events.

use std::sync::Arc;

use engine_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::{builder, matcher, tax};
use crate::models::{
    Category, Direction, DocumentTotals, GstBreakdownRow, NewJournal, NewSubledgerEntry,
    SourceDocument, Trigger,
};
use crate::ports::{BreakdownStore, JournalStore, RuleStore, RunClaim, RunStore, SubledgerStore};
use crate::services::metrics::{ERRORS_TOTAL, POSTING_DURATION, RULE_OUTCOMES_TOTAL, RUNS_TOTAL};

/// How a rule posting failure affects the caller.
///
/// `Continue` keeps the document's own status transition unaffected:
/// the failure is logged, counted, and recorded on the posting run for
/// remediation. `Propagate` returns the first failure as an error so the
/// caller can block or retry the business action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Continue,
    Propagate,
}

impl FailurePolicy {
    /// Map the `continue_on_posting_failure` configuration flag onto a
    /// policy.
    pub fn from_continue_flag(continue_on_failure: bool) -> Self {
        if continue_on_failure {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Propagate
        }
    }
}

/// Why a matched rule produced no journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every rule line was skipped (zero amounts, bad labels, no accounts).
    NoUsableLines,
}

/// Why a matched rule's posting failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// Built lines do not balance: a configuration error for this rule.
    /// Nothing is persisted.
    Unbalanced {
        debit_total: Decimal,
        credit_total: Decimal,
    },
    /// A journal or subledger write failed. Already-persisted records for
    /// this rule are left in place for remediation.
    Persistence { message: String },
}

/// Per-rule outcome of a posting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RuleOutcome {
    Posted {
        rule_id: Uuid,
        journal_id: Uuid,
        subledger_entry_ids: Vec<Uuid>,
    },
    Skipped {
        rule_id: Uuid,
        reason: SkipReason,
    },
    Failed {
        rule_id: Uuid,
        reason: FailReason,
    },
}

impl RuleOutcome {
    fn label(&self) -> &'static str {
        match self {
            RuleOutcome::Posted { .. } => "posted",
            RuleOutcome::Skipped { .. } => "skipped",
            RuleOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result of one posting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingReport {
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub trigger: Trigger,
    pub outcomes: Vec<RuleOutcome>,
}

impl PostingReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome, RuleOutcome::Failed { .. }))
    }
}

/// Sequences tax breakdown, rule matching, journal posting and subledger
/// creation when a document enters a triggering lifecycle status.
///
/// Collaborators are injected at construction; the orchestrator holds no
/// global state and issues its steps strictly in sequence.
pub struct PostingEngine {
    rules: Arc<dyn RuleStore>,
    journals: Arc<dyn JournalStore>,
    subledgers: Arc<dyn SubledgerStore>,
    breakdowns: Arc<dyn BreakdownStore>,
    runs: Arc<dyn RunStore>,
    failure_policy: FailurePolicy,
}

impl PostingEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        journals: Arc<dyn JournalStore>,
        subledgers: Arc<dyn SubledgerStore>,
        breakdowns: Arc<dyn BreakdownStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            rules,
            journals,
            subledgers,
            breakdowns,
            runs,
            failure_policy: FailurePolicy::Continue,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Entry point for document status changes. Statuses that trigger no
    /// posting return `None`.
    pub async fn handle_status_change(
        &self,
        document: &SourceDocument,
        totals: &DocumentTotals,
        status: &str,
    ) -> Result<Option<PostingReport>, AppError> {
        let Some(trigger) = Trigger::for_status(document.category, status) else {
            return Ok(None);
        };
        self.process(document, totals, trigger).await.map(Some)
    }

    /// Run the posting sequence for a lifecycle event.
    #[instrument(
        skip(self, document, totals),
        fields(
            tenant_id = %document.tenant_id,
            document_id = %document.document_id,
            reference = %document.number,
            trigger = %trigger
        )
    )]
    pub async fn process(
        &self,
        document: &SourceDocument,
        totals: &DocumentTotals,
        trigger: Trigger,
    ) -> Result<PostingReport, AppError> {
        let timer = POSTING_DURATION
            .with_label_values(&[trigger.as_str()])
            .start_timer();

        let mut report = PostingReport {
            tenant_id: document.tenant_id,
            document_id: document.document_id,
            trigger,
            outcomes: Vec::new(),
        };

        // Guard against double-posting: the run row is claimed before any
        // journal exists, so a concurrent duplicate trigger no-ops.
        let claim = self
            .runs
            .begin_run(document.tenant_id, document.document_id, trigger)
            .await?;
        if claim == RunClaim::AlreadyHandled {
            info!("Posting already handled for this event, skipping");
            RUNS_TOTAL.with_label_values(&["duplicate"]).inc();
            timer.observe_duration();
            return Ok(report);
        }

        // Amount resolution for the tax-regime sources depends on the
        // breakdown, so it is computed and persisted before any rule runs.
        let breakdown = if document.category == Category::Invoice {
            let rows = tax::compute_breakdown(
                &document.lines,
                document.origin_state.as_deref(),
                document.destination_state.as_deref(),
            );
            self.breakdowns
                .replace_breakdown(document.tenant_id, document.document_id, &rows)
                .await?;
            rows
        } else {
            Vec::new()
        };

        let rules = self.rules.active_rules(document.tenant_id).await?;
        let matched = matcher::match_rules(
            &rules,
            document.category,
            trigger,
            document.transaction_type.as_deref(),
            document.division_id,
        );

        if matched.is_empty() {
            info!("No accounting rules configured for this event");
            self.finish_run(&report).await?;
            timer.observe_duration();
            return Ok(report);
        }

        for rule in matched {
            let outcome = self
                .post_rule(rule, document, totals, &breakdown, trigger)
                .await;
            RULE_OUTCOMES_TOTAL
                .with_label_values(&[outcome.label()])
                .inc();

            if let RuleOutcome::Failed { rule_id, reason } = &outcome {
                let failed_rule = *rule_id;
                warn!(
                    rule_id = %failed_rule,
                    reason = ?reason,
                    "Rule posting failed"
                );
                ERRORS_TOTAL.with_label_values(&["posting_failed"]).inc();

                if self.failure_policy == FailurePolicy::Propagate {
                    report.outcomes.push(outcome);
                    let detail = serde_json::to_value(&report).unwrap_or_default();
                    self.runs
                        .fail_run(document.tenant_id, document.document_id, trigger, &detail)
                        .await?;
                    timer.observe_duration();
                    return Err(AppError::InternalError(anyhow::anyhow!(
                        "Posting failed for rule {} on document {}",
                        failed_rule,
                        document.number
                    )));
                }
            }

            report.outcomes.push(outcome);
        }

        self.finish_run(&report).await?;
        timer.observe_duration();

        info!(
            outcome_count = report.outcomes.len(),
            failed = report.has_failures(),
            "Posting run finished"
        );

        Ok(report)
    }

    /// Build, balance-check, create, post and subledger one matched rule.
    /// Persistence failures become a `Failed` outcome, never a panic or an
    /// early return: each rule stands alone.
    async fn post_rule(
        &self,
        rule: &crate::models::AccountingRule,
        document: &SourceDocument,
        totals: &DocumentTotals,
        breakdown: &[GstBreakdownRow],
        trigger: Trigger,
    ) -> RuleOutcome {
        let built = builder::build_journal_lines(rule, &document.number, trigger, totals, breakdown);

        for skip in &built.skipped {
            info!(rule_id = %rule.rule_id, skip = ?skip, "Rule line skipped");
        }

        if built.lines.is_empty() {
            info!(rule_id = %rule.rule_id, "Rule produced no journal lines");
            return RuleOutcome::Skipped {
                rule_id: rule.rule_id,
                reason: SkipReason::NoUsableLines,
            };
        }

        let journal = NewJournal {
            tenant_id: document.tenant_id,
            journal_date: document.document_date,
            transaction_type: rule.category.clone(),
            reference: document.number.clone(),
            lines: built.lines,
        };

        // Imbalance is a configuration error for this rule: reject before
        // anything is persisted.
        if !journal.is_balanced() {
            return RuleOutcome::Failed {
                rule_id: rule.rule_id,
                reason: FailReason::Unbalanced {
                    debit_total: journal.debit_total(),
                    credit_total: journal.credit_total(),
                },
            };
        }

        let header = match self.journals.create_journal(&journal).await {
            Ok(header) => header,
            Err(e) => {
                return RuleOutcome::Failed {
                    rule_id: rule.rule_id,
                    reason: FailReason::Persistence {
                        message: format!("create_journal: {}", e),
                    },
                };
            }
        };

        if let Err(e) = self
            .journals
            .post_journal(document.tenant_id, header.journal_id)
            .await
        {
            return RuleOutcome::Failed {
                rule_id: rule.rule_id,
                reason: FailReason::Persistence {
                    message: format!("post_journal {}: {}", header.journal_id, e),
                },
            };
        }

        info!(
            rule_id = %rule.rule_id,
            journal_id = %header.journal_id,
            "Journal posted"
        );

        let mut subledger_entry_ids = Vec::new();
        for line in journal.lines.iter().filter(|line| line.track_subledger) {
            let direction = if line.debit.is_some() {
                Direction::Debit
            } else {
                Direction::Credit
            };
            let entry = NewSubledgerEntry {
                tenant_id: document.tenant_id,
                journal_id: header.journal_id,
                party_id: document.party_id,
                party_contact_id: document.party_contact_id,
                entry_date: document.document_date,
                amount: line.amount(),
                direction,
                source_reference: document.number.clone(),
                category: document.category,
                trigger,
            };

            match self.subledgers.create_entry(&entry).await {
                Ok(created) => {
                    if let Err(e) = self
                        .journals
                        .attach_subledger_entry(
                            document.tenant_id,
                            header.journal_id,
                            line.line_no,
                            created.entry_id,
                        )
                        .await
                    {
                        warn!(
                            journal_id = %header.journal_id,
                            entry_id = %created.entry_id,
                            error = %e,
                            "Failed to attach subledger back-reference"
                        );
                    }
                    subledger_entry_ids.push(created.entry_id);
                }
                Err(e) => {
                    return RuleOutcome::Failed {
                        rule_id: rule.rule_id,
                        reason: FailReason::Persistence {
                            message: format!(
                                "create_subledger_entry for journal {}: {}",
                                header.journal_id, e
                            ),
                        },
                    };
                }
            }
        }

        RuleOutcome::Posted {
            rule_id: rule.rule_id,
            journal_id: header.journal_id,
            subledger_entry_ids,
        }
    }

    async fn finish_run(&self, report: &PostingReport) -> Result<(), AppError> {
        let detail = serde_json::to_value(report).unwrap_or_default();
        if report.has_failures() {
            RUNS_TOTAL.with_label_values(&["failed"]).inc();
            self.runs
                .fail_run(report.tenant_id, report.document_id, report.trigger, &detail)
                .await
        } else {
            RUNS_TOTAL.with_label_values(&["completed"]).inc();
            self.runs
                .complete_run(report.tenant_id, report.document_id, report.trigger, &detail)
                .await
        }
    }
}
