//! Journal line building for matched rules.

use tracing::warn;

use crate::engine::resolver::resolve_amount;
use crate::models::{
    AccountingRule, DocumentTotals, GstBreakdownRow, NewJournalLine, Trigger,
};

/// Reason a rule line produced no journal lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSkip {
    /// The stored amount-source label is outside the closed set.
    UnknownAmountSource { line_no: i32, label: String },
    /// The source resolved to zero; lines with nothing to post are omitted.
    ZeroAmount { line_no: i32 },
    /// Neither a debit nor a credit account is configured.
    NoAccounts { line_no: i32 },
}

/// Journal lines built from one rule, with per-line skips for the caller
/// to log.
#[derive(Debug, Clone)]
pub struct BuiltJournal {
    pub lines: Vec<NewJournalLine>,
    pub skipped: Vec<LineSkip>,
}

/// Build journal line drafts for a matched rule.
///
/// Rule line at position n emits a debit leg at line number 2n-1 and a
/// credit leg at 2n, both carrying the resolved amount and a narration of
/// rule name, document reference and trigger. A line may emit one leg
/// only, with its opposite leg coming from another rule line; whether the
/// journal as a whole balances is checked before posting, not here.
///
/// For a line flagged for subledger tracking, the flag is carried on its
/// first emitted leg (debit when present, otherwise credit) so posting
/// produces exactly one subledger entry per flagged rule line.
pub fn build_journal_lines(
    rule: &AccountingRule,
    reference: &str,
    trigger: Trigger,
    totals: &DocumentTotals,
    breakdown: &[GstBreakdownRow],
) -> BuiltJournal {
    let mut lines = Vec::new();
    let mut skipped = Vec::new();

    for rule_line in &rule.lines {
        let line_no = rule_line.line_no;

        let Some(source) = rule_line.parsed_amount_source() else {
            warn!(
                rule_id = %rule.rule_id,
                line_no,
                label = %rule_line.amount_source,
                "Unknown amount source label, skipping rule line"
            );
            skipped.push(LineSkip::UnknownAmountSource {
                line_no,
                label: rule_line.amount_source.clone(),
            });
            continue;
        };

        let amount = resolve_amount(source, totals, breakdown);
        if amount.is_zero() {
            skipped.push(LineSkip::ZeroAmount { line_no });
            continue;
        }

        if rule_line.debit_account.is_none() && rule_line.credit_account.is_none() {
            skipped.push(LineSkip::NoAccounts { line_no });
            continue;
        }

        let narration = format!("{} | {} | {}", rule.name, reference, trigger.as_str());
        let mut tracked = false;

        if let Some(account) = &rule_line.debit_account {
            let mut leg = NewJournalLine::debit(2 * line_no - 1, account, amount, &narration);
            leg.track_subledger = rule_line.track_subledger;
            tracked = rule_line.track_subledger;
            lines.push(leg);
        }
        if let Some(account) = &rule_line.credit_account {
            let mut leg = NewJournalLine::credit(2 * line_no, account, amount, &narration);
            leg.track_subledger = rule_line.track_subledger && !tracked;
            lines.push(leg);
        }
    }

    BuiltJournal { lines, skipped }
}
