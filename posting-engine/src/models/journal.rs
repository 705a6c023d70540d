//! Journal models for double-entry posting.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Journal lifecycle. Draft -> Posted -> Reversed, no other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    Draft,
    Posted,
    Reversed,
}

impl JournalStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "draft",
            JournalStatus::Posted => "posted",
            JournalStatus::Reversed => "reversed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "posted" => JournalStatus::Posted,
            "reversed" => JournalStatus::Reversed,
            _ => JournalStatus::Draft,
        }
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Journal header.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JournalHeader {
    pub journal_id: Uuid,
    pub tenant_id: Uuid,
    pub journal_date: NaiveDate,
    pub transaction_type: String,
    /// Source document number, free text.
    pub reference: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub posted_utc: Option<DateTime<Utc>>,
    pub reversed_utc: Option<DateTime<Utc>>,
}

impl JournalHeader {
    /// Get parsed status.
    pub fn parsed_status(&self) -> JournalStatus {
        JournalStatus::from_string(&self.status)
    }
}

/// Single journal leg. Exactly one of debit/credit is populated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JournalLine {
    pub line_id: Uuid,
    pub journal_id: Uuid,
    pub line_no: i32,
    pub account_code: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub narration: String,
    pub subledger_entry_id: Option<Uuid>,
}

impl JournalLine {
    /// Get signed amount (positive for debit, negative for credit).
    pub fn signed_amount(&self) -> Decimal {
        self.debit.unwrap_or(Decimal::ZERO) - self.credit.unwrap_or(Decimal::ZERO)
    }
}

/// Draft journal prior to persistence.
#[derive(Debug, Clone)]
pub struct NewJournal {
    pub tenant_id: Uuid,
    pub journal_date: NaiveDate,
    pub transaction_type: String,
    pub reference: String,
    pub lines: Vec<NewJournalLine>,
}

impl NewJournal {
    pub fn debit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter_map(|line| line.debit)
            .sum()
    }

    pub fn credit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter_map(|line| line.credit)
            .sum()
    }

    /// A journal may only be posted when debits equal credits.
    pub fn is_balanced(&self) -> bool {
        self.debit_total() == self.credit_total()
    }
}

/// Draft journal leg.
#[derive(Debug, Clone)]
pub struct NewJournalLine {
    pub line_no: i32,
    pub account_code: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub narration: String,
    /// Marks the leg that produces the subledger entry for its rule line.
    pub track_subledger: bool,
}

impl NewJournalLine {
    pub fn debit(line_no: i32, account_code: &str, amount: Decimal, narration: &str) -> Self {
        Self {
            line_no,
            account_code: account_code.to_string(),
            debit: Some(amount),
            credit: None,
            narration: narration.to_string(),
            track_subledger: false,
        }
    }

    pub fn credit(line_no: i32, account_code: &str, amount: Decimal, narration: &str) -> Self {
        Self {
            line_no,
            account_code: account_code.to_string(),
            debit: None,
            credit: Some(amount),
            narration: narration.to_string(),
            track_subledger: false,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.debit.or(self.credit).unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn journal(lines: Vec<NewJournalLine>) -> NewJournal {
        NewJournal {
            tenant_id: Uuid::new_v4(),
            journal_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            transaction_type: "invoice".to_string(),
            reference: "INV-001".to_string(),
            lines,
        }
    }

    #[test]
    fn balanced_when_debits_equal_credits() {
        let j = journal(vec![
            NewJournalLine::debit(1, "1200", Decimal::from(1770), "test"),
            NewJournalLine::credit(2, "4000", Decimal::from(1770), "test"),
        ]);
        assert!(j.is_balanced());
        assert_eq!(j.debit_total(), Decimal::from(1770));
        assert_eq!(j.credit_total(), Decimal::from(1770));
    }

    #[test]
    fn unbalanced_when_one_leg_missing() {
        let j = journal(vec![NewJournalLine::debit(
            1,
            "1200",
            Decimal::from(500),
            "test",
        )]);
        assert!(!j.is_balanced());
    }

    #[test]
    fn signed_amount_negates_credits() {
        let line = JournalLine {
            line_id: Uuid::new_v4(),
            journal_id: Uuid::new_v4(),
            line_no: 2,
            account_code: "4000".to_string(),
            debit: None,
            credit: Some(Decimal::from(100)),
            narration: String::new(),
            subledger_entry_id: None,
        };
        assert_eq!(line.signed_amount(), Decimal::from(-100));
    }
}
