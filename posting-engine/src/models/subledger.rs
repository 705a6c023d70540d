//! Per-party subledger models.
//!
//! A subledger entry tracks what a specific counterparty owes or is owed,
//! linked to the journal that posted it. The journal owns the posting; the
//! entry only references it. Party balances are derived reads over the
//! signed entries, never stored.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Entry direction (debit or credit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(Direction::Debit),
            "credit" => Some(Direction::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted subledger entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubledgerEntry {
    pub entry_id: Uuid,
    pub tenant_id: Uuid,
    pub journal_id: Uuid,
    /// Counterparty organization.
    pub party_id: Uuid,
    pub party_contact_id: Option<Uuid>,
    pub entry_date: NaiveDate,
    pub amount: Decimal,
    pub direction: String,
    pub source_reference: String,
    pub category: String,
    pub trigger_action: String,
    pub created_utc: DateTime<Utc>,
}

impl SubledgerEntry {
    /// Get parsed direction.
    pub fn parsed_direction(&self) -> Option<Direction> {
        Direction::from_str(&self.direction)
    }

    /// Get signed amount (positive for debit, negative for credit).
    pub fn signed_amount(&self) -> Decimal {
        match self.parsed_direction() {
            Some(Direction::Debit) => self.amount,
            Some(Direction::Credit) => -self.amount,
            None => Decimal::ZERO,
        }
    }
}

/// Input for creating a subledger entry.
#[derive(Debug, Clone)]
pub struct NewSubledgerEntry {
    pub tenant_id: Uuid,
    pub journal_id: Uuid,
    pub party_id: Uuid,
    pub party_contact_id: Option<Uuid>,
    pub entry_date: NaiveDate,
    pub amount: Decimal,
    pub direction: Direction,
    pub source_reference: String,
    pub category: super::Category,
    pub trigger: super::Trigger,
}
