//! Read-only document context handed to the engine.
//!
//! The engine never loads or mutates documents; the owning service passes
//! the fields relevant to posting at the moment of a status change.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Category;

/// Line item fields the tax calculator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxableLine {
    pub taxable_value: Decimal,
    /// Percentage, e.g. 18 for 18%.
    pub tax_rate: Decimal,
}

/// Snapshot of a document at the moment of a lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    /// Human-readable document number, carried into journal references.
    pub number: String,
    pub category: Category,
    /// Invoice type or payment mode; matched against rule subtype filters.
    pub transaction_type: Option<String>,
    pub division_id: Option<Uuid>,
    /// Counterparty organization.
    pub party_id: Uuid,
    pub party_contact_id: Option<Uuid>,
    pub document_date: NaiveDate,
    /// Remitting party's state code, e.g. "27".
    pub origin_state: Option<String>,
    /// Ship-to state code.
    pub destination_state: Option<String>,
    pub lines: Vec<TaxableLine>,
}

/// Computed totals for a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub item_value: Decimal,
    pub tax_value: Decimal,
    pub grand_total: Decimal,
}
