//! GST breakdown models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One breakdown row per distinct tax rate in a document.
///
/// Intra-state documents split the tax into equal CGST and SGST halves;
/// inter-state documents carry the full tax as IGST. The two regimes are
/// mutually exclusive within a row, and the three amounts always sum to
/// the row's total tax.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct GstBreakdownRow {
    pub tax_rate: Decimal,
    pub taxable_value: Decimal,
    pub cgst_rate: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_rate: Decimal,
    pub sgst_amount: Decimal,
    pub igst_rate: Decimal,
    pub igst_amount: Decimal,
}

impl GstBreakdownRow {
    pub fn total_tax(&self) -> Decimal {
        self.cgst_amount + self.sgst_amount + self.igst_amount
    }
}
