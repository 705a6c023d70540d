//! Amount resolution for rule lines.

use rust_decimal::Decimal;

use crate::models::{AmountSource, DocumentTotals, GstBreakdownRow};

/// Resolve a rule line's amount source against the document's computed
/// totals and GST breakdown. The match is exhaustive over the closed
/// enum, so an unhandled source is a compile error, not a runtime one.
pub fn resolve_amount(
    source: AmountSource,
    totals: &DocumentTotals,
    breakdown: &[GstBreakdownRow],
) -> Decimal {
    match source {
        AmountSource::ItemValue => totals.item_value,
        AmountSource::TaxValue => totals.tax_value,
        AmountSource::DocumentValue => totals.grand_total,
        AmountSource::CgstValue => breakdown.iter().map(|row| row.cgst_amount).sum(),
        AmountSource::SgstValue => breakdown.iter().map(|row| row.sgst_amount).sum(),
        AmountSource::IgstValue => breakdown.iter().map(|row| row.igst_amount).sum(),
    }
}
